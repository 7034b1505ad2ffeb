// SPDX-License-Identifier: MIT OR Apache-2.0

//! How the client presents itself to DHCP and boot servers.

use alloc::vec::Vec;

use efi_netboot_raw::Guid;
use efi_netboot_raw::protocol::network::dhcp4::{
    CLIENT_ARCH_X64, DHCP4_PACKET_MAX_SIZE, Dhcp4Tag, PXE_CLASS_ID_TEMPLATE,
};
use efi_netboot_raw::protocol::network::dhcp6::{DUID_TYPE_UUID, Dhcp6OptCode, PXE_ENTERPRISE_NUMBER};

use crate::proto::network::dhcp4::Dhcp4PacketOption;
use crate::proto::network::dhcp6::Dhcp6PacketOption;

/// Options a PXE client asks DHCPv4 servers for.
const DHCP4_REQUESTED_OPTIONS: [u8; 35] = [
    1, 2, 3, 4, 5, 6, 12, 13, 15, 17, 18, 22, 23, 28, 40, 41, 42, 43, 50, 51, 54, 58, 59, 60, 66,
    67, 97, 128, 129, 130, 131, 132, 133, 134, 135,
];

/// Options a PXE client asks DHCPv6 servers for.
const DHCP6_REQUESTED_OPTIONS: [Dhcp6OptCode; 4] = [
    Dhcp6OptCode::BOOT_FILE_URL,
    Dhcp6OptCode::BOOT_FILE_PARAM,
    Dhcp6OptCode::DNS_SERVERS,
    Dhcp6OptCode::VENDOR_CLASS,
];

/// Identity of the PXE client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Client system architecture type.
    pub architecture: u16,
    /// System UUID, sent as client identifier when known.
    pub system_guid: Option<Guid>,
    /// UNDI interface type.
    pub undi_type: u8,
    /// UNDI major version.
    pub undi_major: u8,
    /// UNDI minor version.
    pub undi_minor: u8,
    /// Identifier of the DHCPv6 IA_NA.
    pub ia_id: u32,
    /// Hardware address of the network interface.
    pub mac_address: [u8; 6],
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            architecture: CLIENT_ARCH_X64,
            system_guid: None,
            undi_type: 1,
            undi_major: 3,
            undi_minor: 0,
            ia_id: 0,
            mac_address: [0; 6],
        }
    }
}

impl ClientIdentity {
    /// The vendor class identifier, `PXEClient:Arch:AAAAA:UNDI:MMMmmm`.
    #[must_use]
    pub fn class_id(&self) -> [u8; 32] {
        let mut id = *PXE_CLASS_ID_TEMPLATE;
        write_decimal(&mut id[15..20], u32::from(self.architecture));
        write_decimal(&mut id[26..29], u32::from(self.undi_major));
        write_decimal(&mut id[29..32], u32::from(self.undi_minor));
        id
    }

    fn undi(&self) -> [u8; 3] {
        [self.undi_type, self.undi_major, self.undi_minor]
    }

    /// Options added to every DHCPv4 packet the client sends.
    #[must_use]
    pub fn dhcp4_options(&self) -> Vec<Dhcp4PacketOption> {
        let mut options = alloc::vec![
            Dhcp4PacketOption::new(Dhcp4Tag::MAXMSG, (DHCP4_PACKET_MAX_SIZE as u16).to_be_bytes()),
            Dhcp4PacketOption::new(Dhcp4Tag::PARA_LIST, DHCP4_REQUESTED_OPTIONS),
            Dhcp4PacketOption::new(Dhcp4Tag::CLASS_ID, self.class_id()),
            Dhcp4PacketOption::new(Dhcp4Tag::ARCH, self.architecture.to_be_bytes()),
            Dhcp4PacketOption::new(Dhcp4Tag::UNDI, self.undi()),
        ];
        if let Some(guid) = self.system_guid {
            let mut uuid = alloc::vec![0];
            uuid.extend_from_slice(&guid.to_bytes());
            options.push(Dhcp4PacketOption::new(Dhcp4Tag::UUID, uuid));
        }
        options
    }

    /// Options added to every DHCPv6 packet the client sends.
    #[must_use]
    pub fn dhcp6_options(&self) -> Vec<Dhcp6PacketOption> {
        let oro: Vec<u8> = DHCP6_REQUESTED_OPTIONS
            .iter()
            .flat_map(|code| code.0.to_be_bytes())
            .collect();

        let class_id = self.class_id();
        let mut vendor_class = Vec::with_capacity(6 + class_id.len());
        vendor_class.extend_from_slice(&PXE_ENTERPRISE_NUMBER.to_be_bytes());
        vendor_class.extend_from_slice(&(class_id.len() as u16).to_be_bytes());
        vendor_class.extend_from_slice(&class_id);

        let mut options = alloc::vec![
            Dhcp6PacketOption::new(Dhcp6OptCode::ORO, oro),
            Dhcp6PacketOption::new(Dhcp6OptCode::CLIENT_ARCH_TYPE, self.architecture.to_be_bytes()),
            Dhcp6PacketOption::new(Dhcp6OptCode::NII, self.undi()),
            Dhcp6PacketOption::new(Dhcp6OptCode::VENDOR_CLASS, vendor_class),
        ];
        if let Some(guid) = self.system_guid {
            let mut duid = DUID_TYPE_UUID.to_be_bytes().to_vec();
            duid.extend_from_slice(&guid.to_bytes());
            options.push(Dhcp6PacketOption::new(Dhcp6OptCode::CLIENT_ID, duid));
        }
        options
    }
}

/// Writes `value` as zero padded decimal filling all of `out`.
fn write_decimal(out: &mut [u8], mut value: u32) {
    for digit in out.iter_mut().rev() {
        *digit = b'0' + (value % 10) as u8;
        value /= 10;
    }
}
