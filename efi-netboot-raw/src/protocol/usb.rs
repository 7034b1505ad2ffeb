// SPDX-License-Identifier: MIT OR Apache-2.0

//! USB transfer and descriptor layouts, plus the CDC constants needed to bind
//! an RNDIS function.

use bitflags::bitflags;

newtype_enum! {
    pub enum DataDirection: i32 => {
        DATA_IN = 0,
        DATA_OUT = 1,
        NO_DATA = 2,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct DeviceRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct UsbTransferStatus: u32 {
        const NOT_EXECUTE = 0x0001;
        const STALL = 0x0002;
        const BUFFER = 0x0004;
        const BABBLE = 0x0008;
        const NAK = 0x0010;
        const CRC = 0x0020;
        const TIMEOUT = 0x0040;
        const BIT_STUFF = 0x0080;
        const SYSTEM = 0x0100;
    }
}

impl UsbTransferStatus {
    pub const SUCCESS: Self = Self::empty();
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct ConfigDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub total_length: u16,
    pub num_interfaces: u8,
    pub configuration_value: u8,
    pub configuration: u8,
    pub attributes: u8,
    pub max_power: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct InterfaceDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
    pub interface: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct EndpointDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub endpoint_address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl EndpointDescriptor {
    /// Returns true for IN (device to host) endpoints.
    #[must_use]
    pub const fn is_in(&self) -> bool {
        self.endpoint_address & ENDPOINT_DIR_IN != 0
    }

    /// Transfer type encoded in `attributes`.
    #[must_use]
    pub const fn transfer_type(&self) -> u8 {
        self.attributes & ENDPOINT_TYPE_MASK
    }
}

/// Direction bit of an endpoint address.
pub const ENDPOINT_DIR_IN: u8 = 0x80;
/// Mask selecting the transfer type out of endpoint attributes.
pub const ENDPOINT_TYPE_MASK: u8 = 0x03;
pub const ENDPOINT_CONTROL: u8 = 0x00;
pub const ENDPOINT_ISO: u8 = 0x01;
pub const ENDPOINT_BULK: u8 = 0x02;
pub const ENDPOINT_INTERRUPT: u8 = 0x03;

pub const DESC_TYPE_CONFIG: u8 = 0x02;
pub const DESC_TYPE_INTERFACE: u8 = 0x04;
pub const DESC_TYPE_ENDPOINT: u8 = 0x05;
/// Class-specific interface descriptor (CDC functional descriptors).
pub const DESC_TYPE_CS_INTERFACE: u8 = 0x24;

/// CDC functional descriptor sub-type: Ethernet Networking.
pub const CDC_ETHERNET_FUN_DESCRIPTOR: u8 = 0x0F;

/// Request type for a class request to an interface, host to device.
pub const REQUEST_TYPE_CLASS_INTERFACE_OUT: u8 = 0x21;
/// Request type for a class request to an interface, device to host.
pub const REQUEST_TYPE_CLASS_INTERFACE_IN: u8 = 0xA1;

/// CDC class request used to send an encapsulated command.
pub const SEND_ENCAPSULATED_COMMAND: u8 = 0x00;
/// CDC class request used to fetch an encapsulated response.
pub const GET_ENCAPSULATED_RESPONSE: u8 = 0x01;

/// Interface class, sub-class and protocol triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InterfaceClass {
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
}

impl InterfaceClass {
    /// Communications class, ACM sub-class, vendor-specific (RNDIS) protocol.
    pub const CDC_RNDIS: Self = Self::new(0x02, 0x02, 0xFF);
    /// Wireless controller class, RF sub-class, RNDIS protocol.
    pub const WIRELESS_RNDIS: Self = Self::new(0xE0, 0x01, 0x03);
    /// Miscellaneous class, network control sub-class, RNDIS over Ethernet.
    pub const MISC_RNDIS: Self = Self::new(0xEF, 0x04, 0x01);
    /// CDC data interface.
    pub const CDC_DATA: Self = Self::new(0x0A, 0x00, 0x00);

    #[must_use]
    pub const fn new(class: u8, subclass: u8, protocol: u8) -> Self {
        Self {
            class,
            subclass,
            protocol,
        }
    }

    /// Class triple of an interface descriptor.
    #[must_use]
    pub const fn of(desc: &InterfaceDescriptor) -> Self {
        Self::new(
            desc.interface_class,
            desc.interface_subclass,
            desc.interface_protocol,
        )
    }
}

/// CDC Ethernet Networking functional descriptor.
///
/// On the wire this descriptor is 13 bytes and unaligned, so it is decoded
/// field by field rather than overlaid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EthernetFunctionalDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub descriptor_subtype: u8,
    /// String descriptor index of the MAC address.
    pub mac_address: u8,
    pub ethernet_statistics: u32,
    pub max_segment_size: u16,
    pub number_mc_filters: u16,
    pub number_power_filters: u8,
}

impl EthernetFunctionalDescriptor {
    /// Encoded size of the descriptor.
    pub const SIZE: usize = 13;

    /// Decodes the descriptor from the start of `bytes`.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let b: &[u8; Self::SIZE] = bytes.get(..Self::SIZE)?.try_into().ok()?;
        Some(Self {
            length: b[0],
            descriptor_type: b[1],
            descriptor_subtype: b[2],
            mac_address: b[3],
            ethernet_statistics: u32::from_le_bytes([b[4], b[5], b[6], b[7]]),
            max_segment_size: u16::from_le_bytes([b[8], b[9]]),
            number_mc_filters: u16::from_le_bytes([b[10], b[11]]),
            number_power_filters: b[12],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_helpers() {
        let ep = EndpointDescriptor {
            length: 7,
            descriptor_type: DESC_TYPE_ENDPOINT,
            endpoint_address: 0x81,
            attributes: ENDPOINT_BULK,
            max_packet_size: 512,
            interval: 0,
        };
        assert!(ep.is_in());
        assert_eq!(ep.transfer_type(), ENDPOINT_BULK);
    }

    #[test]
    fn test_parse_ethernet_functional_descriptor() {
        let raw = [
            13, 0x24, 0x0F, 4, 0, 0, 0, 0, 0xEA, 0x05, 0x00, 0x00, 0x00, 0xFF,
        ];
        let desc = EthernetFunctionalDescriptor::parse(&raw).unwrap();
        assert_eq!(desc.descriptor_subtype, CDC_ETHERNET_FUN_DESCRIPTOR);
        assert_eq!(desc.mac_address, 4);
        assert_eq!(desc.max_segment_size, 1514);
        assert!(EthernetFunctionalDescriptor::parse(&raw[..12]).is_none());
    }
}
