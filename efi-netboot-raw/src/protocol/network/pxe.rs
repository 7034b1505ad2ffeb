// SPDX-License-Identifier: MIT OR Apache-2.0

//! PXE base-code constants: boot server types, filters and well known ports.

use bitflags::bitflags;

newtype_enum! {
/// Boot server type advertised in PXE boot-server and boot-menu options.
pub enum BootType: u16 => {
    /// Local boot: leave the network boot path.
    BOOTSTRAP = 0,
    MS_WINNT_RIS = 1,
    INTEL_LCM = 2,
    DOSUNDI = 3,
    NEC_ESMPRO = 4,
    IBM_WSOD = 5,
    IBM_LCCM = 6,
    CA_UNICENTER_TNG = 7,
    HP_OPENVIEW = 8,
    ALTIRIS_9 = 9,
    ALTIRIS_10 = 10,
    ALTIRIS_11 = 11,
    NOT_USED_12 = 12,
    REDHAT_INSTALL = 13,
    REDHAT_BOOT = 14,
    REMBO = 15,
    BEOBOOT = 16,
    PXETEST = 65535,
}}

/// Mask selecting the layer number out of a boot layer value.
pub const BOOT_LAYER_MASK: u16 = 0x7FFF;
/// Initial layer of a boot server.
pub const BOOT_LAYER_INITIAL: u16 = 0x0000;

/// Maximum number of addresses in an IP filter.
pub const MAX_IPCNT: usize = 8;
/// Maximum number of ARP cache entries.
pub const MAX_ARP_ENTRIES: usize = 8;
/// Maximum number of route table entries.
pub const MAX_ROUTE_ENTRIES: usize = 8;

pub const DEFAULT_TTL: u8 = 16;
pub const DEFAULT_TOS: u8 = 0;

/// Port a PXE boot server listens on for discover requests.
pub const BOOT_SERVER_PORT: u16 = 4011;
pub const DHCP4_SERVER_PORT: u16 = 67;
pub const DHCP4_CLIENT_PORT: u16 = 68;
pub const DHCP6_SERVER_PORT: u16 = 547;
pub const DHCP6_CLIENT_PORT: u16 = 546;

/// Size of a TFTP block; PXE file sizes are advertised in these units.
pub const BLOCK_SIZE: u64 = 512;

bitflags! {
    /// IP receive filter used by UDP reads.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[repr(transparent)]
    pub struct IpFilterFlags: u8 {
        const STATION_IP = 0x01;
        const BROADCAST = 0x02;
        const PROMISCUOUS = 0x04;
        const PROMISCUOUS_MULTICAST = 0x08;
    }
}

bitflags! {
    /// Operation flags of UDP reads and writes.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[repr(transparent)]
    pub struct UdpOpFlags: u16 {
        const ANY_SRC_IP = 0x0001;
        const ANY_SRC_PORT = 0x0002;
        const ANY_DEST_IP = 0x0004;
        const ANY_DEST_PORT = 0x0008;
        const USE_FILTER = 0x0010;
        const MAY_FRAGMENT = 0x0020;
    }
}

bitflags! {
    /// Discovery control bits of the PXE vendor option `DISCOVER_CTRL`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[repr(transparent)]
    pub struct DiscoverControl: u8 {
        const DISABLE_BROADCAST = 0x01;
        const DISABLE_MULTICAST = 0x02;
        const USE_SERVER_LIST = 0x04;
        const USE_BOOT_FILE_NAME = 0x08;
    }
}

newtype_enum! {
/// TFTP/MTFTP operation requested through the base code.
pub enum TftpOpcode: u32 => {
    FIRST = 0,
    TFTP_GET_FILE_SIZE = 1,
    TFTP_READ_FILE = 2,
    TFTP_WRITE_FILE = 3,
    TFTP_READ_DIRECTORY = 4,
    MTFTP_GET_FILE_SIZE = 5,
    MTFTP_READ_FILE = 6,
    MTFTP_READ_DIRECTORY = 7,
}}
