// SPDX-License-Identifier: MIT OR Apache-2.0

//! DHCPv4 / BOOTP packet layout and option tags, including the PXE vendor
//! sub-options carried in option 43.

/// Byte offsets of the fixed BOOTP header fields.
pub mod header {
    pub const OP: usize = 0;
    pub const HTYPE: usize = 1;
    pub const HLEN: usize = 2;
    pub const HOPS: usize = 3;
    pub const XID: usize = 4;
    pub const SECS: usize = 8;
    pub const FLAGS: usize = 10;
    pub const CIADDR: usize = 12;
    pub const YIADDR: usize = 16;
    pub const SIADDR: usize = 20;
    pub const GIADDR: usize = 24;
    pub const CHADDR: usize = 28;
    pub const CHADDR_LEN: usize = 16;
    pub const SNAME: usize = 44;
    pub const SNAME_LEN: usize = 64;
    pub const FILE: usize = 108;
    pub const FILE_LEN: usize = 128;
    pub const MAGIC: usize = 236;
    /// Start of the options area; also the size of the fixed header.
    pub const OPTIONS: usize = 240;
}

/// Value of the `magic` field of a DHCP packet.
pub const DHCP4_MAGIC: u32 = 0x6382_5363;

pub const BOOTP_OP_REQUEST: u8 = 1;
pub const BOOTP_OP_REPLY: u8 = 2;
pub const HTYPE_ETHERNET: u8 = 1;
/// Broadcast bit of the `flags` header field.
pub const FLAG_BROADCAST: u16 = 0x8000;

/// Largest DHCP packet the client caches or sends.
pub const DHCP4_PACKET_MAX_SIZE: usize = 1472;

newtype_enum! {
/// DHCPv4 option tags.
pub enum Dhcp4Tag: u8 => {
    PAD = 0,
    NETMASK = 1,
    TIME_OFFSET = 2,
    ROUTER = 3,
    TIME_SERVER = 4,
    NAME_SERVER = 5,
    DNS_SERVER = 6,
    HOSTNAME = 12,
    BOOTFILE_LEN = 13,
    DOMAINNAME = 15,
    ROOTPATH = 17,
    EXTEND_PATH = 18,
    EMTU = 22,
    TTL = 23,
    BROADCAST = 28,
    NIS_DOMAIN = 40,
    NIS_SERVER = 41,
    NTP_SERVER = 42,
    VENDOR = 43,
    REQUEST_IP = 50,
    LEASE = 51,
    OVERLOAD = 52,
    MSG_TYPE = 53,
    SERVER_ID = 54,
    PARA_LIST = 55,
    MAXMSG = 57,
    T1 = 58,
    T2 = 59,
    CLASS_ID = 60,
    CLIENT_ID = 61,
    TFTP = 66,
    BOOTFILE = 67,
    ARCH = 93,
    UNDI = 94,
    UUID = 97,
    EOP = 255,
}}

newtype_enum! {
/// Values of the message type option.
pub enum Dhcp4MsgType: u8 => {
    DISCOVER = 1,
    OFFER = 2,
    REQUEST = 3,
    DECLINE = 4,
    ACK = 5,
    NAK = 6,
    RELEASE = 7,
    INFORM = 8,
}}

/// Values of the overload option.
pub mod overload {
    pub const FILE: u8 = 1;
    pub const SNAME: u8 = 2;
    pub const FILE_AND_SNAME: u8 = 3;
}

newtype_enum! {
/// Sub-option tags of the PXE vendor option.
pub enum PxeVendorTag: u8 => {
    MTFTP_IP = 1,
    MTFTP_CPORT = 2,
    MTFTP_SPORT = 3,
    MTFTP_TMOUT = 4,
    MTFTP_DELAY = 5,
    DISCOVER_CTRL = 6,
    DISCOVER_MCAST = 7,
    BOOT_SERVERS = 8,
    BOOT_MENU = 9,
    MENU_PROMPT = 10,
    MCAST_ALLOC = 11,
    CREDENTIAL_TYPES = 12,
    BOOT_ITEM = 71,
    END = 255,
}}

/// Class identifier prefix sent and recognized by PXE clients and servers.
pub const PXE_CLASS_ID: &[u8; 9] = b"PXEClient";

/// Fixed part of the client's vendor class identifier; the architecture and
/// UNDI version digits are filled in at run time.
pub const PXE_CLASS_ID_TEMPLATE: &[u8; 32] = b"PXEClient:Arch:xxxxx:UNDI:003000";

/// Client system architecture type for x64 UEFI.
pub const CLIENT_ARCH_X64: u16 = 0x0007;
