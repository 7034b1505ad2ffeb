// SPDX-License-Identifier: MIT OR Apache-2.0

//! DHCPv6 message layout and option codes.
//!
//! A DHCPv6 message is a one byte type, a three byte transaction id and a
//! sequence of options. Each option is a big-endian `u16` code, a big-endian
//! `u16` length and the option data.

/// Size of the message type plus transaction id.
pub const DHCP6_HEADER_SIZE: usize = 4;

/// Size of an option code plus option length.
pub const DHCP6_OPTION_HEADER_SIZE: usize = 4;

/// Largest DHCPv6 packet the client caches or sends.
pub const DHCP6_PACKET_MAX_SIZE: usize = 1472;

newtype_enum! {
/// DHCPv6 option codes.
pub enum Dhcp6OptCode: u16 => {
    CLIENT_ID = 1,
    SERVER_ID = 2,
    IA_NA = 3,
    IA_TA = 4,
    IAADDR = 5,
    ORO = 6,
    PREFERENCE = 7,
    ELAPSED_TIME = 8,
    STATUS_CODE = 13,
    RAPID_COMMIT = 14,
    USER_CLASS = 15,
    VENDOR_CLASS = 16,
    VENDOR_OPTS = 17,
    DNS_SERVERS = 23,
    DOMAIN_LIST = 24,
    BOOT_FILE_URL = 59,
    BOOT_FILE_PARAM = 60,
    CLIENT_ARCH_TYPE = 61,
    NII = 62,
}}

newtype_enum! {
/// DHCPv6 message types.
pub enum Dhcp6MsgType: u8 => {
    SOLICIT = 1,
    ADVERTISE = 2,
    REQUEST = 3,
    CONFIRM = 4,
    RENEW = 5,
    REBIND = 6,
    REPLY = 7,
    RELEASE = 8,
    DECLINE = 9,
    RECONFIGURE = 10,
    INFORMATION_REQUEST = 11,
}}

/// Status code reporting success inside a Status-Code option.
pub const DHCP6_STATUS_SUCCESS: u16 = 0;

/// Offset of the sub-options inside IA_NA data (IAID, T1, T2).
pub const IA_NA_OPTIONS_OFFSET: usize = 12;

/// Enterprise number carried in the PXE vendor class option.
pub const PXE_ENTERPRISE_NUMBER: u32 = 343;

/// Offset of the class identifier inside vendor class data: enterprise
/// number plus the length of the first class data item.
pub const VENDOR_CLASS_ID_OFFSET: usize = 6;

/// DUID type for a UUID based identifier.
pub const DUID_TYPE_UUID: u16 = 4;
