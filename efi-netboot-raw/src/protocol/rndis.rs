// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote NDIS message layouts.
//!
//! Every RNDIS message starts with a `message_type` / `message_length` pair
//! and is made of little-endian `u32` fields with no padding. Offsets inside
//! request and completion messages are relative to the `request_id` field,
//! i.e. to byte 8 of the message.

use bitflags::bitflags;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

newtype_enum! {
/// RNDIS message type.
pub enum MessageType: u32 => {
    PACKET = 0x0000_0001,
    INITIALIZE = 0x0000_0002,
    HALT = 0x0000_0003,
    QUERY = 0x0000_0004,
    SET = 0x0000_0005,
    RESET = 0x0000_0006,
    INDICATE_STATUS = 0x0000_0007,
    KEEPALIVE = 0x0000_0008,

    INITIALIZE_CMPLT = 0x8000_0002,
    QUERY_CMPLT = 0x8000_0004,
    SET_CMPLT = 0x8000_0005,
    RESET_CMPLT = 0x8000_0006,
    KEEPALIVE_CMPLT = 0x8000_0008,
}}

impl MessageType {
    /// Bit set in the type of every completion message.
    pub const COMPLETION_BIT: u32 = 0x8000_0000;

    /// Completion type answering this request type.
    #[must_use]
    pub const fn completion(self) -> Self {
        Self(self.0 | Self::COMPLETION_BIT)
    }
}

newtype_enum! {
/// Status carried in completion and indication messages.
pub enum RndisStatus: u32 => {
    SUCCESS = 0x0000_0000,
    MEDIA_CONNECT = 0x4001_000B,
    MEDIA_DISCONNECT = 0x4001_000C,
    BUFFER_OVERFLOW = 0x8000_0005,
    FAILURE = 0xC000_0001,
    RESOURCES = 0xC000_009A,
    NOT_SUPPORTED = 0xC000_00BB,
    INVALID_DATA = 0xC001_0015,
}}

newtype_enum! {
/// NDIS object identifiers used with QUERY and SET messages.
pub enum Oid: u32 => {
    GEN_SUPPORTED_LIST = 0x0001_0101,
    GEN_HARDWARE_STATUS = 0x0001_0102,
    GEN_MEDIA_SUPPORTED = 0x0001_0103,
    GEN_MEDIA_IN_USE = 0x0001_0104,
    GEN_MAXIMUM_FRAME_SIZE = 0x0001_0106,
    GEN_LINK_SPEED = 0x0001_0107,
    GEN_CURRENT_PACKET_FILTER = 0x0001_010E,
    GEN_MAXIMUM_TOTAL_SIZE = 0x0001_0111,
    GEN_MEDIA_CONNECT_STATUS = 0x0001_0114,

    GEN_XMIT_OK = 0x0002_0101,
    GEN_RCV_OK = 0x0002_0102,
    GEN_XMIT_ERROR = 0x0002_0103,
    GEN_RCV_ERROR = 0x0002_0104,
    GEN_RCV_NO_BUFFER = 0x0002_0105,

    PERMANENT_ADDRESS_802_3 = 0x0101_0101,
    CURRENT_ADDRESS_802_3 = 0x0101_0102,
    MULTICAST_LIST_802_3 = 0x0101_0103,
    MAXIMUM_LIST_SIZE_802_3 = 0x0101_0104,
}}

bitflags! {
    /// NDIS packet filter written to `GEN_CURRENT_PACKET_FILTER`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[repr(transparent)]
    pub struct PacketFilter: u32 {
        const DIRECTED = 0x0000_0001;
        const MULTICAST = 0x0000_0002;
        const ALL_MULTICAST = 0x0000_0004;
        const BROADCAST = 0x0000_0008;
        const PROMISCUOUS = 0x0000_0020;
    }
}

/// Protocol version requested during initialization.
pub const RNDIS_MAJOR_VERSION: u32 = 1;
pub const RNDIS_MINOR_VERSION: u32 = 0;

/// Transfer size requested from the device during initialization.
pub const RNDIS_MAX_TRANSFER_SIZE: u32 = 0x4000;

/// Byte offset that request-relative offsets are counted from.
pub const RNDIS_OFFSET_BASE: u32 = 8;

/// NDIS medium reported by 802.3 devices.
pub const NDIS_MEDIUM_802_3: u32 = 0;

/// Media connect state reported through `GEN_MEDIA_CONNECT_STATUS`.
pub const MEDIA_STATE_CONNECTED: u32 = 0;

/// First eight bytes of every message.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct MessageHeader {
    pub message_type: u32,
    pub message_length: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct InitializeMsg {
    pub message_type: u32,
    pub message_length: u32,
    pub request_id: u32,
    pub major_version: u32,
    pub minor_version: u32,
    pub max_transfer_size: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct InitializeCmplt {
    pub message_type: u32,
    pub message_length: u32,
    pub request_id: u32,
    pub status: u32,
    pub major_version: u32,
    pub minor_version: u32,
    pub device_flags: u32,
    pub medium: u32,
    pub max_packets_per_transfer: u32,
    pub max_transfer_size: u32,
    pub packet_alignment_factor: u32,
    pub af_list_offset: u32,
    pub af_list_size: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct HaltMsg {
    pub message_type: u32,
    pub message_length: u32,
    pub request_id: u32,
}

/// Shared layout of QUERY and SET requests; the information buffer follows.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct OidRequestMsg {
    pub message_type: u32,
    pub message_length: u32,
    pub request_id: u32,
    pub oid: u32,
    pub information_buffer_length: u32,
    pub information_buffer_offset: u32,
    pub device_vc_handle: u32,
}

/// QUERY completion; the information buffer follows.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct QueryCmplt {
    pub message_type: u32,
    pub message_length: u32,
    pub request_id: u32,
    pub status: u32,
    pub information_buffer_length: u32,
    pub information_buffer_offset: u32,
}

/// Completion carrying only a status: SET and KEEPALIVE.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct StatusCmplt {
    pub message_type: u32,
    pub message_length: u32,
    pub request_id: u32,
    pub status: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ResetMsg {
    pub message_type: u32,
    pub message_length: u32,
    pub reserved: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ResetCmplt {
    pub message_type: u32,
    pub message_length: u32,
    pub status: u32,
    pub addressing_reset: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct IndicateStatusMsg {
    pub message_type: u32,
    pub message_length: u32,
    pub status: u32,
    pub status_buffer_length: u32,
    pub status_buffer_offset: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct KeepaliveMsg {
    pub message_type: u32,
    pub message_length: u32,
    pub request_id: u32,
}

/// Header of a data message; the Ethernet frame follows at
/// `RNDIS_OFFSET_BASE + data_offset`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct PacketMsg {
    pub message_type: u32,
    pub message_length: u32,
    pub data_offset: u32,
    pub data_length: u32,
    pub oob_data_offset: u32,
    pub oob_data_length: u32,
    pub num_oob_data_elements: u32,
    pub per_packet_info_offset: u32,
    pub per_packet_info_length: u32,
    pub reserved: [u32; 2],
}

impl PacketMsg {
    /// Size of the packet header on the wire.
    pub const HEADER_SIZE: usize = size_of::<Self>();

    /// The only `data_offset` a well formed packet may carry: the frame
    /// immediately follows the header.
    pub const DATA_OFFSET: u32 = (Self::HEADER_SIZE as u32) - RNDIS_OFFSET_BASE;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_sizes() {
        assert_eq!(size_of::<MessageHeader>(), 8);
        assert_eq!(size_of::<InitializeMsg>(), 24);
        assert_eq!(size_of::<InitializeCmplt>(), 52);
        assert_eq!(size_of::<HaltMsg>(), 12);
        assert_eq!(size_of::<OidRequestMsg>(), 28);
        assert_eq!(size_of::<QueryCmplt>(), 24);
        assert_eq!(size_of::<StatusCmplt>(), 16);
        assert_eq!(size_of::<ResetMsg>(), 12);
        assert_eq!(size_of::<ResetCmplt>(), 16);
        assert_eq!(size_of::<IndicateStatusMsg>(), 20);
        assert_eq!(size_of::<KeepaliveMsg>(), 12);
        assert_eq!(PacketMsg::HEADER_SIZE, 44);
        assert_eq!(PacketMsg::DATA_OFFSET, 36);
    }

    #[test]
    fn test_completion_type() {
        assert_eq!(MessageType::QUERY.completion(), MessageType::QUERY_CMPLT);
        assert_eq!(MessageType::RESET.completion(), MessageType::RESET_CMPLT);
        assert_eq!(
            MessageType::INITIALIZE.completion(),
            MessageType::INITIALIZE_CMPLT
        );
    }
}
