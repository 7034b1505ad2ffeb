// SPDX-License-Identifier: MIT OR Apache-2.0

//! UNDI command descriptor block codes.

newtype_enum! {
/// UNDI operation code.
pub enum UndiOpCode: u16 => {
    GET_STATE = 0x0000,
    START = 0x0001,
    STOP = 0x0002,
    GET_INIT_INFO = 0x0003,
    GET_CONFIG_INFO = 0x0004,
    INITIALIZE = 0x0005,
    RESET = 0x0006,
    SHUTDOWN = 0x0007,
    INTERRUPT_ENABLES = 0x0008,
    RECEIVE_FILTERS = 0x0009,
    STATION_ADDRESS = 0x000A,
    STATISTICS = 0x000B,
    MCAST_IP_TO_MAC = 0x000C,
    NVDATA = 0x000D,
    GET_STATUS = 0x000E,
    FILL_HEADER = 0x000F,
    TRANSMIT = 0x0010,
    RECEIVE = 0x0011,
}}

newtype_enum! {
/// UNDI completion status code.
pub enum UndiStatCode: u16 => {
    SUCCESS = 0x0000,
    INVALID_CDB = 0x0001,
    INVALID_CPB = 0x0002,
    BUSY = 0x0003,
    QUEUE_FULL = 0x0004,
    ALREADY_STARTED = 0x0005,
    NOT_STARTED = 0x0006,
    NOT_SHUTDOWN = 0x0007,
    ALREADY_INITIALIZED = 0x0008,
    NOT_INITIALIZED = 0x0009,
    DEVICE_FAILURE = 0x000A,
    NVDATA_FAILURE = 0x000B,
    UNSUPPORTED = 0x000C,
    BUFFER_FULL = 0x000D,
    INVALID_PARAMETER = 0x000E,
    INVALID_UNDI = 0x000F,
    IPV4_NOT_SUPPORTED = 0x0010,
    IPV6_NOT_SUPPORTED = 0x0011,
    NOT_ENOUGH_MEMORY = 0x0012,
    NO_DATA = 0x0013,
}}

/// Values of the command state carried in the top two bits of `stat_flags`.
pub mod stat_flags {
    pub const STATUS_MASK: u16 = 0xC000;
    pub const COMMAND_COMPLETE: u16 = 0xC000;
    pub const COMMAND_FAILED: u16 = 0x8000;
    pub const COMMAND_QUEUED: u16 = 0x4000;

    /// `GET_STATE` result: interface state in the low two bits.
    pub const GET_STATE_MASK: u16 = 0x0003;
    pub const GET_STATE_STOPPED: u16 = 0x0000;
    pub const GET_STATE_STARTED: u16 = 0x0001;
    pub const GET_STATE_INITIALIZED: u16 = 0x0002;

    /// `GET_STATUS` result bits.
    pub const GET_STATUS_NO_TXBUFS_WRITTEN: u16 = 0x0040;
    pub const GET_STATUS_NO_MEDIA: u16 = 0x0100;
}

/// Link speeds reported by `GET_INIT_INFO`, in Mbit/s.
pub const LINK_SPEEDS: [u32; 4] = [10, 100, 1000, 0];
