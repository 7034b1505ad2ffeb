// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encoding and decoding of RNDIS messages.

use alloc::vec::Vec;

use log::debug;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub use efi_netboot_raw::protocol::rndis::{
    HaltMsg, IndicateStatusMsg, InitializeCmplt, InitializeMsg, KeepaliveMsg, MessageHeader,
    MessageType, Oid, OidRequestMsg, PacketFilter, PacketMsg, QueryCmplt, ResetCmplt, ResetMsg,
    RndisStatus, StatusCmplt, RNDIS_MAJOR_VERSION, RNDIS_MINOR_VERSION, RNDIS_OFFSET_BASE,
};

use crate::{Result, Status};

/// A control message sent by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request<'a> {
    /// `REMOTE_NDIS_INITIALIZE_MSG`.
    Initialize {
        /// Request id.
        request_id: u32,
        /// Largest transfer the host will accept.
        max_transfer_size: u32,
    },
    /// `REMOTE_NDIS_HALT_MSG`. Never answered.
    Halt {
        /// Request id.
        request_id: u32,
    },
    /// `REMOTE_NDIS_QUERY_MSG`.
    Query {
        /// Request id.
        request_id: u32,
        /// Object queried.
        oid: Oid,
    },
    /// `REMOTE_NDIS_SET_MSG`.
    Set {
        /// Request id.
        request_id: u32,
        /// Object set.
        oid: Oid,
        /// New value.
        data: &'a [u8],
    },
    /// `REMOTE_NDIS_RESET_MSG`. Carries no request id.
    Reset,
    /// `REMOTE_NDIS_KEEPALIVE_MSG`.
    Keepalive {
        /// Request id.
        request_id: u32,
    },
}

impl Request<'_> {
    /// Message type on the wire.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Initialize { .. } => MessageType::INITIALIZE,
            Self::Halt { .. } => MessageType::HALT,
            Self::Query { .. } => MessageType::QUERY,
            Self::Set { .. } => MessageType::SET,
            Self::Reset => MessageType::RESET,
            Self::Keepalive { .. } => MessageType::KEEPALIVE,
        }
    }

    /// Request id the completion must echo, if the message has one.
    #[must_use]
    pub const fn request_id(&self) -> Option<u32> {
        match *self {
            Self::Initialize { request_id, .. }
            | Self::Halt { request_id }
            | Self::Query { request_id, .. }
            | Self::Set { request_id, .. }
            | Self::Keepalive { request_id } => Some(request_id),
            Self::Reset => None,
        }
    }

    /// Key of the completion answering this request. `None` for `HALT`.
    #[must_use]
    pub const fn response_key(&self) -> Option<ResponseKey> {
        match self {
            Self::Halt { .. } => None,
            _ => Some(ResponseKey {
                message_type: self.message_type().completion(),
                request_id: self.request_id(),
            }),
        }
    }

    /// Serializes the message.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let message_type = self.message_type().0;
        match *self {
            Self::Initialize {
                request_id,
                max_transfer_size,
            } => InitializeMsg {
                message_type,
                message_length: size_of::<InitializeMsg>() as u32,
                request_id,
                major_version: RNDIS_MAJOR_VERSION,
                minor_version: RNDIS_MINOR_VERSION,
                max_transfer_size,
            }
            .as_bytes()
            .to_vec(),
            Self::Halt { request_id } | Self::Keepalive { request_id } => HaltMsg {
                message_type,
                message_length: size_of::<HaltMsg>() as u32,
                request_id,
            }
            .as_bytes()
            .to_vec(),
            Self::Query { request_id, oid } => encode_oid_request(message_type, request_id, oid, &[]),
            Self::Set {
                request_id,
                oid,
                data,
            } => encode_oid_request(message_type, request_id, oid, data),
            Self::Reset => ResetMsg {
                message_type,
                message_length: size_of::<ResetMsg>() as u32,
                reserved: 0,
            }
            .as_bytes()
            .to_vec(),
        }
    }
}

fn encode_oid_request(message_type: u32, request_id: u32, oid: Oid, data: &[u8]) -> Vec<u8> {
    let header_len = size_of::<OidRequestMsg>();
    let header = OidRequestMsg {
        message_type,
        message_length: (header_len + data.len()) as u32,
        request_id,
        oid: oid.0,
        information_buffer_length: data.len() as u32,
        information_buffer_offset: if data.is_empty() {
            0
        } else {
            header_len as u32 - RNDIS_OFFSET_BASE
        },
        device_vc_handle: 0,
    };
    let mut msg = Vec::with_capacity(header_len + data.len());
    msg.extend_from_slice(header.as_bytes());
    msg.extend_from_slice(data);
    msg
}

/// Identifies the completion a pending request waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseKey {
    /// Expected completion type.
    pub message_type: MessageType,
    /// Expected request id; `RESET_CMPLT` carries none.
    pub request_id: Option<u32>,
}

impl ResponseKey {
    /// Returns true if `response` is the completion this key describes.
    #[must_use]
    pub fn matches(&self, response: &[u8]) -> bool {
        let Ok((header, _)) = MessageHeader::read_from_prefix(response) else {
            return false;
        };
        if header.message_type != self.message_type.0 {
            return false;
        }
        match self.request_id {
            None => true,
            Some(id) => u32::read_from_prefix(&response[size_of::<MessageHeader>()..])
                .is_ok_and(|(rid, _)| rid == id),
        }
    }
}

/// Reads a fixed-layout message from the start of `bytes`.
///
/// The declared `message_length` must cover the structure and fit in
/// `bytes`.
pub fn read_message<T: FromBytes + KnownLayout + Immutable>(bytes: &[u8]) -> Result<T> {
    let (header, _) = MessageHeader::read_from_prefix(bytes).map_err(|_| Status::DEVICE_ERROR)?;
    let declared = header.message_length as usize;
    if declared < size_of::<T>() || declared > bytes.len() {
        return Err(Status::DEVICE_ERROR.into());
    }
    T::read_from_prefix(bytes)
        .map(|(msg, _)| msg)
        .map_err(|_| Status::DEVICE_ERROR.into())
}

/// A control message sent by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Response<'a> {
    /// `REMOTE_NDIS_INITIALIZE_CMPLT`.
    Initialize(InitializeCmplt),
    /// `REMOTE_NDIS_QUERY_CMPLT` and the information buffer it returned.
    Query(QueryCmplt, &'a [u8]),
    /// `REMOTE_NDIS_SET_CMPLT`.
    Set(StatusCmplt),
    /// `REMOTE_NDIS_RESET_CMPLT`.
    Reset(ResetCmplt),
    /// `REMOTE_NDIS_KEEPALIVE_CMPLT`.
    KeepaliveCmplt(StatusCmplt),
    /// `REMOTE_NDIS_INDICATE_STATUS_MSG`.
    IndicateStatus(IndicateStatusMsg),
    /// `REMOTE_NDIS_KEEPALIVE_MSG` sent by the device.
    Keepalive(KeepaliveMsg),
}

impl Response<'_> {
    /// Completion status reported by the device.
    #[must_use]
    pub const fn status(&self) -> RndisStatus {
        RndisStatus(match self {
            Self::Initialize(m) => m.status,
            Self::Query(m, _) => m.status,
            Self::Set(m) | Self::KeepaliveCmplt(m) => m.status,
            Self::Reset(m) => m.status,
            Self::IndicateStatus(m) => m.status,
            Self::Keepalive(_) => RndisStatus::SUCCESS.0,
        })
    }

    /// Fails with `DEVICE_ERROR` unless the device reported success.
    pub fn check(self) -> Result<Self> {
        if self.status() == RndisStatus::SUCCESS {
            Ok(self)
        } else {
            Err(Status::DEVICE_ERROR.into())
        }
    }
}

/// Decodes a control message received from the device.
pub fn parse_response(bytes: &[u8]) -> Result<Response<'_>> {
    let (header, _) = MessageHeader::read_from_prefix(bytes).map_err(|_| Status::DEVICE_ERROR)?;
    match MessageType(header.message_type) {
        MessageType::INITIALIZE_CMPLT => read_message(bytes).map(Response::Initialize),
        MessageType::QUERY_CMPLT => {
            let cmplt: QueryCmplt = read_message(bytes)?;
            let info = if cmplt.information_buffer_length == 0 {
                &[][..]
            } else {
                let (start, end) = (RNDIS_OFFSET_BASE as usize)
                    .checked_add(cmplt.information_buffer_offset as usize)
                    .and_then(|start| {
                        let end = start.checked_add(cmplt.information_buffer_length as usize)?;
                        Some((start, end))
                    })
                    .filter(|&(_, end)| end <= cmplt.message_length as usize)
                    .ok_or(Status::DEVICE_ERROR)?;
                bytes.get(start..end).ok_or(Status::DEVICE_ERROR)?
            };
            Ok(Response::Query(cmplt, info))
        }
        MessageType::SET_CMPLT => read_message(bytes).map(Response::Set),
        MessageType::RESET_CMPLT => read_message(bytes).map(Response::Reset),
        MessageType::KEEPALIVE_CMPLT => read_message(bytes).map(Response::KeepaliveCmplt),
        MessageType::INDICATE_STATUS => read_message(bytes).map(Response::IndicateStatus),
        MessageType::KEEPALIVE => read_message(bytes).map(Response::Keepalive),
        _ => Err(Status::UNSUPPORTED.into()),
    }
}

/// Frames one Ethernet frame as a `REMOTE_NDIS_PACKET_MSG`.
#[must_use]
pub fn encode_packet(frame: &[u8]) -> Vec<u8> {
    let header = PacketMsg {
        message_type: MessageType::PACKET.0,
        message_length: (PacketMsg::HEADER_SIZE + frame.len()) as u32,
        data_offset: PacketMsg::DATA_OFFSET,
        data_length: frame.len() as u32,
        oob_data_offset: 0,
        oob_data_length: 0,
        num_oob_data_elements: 0,
        per_packet_info_offset: 0,
        per_packet_info_length: 0,
        reserved: [0; 2],
    };
    let mut msg = Vec::with_capacity(PacketMsg::HEADER_SIZE + frame.len());
    msg.extend_from_slice(header.as_bytes());
    msg.extend_from_slice(frame);
    msg
}

/// Validates the packet message at the start of `bytes`.
///
/// Returns the header and the Ethernet frame it carries. Only packets laid
/// out the way this driver sends them are accepted: data directly after the
/// header, and a message length that fits in `bytes`.
pub fn decode_packet(bytes: &[u8]) -> Result<(PacketMsg, &[u8])> {
    let (msg, _) = PacketMsg::read_from_prefix(bytes).map_err(|_| Status::DEVICE_ERROR)?;
    let message_length = msg.message_length as usize;
    if msg.message_type != MessageType::PACKET.0
        || msg.data_offset != PacketMsg::DATA_OFFSET
        || message_length < PacketMsg::HEADER_SIZE
        || message_length > bytes.len()
    {
        return Err(Status::DEVICE_ERROR.into());
    }
    let end = PacketMsg::HEADER_SIZE
        .checked_add(msg.data_length as usize)
        .filter(|&end| end <= message_length)
        .ok_or(Status::DEVICE_ERROR)?;
    let data = bytes.get(PacketMsg::HEADER_SIZE..end).ok_or(Status::DEVICE_ERROR)?;
    Ok((msg, data))
}

/// Logs a one-line summary of a control message.
pub fn log_message(direction: &str, bytes: &[u8]) {
    let Ok((header, _)) = MessageHeader::read_from_prefix(bytes) else {
        debug!("{direction} truncated RNDIS message ({} bytes)", bytes.len());
        return;
    };
    let message_type = MessageType(header.message_type);
    match message_type {
        MessageType::INITIALIZE => {
            if let Ok(m) = read_message::<InitializeMsg>(bytes) {
                debug!(
                    "{direction} INITIALIZE id={} version={}.{} max_transfer={:#x}",
                    m.request_id, m.major_version, m.minor_version, m.max_transfer_size
                );
            }
        }
        MessageType::INITIALIZE_CMPLT => {
            if let Ok(m) = read_message::<InitializeCmplt>(bytes) {
                debug!(
                    "{direction} INITIALIZE_CMPLT id={} status={:?} medium={} max_packets={} max_transfer={:#x} align={}",
                    m.request_id,
                    RndisStatus(m.status),
                    m.medium,
                    m.max_packets_per_transfer,
                    m.max_transfer_size,
                    m.packet_alignment_factor
                );
            }
        }
        MessageType::QUERY | MessageType::SET => {
            if let Ok(m) = read_message::<OidRequestMsg>(bytes) {
                debug!(
                    "{direction} {message_type:?} id={} oid={:?} len={}",
                    m.request_id,
                    Oid(m.oid),
                    m.information_buffer_length
                );
            }
        }
        MessageType::QUERY_CMPLT => {
            if let Ok(m) = read_message::<QueryCmplt>(bytes) {
                debug!(
                    "{direction} QUERY_CMPLT id={} status={:?} len={}",
                    m.request_id,
                    RndisStatus(m.status),
                    m.information_buffer_length
                );
            }
        }
        MessageType::SET_CMPLT | MessageType::KEEPALIVE_CMPLT => {
            if let Ok(m) = read_message::<StatusCmplt>(bytes) {
                debug!(
                    "{direction} {message_type:?} id={} status={:?}",
                    m.request_id,
                    RndisStatus(m.status)
                );
            }
        }
        MessageType::RESET_CMPLT => {
            if let Ok(m) = read_message::<ResetCmplt>(bytes) {
                debug!(
                    "{direction} RESET_CMPLT status={:?} addressing_reset={}",
                    RndisStatus(m.status),
                    m.addressing_reset
                );
            }
        }
        MessageType::INDICATE_STATUS => {
            if let Ok(m) = read_message::<IndicateStatusMsg>(bytes) {
                debug!("{direction} INDICATE_STATUS status={:?}", RndisStatus(m.status));
            }
        }
        _ => debug!(
            "{direction} {message_type:?} len={}",
            header.message_length
        ),
    }
}
