// SPDX-License-Identifier: MIT OR Apache-2.0

//! DHCPv6 protocol.

use alloc::vec::Vec;
use core::net::Ipv6Addr;

use efi_netboot_raw::newtype_enum;
use efi_netboot_raw::protocol::network::dhcp6::Dhcp6OptCode;

use super::CallbackAction;
use crate::Result;

newtype_enum! {
/// Points of the S.A.R.R. exchange at which the callback is invoked.
pub enum Dhcp6Event: u32 => #[allow(missing_docs)] {
    SEND_SOLICIT = 0x00,
    RCVD_ADVERTISE = 0x01,
    SELECT_ADVERTISE = 0x02,
    SEND_REQUEST = 0x03,
    RCVD_REPLY = 0x04,
    RCVD_RECONFIGURE = 0x05,
    SEND_DECLINE = 0x06,
    SEND_CONFIRM = 0x07,
    SEND_RELEASE = 0x08,
    SEND_RENEW = 0x09,
    SEND_REBIND = 0x0A,
}}

/// One option appended to every packet the client sends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dhcp6PacketOption {
    /// Option code.
    pub code: Dhcp6OptCode,
    /// Option payload, without code and length.
    pub data: Vec<u8>,
}

impl Dhcp6PacketOption {
    /// Creates an option.
    pub fn new(code: Dhcp6OptCode, data: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            data: data.into(),
        }
    }
}

/// Solicit retransmission parameters, RFC 8415 section 15.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Retransmission {
    /// Initial retransmission time, in seconds.
    pub irt: u32,
    /// Maximum retransmission count.
    pub mrc: u32,
    /// Maximum retransmission time, in seconds.
    pub mrt: u32,
    /// Maximum retransmission duration, in seconds.
    pub mrd: u32,
}

impl Default for Retransmission {
    fn default() -> Self {
        Self {
            irt: 4,
            mrc: 4,
            mrt: 32,
            mrd: 60,
        }
    }
}

/// Configuration of a DHCPv6 exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dhcp6Config {
    /// IA_NA identifier.
    pub ia_id: u32,
    /// Options added to outgoing packets.
    pub options: Vec<Dhcp6PacketOption>,
    /// Solicit retransmission.
    pub solicit_retransmission: Retransmission,
}

/// Receives the packets of a S.A.R.R. exchange as they are sent or received.
pub trait Dhcp6Callback {
    /// Called once per event with the packet involved. The packet may be
    /// edited in place. Returning an error aborts the exchange.
    fn dhcp6_event(&mut self, event: Dhcp6Event, packet: &mut [u8]) -> Result<CallbackAction>;
}

/// State of a completed exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dhcp6ModeData {
    /// Address bound through the IA_NA, if any.
    pub ia_address: Option<Ipv6Addr>,
    /// DUID the client identified itself with.
    pub client_id: Vec<u8>,
}

/// DHCPv6 client state machine.
pub trait Dhcp6 {
    /// Applies `config`, or returns the instance to its unconfigured state.
    fn configure(&mut self, config: Option<&Dhcp6Config>) -> Result;

    /// Runs S.A.R.R. to completion, invoking `callback` along the way.
    fn start(&mut self, callback: &mut dyn Dhcp6Callback) -> Result;

    /// Releases the lease and stops the state machine.
    fn stop(&mut self) -> Result;

    /// Returns the current state.
    fn mode_data(&self) -> Result<Dhcp6ModeData>;
}
