// SPDX-License-Identifier: MIT OR Apache-2.0

//! DHCPv4 protocol.

use alloc::vec::Vec;
use core::net::Ipv4Addr;

use efi_netboot_raw::newtype_enum;
use efi_netboot_raw::protocol::network::dhcp4::Dhcp4Tag;

use super::CallbackAction;
use crate::Result;

newtype_enum! {
/// Points of the D.O.R.A. exchange at which the callback is invoked.
pub enum Dhcp4Event: u32 => #[allow(missing_docs)] {
    SEND_DISCOVER = 0x01,
    RCVD_OFFER = 0x02,
    SELECT_OFFER = 0x03,
    SEND_REQUEST = 0x04,
    RCVD_ACK = 0x05,
    RCVD_NAK = 0x06,
    SEND_DECLINE = 0x07,
    BOUND_COMPLETED = 0x08,
    ENTER_RENEWING = 0x09,
    ENTER_REBINDING = 0x0A,
    ADDRESS_LOST = 0x0B,
    FAIL = 0x0C,
}}

/// One option appended to every packet the client sends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dhcp4PacketOption {
    /// Option tag.
    pub tag: Dhcp4Tag,
    /// Option payload, without tag and length.
    pub data: Vec<u8>,
}

impl Dhcp4PacketOption {
    /// Creates an option.
    pub fn new(tag: Dhcp4Tag, data: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }
}

/// Configuration of a DHCPv4 exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dhcp4Config {
    /// Number of DHCPDISCOVER attempts.
    pub discover_try_count: u32,
    /// Per-attempt DHCPDISCOVER timeouts, in seconds.
    pub discover_timeout: Vec<u32>,
    /// Number of DHCPREQUEST attempts; 0 keeps the implementation default.
    pub request_try_count: u32,
    /// Per-attempt DHCPREQUEST timeouts, in seconds.
    pub request_timeout: Vec<u32>,
    /// Address to request, or unspecified.
    pub client_address: Ipv4Addr,
    /// Options added to outgoing packets.
    pub options: Vec<Dhcp4PacketOption>,
}

impl Dhcp4Config {
    /// DHCPDISCOVER retransmission schedule.
    pub const DISCOVER_TIMEOUTS: [u32; 4] = [4, 8, 16, 32];
}

impl Default for Dhcp4Config {
    fn default() -> Self {
        Self {
            discover_try_count: Self::DISCOVER_TIMEOUTS.len() as u32,
            discover_timeout: Self::DISCOVER_TIMEOUTS.to_vec(),
            request_try_count: 0,
            request_timeout: Vec::new(),
            client_address: Ipv4Addr::UNSPECIFIED,
            options: Vec::new(),
        }
    }
}

/// Receives the packets of a D.O.R.A. exchange as they are sent or received.
pub trait Dhcp4Callback {
    /// Called once per event with the packet involved. The packet may be
    /// edited in place. Returning an error aborts the exchange.
    fn dhcp4_event(&mut self, event: Dhcp4Event, packet: &mut [u8]) -> Result<CallbackAction>;
}

/// Lease obtained by a completed exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dhcp4ModeData {
    /// Assigned client address.
    pub client_address: Ipv4Addr,
    /// Subnet mask of the assigned address.
    pub subnet_mask: Ipv4Addr,
    /// Default router, or unspecified.
    pub router_address: Ipv4Addr,
}

/// Local address and port replies may arrive on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenPoint {
    /// Local address.
    pub address: Ipv4Addr,
    /// Subnet mask of `address`.
    pub subnet_mask: Ipv4Addr,
    /// Local port.
    pub port: u16,
}

/// A single request / multiple replies exchange outside D.O.R.A.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransmitReceiveToken {
    /// Packet to send.
    pub packet: Vec<u8>,
    /// Destination address.
    pub remote_address: Ipv4Addr,
    /// Destination port.
    pub remote_port: u16,
    /// Gateway, or unspecified for on-link destinations.
    pub gateway_address: Ipv4Addr,
    /// Where replies are accepted.
    pub listen_points: Vec<ListenPoint>,
    /// How long to collect replies, in seconds.
    pub timeout: u32,
}

/// DHCPv4 client state machine.
pub trait Dhcp4 {
    /// Applies `config`, or returns the instance to its unconfigured state.
    fn configure(&mut self, config: Option<&Dhcp4Config>) -> Result;

    /// Runs D.O.R.A. to completion, invoking `callback` along the way.
    fn start(&mut self, callback: &mut dyn Dhcp4Callback) -> Result;

    /// Releases the lease and stops the state machine.
    fn stop(&mut self) -> Result;

    /// Returns the current lease.
    fn mode_data(&self) -> Result<Dhcp4ModeData>;

    /// Sends `token.packet` and returns every reply received before the
    /// timeout.
    fn transmit_receive(&mut self, token: &TransmitReceiveToken) -> Result<Vec<Vec<u8>>>;
}
