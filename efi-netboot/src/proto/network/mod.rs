// SPDX-License-Identifier: MIT OR Apache-2.0

//! Network access protocols.
//!
//! The DHCP, UDP, TFTP and DNS protocols are the network stack the PXE base
//! code runs on top of. [`usb_ethernet`] is the other direction: the surface
//! the RNDIS driver offers to that stack.

use alloc::vec::Vec;

pub mod arp;
pub mod dhcp4;
pub mod dhcp6;
pub mod dns6;
pub mod mtftp;
pub mod udp;
pub mod usb_ethernet;

pub use efi_netboot_raw::protocol::network::snp::{NetworkState, NetworkStatistics, ReceiveFlags};
pub use efi_netboot_raw::{Ipv4Address, Ipv6Address, MacAddress};

/// What a DHCP state machine should do with the packet it passed to a
/// callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    /// Go on with the packet as it is.
    Continue,
    /// Keep collecting: the received packet must not be acted upon yet.
    NotReady,
    /// Use this packet in place of the one passed to the callback.
    Replace(Vec<u8>),
}
