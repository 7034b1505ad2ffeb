// SPDX-License-Identifier: MIT OR Apache-2.0

//! ARP resolution.

use core::net::Ipv4Addr;

use super::MacAddress;
use crate::Result;

/// IPv4 address resolution on the local link.
pub trait Arp {
    /// Resolves `ip` to a hardware address, sending a request if needed.
    ///
    /// Fails with `TIMEOUT` when nobody answers.
    fn request(&mut self, ip: Ipv4Addr) -> Result<MacAddress>;
}
