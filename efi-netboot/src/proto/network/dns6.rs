// SPDX-License-Identifier: MIT OR Apache-2.0

//! DNS over IPv6.

use core::net::Ipv6Addr;

use crate::Result;

/// Host name resolution over IPv6.
pub trait Dns6 {
    /// Resolves `host` to its first AAAA record using `dns_server`.
    fn resolve(&mut self, dns_server: Ipv6Addr, host: &str) -> Result<Ipv6Addr>;
}
