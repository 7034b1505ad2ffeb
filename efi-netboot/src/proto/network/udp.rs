// SPDX-License-Identifier: MIT OR Apache-2.0

//! UDP datagram access.

use core::net::IpAddr;

use crate::Result;

/// Addressing of a received datagram.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdpDatagram {
    /// Number of payload bytes written to the caller buffer.
    pub length: usize,
    /// Sender address.
    pub src_ip: IpAddr,
    /// Sender port.
    pub src_port: u16,
    /// Destination address.
    pub dest_ip: IpAddr,
    /// Destination port.
    pub dest_port: u16,
}

/// Connectionless UDP I/O on the station address.
pub trait Udp {
    /// Sends `payload` to `dest_ip:dest_port` from `src_port`.
    fn write(
        &mut self,
        dest_ip: IpAddr,
        dest_port: u16,
        gateway: Option<IpAddr>,
        src_port: u16,
        payload: &[u8],
    ) -> Result;

    /// Waits up to `timeout` microseconds for a datagram addressed to
    /// `listen_port` (any port if `None`) and copies its payload into
    /// `buffer`.
    ///
    /// Fails with `TIMEOUT` when nothing arrives and `BUFFER_TOO_SMALL` when
    /// the payload does not fit.
    fn read(&mut self, listen_port: Option<u16>, buffer: &mut [u8], timeout: u64)
    -> Result<UdpDatagram>;
}
