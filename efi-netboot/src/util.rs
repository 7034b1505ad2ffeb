// SPDX-License-Identifier: MIT OR Apache-2.0

//! Small byte-level helpers shared by the RNDIS and PXE code.

use core::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Reads a big-endian `u16` at `offset`.
pub(crate) fn be_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let b = bytes.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

/// Reads a big-endian `u32` at `offset`.
pub(crate) fn be_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let b = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Reads an IPv4 address at `offset`.
pub(crate) fn ipv4_at(bytes: &[u8], offset: usize) -> Option<Ipv4Addr> {
    let b: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
    Some(Ipv4Addr::from(b))
}

/// Reads an IPv6 address at `offset`.
pub(crate) fn ipv6_at(bytes: &[u8], offset: usize) -> Option<Ipv6Addr> {
    let b: [u8; 16] = bytes.get(offset..offset + 16)?.try_into().ok()?;
    Some(Ipv6Addr::from(b))
}

/// Returns the prefix of `bytes` up to the first NUL.
pub(crate) fn until_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// Returns true if `mask` is a contiguous IPv4 netmask.
pub(crate) fn is_valid_netmask(mask: Ipv4Addr) -> bool {
    let bits = u32::from(mask);
    bits.leading_ones() + bits.trailing_zeros() == 32
}

/// Returns true if `ip` may be used as a unicast station address.
pub(crate) fn is_unicast(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !(v4.is_unspecified() || v4.is_broadcast() || v4.is_multicast()),
        IpAddr::V6(v6) => !(v6.is_unspecified() || v6.is_multicast()),
    }
}

/// Pseudo-random transaction ids.
///
/// Firmware offers no entropy source to this layer, so ids come from a
/// xorshift generator seeded with the hardware address.
#[derive(Clone, Debug)]
pub(crate) struct XidGenerator(u32);

impl XidGenerator {
    pub(crate) fn new(seed: &[u8]) -> Self {
        let mixed = seed
            .iter()
            .fold(0x811c_9dc5_u32, |acc, &b| (acc ^ u32::from(b)).wrapping_mul(0x0100_0193));
        Self(mixed | 1)
    }

    pub(crate) fn next_xid(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_netmask() {
        assert!(is_valid_netmask(Ipv4Addr::new(255, 255, 255, 0)));
        assert!(is_valid_netmask(Ipv4Addr::new(255, 255, 0, 0)));
        assert!(is_valid_netmask(Ipv4Addr::new(0, 0, 0, 0)));
        assert!(!is_valid_netmask(Ipv4Addr::new(255, 0, 255, 0)));
    }

    #[test]
    fn test_readers() {
        let bytes = [0x12, 0x34, 10, 0, 0, 1, b'a', 0, b'b'];
        assert_eq!(be_u16(&bytes, 0), Some(0x1234));
        assert_eq!(be_u32(&bytes, 0), Some(0x1234_0a00));
        assert_eq!(ipv4_at(&bytes, 2), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(ipv4_at(&bytes, 6), None);
        assert_eq!(until_nul(&bytes[6..]), b"a");
    }

    #[test]
    fn test_xid_varies() {
        let mut xid = XidGenerator::new(&[0x02, 0, 0x5e, 1, 2, 3]);
        let a = xid.next_xid();
        let b = xid.next_xid();
        assert_ne!(a, b);
    }
}
