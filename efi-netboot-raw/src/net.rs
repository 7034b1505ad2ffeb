// SPDX-License-Identifier: MIT OR Apache-2.0

//! Network address types.
//!
//! Protocol logic works with [`core::net`] addresses. These types exist for
//! the places where an address is stored in a firmware-shaped structure.

/// An IPv4 internet protocol address.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Ipv4Address(pub [u8; 4]);

impl Ipv4Address {
    /// The unspecified address `0.0.0.0`.
    pub const ZERO: Self = Self([0; 4]);

    /// Returns the octets of the IP address.
    #[must_use]
    pub const fn octets(self) -> [u8; 4] {
        self.0
    }

    /// Returns true if every octet is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        u32::from_ne_bytes(self.0) == 0
    }
}

impl From<core::net::Ipv4Addr> for Ipv4Address {
    fn from(ip: core::net::Ipv4Addr) -> Self {
        Self(ip.octets())
    }
}

impl From<Ipv4Address> for core::net::Ipv4Addr {
    fn from(ip: Ipv4Address) -> Self {
        Self::from(ip.0)
    }
}

impl From<[u8; 4]> for Ipv4Address {
    fn from(octets: [u8; 4]) -> Self {
        Self(octets)
    }
}

/// An IPv6 internet protocol address.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Ipv6Address(pub [u8; 16]);

impl Ipv6Address {
    /// Returns the octets of the IP address.
    #[must_use]
    pub const fn octets(self) -> [u8; 16] {
        self.0
    }
}

impl From<core::net::Ipv6Addr> for Ipv6Address {
    fn from(ip: core::net::Ipv6Addr) -> Self {
        Self(ip.octets())
    }
}

impl From<Ipv6Address> for core::net::Ipv6Addr {
    fn from(ip: Ipv6Address) -> Self {
        Self::from(ip.0)
    }
}

impl From<[u8; 16]> for Ipv6Address {
    fn from(octets: [u8; 16]) -> Self {
        Self(octets)
    }
}

/// Media Access Control (MAC) address.
///
/// Firmware network interfaces reserve 32 bytes for a hardware address so any
/// media type fits. For Ethernet only the first six bytes are meaningful and
/// the rest are zero.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct MacAddress(pub [u8; 32]);

impl MacAddress {
    /// The Ethernet broadcast address `ff:ff:ff:ff:ff:ff`.
    pub const BROADCAST: Self = {
        let mut octets = [0; 32];
        let mut i = 0;
        while i < 6 {
            octets[i] = 0xff;
            i += 1;
        }
        Self(octets)
    };

    /// Returns the octets of the MAC address.
    #[must_use]
    pub const fn octets(self) -> [u8; 32] {
        self.0
    }

    /// Tries to interpret the MAC address as a normal 6-byte Ethernet address.
    pub fn try_into_ethernet_mac_addr(self) -> Result<[u8; 6], [u8; 32]> {
        if self.0[6..].iter().any(|&x| x != 0) {
            Err(self.0)
        } else {
            Ok(self.into())
        }
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(octets: [u8; 6]) -> Self {
        let mut buffer = [0; 32];
        buffer[..6].copy_from_slice(&octets);
        Self(buffer)
    }
}

impl From<MacAddress> for [u8; 6] {
    fn from(MacAddress(o): MacAddress) -> Self {
        [o[0], o[1], o[2], o[3], o[4], o[5]]
    }
}

impl From<[u8; 32]> for MacAddress {
    fn from(octets: [u8; 32]) -> Self {
        Self(octets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_addr4_conversion() {
        let uefi_addr = Ipv4Address([192, 168, 1, 20]);
        let core_addr = core::net::Ipv4Addr::from(uefi_addr);
        assert_eq!(core_addr, core::net::Ipv4Addr::new(192, 168, 1, 20));
        assert!(!uefi_addr.is_zero());
        assert!(Ipv4Address::ZERO.is_zero());
    }

    #[test]
    fn test_ethernet_mac() {
        let mac = MacAddress::from([0x02, 0x00, 0x5e, 0x10, 0x20, 0x30]);
        assert_eq!(
            mac.try_into_ethernet_mac_addr(),
            Ok([0x02, 0x00, 0x5e, 0x10, 0x20, 0x30])
        );

        let mut long = [0u8; 32];
        long[31] = 1;
        assert!(MacAddress(long).try_into_ethernet_mac_addr().is_err());

        let bcast: [u8; 6] = MacAddress::BROADCAST.into();
        assert_eq!(bcast, [0xff; 6]);
        assert_eq!(MacAddress::BROADCAST.0[6..], [0; 26]);
    }
}
