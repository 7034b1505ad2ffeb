// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw definitions for the USB RNDIS network driver and the PXE boot client.
//!
//! This crate holds the wire formats and constants shared by the
//! [`efi-netboot`] crate: RNDIS control and data messages, USB descriptors,
//! DHCPv4/DHCPv6 option tags, PXE vendor options and firmware status codes.
//! It contains no behavior beyond layout helpers.
//!
//! [`efi-netboot`]: https://crates.io/crates/efi-netboot

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(
    clippy::all,
    clippy::must_use_candidate,
    clippy::use_self,
    missing_debug_implementations
)]

#[macro_use]
mod enums;

pub mod net;
pub mod protocol;

mod status;

pub use net::{Ipv4Address, Ipv6Address, MacAddress};
pub use status::Status;
pub use uguid::{guid, Guid};

/// ABI-compatible UEFI boolean.
///
/// This is similar to a `bool`, but allows values other than 0 or 1 to be
/// stored without it being undefined behavior.
///
/// Any non-zero value is treated as logically `true`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Ord, PartialOrd, Eq, Hash)]
#[repr(transparent)]
pub struct Boolean(pub u8);

impl Boolean {
    /// [`Boolean`] representing `true`.
    pub const TRUE: Self = Self(1);

    /// [`Boolean`] representing `false`.
    pub const FALSE: Self = Self(0);
}

impl From<bool> for Boolean {
    fn from(value: bool) -> Self {
        if value { Self::TRUE } else { Self::FALSE }
    }
}

impl From<Boolean> for bool {
    fn from(value: Boolean) -> Self {
        // Any bit-pattern != 0 equals true, as in C
        value.0 != 0
    }
}
