// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boot-services time source.
//!
//! Every blocking operation in this crate is a bounded polling loop. The only
//! way such a loop waits is by stalling the processor through [`Stall`].

/// Busy-wait source, the equivalent of the `Stall()` boot service.
pub trait Stall {
    /// Stalls execution for at least `microseconds`.
    fn stall(&self, microseconds: usize);
}

impl<T: Stall + ?Sized> Stall for &T {
    fn stall(&self, microseconds: usize) {
        (**self).stall(microseconds);
    }
}
