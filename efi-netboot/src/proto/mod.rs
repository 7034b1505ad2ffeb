// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol definitions.
//!
//! Protocols are the interfaces through which the drivers reach the firmware
//! and the network stack around them. Each protocol is a trait here, so a
//! driver holds its collaborators as trait objects or generic parameters and
//! never depends on how the firmware implements them.

pub mod console;
pub mod device_path;
pub mod network;
pub mod usb;
