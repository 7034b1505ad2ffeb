// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire and ABI definitions, grouped by the protocol they belong to.

pub mod console;
pub mod device_path;
pub mod network;
pub mod rndis;
pub mod usb;
