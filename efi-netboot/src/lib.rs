// SPDX-License-Identifier: MIT OR Apache-2.0

//! Network boot components for UEFI pre-boot environments.
//!
//! This crate contains two drivers:
//!
//! - [`rndis`]: a USB RNDIS Ethernet class driver. It speaks the RNDIS
//!   command protocol over a USB control endpoint (with an interrupt endpoint
//!   as "response available" signal) and moves Ethernet frames over the bulk
//!   endpoints of the sibling CDC-Data interface. The driver is exposed
//!   through the [`UsbEthernet`] and [`UsbEthernetUndi`] capability traits.
//! - [`pxe`]: a PXE base code client. It runs DHCPv4 D.O.R.A. or DHCPv6
//!   S.A.R.R., caches and classifies every offer, selects one under a ranked
//!   rule table, resolves proxy and BINL offers, walks the optional boot
//!   prompt and menu, discovers boot servers and finally resolves the boot
//!   file name and size.
//!
//! Everything the drivers need from the firmware (USB I/O, DHCP state
//! machines, UDP, TFTP, DNS, console, stall) is consumed through the traits
//! in [`proto`] and [`boot`], so both drivers run unchanged against real
//! firmware protocols or against test doubles.
//!
//! # Crate Features
//!
//! - `logger` (default): Logging implementation for the standard [`log`]
//!   crate that prints output to any [`core::fmt::Write`] console.
//! - `unstable`: Reserved for APIs that need a nightly toolchain.
//!
//! [`UsbEthernet`]: proto::network::usb_ethernet::UsbEthernet
//! [`UsbEthernetUndi`]: proto::network::usb_ethernet::UsbEthernetUndi

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(
    clippy::all,
    clippy::must_use_candidate,
    clippy::use_self,
    missing_debug_implementations
)]

extern crate alloc;

pub mod boot;
pub mod helpers;
pub mod proto;
pub mod pxe;
pub mod result;
pub mod rndis;

mod util;

pub use efi_netboot_raw::{Boolean, Guid, Ipv4Address, Ipv6Address, MacAddress, guid};
pub use result::{Error, Result, ResultExt, Status, StatusExt};
