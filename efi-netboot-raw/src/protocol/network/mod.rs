// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod dhcp4;
pub mod dhcp6;
pub mod pxe;
pub mod snp;
pub mod undi;
