// SPDX-License-Identifier: MIT OR Apache-2.0

//! USB I/O protocol and the descriptor types it hands out.

pub use efi_netboot_raw::protocol::usb::{
    ConfigDescriptor, DeviceRequest, EndpointDescriptor, EthernetFunctionalDescriptor,
    InterfaceClass, InterfaceDescriptor, UsbTransferStatus,
};

pub mod io;
