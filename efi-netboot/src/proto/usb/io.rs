// SPDX-License-Identifier: MIT OR Apache-2.0

//! USB I/O protocol.

use alloc::vec::Vec;

use efi_netboot_raw::protocol::usb::{
    EndpointDescriptor, InterfaceDescriptor, UsbTransferStatus,
};

use crate::Result;

/// USB I/O protocol of one USB interface.
///
/// Transfer methods report failures as an [`Error`] whose status is the
/// firmware status of the transfer and whose payload is the USB transfer
/// status.
///
/// [`Error`]: crate::Error
pub trait UsbIo {
    /// Performs a USB Control transfer, allowing the driver to communicate with the USB device.
    fn control_transfer(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        transfer: ControlTransfer<'_>,
        timeout: u32,
    ) -> Result<(), UsbTransferStatus>;

    /// Sends the provided buffer to a USB device over a bulk transfer pipe.
    ///
    /// Returns the number of bytes that were actually sent to the device.
    fn sync_bulk_send(
        &mut self,
        endpoint: u8,
        buffer: &[u8],
        timeout: usize,
    ) -> Result<usize, UsbTransferStatus>;

    /// Fills the provided buffer with data from a USB device over a bulk transfer pipe.
    ///
    /// Returns the number of bytes that were actually received from the device.
    fn sync_bulk_receive(
        &mut self,
        endpoint: u8,
        buffer: &mut [u8],
        timeout: usize,
    ) -> Result<usize, UsbTransferStatus>;

    /// Fills the provided buffer with data from a USB device through a synchronous interrupt
    /// transfer.
    fn sync_interrupt_receive(
        &mut self,
        endpoint: u8,
        buffer: &mut [u8],
        timeout: usize,
    ) -> Result<usize, UsbTransferStatus>;

    /// Returns information about the interface of the USB device.
    fn interface_descriptor(&mut self) -> Result<InterfaceDescriptor>;

    /// Returns information about one endpoint of the interface.
    fn endpoint_descriptor(&mut self, index: u8) -> Result<EndpointDescriptor>;

    /// Returns the complete active configuration descriptor, including the
    /// interface, endpoint and class-specific descriptors that follow it.
    fn config_descriptor_bytes(&mut self) -> Result<Vec<u8>>;

    /// Returns the device path of the handle this interface is installed on.
    fn device_path(&self) -> &[u8];
}

/// Controls what type of USB control transfer operation should occur.
#[derive(Debug)]
pub enum ControlTransfer<'buffer> {
    /// The USB control transfer has no data phase.
    None,
    /// The USB control transfer has an input data phase.
    DataIn(&'buffer mut [u8]),
    /// The USB control transfer has an output data phase.
    DataOut(&'buffer [u8]),
}

impl ControlTransfer<'_> {
    /// Length of the data phase.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::DataIn(buf) => buf.len(),
            Self::DataOut(buf) => buf.len(),
        }
    }

    /// Returns true if the transfer has no data phase.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
