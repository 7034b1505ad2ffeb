// SPDX-License-Identifier: MIT OR Apache-2.0

//! USB RNDIS Ethernet driver.
//!
//! An RNDIS function is made of two USB interfaces. The control interface
//! carries RNDIS control messages over `SEND_ENCAPSULATED_COMMAND` and
//! `GET_ENCAPSULATED_RESPONSE` requests, and its interrupt endpoint signals
//! that a response is ready. The sibling CDC-Data interface moves
//! `REMOTE_NDIS_PACKET_MSG` framed Ethernet frames over its bulk endpoints.
//!
//! [`RndisDevice`] owns both interfaces and implements the
//! [`UsbEthernet`] and [`UsbEthernetUndi`] surfaces on top of them.
//!
//! [`UsbEthernet`]: crate::proto::network::usb_ethernet::UsbEthernet
//! [`UsbEthernetUndi`]: crate::proto::network::usb_ethernet::UsbEthernetUndi

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use efi_netboot_raw::protocol::usb::{
    CDC_ETHERNET_FUN_DESCRIPTOR, DESC_TYPE_CS_INTERFACE, DESC_TYPE_INTERFACE, ENDPOINT_BULK,
    ENDPOINT_INTERRUPT, EthernetFunctionalDescriptor,
};
use log::{debug, info};

use crate::boot::Stall;
use crate::proto::network::MacAddress;
use crate::proto::network::usb_ethernet::UndiState;
use crate::proto::usb::io::UsbIo;
use crate::{Result, Status};

pub mod binding;
mod control;
mod data;
pub mod message;
mod undi;

use data::{BulkInThrottle, ReceivedTransfer};

/// Tunables of the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RndisConfig {
    /// Budget for one control round trip, in microseconds.
    pub control_timeout: usize,
    /// Stall between two response polls, in microseconds.
    pub poll_interval: usize,
    /// Bulk-in transfer timeout, in milliseconds.
    pub bulk_in_timeout: usize,
    /// Bulk-out transfer timeout, in milliseconds.
    pub bulk_out_timeout: usize,
    /// Bulk-in reads allowed after a transmit or a successful read.
    pub rx_burst: u32,
    /// Bulk-in reads allowed when the throttle re-arms itself.
    pub rx_min: u32,
    /// Skipped reads after which the throttle re-arms itself.
    pub rx_rearm: u32,
    /// Bulk-in reads performed by one queue refill.
    pub rx_refill_limit: usize,
    /// Transfer size offered in `REMOTE_NDIS_INITIALIZE_MSG`.
    pub max_transfer_size: u32,
}

impl Default for RndisConfig {
    fn default() -> Self {
        Self {
            control_timeout: 10_000,
            poll_interval: 100,
            bulk_in_timeout: 1,
            bulk_out_timeout: 200,
            rx_burst: 10,
            rx_min: 1,
            rx_rearm: 5,
            rx_refill_limit: 8,
            max_transfer_size: efi_netboot_raw::protocol::rndis::RNDIS_MAX_TRANSFER_SIZE,
        }
    }
}

/// Device side state of the RNDIS protocol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RndisState {
    /// Nothing sent yet.
    #[default]
    Uninitialized,
    /// A reset completed.
    Reset,
    /// `INITIALIZE` completed.
    Initialized,
    /// `HALT` sent.
    Halted,
}

/// Endpoint addresses; 0 until discovered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Endpoints {
    /// Interrupt-in endpoint of the control interface.
    pub interrupt: u8,
    /// Bulk-in endpoint of the data interface.
    pub bulk_in: u8,
    /// Bulk-out endpoint of the data interface.
    pub bulk_out: u8,
}

/// Transfer parameters the device returned in `INITIALIZE_CMPLT`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Negotiated {
    /// NDIS medium.
    pub medium: u32,
    /// Largest bulk transfer the device accepts.
    pub max_transfer_size: u32,
    /// Frames per transfer.
    pub max_packets_per_transfer: u32,
    /// Frame alignment, as a power of two.
    pub packet_alignment_factor: u32,
}

/// An RNDIS function bound to its control and data interfaces.
#[derive(Debug)]
pub struct RndisDevice<U, S> {
    control: U,
    data: U,
    stall: S,
    config: RndisConfig,
    endpoints: Endpoints,
    request_id: u32,
    state: RndisState,
    undi_state: UndiState,
    negotiated: Negotiated,
    throttle: BulkInThrottle,
    rx_queue: VecDeque<ReceivedTransfer>,
    response_available: bool,
    mcast_filters: Vec<MacAddress>,
}

impl<U: UsbIo, S: Stall> RndisDevice<U, S> {
    /// Binds the driver to an RNDIS control interface and its CDC-Data
    /// sibling.
    ///
    /// Fails with `UNSUPPORTED` if `control` is not an RNDIS interface or
    /// `data` is not a CDC-Data interface.
    pub fn new(mut control: U, mut data: U, stall: S, config: RndisConfig) -> Result<Self> {
        let control_desc = control.interface_descriptor()?;
        let data_desc = data.interface_descriptor()?;
        if !binding::is_rndis_interface(&control_desc) || !binding::is_cdc_data_interface(&data_desc) {
            return Err(Status::UNSUPPORTED.into());
        }
        let mut device = Self {
            control,
            data,
            stall,
            config,
            endpoints: Endpoints::default(),
            request_id: 1,
            state: RndisState::Uninitialized,
            undi_state: UndiState::Stopped,
            negotiated: Negotiated::default(),
            throttle: BulkInThrottle::default(),
            rx_queue: VecDeque::new(),
            response_available: false,
            mcast_filters: Vec::new(),
        };
        device.endpoints.interrupt = find_endpoint(&mut device.control, ENDPOINT_INTERRUPT, true)?;
        info!(
            "RNDIS: bound interface {} (interrupt endpoint {:#04x})",
            control_desc.interface_number, device.endpoints.interrupt
        );
        Ok(device)
    }

    /// Current device state.
    pub const fn state(&self) -> RndisState {
        self.state
    }

    /// Current UNDI state.
    pub const fn undi_state(&self) -> UndiState {
        self.undi_state
    }

    /// Request id the next control message will carry.
    pub const fn request_id(&self) -> u32 {
        self.request_id
    }

    /// Transfer parameters from the last successful `INITIALIZE`.
    pub const fn negotiated(&self) -> Negotiated {
        self.negotiated
    }

    /// Discovered endpoint addresses.
    pub const fn endpoints(&self) -> Endpoints {
        self.endpoints
    }

    /// Gives access to the control interface.
    pub fn control_io(&mut self) -> &mut U {
        &mut self.control
    }

    /// Records a notification from the asynchronous interrupt transfer.
    ///
    /// The next control round trip consumes it instead of polling the
    /// interrupt endpoint.
    pub fn on_interrupt(&mut self, data: &[u8]) {
        if !data.is_empty() {
            self.response_available = true;
        }
    }

    /// Looks up the CDC Ethernet networking functional descriptor in the
    /// active configuration.
    pub fn functional_descriptor(&mut self) -> Result<EthernetFunctionalDescriptor> {
        let config = self.control.config_descriptor_bytes()?;
        find_functional_descriptor(&config).ok_or_else(|| Status::UNSUPPORTED.into())
    }

    fn bulk_endpoints(&mut self) -> Result<(u8, u8)> {
        if self.endpoints.bulk_in == 0 {
            self.endpoints.bulk_in = find_endpoint(&mut self.data, ENDPOINT_BULK, true)?;
        }
        if self.endpoints.bulk_out == 0 {
            self.endpoints.bulk_out = find_endpoint(&mut self.data, ENDPOINT_BULK, false)?;
        }
        Ok((self.endpoints.bulk_in, self.endpoints.bulk_out))
    }
}

/// Returns the address of the first endpoint of `transfer_type` and
/// direction on `io`.
fn find_endpoint<U: UsbIo>(io: &mut U, transfer_type: u8, is_in: bool) -> Result<u8> {
    let interface = io.interface_descriptor()?;
    for index in 0..interface.num_endpoints {
        let endpoint = io.endpoint_descriptor(index)?;
        if endpoint.transfer_type() == transfer_type && endpoint.is_in() == is_in {
            debug!(
                "RNDIS: endpoint {:#04x} type {} on interface {}",
                endpoint.endpoint_address, transfer_type, interface.interface_number
            );
            return Ok(endpoint.endpoint_address);
        }
    }
    Err(Status::NOT_FOUND.into())
}

/// Walks a configuration descriptor for the CDC Ethernet networking
/// functional descriptor.
fn find_functional_descriptor(config: &[u8]) -> Option<EthernetFunctionalDescriptor> {
    let mut offset = 0;
    while offset + 2 <= config.len() {
        let length = usize::from(config[offset]);
        if length < 2 {
            return None;
        }
        let descriptor = config.get(offset..offset + length)?;
        if descriptor[1] == DESC_TYPE_CS_INTERFACE
            && descriptor.get(2) == Some(&CDC_ETHERNET_FUN_DESCRIPTOR)
        {
            return EthernetFunctionalDescriptor::parse(descriptor);
        }
        if descriptor[1] == DESC_TYPE_INTERFACE {
            debug!("RNDIS: scanning interface {}", descriptor.get(2).copied().unwrap_or(0));
        }
        offset += length;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_functional_descriptor() {
        let config = [
            // configuration
            9, 0x02, 0x4B, 0, 2, 1, 0, 0x80, 0x32,
            // interface 0, RNDIS
            9, 0x04, 0, 0, 1, 0x02, 0x02, 0xFF, 0,
            // header functional descriptor
            5, 0x24, 0x00, 0x10, 0x01,
            // ethernet networking functional descriptor
            13, 0x24, 0x0F, 4, 0, 0, 0, 0, 0xEA, 0x05, 0, 0, 0,
            // endpoint
            7, 0x05, 0x81, 0x03, 8, 0, 1,
        ];
        let desc = find_functional_descriptor(&config).unwrap();
        assert_eq!(desc.max_segment_size, 1514);
        assert_eq!(desc.mac_address, 4);

        assert!(find_functional_descriptor(&config[..23]).is_none());
        assert!(find_functional_descriptor(&[9, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0]).is_none());
    }

    #[test]
    fn test_default_config() {
        let config = RndisConfig::default();
        assert_eq!(config.control_timeout / config.poll_interval, 100);
        assert_eq!(config.max_transfer_size, 0x4000);
    }
}
