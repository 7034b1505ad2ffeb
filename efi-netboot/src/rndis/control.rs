// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control channel: one outstanding request, answered through
//! `GET_ENCAPSULATED_RESPONSE` once the interrupt endpoint signals it.

use alloc::vec;
use alloc::vec::Vec;

use efi_netboot_raw::protocol::usb::{
    GET_ENCAPSULATED_RESPONSE, REQUEST_TYPE_CLASS_INTERFACE_IN, REQUEST_TYPE_CLASS_INTERFACE_OUT,
    SEND_ENCAPSULATED_COMMAND,
};
use log::{debug, info, warn};
use zerocopy::IntoBytes;

use super::message::{self, Oid, Request, Response};
use super::{Negotiated, RndisDevice, RndisState};
use crate::boot::Stall;
use crate::proto::usb::io::{ControlTransfer, UsbIo};
use crate::{Result, Status};

/// Size of the buffer a control response is read into.
const RESPONSE_BUFFER_SIZE: usize = 0x400;

/// Size of the "response available" notification.
const NOTIFICATION_SIZE: usize = 8;

/// Timeout of a single control transfer, in milliseconds.
const CONTROL_TRANSFER_TIMEOUT: u32 = 1000;

impl<U: UsbIo, S: Stall> RndisDevice<U, S> {
    /// Sends `request` and, unless it is a `HALT`, waits for its completion.
    ///
    /// Responses that do not match the request's completion type and id are
    /// dropped and polling continues. Fails with `TIMEOUT` once the control
    /// budget is spent.
    pub(crate) fn control_msg(&mut self, request: &Request<'_>) -> Result<Vec<u8>> {
        let bytes = request.encode();
        message::log_message("->", &bytes);
        self.send_encapsulated(&bytes)?;

        let Some(key) = request.response_key() else {
            return Ok(Vec::new());
        };
        let attempts = self.config.control_timeout / self.config.poll_interval.max(1);
        for _ in 0..attempts {
            if self.response_ready() {
                let response = self.get_encapsulated()?;
                if key.matches(&response) {
                    message::log_message("<-", &response);
                    return Ok(response);
                }
                debug!("RNDIS: dropping unmatched response, waiting for {key:?}");
                message::log_message("<- (dropped)", &response);
            }
            self.stall.stall(self.config.poll_interval);
        }
        warn!("RNDIS: no response to {:?}", request.message_type());
        Err(Status::TIMEOUT.into())
    }

    fn send_encapsulated(&mut self, bytes: &[u8]) -> Result {
        let interface = self.control.interface_descriptor()?.interface_number;
        self.control
            .control_transfer(
                REQUEST_TYPE_CLASS_INTERFACE_OUT,
                SEND_ENCAPSULATED_COMMAND,
                0,
                u16::from(interface),
                ControlTransfer::DataOut(bytes),
                CONTROL_TRANSFER_TIMEOUT,
            )
            .map_err(|err| err.to_err_without_payload())
    }

    fn get_encapsulated(&mut self) -> Result<Vec<u8>> {
        let interface = self.control.interface_descriptor()?.interface_number;
        let mut buffer = vec![0u8; RESPONSE_BUFFER_SIZE];
        self.control
            .control_transfer(
                REQUEST_TYPE_CLASS_INTERFACE_IN,
                GET_ENCAPSULATED_RESPONSE,
                0,
                u16::from(interface),
                ControlTransfer::DataIn(&mut buffer),
                CONTROL_TRANSFER_TIMEOUT,
            )
            .map_err(|err| err.to_err_without_payload())?;
        let length = message::read_message::<message::MessageHeader>(&buffer)
            .map(|header| header.message_length as usize)
            .unwrap_or(buffer.len());
        buffer.truncate(length);
        Ok(buffer)
    }

    /// Consumes a pending notification, or polls the interrupt endpoint once.
    fn response_ready(&mut self) -> bool {
        if core::mem::take(&mut self.response_available) {
            return true;
        }
        let mut notification = [0u8; NOTIFICATION_SIZE];
        self.control
            .sync_interrupt_receive(self.endpoints.interrupt, &mut notification, 1)
            .is_ok_and(|len| len > 0)
    }

    fn next_request_id(&mut self) -> u32 {
        let id = self.request_id;
        self.request_id = self.request_id.wrapping_add(1);
        id
    }

    /// Sends `REMOTE_NDIS_INITIALIZE_MSG` and records the negotiated
    /// transfer parameters.
    pub fn initialize(&mut self) -> Result {
        let request = Request::Initialize {
            request_id: self.request_id,
            max_transfer_size: self.config.max_transfer_size,
        };
        let response = self.control_msg(&request)?;
        let Response::Initialize(cmplt) = message::parse_response(&response)?.check()? else {
            return Err(Status::DEVICE_ERROR.into());
        };
        self.request_id = self.request_id.wrapping_add(1);
        self.negotiated = Negotiated {
            medium: cmplt.medium,
            max_transfer_size: cmplt.max_transfer_size,
            max_packets_per_transfer: cmplt.max_packets_per_transfer,
            packet_alignment_factor: cmplt.packet_alignment_factor,
        };
        self.state = RndisState::Initialized;
        info!(
            "RNDIS: initialized, version {}.{}, max transfer {:#x}, {} packet(s) per transfer",
            cmplt.major_version,
            cmplt.minor_version,
            cmplt.max_transfer_size,
            cmplt.max_packets_per_transfer
        );
        Ok(())
    }

    /// Sends `REMOTE_NDIS_RESET_MSG` and drops any queued receive data.
    pub fn reset(&mut self) -> Result {
        let response = self.control_msg(&Request::Reset)?;
        message::parse_response(&response)?.check()?;
        self.request_id = 1;
        self.rx_queue.clear();
        self.state = RndisState::Reset;
        info!("RNDIS: reset");
        Ok(())
    }

    /// Sends `REMOTE_NDIS_HALT_MSG`.
    ///
    /// A halted device may refuse further control transfers, so halting
    /// twice succeeds.
    pub fn shutdown(&mut self) -> Result {
        let request = Request::Halt {
            request_id: self.request_id,
        };
        match self.control_msg(&request) {
            Ok(_) => {}
            Err(err) if err.status() == Status::DEVICE_ERROR => {
                debug!("RNDIS: halt refused, device already halted");
            }
            Err(err) => return Err(err),
        }
        self.request_id = 1;
        self.rx_queue.clear();
        self.state = RndisState::Halted;
        info!("RNDIS: halted");
        Ok(())
    }

    /// Sends `REMOTE_NDIS_KEEPALIVE_MSG`.
    pub fn keepalive(&mut self) -> Result {
        let request = Request::Keepalive {
            request_id: self.next_request_id(),
        };
        let response = self.control_msg(&request)?;
        message::parse_response(&response)?.check()?;
        Ok(())
    }

    /// Queries `oid` and copies the information buffer to `out`.
    ///
    /// Returns the number of bytes copied. Fails with `BUFFER_TOO_SMALL` if
    /// the value does not fit and with `DEVICE_ERROR` if the device rejects
    /// the query.
    pub fn query(&mut self, oid: Oid, out: &mut [u8]) -> Result<usize> {
        let request = Request::Query {
            request_id: self.next_request_id(),
            oid,
        };
        let response = self.control_msg(&request)?;
        let Response::Query(_, info) = message::parse_response(&response)?.check()? else {
            return Err(Status::DEVICE_ERROR.into());
        };
        let dest = out.get_mut(..info.len()).ok_or(Status::BUFFER_TOO_SMALL)?;
        dest.copy_from_slice(info);
        Ok(info.len())
    }

    /// Queries a 32-bit OID.
    pub fn query_u32(&mut self, oid: Oid) -> Result<u32> {
        let mut value = [0u8; 4];
        match self.query(oid, &mut value)? {
            4 => Ok(u32::from_le_bytes(value)),
            _ => Err(Status::DEVICE_ERROR.into()),
        }
    }

    /// Sets `oid` to `data`.
    pub fn set(&mut self, oid: Oid, data: &[u8]) -> Result {
        let request = Request::Set {
            request_id: self.next_request_id(),
            oid,
            data,
        };
        let response = self.control_msg(&request)?;
        match message::parse_response(&response)?.check()? {
            Response::Set(_) => Ok(()),
            _ => Err(Status::DEVICE_ERROR.into()),
        }
    }

    /// Sets a 32-bit OID.
    pub fn set_u32(&mut self, oid: Oid, value: u32) -> Result {
        self.set(oid, value.as_bytes())
    }
}
