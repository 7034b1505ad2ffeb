// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data channel: packet messages over the bulk endpoints of the CDC-Data
//! interface.

use alloc::vec;
use alloc::vec::Vec;

use log::{trace, warn};

use super::message::{self, PacketMsg};
use super::{RndisConfig, RndisDevice};
use crate::boot::Stall;
use crate::proto::network::usb_ethernet::ReceivedFrame;
use crate::proto::usb::io::UsbIo;
use crate::{Result, Status};

/// Adaptive bulk-in polling.
///
/// Devices only have data shortly after the host transmitted something, so
/// bulk-in reads are allowed in bursts. Once a burst is spent, reads are
/// skipped without touching the bus until enough of them were skipped to
/// grant a single probing read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct BulkInThrottle {
    /// Reads left in the current burst.
    pub(crate) stop_count: u32,
    /// Reads skipped since the burst ran out.
    pub(crate) block_count: u32,
}

impl BulkInThrottle {
    pub(crate) fn after_transmit(&mut self, config: &RndisConfig) {
        self.stop_count = config.rx_burst;
        self.block_count = 0;
    }

    /// Returns true if the next read must be skipped.
    pub(crate) fn skip_read(&mut self, config: &RndisConfig) -> bool {
        if self.stop_count != 0 {
            return false;
        }
        self.block_count += 1;
        if self.block_count >= config.rx_rearm {
            self.stop_count = config.rx_min;
            self.block_count = 0;
        }
        true
    }

    pub(crate) fn after_read(&mut self, success: bool, config: &RndisConfig) {
        if success {
            self.stop_count = config.rx_burst;
        } else {
            self.stop_count = self.stop_count.saturating_sub(1);
        }
    }
}

/// One bulk-in transfer, consumed one packet message at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ReceivedTransfer {
    buf: Vec<u8>,
    offset: usize,
    remaining: usize,
}

impl ReceivedTransfer {
    pub(crate) fn new(mut buf: Vec<u8>, length: usize) -> Self {
        buf.truncate(length);
        Self {
            remaining: buf.len(),
            buf,
            offset: 0,
        }
    }

    fn pending(&self) -> &[u8] {
        &self.buf[self.offset..self.offset + self.remaining]
    }

    fn advance(&mut self, length: usize) {
        let length = length.min(self.remaining);
        self.offset += length;
        self.remaining -= length;
    }

    const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

impl<U: UsbIo, S: Stall> RndisDevice<U, S> {
    /// Sends one already framed bulk transfer.
    pub(crate) fn transmit_data_msg(&mut self, msg: &[u8]) -> Result<usize> {
        let (_, bulk_out) = self.bulk_endpoints()?;
        let sent = self
            .data
            .sync_bulk_send(bulk_out, msg, self.config.bulk_out_timeout)
            .map_err(|err| err.to_err_without_payload())?;
        self.throttle.after_transmit(&self.config);
        Ok(sent)
    }

    /// Reads one bulk transfer, subject to the receive throttle.
    ///
    /// Fails with `TIMEOUT` without any bus activity when the throttle is
    /// closed.
    pub(crate) fn receive_data_msg(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let (bulk_in, _) = self.bulk_endpoints()?;
        if self.throttle.skip_read(&self.config) {
            return Err(Status::TIMEOUT.into());
        }
        let result = self
            .data
            .sync_bulk_receive(bulk_in, buffer, self.config.bulk_in_timeout)
            .map_err(|err| err.to_err_without_payload());
        self.throttle.after_read(result.is_ok(), &self.config);
        result
    }

    pub(crate) fn transfer_size(&self) -> usize {
        match self.negotiated.max_transfer_size {
            0 => self.config.max_transfer_size as usize,
            size => size as usize,
        }
    }

    /// Drains available bulk-in data into the receive queue.
    fn refill_rx_queue(&mut self) {
        for _ in 0..self.config.rx_refill_limit {
            let mut buf = vec![0u8; self.transfer_size()];
            match self.receive_data_msg(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(length) => {
                    trace!("RNDIS: queued {length} byte transfer");
                    self.rx_queue.push_back(ReceivedTransfer::new(buf, length));
                }
            }
        }
    }

    /// Length of the next queued frame, if any.
    pub(crate) fn peek_frame_len(&self) -> Option<usize> {
        let head = self.rx_queue.front()?;
        message::decode_packet(head.pending())
            .ok()
            .map(|(msg, _)| msg.data_length as usize)
    }

    /// Copies the next received Ethernet frame into `buffer`.
    ///
    /// Fails with `BUFFER_TOO_SMALL` without consuming the frame if it does
    /// not fit, and with `NOT_FOUND` if nothing was received.
    pub(crate) fn receive_frame(&mut self, buffer: &mut [u8]) -> Result<ReceivedFrame> {
        if self.rx_queue.is_empty() {
            self.refill_rx_queue();
        }
        while let Some(head) = self.rx_queue.front_mut() {
            let (msg, data) = match message::decode_packet(head.pending()) {
                Ok(packet) => packet,
                Err(_) => {
                    warn!("RNDIS: dropping malformed transfer");
                    self.rx_queue.pop_front();
                    continue;
                }
            };
            let frame_len = data.len();
            let Some(dest) = buffer.get_mut(..frame_len) else {
                return Err(Status::BUFFER_TOO_SMALL.into());
            };
            dest.copy_from_slice(data);
            head.advance(msg.message_length as usize);
            if head.is_exhausted() || head.remaining < PacketMsg::HEADER_SIZE {
                self.rx_queue.pop_front();
            }
            let mut frame = ReceivedFrame::parse(dest).unwrap_or(ReceivedFrame {
                frame_len,
                header_len: 0,
                src: Default::default(),
                dest: Default::default(),
                protocol: 0,
            });
            frame.frame_len = frame_len;
            return Ok(frame);
        }
        Err(Status::NOT_FOUND.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_cycle() {
        let config = RndisConfig::default();
        let mut throttle = BulkInThrottle::default();

        // Closed until something is sent; every fifth skipped read re-arms.
        for _ in 0..4 {
            assert!(throttle.skip_read(&config));
        }
        assert!(throttle.skip_read(&config));
        assert_eq!(throttle.stop_count, 1);
        assert!(!throttle.skip_read(&config));
        throttle.after_read(false, &config);
        assert!(throttle.skip_read(&config));

        throttle.after_transmit(&config);
        assert_eq!(throttle.stop_count, 10);
        for _ in 0..10 {
            assert!(!throttle.skip_read(&config));
            throttle.after_read(false, &config);
        }
        assert!(throttle.skip_read(&config));

        throttle.after_read(true, &config);
        assert_eq!(throttle.stop_count, 10);
    }

    #[test]
    fn test_transfer_cursor() {
        let mut transfer = ReceivedTransfer::new(vec![1, 2, 3, 4, 5, 0, 0], 5);
        assert_eq!(transfer.pending(), &[1, 2, 3, 4, 5]);
        transfer.advance(2);
        assert_eq!(transfer.pending(), &[3, 4, 5]);
        transfer.advance(10);
        assert!(transfer.is_exhausted());
    }
}
