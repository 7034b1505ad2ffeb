// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ethernet adapter and UNDI surfaces of [`RndisDevice`].

use alloc::vec::Vec;
use core::net::IpAddr;

use efi_netboot_raw::protocol::network::snp::{
    ETHER_HEADER_SIZE, ETHER_MAX_DATA_SIZE, MAX_MCAST_FILTER_COUNT,
};
use efi_netboot_raw::protocol::network::undi::LINK_SPEEDS;
use efi_netboot_raw::protocol::rndis::MEDIA_STATE_CONNECTED;
use log::{info, warn};

use super::message::{self, Oid, PacketFilter};
use super::RndisDevice;
use crate::boot::Stall;
use crate::proto::network::usb_ethernet::{
    Cdb, ConfigInfo, EthernetFunctionalDescriptor, FrameHeader, InitInfo, ReceivedFrame,
    StationAddress, UndiStatCode, UndiState, UndiStatus, UsbEthernet, UsbEthernetUndi,
    stat_flags,
};
use crate::proto::network::{MacAddress, NetworkStatistics, ReceiveFlags};
use crate::proto::usb::io::UsbIo;
use crate::{Result, Status};

/// Packet filter programmed by UNDI `INITIALIZE`.
const DEFAULT_PACKET_FILTER: PacketFilter = PacketFilter::DIRECTED
    .union(PacketFilter::BROADCAST)
    .union(PacketFilter::ALL_MULTICAST);

impl<U: UsbIo, S: Stall> RndisDevice<U, S> {
    /// Probes the device: reset, initialize and halt again, each step
    /// retried once.
    fn probe(&mut self) -> Result {
        if self.reset().is_err() {
            warn!("RNDIS: reset failed, retrying");
            self.reset()?;
        }
        if self.initialize().is_err() {
            warn!("RNDIS: initialize failed, retrying");
            self.initialize()?;
        }
        self.shutdown()
    }

    fn mac_from_oid(&mut self, oid: Oid) -> Result<MacAddress> {
        let mut mac = [0u8; 6];
        match self.query(oid, &mut mac)? {
            6 => Ok(MacAddress::from(mac)),
            _ => Err(Status::DEVICE_ERROR.into()),
        }
    }

    fn permanent_address(&mut self) -> Result<MacAddress> {
        self.mac_from_oid(Oid::PERMANENT_ADDRESS_802_3)
    }

    fn require(&self, cdb: &mut Cdb, wanted: UndiState) -> Result {
        match (self.undi_state, wanted) {
            (current, wanted) if current == wanted => Ok(()),
            (UndiState::Stopped, _) => cdb.fail(UndiStatCode::NOT_STARTED, Status::NOT_STARTED),
            (_, UndiState::Initialized) => {
                cdb.fail(UndiStatCode::NOT_INITIALIZED, Status::NOT_STARTED)
            }
            _ => cdb.fail(UndiStatCode::INVALID_CDB, Status::INVALID_PARAMETER),
        }
    }

    fn require_started(&self, cdb: &mut Cdb) -> Result {
        if self.undi_state == UndiState::Stopped {
            return cdb.fail(UndiStatCode::NOT_STARTED, Status::NOT_STARTED);
        }
        Ok(())
    }
}

impl<U: UsbIo, S: Stall> UsbEthernet for RndisDevice<U, S> {
    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize> {
        self.receive_data_msg(buffer)
    }

    fn transmit(&mut self, buffer: &[u8]) -> Result<usize> {
        self.transmit_data_msg(buffer)
    }

    fn interrupt(&mut self, data: &[u8]) -> Result {
        self.on_interrupt(data);
        Ok(())
    }

    fn mac_address(&mut self) -> Result<MacAddress> {
        self.mac_from_oid(Oid::CURRENT_ADDRESS_802_3)
            .or_else(|_| self.permanent_address())
    }

    fn max_bulk_size(&self) -> usize {
        self.transfer_size()
    }

    fn ethernet_functional_descriptor(&mut self) -> Result<EthernetFunctionalDescriptor> {
        self.functional_descriptor()
    }

    fn set_multicast_filter(&mut self, filters: &[MacAddress]) -> Result {
        if filters.len() > MAX_MCAST_FILTER_COUNT {
            return Err(Status::INVALID_PARAMETER.into());
        }
        let list: Vec<u8> = filters
            .iter()
            .flat_map(|mac| mac.0[..6].iter().copied())
            .collect();
        self.set(Oid::MULTICAST_LIST_802_3, &list)?;
        self.mcast_filters = filters.to_vec();
        Ok(())
    }

    fn set_power_pattern_filter(&mut self, _value: u16, _pattern: &[u8]) -> Result {
        Err(Status::UNSUPPORTED.into())
    }

    fn power_pattern_filter(&mut self, _value: u16) -> Result<bool> {
        Err(Status::UNSUPPORTED.into())
    }

    fn set_packet_filter(&mut self, filter: PacketFilter) -> Result {
        self.set_u32(Oid::GEN_CURRENT_PACKET_FILTER, filter.bits())
    }

    fn statistics(&mut self) -> Result<NetworkStatistics> {
        let mut stats = NetworkStatistics::default();
        let tx_ok = self.query_u32(Oid::GEN_XMIT_OK).ok();
        let rx_ok = self.query_u32(Oid::GEN_RCV_OK).ok();
        let tx_err = self.query_u32(Oid::GEN_XMIT_ERROR).ok();
        let rx_err = self.query_u32(Oid::GEN_RCV_ERROR).ok();
        let rx_no_buf = self.query_u32(Oid::GEN_RCV_NO_BUFFER).ok();
        if let Some(ok) = tx_ok {
            stats.tx_good_frames = u64::from(ok);
        }
        if let Some(ok) = rx_ok {
            stats.rx_good_frames = u64::from(ok);
        }
        if let Some(err) = tx_err {
            stats.tx_dropped_frames = u64::from(err);
        }
        if let (Some(err), Some(no_buf)) = (rx_err, rx_no_buf) {
            stats.rx_dropped_frames = u64::from(err) + u64::from(no_buf);
        }
        if let (Some(ok), Some(err)) = (tx_ok, tx_err) {
            stats.tx_total_frames = u64::from(ok) + u64::from(err);
        }
        if let (Some(ok), Some(err)) = (rx_ok, rx_err) {
            stats.rx_total_frames = u64::from(ok) + u64::from(err);
        }
        if tx_ok.is_none() && rx_ok.is_none() {
            return Err(Status::UNSUPPORTED.into());
        }
        Ok(stats)
    }
}

impl<U: UsbIo, S: Stall> UsbEthernetUndi for RndisDevice<U, S> {
    fn get_state(&mut self, cdb: &mut Cdb) -> Result<UndiState> {
        cdb.stat_flags = (cdb.stat_flags & !stat_flags::GET_STATE_MASK) | self.undi_state.stat_flags();
        cdb.complete();
        Ok(self.undi_state)
    }

    fn start(&mut self, cdb: &mut Cdb) -> Result {
        if self.undi_state != UndiState::Stopped {
            return cdb.fail(UndiStatCode::ALREADY_STARTED, Status::ALREADY_STARTED);
        }
        let probed = self.probe();
        cdb.finish(probed)?;
        self.undi_state = UndiState::Started;
        info!("RNDIS: UNDI started");
        Ok(())
    }

    fn stop(&mut self, cdb: &mut Cdb) -> Result {
        match self.undi_state {
            UndiState::Stopped => cdb.fail(UndiStatCode::NOT_STARTED, Status::NOT_STARTED),
            UndiState::Initialized => cdb.fail(UndiStatCode::NOT_SHUTDOWN, Status::DEVICE_ERROR),
            UndiState::Started => {
                self.undi_state = UndiState::Stopped;
                cdb.complete();
                Ok(())
            }
        }
    }

    fn get_init_info(&mut self, cdb: &mut Cdb) -> Result<InitInfo> {
        self.require_started(cdb)?;
        let transfer = u16::try_from(self.transfer_size()).unwrap_or(u16::MAX);
        cdb.complete();
        Ok(InitInfo {
            frame_data_len: ETHER_MAX_DATA_SIZE as u32,
            link_speeds: LINK_SPEEDS,
            media_header_len: ETHER_HEADER_SIZE as u16,
            hw_addr_len: 6,
            mcast_filter_count: MAX_MCAST_FILTER_COUNT as u16,
            tx_buf_count: 1,
            tx_buf_size: transfer,
            rx_buf_count: 1,
            rx_buf_size: transfer,
            if_type: 1,
        })
    }

    fn get_config_info(&mut self, cdb: &mut Cdb) -> Result<ConfigInfo> {
        self.require_started(cdb)?;
        let negotiated = self.negotiated();
        cdb.complete();
        Ok(ConfigInfo {
            max_transfer_size: negotiated.max_transfer_size,
            max_packets_per_transfer: negotiated.max_packets_per_transfer,
            packet_alignment_factor: negotiated.packet_alignment_factor,
            medium: negotiated.medium,
        })
    }

    fn initialize(&mut self, cdb: &mut Cdb) -> Result {
        match self.undi_state {
            UndiState::Stopped => return cdb.fail(UndiStatCode::NOT_STARTED, Status::NOT_STARTED),
            UndiState::Initialized => {
                return cdb.fail(UndiStatCode::ALREADY_INITIALIZED, Status::ALREADY_STARTED);
            }
            UndiState::Started => {}
        }
        let result = RndisDevice::initialize(self)
            .and_then(|()| self.set_packet_filter(DEFAULT_PACKET_FILTER));
        cdb.finish(result)?;
        self.undi_state = UndiState::Initialized;
        Ok(())
    }

    fn reset(&mut self, cdb: &mut Cdb) -> Result {
        self.require(cdb, UndiState::Initialized)?;
        let result = RndisDevice::reset(self);
        cdb.finish(result)
    }

    fn shutdown(&mut self, cdb: &mut Cdb) -> Result {
        self.require_started(cdb)?;
        let result = RndisDevice::shutdown(self);
        cdb.finish(result)?;
        self.undi_state = UndiState::Started;
        Ok(())
    }

    fn receive_filter(
        &mut self,
        cdb: &mut Cdb,
        filter: ReceiveFlags,
        mcast: &[MacAddress],
    ) -> Result {
        self.require(cdb, UndiState::Initialized)?;
        let mut packet_filter = PacketFilter::empty();
        for (flag, rndis) in [
            (ReceiveFlags::UNICAST, PacketFilter::DIRECTED),
            (ReceiveFlags::BROADCAST, PacketFilter::BROADCAST),
            (ReceiveFlags::MULTICAST, PacketFilter::MULTICAST),
            (ReceiveFlags::PROMISCUOUS, PacketFilter::PROMISCUOUS),
            (ReceiveFlags::PROMISCUOUS_MULTICAST, PacketFilter::ALL_MULTICAST),
        ] {
            if filter.contains(flag) {
                packet_filter |= rndis;
            }
        }
        let mut result = self.set_packet_filter(packet_filter);
        if result.is_ok() && !mcast.is_empty() {
            result = self.set_multicast_filter(mcast);
        }
        cdb.finish(result)
    }

    fn station_address(&mut self, cdb: &mut Cdb, new: Option<MacAddress>) -> Result<StationAddress> {
        self.require(cdb, UndiState::Initialized)?;
        if new.is_some() {
            return cdb.fail(UndiStatCode::UNSUPPORTED, Status::UNSUPPORTED);
        }
        let station = UsbEthernet::mac_address(self);
        let result = station.map(|station| StationAddress {
            station,
            broadcast: MacAddress::BROADCAST,
            permanent: self.permanent_address().unwrap_or(station),
        });
        cdb.finish(result)
    }

    fn statistics(&mut self, cdb: &mut Cdb, reset: bool) -> Result<NetworkStatistics> {
        self.require(cdb, UndiState::Initialized)?;
        if reset {
            return cdb.fail(UndiStatCode::UNSUPPORTED, Status::UNSUPPORTED);
        }
        let stats = UsbEthernet::statistics(self);
        cdb.finish(stats)
    }

    fn mcast_ip_to_mac(&mut self, cdb: &mut Cdb, ip: IpAddr) -> Result<MacAddress> {
        self.require_started(cdb)?;
        let mac = crate::proto::network::usb_ethernet::multicast_mac(ip);
        cdb.finish(mac)
    }

    fn get_status(&mut self, cdb: &mut Cdb) -> Result<UndiStatus> {
        self.require(cdb, UndiState::Initialized)?;
        let media_present = self
            .query_u32(Oid::GEN_MEDIA_CONNECT_STATUS)
            .map(|state| state == MEDIA_STATE_CONNECTED)
            .unwrap_or(true);
        cdb.stat_flags |= stat_flags::GET_STATUS_NO_TXBUFS_WRITTEN;
        if !media_present {
            cdb.stat_flags |= stat_flags::GET_STATUS_NO_MEDIA;
        }
        cdb.complete();
        Ok(UndiStatus {
            rx_frame_len: self.peek_frame_len().unwrap_or(0),
            media_present,
        })
    }

    fn fill_header(&mut self, cdb: &mut Cdb, frame: &mut [u8], header: &FrameHeader) -> Result {
        self.require(cdb, UndiState::Initialized)?;
        let filled = crate::proto::network::usb_ethernet::fill_ethernet_header(frame, header);
        cdb.finish(filled)
    }

    fn transmit(&mut self, cdb: &mut Cdb, frame: &[u8]) -> Result {
        self.require(cdb, UndiState::Initialized)?;
        if frame.len() + message::PacketMsg::HEADER_SIZE > self.transfer_size() {
            return cdb.fail(UndiStatCode::INVALID_PARAMETER, Status::BUFFER_TOO_SMALL);
        }
        let msg = message::encode_packet(frame);
        let sent = self.transmit_data_msg(&msg).map(|_| ());
        cdb.finish(sent)
    }

    fn receive(&mut self, cdb: &mut Cdb, buffer: &mut [u8]) -> Result<ReceivedFrame> {
        self.require(cdb, UndiState::Initialized)?;
        let frame = self.receive_frame(buffer);
        cdb.finish(frame)
    }
}
