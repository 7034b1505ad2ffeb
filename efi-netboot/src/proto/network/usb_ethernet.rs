// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ethernet adapter surface of a USB network function.
//!
//! [`UsbEthernet`] is what a USB class driver offers to the generic network
//! layer above it: raw frame I/O, the MAC address and receive filters.
//! [`UsbEthernetUndi`] is the UNDI command set that layer forwards to the
//! driver. Every UNDI operation takes the caller's [`Cdb`] and reports its
//! outcome both in the returned [`Result`] and in the CDB status fields.

use core::net::IpAddr;

use efi_netboot_raw::protocol::network::snp::ETHER_HEADER_SIZE;
pub use efi_netboot_raw::protocol::network::undi::{UndiOpCode, UndiStatCode, stat_flags};
pub use efi_netboot_raw::protocol::rndis::PacketFilter;
pub use efi_netboot_raw::protocol::usb::EthernetFunctionalDescriptor;

use super::{MacAddress, NetworkStatistics, ReceiveFlags};
use crate::{Result, Status, StatusExt};

/// Command descriptor block of one UNDI call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cdb {
    /// Requested operation.
    pub op_code: UndiOpCode,
    /// Operation-specific flags.
    pub op_flags: u16,
    /// Completion code written by the driver.
    pub stat_code: UndiStatCode,
    /// Completion state and operation-specific result bits.
    pub stat_flags: u16,
}

impl Cdb {
    /// Creates a CDB that has not been processed yet.
    #[must_use]
    pub const fn new(op_code: UndiOpCode) -> Self {
        Self {
            op_code,
            op_flags: 0,
            stat_code: UndiStatCode::INVALID_CDB,
            stat_flags: 0,
        }
    }

    /// Marks the command as successfully completed.
    pub fn complete(&mut self) {
        self.stat_code = UndiStatCode::SUCCESS;
        self.stat_flags = (self.stat_flags & !stat_flags::STATUS_MASK) | stat_flags::COMMAND_COMPLETE;
    }

    /// Marks the command as failed with `code`, and returns `status` as an
    /// error.
    pub fn fail<T>(&mut self, code: UndiStatCode, status: Status) -> Result<T> {
        self.stat_code = code;
        self.stat_flags = (self.stat_flags & !stat_flags::STATUS_MASK) | stat_flags::COMMAND_FAILED;
        Err(status.into())
    }

    /// Records the outcome of `result` and passes it through.
    pub fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.complete();
                Ok(value)
            }
            Err(err) => {
                let code = stat_code_for(err.status());
                self.fail(code, err.status())
            }
        }
    }

    /// Returns true once the driver reported success.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.stat_flags & stat_flags::STATUS_MASK == stat_flags::COMMAND_COMPLETE
    }
}

/// UNDI completion code best describing a firmware status.
#[must_use]
pub fn stat_code_for(status: Status) -> UndiStatCode {
    match status {
        Status::SUCCESS => UndiStatCode::SUCCESS,
        Status::NOT_STARTED => UndiStatCode::NOT_STARTED,
        Status::ALREADY_STARTED => UndiStatCode::ALREADY_STARTED,
        Status::UNSUPPORTED => UndiStatCode::UNSUPPORTED,
        Status::INVALID_PARAMETER => UndiStatCode::INVALID_PARAMETER,
        Status::BUFFER_TOO_SMALL => UndiStatCode::BUFFER_FULL,
        Status::NOT_FOUND | Status::TIMEOUT => UndiStatCode::NO_DATA,
        Status::OUT_OF_RESOURCES => UndiStatCode::NOT_ENOUGH_MEMORY,
        Status::NOT_READY => UndiStatCode::BUSY,
        _ => UndiStatCode::DEVICE_FAILURE,
    }
}

/// State of the UNDI interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UndiState {
    /// `START` has not been issued.
    #[default]
    Stopped,
    /// Started but not initialized.
    Started,
    /// Ready for frame I/O.
    Initialized,
}

impl UndiState {
    /// Encoding of the state in the `GET_STATE` stat flags.
    #[must_use]
    pub const fn stat_flags(self) -> u16 {
        match self {
            Self::Stopped => stat_flags::GET_STATE_STOPPED,
            Self::Started => stat_flags::GET_STATE_STARTED,
            Self::Initialized => stat_flags::GET_STATE_INITIALIZED,
        }
    }
}

/// Result of `GET_INIT_INFO`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InitInfo {
    /// Largest frame payload.
    pub frame_data_len: u32,
    /// Supported link speeds, zero terminated.
    pub link_speeds: [u32; 4],
    /// Media header length.
    pub media_header_len: u16,
    /// Hardware address length.
    pub hw_addr_len: u16,
    /// Number of multicast filter slots.
    pub mcast_filter_count: u16,
    /// Transmit buffers.
    pub tx_buf_count: u16,
    /// Size of each transmit buffer.
    pub tx_buf_size: u16,
    /// Receive buffers.
    pub rx_buf_count: u16,
    /// Size of each receive buffer.
    pub rx_buf_size: u16,
    /// ARP hardware type, 1 for Ethernet.
    pub if_type: u8,
}

/// Result of `GET_CONFIG_INFO`: what the device negotiated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfigInfo {
    /// Largest bulk transfer the device accepts.
    pub max_transfer_size: u32,
    /// Number of frames the device may pack into one transfer.
    pub max_packets_per_transfer: u32,
    /// Frame alignment inside a transfer, as a power of two.
    pub packet_alignment_factor: u32,
    /// NDIS medium.
    pub medium: u32,
}

/// Result of `STATION_ADDRESS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StationAddress {
    /// Address used for transmit and directed receive.
    pub station: MacAddress,
    /// Broadcast address.
    pub broadcast: MacAddress,
    /// Factory address.
    pub permanent: MacAddress,
}

/// Result of `GET_STATUS`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UndiStatus {
    /// Length of the next queued frame, 0 if none.
    pub rx_frame_len: usize,
    /// Link is up.
    pub media_present: bool,
}

/// Addressing for `FILL_HEADER`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Source address.
    pub src: MacAddress,
    /// Destination address.
    pub dest: MacAddress,
    /// EtherType, host order.
    pub protocol: u16,
}

/// Result of `RECEIVE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Bytes copied to the caller buffer.
    pub frame_len: usize,
    /// Length of the media header at the start of the frame.
    pub header_len: usize,
    /// Source address.
    pub src: MacAddress,
    /// Destination address.
    pub dest: MacAddress,
    /// EtherType, host order.
    pub protocol: u16,
}

impl ReceivedFrame {
    /// Decodes the Ethernet header of `frame`.
    #[must_use]
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let header = frame.get(..ETHER_HEADER_SIZE)?;
        let mac = |range: core::ops::Range<usize>| {
            let mut octets = [0; 6];
            octets.copy_from_slice(&header[range]);
            MacAddress::from(octets)
        };
        Some(Self {
            frame_len: frame.len(),
            header_len: ETHER_HEADER_SIZE,
            dest: mac(0..6),
            src: mac(6..12),
            protocol: u16::from_be_bytes([header[12], header[13]]),
        })
    }
}

/// Raw Ethernet function of a USB device.
pub trait UsbEthernet {
    /// Receives one bulk transfer worth of data.
    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Sends one bulk transfer.
    fn transmit(&mut self, buffer: &[u8]) -> Result<usize>;

    /// Handles an interrupt-endpoint notification.
    fn interrupt(&mut self, data: &[u8]) -> Result;

    /// Current MAC address of the function.
    fn mac_address(&mut self) -> Result<MacAddress>;

    /// Largest bulk transfer the device accepts.
    fn max_bulk_size(&self) -> usize;

    /// CDC Ethernet networking functional descriptor.
    fn ethernet_functional_descriptor(&mut self) -> Result<EthernetFunctionalDescriptor>;

    /// Replaces the multicast address list.
    fn set_multicast_filter(&mut self, filters: &[MacAddress]) -> Result;

    /// Installs a wake-up pattern filter.
    fn set_power_pattern_filter(&mut self, value: u16, pattern: &[u8]) -> Result;

    /// Returns whether a wake-up pattern filter is active.
    fn power_pattern_filter(&mut self, value: u16) -> Result<bool>;

    /// Selects which kinds of frames are received.
    fn set_packet_filter(&mut self, filter: PacketFilter) -> Result;

    /// Reads the device counters.
    fn statistics(&mut self) -> Result<NetworkStatistics>;
}

/// UNDI command set of a USB Ethernet function.
pub trait UsbEthernetUndi {
    /// `GET_STATE`: reports the interface state in `cdb.stat_flags`.
    fn get_state(&mut self, cdb: &mut Cdb) -> Result<UndiState>;

    /// `START`.
    fn start(&mut self, cdb: &mut Cdb) -> Result;

    /// `STOP`.
    fn stop(&mut self, cdb: &mut Cdb) -> Result;

    /// `GET_INIT_INFO`.
    fn get_init_info(&mut self, cdb: &mut Cdb) -> Result<InitInfo>;

    /// `GET_CONFIG_INFO`.
    fn get_config_info(&mut self, cdb: &mut Cdb) -> Result<ConfigInfo>;

    /// `INITIALIZE`.
    fn initialize(&mut self, cdb: &mut Cdb) -> Result;

    /// `RESET`.
    fn reset(&mut self, cdb: &mut Cdb) -> Result;

    /// `SHUTDOWN`.
    fn shutdown(&mut self, cdb: &mut Cdb) -> Result;

    /// `INTERRUPT_ENABLES`. Frame I/O is polled, so there is nothing to
    /// enable.
    fn interrupt_enable(&mut self, cdb: &mut Cdb) -> Result {
        cdb.complete();
        Ok(())
    }

    /// `RECEIVE_FILTERS`.
    fn receive_filter(
        &mut self,
        cdb: &mut Cdb,
        filter: ReceiveFlags,
        mcast: &[MacAddress],
    ) -> Result;

    /// `STATION_ADDRESS`.
    fn station_address(&mut self, cdb: &mut Cdb, new: Option<MacAddress>) -> Result<StationAddress>;

    /// `STATISTICS`.
    fn statistics(&mut self, cdb: &mut Cdb, reset: bool) -> Result<NetworkStatistics>;

    /// `MCAST_IP_TO_MAC`.
    fn mcast_ip_to_mac(&mut self, cdb: &mut Cdb, ip: IpAddr) -> Result<MacAddress> {
        let mac = multicast_mac(ip);
        cdb.finish(mac)
    }

    /// `NVDATA`. USB functions expose no non-volatile storage.
    fn nv_data(&mut self, cdb: &mut Cdb) -> Result {
        cdb.fail(UndiStatCode::UNSUPPORTED, Status::UNSUPPORTED)
    }

    /// `GET_STATUS`.
    fn get_status(&mut self, cdb: &mut Cdb) -> Result<UndiStatus>;

    /// `FILL_HEADER`: writes an Ethernet header to the start of `frame`.
    fn fill_header(&mut self, cdb: &mut Cdb, frame: &mut [u8], header: &FrameHeader) -> Result {
        let filled = fill_ethernet_header(frame, header);
        cdb.finish(filled)
    }

    /// `TRANSMIT`: sends one complete Ethernet frame.
    fn transmit(&mut self, cdb: &mut Cdb, frame: &[u8]) -> Result;

    /// `RECEIVE`: copies the next queued frame into `buffer`.
    fn receive(&mut self, cdb: &mut Cdb, buffer: &mut [u8]) -> Result<ReceivedFrame>;
}

/// Maps a multicast IP address to its Ethernet group address.
pub fn multicast_mac(ip: IpAddr) -> Result<MacAddress> {
    match ip {
        IpAddr::V4(v4) if v4.is_multicast() => {
            let o = v4.octets();
            Ok(MacAddress::from([0x01, 0x00, 0x5E, o[1] & 0x7F, o[2], o[3]]))
        }
        IpAddr::V6(v6) if v6.is_multicast() => {
            let o = v6.octets();
            Ok(MacAddress::from([0x33, 0x33, o[12], o[13], o[14], o[15]]))
        }
        _ => Err(Status::INVALID_PARAMETER.into()),
    }
}

/// Writes the Ethernet header described by `header` to the start of `frame`.
pub fn fill_ethernet_header(frame: &mut [u8], header: &FrameHeader) -> Result {
    let Some(out) = frame.get_mut(..ETHER_HEADER_SIZE) else {
        return Status::BUFFER_TOO_SMALL.to_result();
    };
    out[..6].copy_from_slice(&header.dest.0[..6]);
    out[6..12].copy_from_slice(&header.src.0[..6]);
    out[12..].copy_from_slice(&header.protocol.to_be_bytes());
    Ok(())
}
