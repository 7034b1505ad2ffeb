// SPDX-License-Identifier: MIT OR Apache-2.0

//! Types shared by Ethernet-adapter style network interfaces.

use bitflags::bitflags;

bitflags! {
    /// Flags to pass to receive_filters to enable/disable reception of some kinds of packets.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[repr(transparent)]
    pub struct ReceiveFlags: u32 {
        /// Receive unicast packets.
        const UNICAST = 0x01;
        /// Receive multicast packets.
        const MULTICAST = 0x02;
        /// Receive broadcast packets.
        const BROADCAST = 0x04;
        /// Receive packets in promiscuous mode.
        const PROMISCUOUS = 0x08;
        /// Receive packets in promiscuous multicast mode.
        const PROMISCUOUS_MULTICAST = 0x10;
    }
}

newtype_enum! {
    /// The state of a network interface.
    pub enum NetworkState: u32 => {
        /// The interface has been stopped
        STOPPED = 0,
        /// The interface has been started
        STARTED = 1,
        /// The interface has been initialized
        INITIALIZED = 2,
        /// No state can have a number higher than this
        MAX_STATE = 4,
    }
}

/// Network Statistics
///
/// The description of statistics on the network with the SNP's `statistics` function
/// is returned in this structure
///
/// Any of these statistics may or may not be available on the device. So, all the
/// retriever functions of the statistics return `None` when a statistic is not supported
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkStatistics {
    pub rx_total_frames: u64,
    pub rx_good_frames: u64,
    pub rx_dropped_frames: u64,
    pub rx_total_bytes: u64,
    pub tx_total_frames: u64,
    pub tx_good_frames: u64,
    pub tx_dropped_frames: u64,
    pub tx_total_bytes: u64,
}

impl Default for NetworkStatistics {
    fn default() -> Self {
        Self {
            rx_total_frames: Self::UNAVAILABLE,
            rx_good_frames: Self::UNAVAILABLE,
            rx_dropped_frames: Self::UNAVAILABLE,
            rx_total_bytes: Self::UNAVAILABLE,
            tx_total_frames: Self::UNAVAILABLE,
            tx_good_frames: Self::UNAVAILABLE,
            tx_dropped_frames: Self::UNAVAILABLE,
            tx_total_bytes: Self::UNAVAILABLE,
        }
    }
}

impl NetworkStatistics {
    /// Value of a statistic the device does not support.
    pub const UNAVAILABLE: u64 = u64::MAX;

    /// Any statistic value of -1 is not available
    const fn to_option(stat: u64) -> Option<u64> {
        if stat == Self::UNAVAILABLE {
            None
        } else {
            Some(stat)
        }
    }

    /// The total number of frames received, including error frames
    /// and dropped frames
    #[must_use]
    pub const fn rx_total_frames(&self) -> Option<u64> {
        Self::to_option(self.rx_total_frames)
    }

    /// The total number of good frames received and copied
    /// into receive buffers
    #[must_use]
    pub const fn rx_good_frames(&self) -> Option<u64> {
        Self::to_option(self.rx_good_frames)
    }

    /// Valid frames that were dropped because receive buffers were full
    #[must_use]
    pub const fn rx_dropped_frames(&self) -> Option<u64> {
        Self::to_option(self.rx_dropped_frames)
    }

    /// Total number of frames transmitted, including error frames
    #[must_use]
    pub const fn tx_total_frames(&self) -> Option<u64> {
        Self::to_option(self.tx_total_frames)
    }

    /// Valid frames that were transmitted
    #[must_use]
    pub const fn tx_good_frames(&self) -> Option<u64> {
        Self::to_option(self.tx_good_frames)
    }

    /// Valid frames that were dropped by the device
    #[must_use]
    pub const fn tx_dropped_frames(&self) -> Option<u64> {
        Self::to_option(self.tx_dropped_frames)
    }
}

/// Length of an Ethernet header.
pub const ETHER_HEADER_SIZE: usize = 14;
/// Largest Ethernet payload.
pub const ETHER_MAX_DATA_SIZE: usize = 1500;
/// Largest Ethernet frame, header included.
pub const ETHER_MAX_FRAME_SIZE: usize = ETHER_HEADER_SIZE + ETHER_MAX_DATA_SIZE;
/// Maximum number of multicast MAC filters the adapter exposes.
pub const MAX_MCAST_FILTER_COUNT: usize = 16;
