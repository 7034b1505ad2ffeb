// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device path node layout.
//!
//! A device path is a packed sequence of variable-length nodes. Each node
//! starts with a four byte header: type, sub-type and a little-endian `u16`
//! total length that includes the header itself.

newtype_enum! {
/// Device path node type.
pub enum DeviceType: u8 => {
    HARDWARE = 0x01,
    ACPI = 0x02,
    MESSAGING = 0x03,
    MEDIA = 0x04,
    BIOS_BOOT_SPEC = 0x05,
    END = 0x7F,
}}

newtype_enum! {
/// Messaging node sub-types used by the USB network driver.
pub enum MessagingSubType: u8 => {
    ATAPI = 0x01,
    SCSI = 0x02,
    USB = 0x05,
    MAC_ADDRESS = 0x0B,
    IPV4 = 0x0C,
    IPV6 = 0x0D,
    USB_CLASS = 0x0F,
}}

/// Sub-type of the node terminating a whole device path.
pub const END_ENTIRE_SUB_TYPE: u8 = 0xFF;

/// Sub-type of the node terminating one instance of a multi-instance path.
pub const END_INSTANCE_SUB_TYPE: u8 = 0x01;

/// Size of a node header in bytes.
pub const NODE_HEADER_SIZE: usize = 4;

/// Common header of every device path node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct DevicePathHeader {
    pub device_type: DeviceType,
    pub sub_type: u8,
    pub length: [u8; 2],
}

impl DevicePathHeader {
    /// Total node length, header included.
    #[must_use]
    pub const fn node_length(&self) -> u16 {
        u16::from_le_bytes(self.length)
    }
}

/// USB messaging node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct UsbDevicePath {
    pub header: DevicePathHeader,
    pub parent_port_number: u8,
    pub interface_number: u8,
}

impl UsbDevicePath {
    /// Encoded size of the node.
    pub const SIZE: usize = 6;
}
