// SPDX-License-Identifier: MIT OR Apache-2.0

//! Walking packed device paths.

use efi_netboot_raw::protocol::device_path::{
    DeviceType, END_ENTIRE_SUB_TYPE, MessagingSubType, NODE_HEADER_SIZE, UsbDevicePath,
};

/// One node of a device path, header included.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DevicePathNode<'a> {
    bytes: &'a [u8],
}

impl<'a> DevicePathNode<'a> {
    /// Node type.
    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        DeviceType(self.bytes[0])
    }

    /// Node sub-type.
    #[must_use]
    pub fn sub_type(&self) -> u8 {
        self.bytes[1]
    }

    /// The encoded node, header included.
    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Returns true for the node terminating the whole path.
    #[must_use]
    pub fn is_end_entire(&self) -> bool {
        self.device_type() == DeviceType::END && self.sub_type() == END_ENTIRE_SUB_TYPE
    }

    /// Returns the parent port number if this is a USB messaging node.
    #[must_use]
    pub fn usb_parent_port(&self) -> Option<u8> {
        (self.device_type() == DeviceType::MESSAGING
            && self.sub_type() == MessagingSubType::USB.0
            && self.bytes.len() >= UsbDevicePath::SIZE)
            .then(|| self.bytes[4])
    }
}

/// Iterator over the nodes of a device path, up to (not including) the end
/// node.
///
/// Iteration stops early on a malformed node; [`DevicePathNodes::is_malformed`]
/// tells the two cases apart.
#[derive(Clone, Debug)]
pub struct DevicePathNodes<'a> {
    rest: &'a [u8],
    malformed: bool,
}

impl<'a> DevicePathNodes<'a> {
    /// Starts walking `path`.
    #[must_use]
    pub const fn new(path: &'a [u8]) -> Self {
        Self {
            rest: path,
            malformed: false,
        }
    }

    /// Returns true if iteration stopped on a truncated or zero-length node.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        self.malformed
    }
}

impl<'a> Iterator for DevicePathNodes<'a> {
    type Item = DevicePathNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.malformed || self.rest.len() < NODE_HEADER_SIZE {
            if !self.rest.is_empty() {
                self.malformed = true;
            }
            return None;
        }
        let len = usize::from(u16::from_le_bytes([self.rest[2], self.rest[3]]));
        if len < NODE_HEADER_SIZE || len > self.rest.len() {
            self.malformed = true;
            return None;
        }
        let (bytes, rest) = self.rest.split_at(len);
        let node = DevicePathNode { bytes };
        if node.is_end_entire() {
            self.rest = &[];
            return None;
        }
        self.rest = rest;
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_nodes() {
        let path = [
            0x02, 0x01, 0x0C, 0x00, 0xD0, 0x41, 0x03, 0x0A, 0x00, 0x00, 0x00, 0x00, // ACPI
            0x03, 0x05, 0x06, 0x00, 0x02, 0x01, // USB port 2, interface 1
            0x7F, 0xFF, 0x04, 0x00, // end
        ];
        let mut nodes = DevicePathNodes::new(&path);
        let acpi = nodes.next().unwrap();
        assert_eq!(acpi.device_type(), DeviceType::ACPI);
        assert_eq!(acpi.usb_parent_port(), None);
        let usb = nodes.next().unwrap();
        assert_eq!(usb.usb_parent_port(), Some(2));
        assert!(nodes.next().is_none());
        assert!(!nodes.is_malformed());
    }

    #[test]
    fn test_zero_length_node_is_malformed() {
        let path = [0x03, 0x05, 0x00, 0x00, 0x7F, 0xFF, 0x04, 0x00];
        let mut nodes = DevicePathNodes::new(&path);
        assert!(nodes.next().is_none());
        assert!(nodes.is_malformed());
    }
}
