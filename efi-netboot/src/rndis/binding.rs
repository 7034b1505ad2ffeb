// SPDX-License-Identifier: MIT OR Apache-2.0

//! Matching USB interfaces to the driver.

use efi_netboot_raw::protocol::usb::{InterfaceClass, InterfaceDescriptor};

use crate::proto::device_path::DevicePathNodes;
use crate::{Result, Status};

/// Returns true for the RNDIS control interface classes: CDC with the
/// vendor RNDIS protocol, wireless RNDIS and miscellaneous RNDIS.
#[must_use]
pub fn is_rndis_interface(desc: &InterfaceDescriptor) -> bool {
    matches!(
        InterfaceClass::of(desc),
        InterfaceClass::CDC_RNDIS | InterfaceClass::WIRELESS_RNDIS | InterfaceClass::MISC_RNDIS
    )
}

/// Returns true for a CDC-Data interface.
#[must_use]
pub fn is_cdc_data_interface(desc: &InterfaceDescriptor) -> bool {
    InterfaceClass::of(desc) == InterfaceClass::CDC_DATA
}

/// Checks that two interface device paths belong to the same USB device.
///
/// Every node but the last must be byte-identical, and the last nodes must
/// both be USB nodes on the same parent port; the interface numbers may
/// differ. Anything else fails with `UNSUPPORTED`.
pub fn is_same_device(a: &[u8], b: &[u8]) -> Result {
    let mut nodes_a = DevicePathNodes::new(a);
    let mut nodes_b = DevicePathNodes::new(b);
    let mut last_a = None;
    let mut last_b = None;
    loop {
        match (nodes_a.next(), nodes_b.next()) {
            (None, None) => break,
            (Some(node_a), Some(node_b)) => {
                if let (Some(prev_a), Some(prev_b)) = (last_a, last_b) {
                    if prev_a != prev_b {
                        return Err(Status::UNSUPPORTED.into());
                    }
                }
                last_a = Some(node_a);
                last_b = Some(node_b);
            }
            _ => return Err(Status::UNSUPPORTED.into()),
        }
    }
    if nodes_a.is_malformed() || nodes_b.is_malformed() {
        return Err(Status::UNSUPPORTED.into());
    }
    let port_a = last_a.and_then(|node| node.usb_parent_port());
    let port_b = last_b.and_then(|node| node.usb_parent_port());
    match (port_a, port_b) {
        (Some(a), Some(b)) if a == b => Ok(()),
        _ => Err(Status::UNSUPPORTED.into()),
    }
}

/// Returns the index of the first candidate device path that belongs to
/// the same device as `control_path`.
pub fn find_matching_cdc_data<'a, I>(control_path: &[u8], candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    candidates
        .into_iter()
        .position(|path| is_same_device(control_path, path).is_ok())
}
