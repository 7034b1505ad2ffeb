// SPDX-License-Identifier: MIT OR Apache-2.0

//! PXE vendor options (DHCPv4 option 43).

use alloc::vec::Vec;
use core::net::Ipv4Addr;

use efi_netboot_raw::protocol::network::dhcp4::PxeVendorTag;
use efi_netboot_raw::protocol::network::pxe::{BootType, DiscoverControl};

use crate::util::{be_u16, be_u32, ipv4_at, until_nul};

/// Bits of the MTFTP sub-options 1 to 5; all must be present.
const MTFTP_BITS: u32 = 0x3E;
/// Bits of the discovery sub-options 6 to 10; any one is enough.
const DISCOVER_BITS: u32 = 0x7C0;

/// Most menu items kept from a boot menu.
pub const MAX_MENU_ITEMS: usize = 24;

/// One entry of the boot servers sub-option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootServer {
    /// Server type.
    pub boot_type: BootType,
    /// Addresses of servers of that type.
    pub addresses: Vec<Ipv4Addr>,
}

/// One entry of the boot menu sub-option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootMenuItem {
    /// Server type selected by this item.
    pub boot_type: BootType,
    /// Text shown in the menu.
    pub description: Vec<u8>,
}

/// The menu prompt sub-option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuPrompt {
    /// Seconds to wait for a key. 0 skips the prompt, 255 waits forever.
    pub timeout: u8,
    /// Prompt text.
    pub text: Vec<u8>,
}

/// The multicast allocation sub-option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct McastAlloc {
    /// First address of the block.
    pub base: Ipv4Addr,
    /// Block size.
    pub block: u16,
    /// Range size.
    pub range: u16,
}

/// The boot item sub-option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootItem {
    /// Server type.
    pub boot_type: BootType,
    /// Boot layer.
    pub layer: u16,
}

/// Decoded PXE vendor options.
///
/// `bitmap` records every sub-option tag seen, including the ones that are
/// not decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VendorOptions {
    bitmap: [u32; 8],
    /// MTFTP multicast address.
    pub mtftp_ip: Option<Ipv4Addr>,
    /// MTFTP client port.
    pub mtftp_client_port: u16,
    /// MTFTP server port.
    pub mtftp_server_port: u16,
    /// MTFTP listen timeout, in seconds.
    pub mtftp_timeout: u8,
    /// MTFTP reopen delay, in seconds.
    pub mtftp_delay: u8,
    /// Discovery control bits.
    pub discover_control: DiscoverControl,
    /// Multicast discovery address.
    pub discover_mcast: Option<Ipv4Addr>,
    /// Boot servers, by type.
    pub boot_servers: Vec<BootServer>,
    /// Boot menu items, in display order.
    pub boot_menu: Vec<BootMenuItem>,
    /// Boot prompt.
    pub menu_prompt: Option<MenuPrompt>,
    /// Multicast address allocation.
    pub mcast_alloc: Option<McastAlloc>,
    /// Accepted credential types.
    pub credential_types: Vec<u32>,
    /// Boot item a server reply answers.
    pub boot_item: Option<BootItem>,
}

impl VendorOptions {
    /// Decodes the data of a vendor option.
    #[must_use]
    pub fn parse(data: &[u8]) -> Self {
        let mut options = Self::default();
        let mut offset = 0;
        while let Some(&tag) = data.get(offset) {
            let tag = PxeVendorTag(tag);
            if tag == PxeVendorTag::END {
                break;
            }
            if tag.0 == 0 {
                offset += 1;
                continue;
            }
            let Some(&len) = data.get(offset + 1) else {
                break;
            };
            let Some(value) = data.get(offset + 2..offset + 2 + usize::from(len)) else {
                break;
            };
            options.set(tag.0);
            options.decode(tag, value);
            offset += 2 + usize::from(len);
        }
        options
    }

    fn set(&mut self, tag: u8) {
        self.bitmap[usize::from(tag / 32)] |= 1 << (tag % 32);
    }

    fn decode(&mut self, tag: PxeVendorTag, value: &[u8]) {
        match tag {
            PxeVendorTag::MTFTP_IP => self.mtftp_ip = ipv4_at(value, 0),
            PxeVendorTag::MTFTP_CPORT => self.mtftp_client_port = be_u16(value, 0).unwrap_or(0),
            PxeVendorTag::MTFTP_SPORT => self.mtftp_server_port = be_u16(value, 0).unwrap_or(0),
            PxeVendorTag::MTFTP_TMOUT => self.mtftp_timeout = value.first().copied().unwrap_or(0),
            PxeVendorTag::MTFTP_DELAY => self.mtftp_delay = value.first().copied().unwrap_or(0),
            PxeVendorTag::DISCOVER_CTRL => {
                self.discover_control =
                    DiscoverControl::from_bits_retain(value.first().copied().unwrap_or(0));
            }
            PxeVendorTag::DISCOVER_MCAST => self.discover_mcast = ipv4_at(value, 0),
            PxeVendorTag::BOOT_SERVERS => self.boot_servers = parse_boot_servers(value),
            PxeVendorTag::BOOT_MENU => self.boot_menu = parse_boot_menu(value),
            PxeVendorTag::MENU_PROMPT => {
                self.menu_prompt = value.split_first().map(|(&timeout, text)| MenuPrompt {
                    timeout,
                    text: until_nul(text).to_vec(),
                });
            }
            PxeVendorTag::MCAST_ALLOC => {
                self.mcast_alloc = ipv4_at(value, 0).map(|base| McastAlloc {
                    base,
                    block: be_u16(value, 4).unwrap_or(0),
                    range: be_u16(value, 6).unwrap_or(0),
                });
            }
            PxeVendorTag::CREDENTIAL_TYPES => {
                self.credential_types = (0..value.len() / 4).filter_map(|i| be_u32(value, i * 4)).collect();
            }
            PxeVendorTag::BOOT_ITEM => {
                self.boot_item = be_u16(value, 0).map(|ty| BootItem {
                    boot_type: BootType(ty),
                    layer: be_u16(value, 2).unwrap_or(0),
                });
            }
            _ => {}
        }
    }

    /// The presence bitmap, one bit per sub-option tag.
    #[must_use]
    pub const fn bitmap(&self) -> &[u32; 8] {
        &self.bitmap
    }

    /// True if sub-option `tag` was present.
    #[must_use]
    pub fn has(&self, tag: PxeVendorTag) -> bool {
        self.bitmap[usize::from(tag.0 / 32)] & (1 << (tag.0 % 32)) != 0
    }

    /// True if any boot server discovery sub-option was present.
    #[must_use]
    pub const fn is_discover_valid(&self) -> bool {
        self.bitmap[0] & DISCOVER_BITS != 0
    }

    /// True if every MTFTP sub-option was present.
    #[must_use]
    pub const fn is_mtftp_valid(&self) -> bool {
        self.bitmap[0] & MTFTP_BITS == MTFTP_BITS
    }

    /// Boot servers entry for `boot_type`.
    #[must_use]
    pub fn boot_server(&self, boot_type: BootType) -> Option<&BootServer> {
        self.boot_servers.iter().find(|s| s.boot_type == boot_type)
    }
}

fn parse_boot_servers(mut value: &[u8]) -> Vec<BootServer> {
    let mut servers = Vec::new();
    while let (Some(ty), Some(&count)) = (be_u16(value, 0), value.get(2)) {
        let end = 3 + 4 * usize::from(count);
        let Some(ips) = value.get(3..end) else {
            break;
        };
        servers.push(BootServer {
            boot_type: BootType(ty),
            addresses: ips.chunks_exact(4).filter_map(|ip| ipv4_at(ip, 0)).collect(),
        });
        value = &value[end..];
    }
    servers
}

fn parse_boot_menu(mut value: &[u8]) -> Vec<BootMenuItem> {
    let mut items = Vec::new();
    while let (Some(ty), Some(&len)) = (be_u16(value, 0), value.get(2)) {
        let end = 3 + usize::from(len);
        let Some(description) = value.get(3..end) else {
            break;
        };
        if items.len() == MAX_MENU_ITEMS {
            break;
        }
        items.push(BootMenuItem {
            boot_type: BootType(ty),
            description: description.to_vec(),
        });
        value = &value[end..];
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_discover_options() {
        let data = [
            6, 1, 0x0B, // discovery control
            8, 11, 0x80, 0x00, 2, 10, 0, 0, 1, 10, 0, 0, 2, // boot servers
            9, 9, 0x80, 0x00, 6, b'L', b'i', b'n', b'u', b'x', b'!', // menu
            10, 6, 5, b'P', b'r', b'e', b's', b's', // prompt
            71, 4, 0x80, 0x00, 0, 0, // boot item
            255,
        ];
        let options = VendorOptions::parse(&data);
        assert!(options.is_discover_valid());
        assert!(!options.is_mtftp_valid());
        assert!(options.has(PxeVendorTag::BOOT_ITEM));
        assert!(!options.has(PxeVendorTag::DISCOVER_MCAST));
        assert_eq!(
            options.discover_control,
            DiscoverControl::DISABLE_BROADCAST
                | DiscoverControl::DISABLE_MULTICAST
                | DiscoverControl::USE_BOOT_FILE_NAME
        );
        assert_eq!(
            options.boot_server(BootType(0x8000)).unwrap().addresses,
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
        );
        assert_eq!(options.boot_menu[0].description, b"Linux!");
        let prompt = options.menu_prompt.unwrap();
        assert_eq!(prompt.timeout, 5);
        assert_eq!(prompt.text, b"Press");
        assert_eq!(
            options.boot_item,
            Some(BootItem {
                boot_type: BootType(0x8000),
                layer: 0
            })
        );
    }

    #[test]
    fn test_mtftp_options() {
        let data = [1, 4, 224, 1, 1, 1, 2, 2, 0, 69, 3, 2, 0, 70, 4, 1, 3, 5, 1, 2, 255];
        let options = VendorOptions::parse(&data);
        assert!(options.is_mtftp_valid());
        assert!(!options.is_discover_valid());
        assert_eq!(options.mtftp_client_port, 69);
        assert_eq!(options.mtftp_timeout, 3);
    }

    #[test]
    fn test_truncated_stops_parsing() {
        let options = VendorOptions::parse(&[6, 1, 0x01, 8, 40, 0x80]);
        assert!(options.has(PxeVendorTag::DISCOVER_CTRL));
        assert!(!options.has(PxeVendorTag::BOOT_SERVERS));
        assert!(options.boot_servers.is_empty());
    }
}
