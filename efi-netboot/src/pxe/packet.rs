// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsed views of DHCPv4 and DHCPv6 packets.
//!
//! Both views own the raw packet and remember where the options the PXE
//! client cares about were found, so the bytes are scanned once per packet.

use alloc::vec::Vec;
use core::net::{Ipv4Addr, Ipv6Addr};
use core::ops::Range;

use efi_netboot_raw::protocol::network::dhcp4::{
    BOOTP_OP_REQUEST, DHCP4_MAGIC, Dhcp4Tag, FLAG_BROADCAST, HTYPE_ETHERNET, PXE_CLASS_ID, header,
    overload,
};
use efi_netboot_raw::protocol::network::dhcp6::{
    DHCP6_HEADER_SIZE, DHCP6_OPTION_HEADER_SIZE, DHCP6_STATUS_SUCCESS, Dhcp6MsgType, Dhcp6OptCode,
    IA_NA_OPTIONS_OFFSET, PXE_ENTERPRISE_NUMBER, VENDOR_CLASS_ID_OFFSET,
};

use crate::util::{be_u16, be_u32, ipv4_at, ipv6_at, until_nul};
use crate::{Result, Status};

/// Smallest packet a BOOTP client may send.
const BOOTP_MIN_SIZE: usize = 300;

/// DHCPv4 options remembered by [`Dhcp4Packet`].
const DHCP4_TAGS: [Dhcp4Tag; 7] = [
    Dhcp4Tag::BOOTFILE_LEN,
    Dhcp4Tag::VENDOR,
    Dhcp4Tag::OVERLOAD,
    Dhcp4Tag::MSG_TYPE,
    Dhcp4Tag::SERVER_ID,
    Dhcp4Tag::CLASS_ID,
    Dhcp4Tag::BOOTFILE,
];

/// Walks a DHCPv4 option area and returns the data range of the first
/// `tag`, relative to `area`.
pub(crate) fn find_dhcp4_option(area: &[u8], tag: Dhcp4Tag) -> Option<Range<usize>> {
    let mut offset = 0;
    while offset < area.len() {
        let code = Dhcp4Tag(area[offset]);
        if code == Dhcp4Tag::EOP {
            return None;
        }
        if code == Dhcp4Tag::PAD {
            offset += 1;
            continue;
        }
        let len = usize::from(*area.get(offset + 1)?);
        let data = offset + 2..offset + 2 + len;
        if data.end > area.len() {
            return None;
        }
        if code == tag {
            return Some(data);
        }
        offset = data.end;
    }
    None
}

/// A DHCPv4 or BOOTP packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dhcp4Packet {
    bytes: Vec<u8>,
    options: [Option<Range<usize>>; DHCP4_TAGS.len()],
    file_overloaded: bool,
}

impl Dhcp4Packet {
    /// Parses `bytes`.
    ///
    /// Options are looked up in the option area first, then in the `file`
    /// and `sname` header fields when the overload option says they carry
    /// options. Without a boot file option the `file` header field stands in
    /// for it, unless that field is overloaded.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < header::MAGIC {
            return Err(Status::DEVICE_ERROR.into());
        }

        let mut packet = Self {
            bytes,
            options: Default::default(),
            file_overloaded: false,
        };
        if be_u32(&packet.bytes, header::MAGIC) == Some(DHCP4_MAGIC) {
            packet.scan(header::OPTIONS..packet.bytes.len());
        }

        let overloaded = packet.option(Dhcp4Tag::OVERLOAD).and_then(|o| o.first().copied()).unwrap_or(0);
        if overloaded & overload::FILE != 0 {
            packet.file_overloaded = true;
            packet.scan(header::FILE..header::FILE + header::FILE_LEN);
        }
        if overloaded & overload::SNAME != 0 {
            packet.scan(header::SNAME..header::SNAME + header::SNAME_LEN);
        }

        let bootfile = tag_index(Dhcp4Tag::BOOTFILE);
        if packet.options[bootfile].is_none() && !packet.file_overloaded {
            let file = until_nul(&packet.bytes[header::FILE..header::FILE + header::FILE_LEN]);
            if !file.is_empty() {
                packet.options[bootfile] = Some(header::FILE..header::FILE + file.len());
            }
        }
        Ok(packet)
    }

    fn scan(&mut self, area: Range<usize>) {
        let Some(bytes) = self.bytes.get(area.clone()) else {
            return;
        };
        for (slot, tag) in self.options.iter_mut().zip(DHCP4_TAGS) {
            if slot.is_none() {
                *slot = find_dhcp4_option(bytes, tag).map(|r| r.start + area.start..r.end + area.start);
            }
        }
    }

    /// Raw packet.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the data of `tag`, if it is one of the remembered options and
    /// was present.
    #[must_use]
    pub fn option(&self, tag: Dhcp4Tag) -> Option<&[u8]> {
        let range = DHCP4_TAGS
            .iter()
            .position(|&t| t == tag)
            .and_then(|i| self.options[i].clone())?;
        self.bytes.get(range)
    }

    /// Value of the message type option.
    #[must_use]
    pub fn msg_type(&self) -> Option<u8> {
        self.option(Dhcp4Tag::MSG_TYPE).and_then(|o| o.first().copied())
    }

    /// Server identifier option.
    #[must_use]
    pub fn server_id(&self) -> Option<Ipv4Addr> {
        self.option(Dhcp4Tag::SERVER_ID).and_then(|o| ipv4_at(o, 0))
    }

    /// Boot file name, without any trailing NULs.
    #[must_use]
    pub fn boot_file(&self) -> Option<&[u8]> {
        self.option(Dhcp4Tag::BOOTFILE).map(until_nul)
    }

    /// Boot file size option, in 512 byte blocks.
    #[must_use]
    pub fn boot_file_blocks(&self) -> Option<u16> {
        self.option(Dhcp4Tag::BOOTFILE_LEN).and_then(|o| be_u16(o, 0))
    }

    /// True if the class identifier starts with `PXEClient`.
    #[must_use]
    pub fn is_pxe_class(&self) -> bool {
        self.option(Dhcp4Tag::CLASS_ID)
            .is_some_and(|o| o.starts_with(PXE_CLASS_ID))
    }

    /// True if the `file` header field carries options.
    #[must_use]
    pub const fn file_overloaded(&self) -> bool {
        self.file_overloaded
    }

    /// Transaction id.
    #[must_use]
    pub fn xid(&self) -> u32 {
        be_u32(&self.bytes, header::XID).unwrap_or(0)
    }

    /// Address assigned to the client.
    #[must_use]
    pub fn yiaddr(&self) -> Ipv4Addr {
        ipv4_at(&self.bytes, header::YIADDR).unwrap_or(Ipv4Addr::UNSPECIFIED)
    }

    /// Next server address.
    #[must_use]
    pub fn siaddr(&self) -> Ipv4Addr {
        ipv4_at(&self.bytes, header::SIADDR).unwrap_or(Ipv4Addr::UNSPECIFIED)
    }
}

fn tag_index(tag: Dhcp4Tag) -> usize {
    DHCP4_TAGS.iter().position(|&t| t == tag).unwrap_or(0)
}

/// Assembles a client BOOTREQUEST.
#[derive(Debug)]
pub(crate) struct Dhcp4Builder {
    bytes: Vec<u8>,
}

impl Dhcp4Builder {
    pub(crate) fn request(xid: u32, mac: &[u8; 6], ciaddr: Ipv4Addr, broadcast: bool) -> Self {
        let mut bytes = alloc::vec![0; header::OPTIONS];
        bytes[header::OP] = BOOTP_OP_REQUEST;
        bytes[header::HTYPE] = HTYPE_ETHERNET;
        bytes[header::HLEN] = 6;
        bytes[header::XID..header::XID + 4].copy_from_slice(&xid.to_be_bytes());
        if broadcast {
            bytes[header::FLAGS..header::FLAGS + 2].copy_from_slice(&FLAG_BROADCAST.to_be_bytes());
        }
        bytes[header::CIADDR..header::CIADDR + 4].copy_from_slice(&ciaddr.octets());
        bytes[header::CHADDR..header::CHADDR + 6].copy_from_slice(mac);
        bytes[header::MAGIC..header::OPTIONS].copy_from_slice(&DHCP4_MAGIC.to_be_bytes());
        Self { bytes }
    }

    /// Appends one option. Data longer than 255 bytes is truncated.
    pub(crate) fn option(mut self, tag: Dhcp4Tag, data: &[u8]) -> Self {
        let data = &data[..data.len().min(usize::from(u8::MAX))];
        self.bytes.push(tag.0);
        self.bytes.push(data.len() as u8);
        self.bytes.extend_from_slice(data);
        self
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        self.bytes.push(Dhcp4Tag::EOP.0);
        if self.bytes.len() < BOOTP_MIN_SIZE {
            self.bytes.resize(BOOTP_MIN_SIZE, 0);
        }
        self.bytes
    }
}

/// Writes the `secs` header field.
pub(crate) fn set_dhcp4_seconds(packet: &mut [u8], seconds: u16) {
    if let Some(field) = packet.get_mut(header::SECS..header::SECS + 2) {
        field.copy_from_slice(&seconds.to_be_bytes());
    }
}

/// Iterator over the options of a DHCPv6 option area.
///
/// Yields the option code and the range of the whole option, header
/// included, relative to the area. Stops at the first truncated option.
#[derive(Clone, Debug)]
pub(crate) struct Dhcp6Options<'a> {
    area: &'a [u8],
    offset: usize,
}

pub(crate) fn dhcp6_options(area: &[u8]) -> Dhcp6Options<'_> {
    Dhcp6Options { area, offset: 0 }
}

impl Iterator for Dhcp6Options<'_> {
    type Item = (Dhcp6OptCode, Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.offset;
        let code = be_u16(self.area, start)?;
        let len = usize::from(be_u16(self.area, start + 2)?);
        let end = start + DHCP6_OPTION_HEADER_SIZE + len;
        if end > self.area.len() {
            self.offset = self.area.len();
            return None;
        }
        self.offset = end;
        Some((Dhcp6OptCode(code), start..end))
    }
}

/// Returns the data of the first `code` option in `area`.
pub(crate) fn find_dhcp6_option(area: &[u8], code: Dhcp6OptCode) -> Option<&[u8]> {
    dhcp6_options(area)
        .find(|(c, _)| *c == code)
        .map(|(_, r)| &area[r.start + DHCP6_OPTION_HEADER_SIZE..r.end])
}

/// DHCPv6 options remembered by [`Dhcp6Packet`].
const DHCP6_CODES: [Dhcp6OptCode; 5] = [
    Dhcp6OptCode::IA_NA,
    Dhcp6OptCode::BOOT_FILE_URL,
    Dhcp6OptCode::BOOT_FILE_PARAM,
    Dhcp6OptCode::VENDOR_CLASS,
    Dhcp6OptCode::DNS_SERVERS,
];

/// A DHCPv6 message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dhcp6Packet {
    bytes: Vec<u8>,
    options: [Option<Range<usize>>; DHCP6_CODES.len()],
}

impl Dhcp6Packet {
    /// Parses `bytes`. The first occurrence of each option wins.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < DHCP6_HEADER_SIZE {
            return Err(Status::DEVICE_ERROR.into());
        }
        let mut options: [Option<Range<usize>>; DHCP6_CODES.len()] = Default::default();
        for (code, range) in dhcp6_options(&bytes[DHCP6_HEADER_SIZE..]) {
            if let Some(i) = DHCP6_CODES.iter().position(|&c| c == code) {
                if options[i].is_none() {
                    let start = DHCP6_HEADER_SIZE + range.start + DHCP6_OPTION_HEADER_SIZE;
                    options[i] = Some(start..DHCP6_HEADER_SIZE + range.end);
                }
            }
        }
        Ok(Self { bytes, options })
    }

    /// Raw packet.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Message type.
    #[must_use]
    pub fn msg_type(&self) -> Dhcp6MsgType {
        Dhcp6MsgType(self.bytes[0])
    }

    /// 24-bit transaction id.
    #[must_use]
    pub fn xid(&self) -> u32 {
        u32::from_be_bytes([0, self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    /// Returns the data of `code`, if it is one of the remembered options
    /// and was present.
    #[must_use]
    pub fn option(&self, code: Dhcp6OptCode) -> Option<&[u8]> {
        let range = DHCP6_CODES
            .iter()
            .position(|&c| c == code)
            .and_then(|i| self.options[i].clone())?;
        self.bytes.get(range)
    }

    /// True if an IA_NA is present and carries a success status code.
    #[must_use]
    pub fn has_bound_address(&self) -> bool {
        let Some(ia_na) = self.option(Dhcp6OptCode::IA_NA) else {
            return false;
        };
        let sub_options = ia_na.get(IA_NA_OPTIONS_OFFSET..).unwrap_or(&[]);
        match find_dhcp6_option(sub_options, Dhcp6OptCode::STATUS_CODE) {
            Some(status) => be_u16(status, 0) == Some(DHCP6_STATUS_SUCCESS),
            None => false,
        }
    }

    /// True if the vendor class carries the PXE enterprise number and the
    /// `PXEClient` class identifier.
    #[must_use]
    pub fn is_pxe_class(&self) -> bool {
        self.option(Dhcp6OptCode::VENDOR_CLASS).is_some_and(|o| {
            be_u32(o, 0) == Some(PXE_ENTERPRISE_NUMBER)
                && o.get(VENDOR_CLASS_ID_OFFSET..VENDOR_CLASS_ID_OFFSET + PXE_CLASS_ID.len())
                    == Some(PXE_CLASS_ID.as_slice())
        })
    }

    /// Boot file URL option.
    #[must_use]
    pub fn boot_file_url(&self) -> Option<&[u8]> {
        self.option(Dhcp6OptCode::BOOT_FILE_URL)
    }

    /// Every address of the DNS servers option.
    #[must_use]
    pub fn dns_servers(&self) -> Vec<Ipv6Addr> {
        let data = self.option(Dhcp6OptCode::DNS_SERVERS).unwrap_or(&[]);
        (0..data.len() / 16).filter_map(|i| ipv6_at(data, i * 16)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn bootp_header() -> Vec<u8> {
        let mut p = vec![0; header::OPTIONS];
        p[header::MAGIC..header::OPTIONS].copy_from_slice(&DHCP4_MAGIC.to_be_bytes());
        p
    }

    #[test]
    fn test_find_option_skips_pad() {
        let area = [0, 0, 53, 1, 2, 54, 4, 10, 0, 0, 1, 255, 60, 1, 0];
        assert_eq!(find_dhcp4_option(&area, Dhcp4Tag::MSG_TYPE), Some(4..5));
        assert_eq!(find_dhcp4_option(&area, Dhcp4Tag::SERVER_ID), Some(7..11));
        // Nothing after END is looked at.
        assert_eq!(find_dhcp4_option(&area, Dhcp4Tag::CLASS_ID), None);
        // Truncated option.
        assert_eq!(find_dhcp4_option(&[53, 4, 1], Dhcp4Tag::MSG_TYPE), None);
    }

    #[test]
    fn test_overloaded_file_field() {
        let mut p = bootp_header();
        p[header::FILE..header::FILE + 5].copy_from_slice(&[67, 3, b'a', b'b', b'c']);
        p.extend_from_slice(&[52, 1, overload::FILE, 53, 1, 2, 255]);
        let packet = Dhcp4Packet::parse(p).unwrap();
        assert!(packet.file_overloaded());
        assert_eq!(packet.boot_file(), Some(&b"abc"[..]));
        assert_eq!(packet.msg_type(), Some(2));
    }

    #[test]
    fn test_file_field_fallback() {
        let mut p = bootp_header();
        p[header::FILE..header::FILE + 8].copy_from_slice(b"pxelinux");
        p.push(255);
        let packet = Dhcp4Packet::parse(p).unwrap();
        assert_eq!(packet.boot_file(), Some(&b"pxelinux"[..]));
        assert_eq!(packet.msg_type(), None);

        assert!(Dhcp4Packet::parse(vec![0; 100]).is_err());
    }

    #[test]
    fn test_builder() {
        let packet = Dhcp4Builder::request(0x1234_5678, &[2, 0, 0, 0, 0, 1], Ipv4Addr::new(10, 0, 0, 5), true)
            .option(Dhcp4Tag::MSG_TYPE, &[3])
            .finish();
        assert_eq!(packet.len(), BOOTP_MIN_SIZE);
        let parsed = Dhcp4Packet::parse(packet).unwrap();
        assert_eq!(parsed.xid(), 0x1234_5678);
        assert_eq!(parsed.msg_type(), Some(3));
        assert_eq!(be_u16(parsed.bytes(), header::FLAGS), Some(FLAG_BROADCAST));
        assert_eq!(ipv4_at(parsed.bytes(), header::CIADDR), Some(Ipv4Addr::new(10, 0, 0, 5)));
    }

    #[test]
    fn test_dhcp6_ia_na_status() {
        let mut p = vec![2, 0, 0, 1];
        // IA_NA with IAID/T1/T2 and a NoAddrsAvail status.
        p.extend_from_slice(&[0, 3, 0, 18]);
        p.extend_from_slice(&[0; 12]);
        p.extend_from_slice(&[0, 13, 0, 2, 0, 2]);
        let packet = Dhcp6Packet::parse(p).unwrap();
        assert_eq!(packet.msg_type(), Dhcp6MsgType::ADVERTISE);
        assert_eq!(packet.xid(), 1);
        assert!(!packet.has_bound_address());

        // Without a status code the IA_NA binds nothing.
        let mut p = vec![2, 0, 0, 1, 0, 3, 0, 12];
        p.extend_from_slice(&[0; 12]);
        assert!(!Dhcp6Packet::parse(p).unwrap().has_bound_address());

        let mut p = vec![2, 0, 0, 1, 0, 3, 0, 18];
        p.extend_from_slice(&[0; 12]);
        p.extend_from_slice(&[0, 13, 0, 2, 0, 0]);
        assert!(Dhcp6Packet::parse(p).unwrap().has_bound_address());
    }

    #[test]
    fn test_dhcp6_vendor_class_and_dns() {
        let mut p = vec![2, 0, 0, 1, 0, 16, 0, 15];
        p.extend_from_slice(&PXE_ENTERPRISE_NUMBER.to_be_bytes());
        p.extend_from_slice(&[0, 9]);
        p.extend_from_slice(b"PXEClient");
        p.extend_from_slice(&[0, 23, 0, 32]);
        p.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        p.extend_from_slice(&Ipv6Addr::UNSPECIFIED.octets());
        let packet = Dhcp6Packet::parse(p).unwrap();
        assert!(packet.is_pxe_class());
        assert_eq!(packet.dns_servers(), vec![Ipv6Addr::LOCALHOST, Ipv6Addr::UNSPECIFIED]);
    }
}
