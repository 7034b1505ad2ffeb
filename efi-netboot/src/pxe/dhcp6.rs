// SPDX-License-Identifier: MIT OR Apache-2.0

//! DHCPv6 side of the base code: S.A.R.R., offer resolution and boot file
//! URLs.

use alloc::string::String;
use alloc::vec::Vec;
use core::net::{IpAddr, Ipv6Addr};

use efi_netboot_raw::protocol::network::dhcp6::{
    DHCP6_HEADER_SIZE, DHCP6_PACKET_MAX_SIZE, Dhcp6MsgType, Dhcp6OptCode,
};
use efi_netboot_raw::protocol::network::pxe::{
    BLOCK_SIZE, DHCP6_CLIENT_PORT, DHCP6_SERVER_PORT, TftpOpcode,
};
use log::{debug, info, warn};

use super::offer::{CachedOffer, DHCP6_SELECT_RULES, OfferCache, OfferType};
use super::packet::{Dhcp6Packet, dhcp6_options};
use super::{BaseCode, BootFileInfo, Session, UDP_READ_ATTEMPTS, UDP_READ_TIMEOUT};
use crate::boot::Stall;
use crate::proto::console::Console;
use crate::proto::network::CallbackAction;
use crate::proto::network::dhcp6::{Dhcp6, Dhcp6Callback, Dhcp6Config, Dhcp6Event};
use crate::proto::network::dns6::Dns6;
use crate::util::{be_u16, until_nul};
use crate::{Result, Status};

const TFTP_SCHEME: &[u8] = b"tftp://";
const OCTET_MODE: &[u8] = b";mode=octet";
const MODE_PREFIX: &[u8] = b";mode=";

/// A classified DHCPv6 Advertise or Reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dhcp6Offer {
    packet: Dhcp6Packet,
    offer_type: OfferType,
}

impl Dhcp6Offer {
    /// Parses and classifies `bytes`.
    ///
    /// An offer without a bound address is a proxy offer. DHCPv6 has no
    /// PXE vendor options, so a PXE offer is always a BINL one.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let packet = Dhcp6Packet::parse(bytes)?;
        let proxy = !packet.has_bound_address();
        let offer_type = match (packet.is_pxe_class(), proxy) {
            (true, true) => OfferType::ProxyBinl,
            (true, false) => OfferType::DhcpBinl,
            (false, _) => OfferType::DhcpOnly,
        };
        Ok(Self { packet, offer_type })
    }

    /// The packet.
    #[must_use]
    pub const fn packet(&self) -> &Dhcp6Packet {
        &self.packet
    }

    /// Raw packet bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.packet.bytes()
    }
}

impl CachedOffer for Dhcp6Offer {
    fn offer_type(&self) -> OfferType {
        self.offer_type
    }

    fn is_proxy(&self) -> bool {
        self.offer_type.is_proxy()
    }

    fn has_boot_file(&self) -> bool {
        self.packet.boot_file_url().is_some()
    }
}

/// Host part of a boot file URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlHost<'a> {
    /// A literal address, `[addr]`.
    Address(Ipv6Addr),
    /// A host name to resolve.
    Name(&'a str),
}

/// A parsed `tftp://` boot file URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootFileUrl<'a> {
    /// Server.
    pub host: UrlHost<'a>,
    /// Percent-decoded path on the server, without the leading `/`.
    pub file: String,
}

/// Parses the boot file URL option, `tftp://[addr]/path` or
/// `tftp://host/path`, with an optional `;mode=octet` suffix.
///
/// Fails with `NOT_FOUND` for other schemes and `INVALID_PARAMETER` for a
/// malformed URL.
pub fn parse_boot_file_url(url: &[u8]) -> Result<BootFileUrl<'_>> {
    let url = until_nul(url);
    let rest = url.strip_prefix(TFTP_SCHEME).ok_or(Status::NOT_FOUND)?;

    let (host, path) = if let Some(bracketed) = rest.strip_prefix(b"[") {
        let end = bracketed.iter().position(|&b| b == b']').ok_or(Status::INVALID_PARAMETER)?;
        let address = core::str::from_utf8(&bracketed[..end])
            .ok()
            .and_then(|s| s.parse::<Ipv6Addr>().ok())
            .ok_or(Status::INVALID_PARAMETER)?;
        let path = bracketed[end + 1..].strip_prefix(b"/").ok_or(Status::INVALID_PARAMETER)?;
        (UrlHost::Address(address), path)
    } else {
        let end = rest.iter().position(|&b| b == b'/').ok_or(Status::INVALID_PARAMETER)?;
        let name = core::str::from_utf8(&rest[..end]).map_err(|_| Status::INVALID_PARAMETER)?;
        if name.is_empty() {
            return Err(Status::INVALID_PARAMETER.into());
        }
        (UrlHost::Name(name), &rest[end + 1..])
    };

    let path = match path.strip_suffix(OCTET_MODE) {
        Some(path) => path,
        None if path.windows(MODE_PREFIX.len()).any(|w| w == MODE_PREFIX) => {
            return Err(Status::INVALID_PARAMETER.into());
        }
        None => path,
    };
    Ok(BootFileUrl {
        host,
        file: percent_decode(path)?,
    })
}

fn percent_decode(path: &[u8]) -> Result<String> {
    let mut out = Vec::with_capacity(path.len());
    let mut bytes = path.iter();
    while let Some(&b) = bytes.next() {
        if b != b'%' {
            out.push(b);
            continue;
        }
        let mut hex = || bytes.next().and_then(|&d| char::from(d).to_digit(16));
        match (hex(), hex()) {
            (Some(hi), Some(lo)) => out.push((hi * 16 + lo) as u8),
            _ => return Err(Status::INVALID_PARAMETER.into()),
        }
    }
    String::from_utf8(out).map_err(|_| Status::INVALID_PARAMETER.into())
}

/// Reads the boot file size, in 512 byte blocks, from the boot file
/// parameters option: a 16-bit length followed by decimal digits.
pub fn parse_boot_file_param(data: &[u8]) -> Result<u16> {
    let len = usize::from(be_u16(data, 0).ok_or(Status::NOT_FOUND)?);
    let digits = data.get(2..2 + len).ok_or(Status::NOT_FOUND)?;
    if digits.is_empty() || digits.len() > 5 || !digits.iter().all(u8::is_ascii_digit) {
        return Err(Status::NOT_FOUND.into());
    }
    let value = digits
        .iter()
        .fold(0u32, |acc, &d| acc * 10 + u32::from(d - b'0'));
    u16::try_from(value).map_err(|_| Status::NOT_FOUND.into())
}

/// Stops `dhcp6` and drops its configuration.
pub(super) fn release(dhcp6: &mut dyn Dhcp6) {
    if let Err(err) = dhcp6.stop() {
        debug!("PXE: DHCPv6 stop: {:?}", err.status());
    }
    if let Err(err) = dhcp6.configure(None) {
        debug!("PXE: DHCPv6 unconfigure: {:?}", err.status());
    }
}

/// Callback state of one S.A.R.R.
struct Sarr<'a> {
    offers: &'a mut OfferCache<Dhcp6Offer>,
    sorted: bool,
    solicit: &'a mut Vec<u8>,
    request: &'a mut Option<Vec<u8>>,
    reply: &'a mut Option<Vec<u8>>,
}

impl Dhcp6Callback for Sarr<'_> {
    fn dhcp6_event(&mut self, event: Dhcp6Event, packet: &mut [u8]) -> Result<CallbackAction> {
        let oversized = packet.len() > DHCP6_PACKET_MAX_SIZE;
        match event {
            Dhcp6Event::SEND_SOLICIT => {
                if oversized {
                    return Err(Status::ABORTED.into());
                }
                *self.solicit = packet.to_vec();
                Ok(CallbackAction::Continue)
            }
            Dhcp6Event::RCVD_ADVERTISE => {
                if oversized {
                    warn!("PXE: ignoring oversized advertise ({} bytes)", packet.len());
                } else if !self.offers.is_full() {
                    match Dhcp6Offer::parse(packet.to_vec()) {
                        Ok(offer) => {
                            debug!("PXE: advertise {:?}", offer.offer_type());
                            self.offers.insert(offer);
                        }
                        Err(err) => warn!("PXE: discarding advertise: {:?}", err.status()),
                    }
                }
                Ok(CallbackAction::NotReady)
            }
            Dhcp6Event::SEND_REQUEST => {
                if oversized {
                    return Err(Status::ABORTED.into());
                }
                *self.request = Some(packet.to_vec());
                Ok(CallbackAction::Continue)
            }
            Dhcp6Event::SELECT_ADVERTISE => {
                let selected = self
                    .offers
                    .select(&DHCP6_SELECT_RULES, self.sorted)
                    .and_then(|s| self.offers.get(s.index));
                match selected {
                    Some(offer) => {
                        info!("PXE: selected {:?} advertise", offer.offer_type());
                        Ok(CallbackAction::Replace(offer.bytes().to_vec()))
                    }
                    None => {
                        warn!("PXE: no usable advertise among {}", self.offers.len());
                        Err(Status::ABORTED.into())
                    }
                }
            }
            Dhcp6Event::RCVD_REPLY => {
                if oversized {
                    return Err(Status::ABORTED.into());
                }
                *self.reply = Some(packet.to_vec());
                Ok(CallbackAction::Continue)
            }
            _ => Ok(CallbackAction::Continue),
        }
    }
}

impl<C: Console, S: Stall> BaseCode<C, S> {
    pub(super) fn dhcp6_sarr(&mut self) -> Result {
        let result = self.sarr_exchange();
        if result.is_err() {
            if let Some(dhcp6) = self.stack.dhcp6.as_deref_mut() {
                release(dhcp6);
            }
        } else {
            self.address_ok = true;
        }
        result
    }

    fn sarr_exchange(&mut self) -> Result {
        let dhcp6 = self.stack.dhcp6.as_deref_mut().ok_or(Status::UNSUPPORTED)?;
        let config = Dhcp6Config {
            ia_id: self.identity.ia_id,
            options: self.identity.dhcp6_options(),
            solicit_retransmission: Default::default(),
        };
        dhcp6.configure(Some(&config))?;

        self.v6 = Session::default();
        self.dhcp6_request = None;
        self.dns_servers.clear();
        let mut sarr = Sarr {
            offers: &mut self.v6.offers,
            sorted: self.sort_offers,
            solicit: &mut self.mode.packets.dhcp_discover,
            request: &mut self.dhcp6_request,
            reply: &mut self.v6.pending_ack,
        };
        if let Err(err) = dhcp6.start(&mut sarr) {
            if err.status() == Status::ICMP_ERROR {
                self.mode.icmp_error_received = true;
            }
            return Err(err);
        }

        let station = dhcp6.mode_data()?.ia_address.ok_or(Status::DEVICE_ERROR)?;
        self.mode.station_ip = IpAddr::V6(station);

        self.handle_dhcp6_offer()?;
        info!("PXE: bound to {station}");
        self.print(format_args!("\n  Station IP address is {station}\n"));
        Ok(())
    }

    /// Completes the selected advertise and caches the reply.
    fn handle_dhcp6_offer(&mut self) -> Result {
        let selection = self.v6.offers.selection().ok_or(Status::NO_RESPONSE)?;
        let offer = self.v6.offers.get(selection.index).ok_or(Status::NO_RESPONSE)?;
        let (offer_type, has_boot_file) = (offer.offer_type(), offer.has_boot_file());
        let dns_servers = offer.packet().dns_servers();
        if !dns_servers.is_empty() {
            self.dns_servers = dns_servers;
        }

        match offer_type {
            OfferType::DhcpBinl => {
                if let Err(err) = self.retry_dhcp6_binl(selection.index) {
                    warn!("PXE: BINL retry failed: {:?}", err.status());
                    return Err(Status::NO_RESPONSE.into());
                }
            }
            OfferType::DhcpOnly if self.v6.offers.proxy_received() => {
                let candidates = self.v6.offers.proxy_candidates(self.sort_offers);
                if !candidates.into_iter().any(|index| self.use_dhcp6_proxy(index)) {
                    return Err(Status::NO_RESPONSE.into());
                }
            }
            OfferType::DhcpOnly if !has_boot_file => return Err(Status::NOT_FOUND.into()),
            _ => {}
        }

        let ack = Dhcp6Offer::parse(self.v6.pending_ack.take().ok_or(Status::DEVICE_ERROR)?)?;
        self.mode.packets.dhcp_ack = ack.bytes().to_vec();
        self.mode.dhcp_ack_received = true;
        self.mode.dhcp_discover_valid = true;
        self.v6.ack = Some(ack);
        Ok(())
    }

    fn use_dhcp6_proxy(&mut self, index: usize) -> bool {
        let Some(offer) = self.v6.offers.get(index) else {
            return false;
        };
        if offer.offer_type() == OfferType::ProxyBinl {
            return match self.retry_dhcp6_binl(index) {
                Ok(()) => true,
                Err(err) => {
                    debug!("PXE: proxy BINL {index} failed: {:?}", err.status());
                    false
                }
            };
        }
        self.mode.packets.proxy_offer = offer.bytes().to_vec();
        self.mode.proxy_offer_received = true;
        self.v6.proxy_offer = Some(offer.clone());
        true
    }

    /// Asks the server named by the boot file URL of the BINL offer at
    /// `index` for its boot file.
    fn retry_dhcp6_binl(&mut self, index: usize) -> Result {
        let offer = self.v6.offers.get(index).ok_or(Status::NOT_FOUND)?;
        let url = offer.packet().boot_file_url().ok_or(Status::NOT_FOUND)?.to_vec();
        let (server, _) = self.resolve_boot_file_url(&url)?;
        self.server_ip = Some(IpAddr::V6(server));

        self.is_do_discover = false;
        let reply = Dhcp6Offer::parse(self.dhcp6_discover_request(server)?)?;
        if !matches!(reply.offer_type(), OfferType::ProxyPxe10 | OfferType::ProxyWfm11a)
            && !reply.has_boot_file()
        {
            return Err(Status::DEVICE_ERROR.into());
        }

        debug!("PXE: BINL server {server} answered");
        self.mode.packets.proxy_offer = reply.bytes().to_vec();
        self.mode.proxy_offer_received = true;
        self.v6.proxy_offer = Some(reply);
        Ok(())
    }

    /// Parses `url` and resolves its host.
    fn resolve_boot_file_url(&mut self, url: &[u8]) -> Result<(Ipv6Addr, String)> {
        let parsed = parse_boot_file_url(url)?;
        let server = match parsed.host {
            UrlHost::Address(ip) => ip,
            UrlHost::Name(name) => {
                let dns_server = *self.dns_servers.first().ok_or(Status::NOT_FOUND)?;
                let dns6: &mut dyn Dns6 = self.stack.dns6.as_deref_mut().ok_or(Status::NOT_FOUND)?;
                let ip = dns6.resolve(dns_server, name)?;
                debug!("PXE: {name} is {ip}");
                ip
            }
        };
        Ok((server, parsed.file))
    }

    /// Sends the S.A.R.R. request again, with a new transaction id and
    /// without address options, to `server` and returns the first
    /// matching reply.
    pub(super) fn dhcp6_discover_request(&mut self, server: Ipv6Addr) -> Result<Vec<u8>> {
        let template = self.dhcp6_request.as_deref().ok_or(Status::DEVICE_ERROR)?;
        let msg_type = *template.first().ok_or(Status::DEVICE_ERROR)?;
        let xid = self.xid.next_xid() & 0x00FF_FFFF;

        let mut packet = Vec::with_capacity(template.len());
        packet.push(msg_type);
        packet.extend_from_slice(&xid.to_be_bytes()[1..]);
        let options = template.get(DHCP6_HEADER_SIZE..).unwrap_or(&[]);
        for (code, range) in dhcp6_options(options) {
            if !matches!(code, Dhcp6OptCode::IA_NA | Dhcp6OptCode::IA_TA | Dhcp6OptCode::SERVER_ID) {
                packet.extend_from_slice(&options[range]);
            }
        }

        if self.is_do_discover {
            self.mode.packets.pxe_discover.clone_from(&packet);
        }
        self.stack
            .udp
            .write(IpAddr::V6(server), DHCP6_SERVER_PORT, None, DHCP6_CLIENT_PORT, &packet)?;

        let mut buffer = alloc::vec![0; DHCP6_PACKET_MAX_SIZE];
        for _ in 0..UDP_READ_ATTEMPTS {
            let datagram = self
                .stack
                .udp
                .read(Some(DHCP6_CLIENT_PORT), &mut buffer, UDP_READ_TIMEOUT)?;
            let reply = &buffer[..datagram.length.min(buffer.len())];
            if reply.len() >= DHCP6_HEADER_SIZE
                && Dhcp6MsgType(reply[0]) == Dhcp6MsgType::REPLY
                && reply[1..DHCP6_HEADER_SIZE] == packet[1..DHCP6_HEADER_SIZE]
            {
                return Ok(reply.to_vec());
            }
            debug!("PXE: dropping DHCPv6 datagram from {}", datagram.src_ip);
        }
        Err(Status::TIMEOUT.into())
    }

    /// Reads the boot server, file name and size from the cached replies.
    pub(super) fn dhcp6_boot_info(&mut self) -> Result<BootFileInfo> {
        let source = self.v6.boot_source().ok_or(Status::NOT_FOUND)?;
        let url = source.packet().boot_file_url().ok_or(Status::NOT_FOUND)?.to_vec();
        let param = source.packet().option(Dhcp6OptCode::BOOT_FILE_PARAM).map(<[u8]>::to_vec);

        let (server, name) = self.resolve_boot_file_url(&url)?;
        let server = IpAddr::V6(server);
        self.server_ip = Some(server);

        let size = match param {
            Some(param) => u64::from(parse_boot_file_param(&param)?) * BLOCK_SIZE,
            None => match self.mtftp(TftpOpcode::TFTP_GET_FILE_SIZE, None, server, &name, None) {
                Ok(size) => size,
                Err(err) => {
                    warn!("PXE: size of {name} unknown: {:?}", err.status());
                    0
                }
            },
        };
        Ok(BootFileInfo { server, name, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_url_with_address() {
        let url = parse_boot_file_url(b"tftp://[2001:db8::1]/boot/grub%20x64.efi;mode=octet\0").unwrap();
        assert_eq!(url.host, UrlHost::Address("2001:db8::1".parse().unwrap()));
        assert_eq!(url.file, "boot/grub x64.efi");
    }

    #[test]
    fn test_url_with_host_name() {
        let url = parse_boot_file_url(b"tftp://boot.example.com/pxe/shim.efi").unwrap();
        assert_eq!(url.host, UrlHost::Name("boot.example.com"));
        assert_eq!(url.file, "pxe/shim.efi");
    }

    #[test]
    fn test_url_errors() {
        let status = |url: &[u8]| parse_boot_file_url(url).unwrap_err().status();
        assert_eq!(status(b"http://[::1]/a"), Status::NOT_FOUND);
        assert_eq!(status(b"tftp://[::1/a"), Status::INVALID_PARAMETER);
        assert_eq!(status(b"tftp://[::1]a"), Status::INVALID_PARAMETER);
        assert_eq!(status(b"tftp://[zz]/a"), Status::INVALID_PARAMETER);
        assert_eq!(status(b"tftp://host"), Status::INVALID_PARAMETER);
        assert_eq!(status(b"tftp://host/a;mode=netascii"), Status::INVALID_PARAMETER);
        assert_eq!(status(b"tftp://host/a%2"), Status::INVALID_PARAMETER);
        assert_eq!(status(b"tftp://host/a%zz"), Status::INVALID_PARAMETER);
    }

    #[test]
    fn test_boot_file_param() {
        assert_eq!(parse_boot_file_param(&[0, 4, b'2', b'0', b'4', b'8']), Ok(2048));
        assert_eq!(parse_boot_file_param(&[0, 5, b'6', b'5', b'5', b'3', b'5']), Ok(65535));
        let status = |data: &[u8]| parse_boot_file_param(data).unwrap_err().status();
        assert_eq!(status(&[0, 5, b'6', b'5', b'5', b'3', b'6']), Status::NOT_FOUND);
        assert_eq!(status(&[0, 2, b'1', b'x']), Status::NOT_FOUND);
        assert_eq!(status(&[0, 0]), Status::NOT_FOUND);
        assert_eq!(status(&[0, 3, b'1']), Status::NOT_FOUND);
    }

    fn advertise(ia_na: bool, pxe: bool) -> Vec<u8> {
        let mut p = vec![Dhcp6MsgType::ADVERTISE.0, 0, 0, 7];
        if ia_na {
            p.extend_from_slice(&[0, 3, 0, 18]);
            p.extend_from_slice(&[0; 12]);
            p.extend_from_slice(&[0, 13, 0, 2, 0, 0]);
        }
        if pxe {
            p.extend_from_slice(&[0, 16, 0, 15, 0, 0, 1, 0x57, 0, 9]);
            p.extend_from_slice(b"PXEClient");
        }
        p
    }

    #[test]
    fn test_classification() {
        let kind = |ia_na, pxe| Dhcp6Offer::parse(advertise(ia_na, pxe)).unwrap().offer_type();
        assert_eq!(kind(true, false), OfferType::DhcpOnly);
        assert_eq!(kind(true, true), OfferType::DhcpBinl);
        assert_eq!(kind(false, true), OfferType::ProxyBinl);
        assert_eq!(kind(false, false), OfferType::DhcpOnly);
        assert!(Dhcp6Offer::parse(vec![2, 0]).is_err());

        // An IA_NA without a status code still makes a proxy offer.
        let mut empty_ia_na = vec![Dhcp6MsgType::ADVERTISE.0, 0, 0, 7, 0, 3, 0, 12];
        empty_ia_na.extend_from_slice(&[0; 12]);
        empty_ia_na.extend_from_slice(&advertise(false, true)[4..]);
        let offer = Dhcp6Offer::parse(empty_ia_na).unwrap();
        assert_eq!(offer.offer_type(), OfferType::ProxyBinl);
    }

    #[test]
    fn test_callback() {
        let (mut offers, mut solicit, mut request, mut reply) = (OfferCache::new(), Vec::new(), None, None);
        let mut sarr = Sarr {
            offers: &mut offers,
            sorted: true,
            solicit: &mut solicit,
            request: &mut request,
            reply: &mut reply,
        };

        let mut packet = vec![1, 0, 0, 7];
        assert_eq!(
            sarr.dhcp6_event(Dhcp6Event::SEND_SOLICIT, &mut packet),
            Ok(CallbackAction::Continue)
        );
        assert_eq!(
            sarr.dhcp6_event(Dhcp6Event::SELECT_ADVERTISE, &mut []).unwrap_err().status(),
            Status::ABORTED
        );

        let mut plain = advertise(true, false);
        let mut binl = advertise(true, true);
        for packet in [&mut plain, &mut binl] {
            assert_eq!(
                sarr.dhcp6_event(Dhcp6Event::RCVD_ADVERTISE, packet),
                Ok(CallbackAction::NotReady)
            );
        }
        assert_eq!(
            sarr.dhcp6_event(Dhcp6Event::SELECT_ADVERTISE, &mut []),
            Ok(CallbackAction::Replace(binl.clone()))
        );

        let mut oversized = vec![0; DHCP6_PACKET_MAX_SIZE + 1];
        assert!(sarr.dhcp6_event(Dhcp6Event::RCVD_REPLY, &mut oversized).is_err());
        let mut packet = vec![7, 0, 0, 7];
        sarr.dhcp6_event(Dhcp6Event::RCVD_REPLY, &mut packet).unwrap();

        assert_eq!(solicit, [1, 0, 0, 7]);
        assert_eq!(reply, Some(vec![7, 0, 0, 7]));
        assert_eq!(request, None);
    }
}
