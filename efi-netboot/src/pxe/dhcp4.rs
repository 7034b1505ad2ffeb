// SPDX-License-Identifier: MIT OR Apache-2.0

//! DHCPv4 side of the base code: D.O.R.A., offer resolution and boot
//! server discover requests.

use alloc::string::String;
use alloc::vec::Vec;
use core::net::{IpAddr, Ipv4Addr};

use efi_netboot_raw::protocol::network::dhcp4::{
    DHCP4_PACKET_MAX_SIZE, Dhcp4MsgType, Dhcp4Tag, PxeVendorTag, header,
};
use efi_netboot_raw::protocol::network::pxe::{
    BLOCK_SIZE, BOOT_SERVER_PORT, BootType, DHCP4_CLIENT_PORT, DHCP4_SERVER_PORT, DiscoverControl,
    TftpOpcode,
};
use log::{debug, info, warn};

use super::offer::{CachedOffer, DHCP4_SELECT_RULES, OfferCache, OfferType};
use super::packet::{Dhcp4Builder, Dhcp4Packet, find_dhcp4_option, set_dhcp4_seconds};
use super::vendor::VendorOptions;
use super::{
    BOOT_REQUEST_RETRIES, BOOT_REQUEST_TIMEOUT, BaseCode, BootFileInfo, RouteEntry, Server, Session,
};
use crate::boot::Stall;
use crate::proto::console::Console;
use crate::proto::network::CallbackAction;
use crate::proto::network::dhcp4::{
    Dhcp4, Dhcp4Callback, Dhcp4Config, Dhcp4Event, ListenPoint, TransmitReceiveToken,
};
use crate::util::ipv4_at;
use crate::{Result, Status};

/// A classified DHCPv4 or BOOTP reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dhcp4Offer {
    packet: Dhcp4Packet,
    vendor: VendorOptions,
    offer_type: OfferType,
}

impl Dhcp4Offer {
    /// Parses and classifies `bytes`.
    ///
    /// Fails with `DEVICE_ERROR` for a truncated packet, a BOOTP reply
    /// without boot file, and offers relying on multicast TFTP.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let packet = Dhcp4Packet::parse(bytes)?;
        let vendor = match packet.option(Dhcp4Tag::VENDOR) {
            Some(data) if packet.is_pxe_class() => VendorOptions::parse(data),
            _ => VendorOptions::default(),
        };
        let proxy = packet.yiaddr().is_unspecified();

        let offer_type = match packet.msg_type() {
            None | Some(0) => {
                if packet.boot_file().is_none() {
                    return Err(Status::DEVICE_ERROR.into());
                }
                OfferType::Bootp
            }
            Some(_) if vendor.is_discover_valid() => {
                if proxy {
                    OfferType::ProxyPxe10
                } else {
                    OfferType::DhcpPxe10
                }
            }
            Some(_) if vendor.is_mtftp_valid() => return Err(Status::DEVICE_ERROR.into()),
            Some(_) if packet.is_pxe_class() => {
                if proxy {
                    OfferType::ProxyBinl
                } else {
                    OfferType::DhcpBinl
                }
            }
            Some(_) => OfferType::DhcpOnly,
        };

        Ok(Self {
            packet,
            vendor,
            offer_type,
        })
    }

    /// The packet.
    #[must_use]
    pub const fn packet(&self) -> &Dhcp4Packet {
        &self.packet
    }

    /// Raw packet bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.packet.bytes()
    }

    /// PXE vendor options; empty unless the class identifier is
    /// `PXEClient`.
    #[must_use]
    pub const fn vendor(&self) -> &VendorOptions {
        &self.vendor
    }
}

impl CachedOffer for Dhcp4Offer {
    fn offer_type(&self) -> OfferType {
        self.offer_type
    }

    fn is_proxy(&self) -> bool {
        self.packet.yiaddr().is_unspecified()
    }

    fn has_boot_file(&self) -> bool {
        self.packet.boot_file().is_some()
    }
}

/// Stops `dhcp4` and drops its configuration.
pub(super) fn release(dhcp4: &mut dyn Dhcp4) {
    if let Err(err) = dhcp4.stop() {
        debug!("PXE: DHCPv4 stop: {:?}", err.status());
    }
    if let Err(err) = dhcp4.configure(None) {
        debug!("PXE: DHCPv4 unconfigure: {:?}", err.status());
    }
}

/// Callback state of one D.O.R.A.
struct Dora<'a> {
    offers: &'a mut OfferCache<Dhcp4Offer>,
    sorted: bool,
    discover: &'a mut Vec<u8>,
    ack: &'a mut Option<Vec<u8>>,
    /// Client hardware address replacement when the GUID is sent instead.
    guid: Option<[u8; 16]>,
}

impl Dora<'_> {
    fn offer_received(&mut self, packet: &[u8]) {
        if packet.len() > DHCP4_PACKET_MAX_SIZE {
            warn!("PXE: ignoring oversized offer ({} bytes)", packet.len());
            return;
        }
        if self.offers.is_full() {
            return;
        }
        match Dhcp4Offer::parse(packet.to_vec()) {
            Ok(offer) => {
                debug!(
                    "PXE: offer {:?} from {}",
                    offer.offer_type(),
                    offer.packet().server_id().unwrap_or(Ipv4Addr::UNSPECIFIED)
                );
                self.offers.insert(offer);
            }
            Err(err) => warn!("PXE: discarding offer: {:?}", err.status()),
        }
    }
}

impl Dhcp4Callback for Dora<'_> {
    fn dhcp4_event(&mut self, event: Dhcp4Event, packet: &mut [u8]) -> Result<CallbackAction> {
        if !matches!(
            event,
            Dhcp4Event::SEND_DISCOVER
                | Dhcp4Event::SEND_REQUEST
                | Dhcp4Event::RCVD_OFFER
                | Dhcp4Event::SELECT_OFFER
                | Dhcp4Event::RCVD_ACK
        ) {
            return Ok(CallbackAction::Continue);
        }

        if let Some(options) = packet.get_mut(header::OPTIONS..) {
            if let Some(range) = find_dhcp4_option(options, Dhcp4Tag::MAXMSG) {
                if range.len() == 2 {
                    options[range].copy_from_slice(&(DHCP4_PACKET_MAX_SIZE as u16).to_be_bytes());
                }
            }
        }

        match event {
            Dhcp4Event::SEND_DISCOVER | Dhcp4Event::SEND_REQUEST => {
                if packet.len() > DHCP4_PACKET_MAX_SIZE {
                    return Err(Status::ABORTED.into());
                }
                if event == Dhcp4Event::SEND_DISCOVER {
                    *self.discover = packet.to_vec();
                }
                if let Some(guid) = self.guid {
                    if let Some(chaddr) = packet.get_mut(header::CHADDR..header::CHADDR + header::CHADDR_LEN) {
                        chaddr.copy_from_slice(&guid);
                        packet[header::HLEN] = header::CHADDR_LEN as u8;
                    }
                }
                Ok(CallbackAction::Continue)
            }
            Dhcp4Event::RCVD_OFFER => {
                self.offer_received(packet);
                Ok(CallbackAction::NotReady)
            }
            Dhcp4Event::SELECT_OFFER => {
                let selected = self
                    .offers
                    .select(&DHCP4_SELECT_RULES, self.sorted)
                    .and_then(|s| self.offers.get(s.index));
                match selected {
                    Some(offer) => {
                        info!("PXE: selected {:?} offer", offer.offer_type());
                        Ok(CallbackAction::Replace(offer.bytes().to_vec()))
                    }
                    None => {
                        warn!("PXE: no usable offer among {}", self.offers.len());
                        Err(Status::ABORTED.into())
                    }
                }
            }
            _ => {
                if packet.len() > DHCP4_PACKET_MAX_SIZE {
                    return Err(Status::ABORTED.into());
                }
                *self.ack = Some(packet.to_vec());
                Ok(CallbackAction::Continue)
            }
        }
    }
}

impl<C: Console, S: Stall> BaseCode<C, S> {
    pub(super) fn dhcp4_dora(&mut self) -> Result {
        let result = self.dora_exchange();
        if result.is_err() {
            if let Some(dhcp4) = self.stack.dhcp4.as_deref_mut() {
                release(dhcp4);
            }
        } else {
            self.address_ok = true;
        }
        result
    }

    fn dora_exchange(&mut self) -> Result {
        let dhcp4 = self.stack.dhcp4.as_deref_mut().ok_or(Status::UNSUPPORTED)?;
        let config = Dhcp4Config {
            options: self.identity.dhcp4_options(),
            ..Dhcp4Config::default()
        };
        dhcp4.configure(Some(&config))?;

        self.v4 = Session::default();
        let guid = self
            .mode
            .send_guid
            .then(|| self.identity.system_guid.map(|g| g.to_bytes()).unwrap_or([0; 16]));
        let mut dora = Dora {
            offers: &mut self.v4.offers,
            sorted: self.sort_offers,
            discover: &mut self.mode.packets.dhcp_discover,
            ack: &mut self.v4.pending_ack,
            guid,
        };
        if let Err(err) = dhcp4.start(&mut dora) {
            if err.status() == Status::ICMP_ERROR {
                self.mode.icmp_error_received = true;
            }
            if err.status() == Status::TIMEOUT && !self.v4.offers.is_empty() {
                return Err(Status::NO_RESPONSE.into());
            }
            return Err(err);
        }

        let lease = dhcp4.mode_data()?;
        self.mode.station_ip = IpAddr::V4(lease.client_address);
        self.mode.subnet_mask = lease.subnet_mask;
        self.router = lease.router_address;
        self.mode.route_table.clear();
        if !lease.router_address.is_unspecified() {
            self.mode.route_table.push(RouteEntry {
                ip: Ipv4Addr::UNSPECIFIED,
                subnet_mask: Ipv4Addr::UNSPECIFIED,
                gateway: lease.router_address,
            });
        }

        self.handle_dhcp4_offer()?;
        info!("PXE: bound to {}", lease.client_address);
        self.print(format_args!("\n  Station IP address is {}\n", lease.client_address));
        Ok(())
    }

    /// Completes the selected offer and caches the acknowledgement.
    fn handle_dhcp4_offer(&mut self) -> Result {
        let selection = self.v4.offers.selection().ok_or(Status::NO_RESPONSE)?;
        let (offer_type, has_boot_file) = self
            .v4
            .offers
            .get(selection.index)
            .map(|o| (o.offer_type(), o.has_boot_file()))
            .ok_or(Status::NO_RESPONSE)?;

        match offer_type {
            OfferType::DhcpBinl => {
                if let Err(err) = self.retry_dhcp4_binl(selection.index) {
                    warn!("PXE: BINL retry failed: {:?}", err.status());
                    return Err(Status::NO_RESPONSE.into());
                }
            }
            OfferType::DhcpOnly if self.v4.offers.proxy_received() => {
                let candidates = self.v4.offers.proxy_candidates(self.sort_offers);
                if !candidates.into_iter().any(|index| self.use_dhcp4_proxy(index)) {
                    return Err(Status::NO_RESPONSE.into());
                }
            }
            OfferType::DhcpOnly if !has_boot_file => return Err(Status::NOT_FOUND.into()),
            _ => {}
        }

        let ack = if offer_type == OfferType::Bootp {
            self.v4.offers.get(selection.index).map(|o| o.bytes().to_vec())
        } else {
            self.v4.pending_ack.take()
        };
        let ack = Dhcp4Offer::parse(ack.ok_or(Status::DEVICE_ERROR)?)?;
        self.mode.packets.dhcp_ack = ack.bytes().to_vec();
        self.mode.dhcp_ack_received = true;
        self.mode.dhcp_discover_valid = true;
        self.v4.ack = Some(ack);
        Ok(())
    }

    /// Completes the selection with the proxy offer at `index`.
    fn use_dhcp4_proxy(&mut self, index: usize) -> bool {
        let Some(offer) = self.v4.offers.get(index) else {
            return false;
        };
        if offer.offer_type() == OfferType::ProxyBinl {
            return match self.retry_dhcp4_binl(index) {
                Ok(()) => true,
                Err(err) => {
                    debug!("PXE: proxy BINL {index} failed: {:?}", err.status());
                    false
                }
            };
        }
        self.mode.packets.proxy_offer = offer.bytes().to_vec();
        self.mode.proxy_offer_received = true;
        self.v4.proxy_offer = Some(offer.clone());
        true
    }

    /// Asks the server of the BINL offer at `index` for its boot file.
    fn retry_dhcp4_binl(&mut self, index: usize) -> Result {
        let offer = self.v4.offers.get(index).ok_or(Status::NOT_FOUND)?;
        let siaddr = offer.packet().siaddr();
        let server = if siaddr.is_unspecified() {
            offer.packet().server_id().ok_or(Status::DEVICE_ERROR)?
        } else {
            siaddr
        };

        self.is_do_discover = false;
        let reply = self.dhcp4_discover_request(BootType::BOOTSTRAP, 0, Some(server), &[])?;
        let reply = Dhcp4Offer::parse(reply)?;
        if !matches!(reply.offer_type(), OfferType::ProxyPxe10 | OfferType::ProxyWfm11a)
            && !reply.has_boot_file()
        {
            return Err(Status::DEVICE_ERROR.into());
        }

        debug!("PXE: BINL server {server} answered");
        self.mode.packets.proxy_offer = reply.bytes().to_vec();
        self.mode.proxy_offer_received = true;
        self.v4.proxy_offer = Some(reply);
        Ok(())
    }

    /// Sends a DHCPREQUEST to a boot server and returns the first matching
    /// reply.
    ///
    /// `dest` of `None` broadcasts to the DHCP server port. Replies are
    /// matched against `servers` unless it is empty.
    pub(super) fn dhcp4_discover_request(
        &mut self,
        boot_type: BootType,
        layer: u16,
        dest: Option<Ipv4Addr>,
        servers: &[Server],
    ) -> Result<Vec<u8>> {
        let station = match self.mode.station_ip {
            IpAddr::V4(ip) => ip,
            IpAddr::V6(_) => return Err(Status::INVALID_PARAMETER.into()),
        };
        let xid = self.xid.next_xid();

        let mut builder =
            Dhcp4Builder::request(xid, &self.identity.mac_address, station, dest.is_none())
                .option(Dhcp4Tag::MSG_TYPE, &[Dhcp4MsgType::REQUEST.0]);
        for option in self.identity.dhcp4_options() {
            builder = builder.option(option.tag, &option.data);
        }
        if self.is_do_discover {
            let mut vendor = Vec::with_capacity(7);
            vendor.extend_from_slice(&[PxeVendorTag::BOOT_ITEM.0, 4]);
            vendor.extend_from_slice(&boot_type.0.to_be_bytes());
            vendor.extend_from_slice(&layer.to_be_bytes());
            vendor.push(PxeVendorTag::END.0);
            builder = builder.option(Dhcp4Tag::VENDOR, &vendor);
        }
        let mut packet = builder.finish();

        let (remote_address, remote_port, listen_port) = match dest {
            Some(ip) => (ip, BOOT_SERVER_PORT, BOOT_SERVER_PORT),
            None => (Ipv4Addr::BROADCAST, DHCP4_SERVER_PORT, DHCP4_CLIENT_PORT),
        };
        let listen_points = alloc::vec![ListenPoint {
            address: station,
            subnet_mask: self.mode.subnet_mask,
            port: listen_port,
        }];

        let dhcp4 = self.stack.dhcp4.as_deref_mut().ok_or(Status::UNSUPPORTED)?;
        let mut replies = None;
        for attempt in 1..=BOOT_REQUEST_RETRIES {
            set_dhcp4_seconds(&mut packet, (BOOT_REQUEST_TIMEOUT * (attempt - 1)) as u16);
            let token = TransmitReceiveToken {
                packet: packet.clone(),
                remote_address,
                remote_port,
                gateway_address: self.router,
                listen_points: listen_points.clone(),
                timeout: BOOT_REQUEST_TIMEOUT * attempt,
            };
            match dhcp4.transmit_receive(&token) {
                Err(err) if err.status() == Status::TIMEOUT => {
                    debug!("PXE: no answer from {remote_address} (attempt {attempt})");
                }
                result => {
                    replies = Some(result?);
                    break;
                }
            }
        }
        let replies = replies.ok_or(Status::TIMEOUT)?;

        let reply = replies
            .into_iter()
            .filter(|r| r.len() <= DHCP4_PACKET_MAX_SIZE)
            .find(|r| {
                let siaddr = IpAddr::V4(ipv4_at(r, header::SIADDR).unwrap_or(Ipv4Addr::UNSPECIFIED));
                servers.is_empty()
                    || servers.iter().any(|s| {
                        s.accept_any_response || (s.boot_type == boot_type && s.ip == siaddr)
                    })
            })
            .ok_or(Status::NOT_FOUND)?;

        if self.is_do_discover {
            self.mode.packets.pxe_discover = packet;
        }
        Ok(reply)
    }

    /// Reads the boot server, file name and size from the cached replies.
    pub(super) fn dhcp4_boot_info(&mut self) -> Result<BootFileInfo> {
        let source = self.v4.boot_source().ok_or(Status::NOT_FOUND)?;
        let name = source.packet().boot_file().ok_or(Status::NOT_FOUND)?;
        let name: String = core::str::from_utf8(name).map_err(|_| Status::NOT_FOUND)?.into();

        let vendor = source.vendor();
        let listed = vendor
            .discover_control
            .contains(DiscoverControl::USE_BOOT_FILE_NAME)
            .then(|| vendor.boot_servers.first())
            .flatten()
            .filter(|entry| entry.boot_type == BootType::BOOTSTRAP)
            .and_then(|entry| entry.addresses.first().copied());
        let siaddr = Some(source.packet().siaddr()).filter(|ip| !ip.is_unspecified());
        let server = listed
            .or(siaddr)
            .or_else(|| source.packet().server_id())
            .ok_or(Status::NOT_FOUND)?;
        let blocks = source.packet().boot_file_blocks();

        let server = IpAddr::V4(server);
        let size = match blocks {
            Some(blocks) => u64::from(blocks) * BLOCK_SIZE,
            None => self.mtftp(TftpOpcode::TFTP_GET_FILE_SIZE, None, server, &name, None)?,
        };
        Ok(BootFileInfo { server, name, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use efi_netboot_raw::protocol::network::dhcp4::DHCP4_MAGIC;

    fn reply(yiaddr: [u8; 4], options: &[&[u8]]) -> Vec<u8> {
        let mut p = vec![0; header::OPTIONS];
        p[header::OP] = 2;
        p[header::YIADDR..header::YIADDR + 4].copy_from_slice(&yiaddr);
        p[header::MAGIC..header::OPTIONS].copy_from_slice(&DHCP4_MAGIC.to_be_bytes());
        for option in options {
            p.extend_from_slice(option);
        }
        p.push(255);
        p
    }

    const OFFER: &[u8] = &[53, 1, 2];
    const PXE_CLASS: &[u8] = &[60, 9, b'P', b'X', b'E', b'C', b'l', b'i', b'e', b'n', b't'];
    const DISCOVER_VENDOR: &[u8] = &[43, 4, 6, 1, 0x03, 255];
    const MTFTP_VENDOR: &[u8] = &[
        43, 20, 1, 4, 224, 0, 0, 1, 2, 2, 0, 69, 3, 2, 0, 70, 4, 1, 1, 5, 1, 1,
    ];
    const YIADDR: [u8; 4] = [10, 0, 0, 5];

    fn classify(yiaddr: [u8; 4], options: &[&[u8]]) -> Result<OfferType> {
        Dhcp4Offer::parse(reply(yiaddr, options)).map(|o| o.offer_type())
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify(YIADDR, &[OFFER]), Ok(OfferType::DhcpOnly));
        assert_eq!(classify(YIADDR, &[OFFER, PXE_CLASS]), Ok(OfferType::DhcpBinl));
        assert_eq!(classify([0; 4], &[OFFER, PXE_CLASS]), Ok(OfferType::ProxyBinl));
        assert_eq!(
            classify(YIADDR, &[OFFER, PXE_CLASS, DISCOVER_VENDOR]),
            Ok(OfferType::DhcpPxe10)
        );
        assert_eq!(
            classify([0; 4], &[OFFER, PXE_CLASS, DISCOVER_VENDOR]),
            Ok(OfferType::ProxyPxe10)
        );
        // Vendor options only count for a PXEClient class.
        assert_eq!(classify(YIADDR, &[OFFER, DISCOVER_VENDOR]), Ok(OfferType::DhcpOnly));
    }

    #[test]
    fn test_rejected_offers() {
        let err = classify(YIADDR, &[OFFER, PXE_CLASS, MTFTP_VENDOR]).unwrap_err();
        assert_eq!(err.status(), Status::DEVICE_ERROR);

        let err = classify(YIADDR, &[]).unwrap_err();
        assert_eq!(err.status(), Status::DEVICE_ERROR);
    }

    #[test]
    fn test_bootp() {
        let mut p = reply(YIADDR, &[]);
        p[header::FILE..header::FILE + 4].copy_from_slice(b"boot");
        let offer = Dhcp4Offer::parse(p).unwrap();
        assert_eq!(offer.offer_type(), OfferType::Bootp);
        assert!(!offer.is_proxy());
        assert!(offer.has_boot_file());
    }

    fn dora<'a>(
        offers: &'a mut OfferCache<Dhcp4Offer>,
        discover: &'a mut Vec<u8>,
        ack: &'a mut Option<Vec<u8>>,
        guid: Option<[u8; 16]>,
    ) -> Dora<'a> {
        Dora {
            offers,
            sorted: true,
            discover,
            ack,
            guid,
        }
    }

    #[test]
    fn test_callback_rewrites_max_size_and_chaddr() {
        let (mut offers, mut discover, mut ack) = (OfferCache::new(), Vec::new(), None);
        let mut callback = dora(&mut offers, &mut discover, &mut ack, Some([0xAB; 16]));

        let mut packet = reply([0; 4], &[&[57, 2, 0x02, 0x40]]);
        let action = callback.dhcp4_event(Dhcp4Event::SEND_DISCOVER, &mut packet).unwrap();
        assert_eq!(action, CallbackAction::Continue);
        assert_eq!(packet[header::OPTIONS..header::OPTIONS + 4], [57, 2, 0x05, 0xC0]);
        assert_eq!(packet[header::HLEN], 16);
        assert_eq!(packet[header::CHADDR..header::CHADDR + 16], [0xAB; 16]);
        // The discover is cached before the hardware address is replaced.
        assert_eq!(discover[header::CHADDR], 0);
    }

    #[test]
    fn test_callback_collects_and_selects() {
        let (mut offers, mut discover, mut ack) = (OfferCache::new(), Vec::new(), None);
        let mut callback = dora(&mut offers, &mut discover, &mut ack, None);

        let mut oversized = vec![0; DHCP4_PACKET_MAX_SIZE + 1];
        assert_eq!(
            callback.dhcp4_event(Dhcp4Event::SEND_DISCOVER, &mut oversized).unwrap_err().status(),
            Status::ABORTED
        );
        assert_eq!(
            callback.dhcp4_event(Dhcp4Event::SELECT_OFFER, &mut []).unwrap_err().status(),
            Status::ABORTED
        );

        let mut bare = reply(YIADDR, &[OFFER]);
        let mut pxe = reply(YIADDR, &[OFFER, PXE_CLASS, DISCOVER_VENDOR]);
        for packet in [&mut bare, &mut pxe] {
            let action = callback.dhcp4_event(Dhcp4Event::RCVD_OFFER, packet).unwrap();
            assert_eq!(action, CallbackAction::NotReady);
        }
        let action = callback.dhcp4_event(Dhcp4Event::SELECT_OFFER, &mut []).unwrap();
        assert_eq!(action, CallbackAction::Replace(pxe.clone()));

        let mut packet = pxe.clone();
        callback.dhcp4_event(Dhcp4Event::RCVD_ACK, &mut packet).unwrap();
        assert_eq!(ack, Some(pxe));
        assert_eq!(offers.len(), 2);
    }
}
