// SPDX-License-Identifier: MIT OR Apache-2.0

//! PXE base code client.
//!
//! [`BaseCode`] is the PXE base code protocol. It owns the network stack it
//! runs on ([`NetworkStack`]), a console for the boot prompt and menu, and
//! the [`Mode`] shared with boot loaders.
//!
//! A network boot goes through [`BaseCode::load_file`]:
//!
//! 1. D.O.R.A. (IPv4) or S.A.R.R. (IPv6). Every offer is classified and
//!    cached, then one is selected by [`offer::DHCP4_SELECT_RULES`] or in
//!    arrival order.
//! 2. The selected offer is completed: BINL offers are asked again for a
//!    boot file, plain DHCP offers are paired with a proxy offer.
//! 3. For PXE 1.0 offers, the boot prompt and boot menu pick a boot server
//!    type which is then discovered by multicast, broadcast or unicast.
//! 4. The boot file name, server and size are taken from the most recent
//!    of the PXE reply, the proxy offer and the DHCP acknowledgement.
//! 5. The file is downloaded over TFTP.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use efi_netboot_raw::protocol::network::dhcp4::PxeVendorTag;
use efi_netboot_raw::protocol::network::pxe::{
    BOOT_LAYER_INITIAL, BOOT_LAYER_MASK, BootType, DEFAULT_TOS, DEFAULT_TTL, DiscoverControl,
    IpFilterFlags, MAX_ARP_ENTRIES, MAX_IPCNT, TftpOpcode, UdpOpFlags,
};
use log::{debug, info};

use crate::boot::Stall;
use crate::proto::console::Console;
use crate::proto::network::MacAddress;
use crate::proto::network::arp::Arp;
use crate::proto::network::dhcp4::Dhcp4;
use crate::proto::network::dhcp6::Dhcp6;
use crate::proto::network::dns6::Dns6;
use crate::proto::network::mtftp::Mtftp;
use crate::proto::network::udp::{Udp, UdpDatagram};
use crate::util::{XidGenerator, is_unicast, is_valid_netmask};
use crate::{Error, Result, Status};

mod boot;
mod dhcp4;
mod dhcp6;
pub mod identity;
pub mod offer;
pub mod packet;
pub mod vendor;

pub use boot::{PromptOutcome, pxe_error_message};
pub use dhcp4::Dhcp4Offer;
pub use dhcp6::{BootFileUrl, Dhcp6Offer, UrlHost, parse_boot_file_param, parse_boot_file_url};
pub use identity::ClientIdentity;

use offer::OfferCache;

/// Seconds a boot server has to answer the first discover request. Each
/// retry waits one more of these.
const BOOT_REQUEST_TIMEOUT: u32 = 1;
/// Discover requests sent to one boot server.
const BOOT_REQUEST_RETRIES: u32 = 4;
/// Timeout of one UDP read, in microseconds.
const UDP_READ_TIMEOUT: u64 = 3_000_000;
/// Datagrams a single read looks at before giving up.
const UDP_READ_ATTEMPTS: usize = 64;
/// Smallest TFTP block size a caller may ask for.
const MIN_BLOCK_SIZE: usize = 512;

/// Packets cached in [`Mode`], as received or sent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModePackets {
    /// Last DHCPDISCOVER or Solicit sent.
    pub dhcp_discover: Vec<u8>,
    /// DHCP acknowledgement, or the BOOTP reply standing in for it.
    pub dhcp_ack: Vec<u8>,
    /// Proxy offer used to complete the DHCP acknowledgement.
    pub proxy_offer: Vec<u8>,
    /// Last boot server discover request.
    pub pxe_discover: Vec<u8>,
    /// Boot server reply.
    pub pxe_reply: Vec<u8>,
    /// Boot integrity services reply. Never filled, kept for
    /// [`BaseCode::set_packets`].
    pub pxe_bis_reply: Vec<u8>,
}

/// Receive filter applied by [`BaseCode::udp_read`] with
/// [`UdpOpFlags::USE_FILTER`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IpFilter {
    /// Filter bits.
    pub filters: IpFilterFlags,
    /// Extra destination addresses accepted with
    /// [`IpFilterFlags::STATION_IP`].
    pub addresses: Vec<IpAddr>,
}

/// One ARP cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpEntry {
    /// Resolved address.
    pub ip: Ipv4Addr,
    /// Hardware address of `ip`.
    pub mac: MacAddress,
}

/// One route table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteEntry {
    /// Destination network.
    pub ip: Ipv4Addr,
    /// Destination netmask.
    pub subnet_mask: Ipv4Addr,
    /// Next hop.
    pub gateway: Ipv4Addr,
}

/// State of the base code visible to its users.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Mode {
    pub started: bool,
    pub ipv6_available: bool,
    pub ipv6_supported: bool,
    pub using_ipv6: bool,
    pub bis_supported: bool,
    pub bis_detected: bool,
    pub auto_arp: bool,
    pub send_guid: bool,
    pub dhcp_discover_valid: bool,
    pub dhcp_ack_received: bool,
    pub proxy_offer_received: bool,
    pub pxe_discover_valid: bool,
    pub pxe_reply_received: bool,
    pub pxe_bis_reply_received: bool,
    pub icmp_error_received: bool,
    pub tftp_error_received: bool,
    pub make_callbacks: bool,
    pub ttl: u8,
    pub tos: u8,
    pub station_ip: IpAddr,
    pub subnet_mask: Ipv4Addr,
    pub packets: ModePackets,
    pub ip_filter: IpFilter,
    pub arp_cache: Vec<ArpEntry>,
    pub route_table: Vec<RouteEntry>,
}

impl Mode {
    fn new(ipv6_supported: bool) -> Self {
        Self {
            started: false,
            ipv6_available: ipv6_supported,
            ipv6_supported,
            using_ipv6: false,
            bis_supported: false,
            bis_detected: false,
            auto_arp: false,
            send_guid: false,
            dhcp_discover_valid: false,
            dhcp_ack_received: false,
            proxy_offer_received: false,
            pxe_discover_valid: false,
            pxe_reply_received: false,
            pxe_bis_reply_received: false,
            icmp_error_received: false,
            tftp_error_received: false,
            make_callbacks: false,
            ttl: DEFAULT_TTL,
            tos: DEFAULT_TOS,
            station_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            subnet_mask: Ipv4Addr::UNSPECIFIED,
            packets: ModePackets::default(),
            ip_filter: IpFilter::default(),
            arp_cache: Vec::new(),
            route_table: Vec::new(),
        }
    }
}

/// New values for [`BaseCode::set_parameters`]. `None` keeps the current
/// value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct SetParameters {
    pub auto_arp: Option<bool>,
    pub send_guid: Option<bool>,
    pub ttl: Option<u8>,
    pub tos: Option<u8>,
    pub make_callbacks: Option<bool>,
}

/// New values for [`BaseCode::set_packets`]. `None` keeps the current
/// value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct PacketsUpdate {
    pub dhcp_discover_valid: Option<bool>,
    pub dhcp_ack_received: Option<bool>,
    pub proxy_offer_received: Option<bool>,
    pub pxe_discover_valid: Option<bool>,
    pub pxe_reply_received: Option<bool>,
    pub pxe_bis_reply_received: Option<bool>,
    pub dhcp_discover: Option<Vec<u8>>,
    pub dhcp_ack: Option<Vec<u8>>,
    pub proxy_offer: Option<Vec<u8>>,
    pub pxe_discover: Option<Vec<u8>>,
    pub pxe_reply: Option<Vec<u8>>,
    pub pxe_bis_reply: Option<Vec<u8>>,
}

/// A boot server a discover may be answered by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Server {
    /// Server type.
    pub boot_type: BootType,
    /// Accept a reply from any server.
    pub accept_any_response: bool,
    /// Server address.
    pub ip: IpAddr,
}

impl Server {
    /// A server of `boot_type` at `ip`, or any server if `ip` is `None`.
    #[must_use]
    pub const fn new(boot_type: BootType, ip: Option<IpAddr>) -> Self {
        match ip {
            Some(ip) => Self {
                boot_type,
                accept_any_response: false,
                ip,
            },
            None => Self {
                boot_type,
                accept_any_response: true,
                ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            },
        }
    }
}

/// How [`BaseCode::discover`] looks for a boot server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoverInfo {
    /// Try the multicast address first.
    pub use_mcast: bool,
    /// Then try a broadcast.
    pub use_bcast: bool,
    /// Then ask every server of `servers` in turn.
    pub use_ucast: bool,
    /// Only accept replies from `servers`.
    pub must_use_list: bool,
    /// Multicast discovery address.
    pub server_mcast_ip: Option<IpAddr>,
    /// Known boot servers.
    pub servers: Vec<Server>,
}

impl DiscoverInfo {
    fn unicast(boot_type: BootType, ip: IpAddr) -> Self {
        Self {
            use_mcast: false,
            use_bcast: false,
            use_ucast: true,
            must_use_list: false,
            server_mcast_ip: None,
            servers: alloc::vec![Server::new(boot_type, Some(ip))],
        }
    }
}

/// Boot file resolved by [`BaseCode::discover_boot_file`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootFileInfo {
    /// TFTP server.
    pub server: IpAddr,
    /// File name on the server.
    pub name: String,
    /// File size in bytes, 0 when unknown.
    pub size: u64,
}

/// Protocols the base code runs on.
pub struct NetworkStack {
    /// DHCPv4 client, if IPv4 is available.
    pub dhcp4: Option<Box<dyn Dhcp4>>,
    /// DHCPv6 client, if IPv6 is available.
    pub dhcp6: Option<Box<dyn Dhcp6>>,
    /// UDP on the station address.
    pub udp: Box<dyn Udp>,
    /// TFTP client.
    pub mtftp: Box<dyn Mtftp>,
    /// DNS resolver for boot file URLs naming a host.
    pub dns6: Option<Box<dyn Dns6>>,
    /// ARP resolver.
    pub arp: Option<Box<dyn Arp>>,
}

impl fmt::Debug for NetworkStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkStack")
            .field("dhcp4", &self.dhcp4.is_some())
            .field("dhcp6", &self.dhcp6.is_some())
            .field("dns6", &self.dns6.is_some())
            .field("arp", &self.arp.is_some())
            .finish_non_exhaustive()
    }
}

/// Packets of one address family kept between calls.
#[derive(Debug)]
struct Session<T> {
    offers: OfferCache<T>,
    /// Acknowledgement captured during the exchange, parsed once the
    /// selected offer is resolved.
    pending_ack: Option<Vec<u8>>,
    ack: Option<T>,
    proxy_offer: Option<T>,
    pxe_reply: Option<T>,
}

impl<T> Default for Session<T> {
    fn default() -> Self {
        Self {
            offers: OfferCache::default(),
            pending_ack: None,
            ack: None,
            proxy_offer: None,
            pxe_reply: None,
        }
    }
}

impl<T> Session<T> {
    /// The offer the boot prompt and menu read: the proxy offer, else the
    /// acknowledgement.
    fn offer_source(&self) -> Option<&T> {
        self.proxy_offer.as_ref().or(self.ack.as_ref())
    }

    /// The packet boot information is read from.
    fn boot_source(&self) -> Option<&T> {
        self.pxe_reply.as_ref().or_else(|| self.offer_source())
    }
}

/// The PXE base code protocol.
#[derive(Debug)]
pub struct BaseCode<C, S> {
    stack: NetworkStack,
    console: C,
    stall: S,
    identity: ClientIdentity,
    mode: Mode,
    xid: XidGenerator,
    v4: Session<Dhcp4Offer>,
    v6: Session<Dhcp6Offer>,
    /// Request sent during S.A.R.R., the template of DHCPv6 discovers.
    dhcp6_request: Option<Vec<u8>>,
    dns_servers: Vec<Ipv6Addr>,
    router: Ipv4Addr,
    server_ip: Option<IpAddr>,
    boot_file: Option<BootFileInfo>,
    sort_offers: bool,
    is_do_discover: bool,
    address_ok: bool,
}

impl<C: Console, S: Stall> BaseCode<C, S> {
    /// Creates a stopped base code.
    pub fn new(stack: NetworkStack, console: C, stall: S, identity: ClientIdentity) -> Self {
        let mode = Mode::new(stack.dhcp6.is_some());
        let xid = XidGenerator::new(&identity.mac_address);
        Self {
            stack,
            console,
            stall,
            identity,
            mode,
            xid,
            v4: Session::default(),
            v6: Session::default(),
            dhcp6_request: None,
            dns_servers: Vec::new(),
            router: Ipv4Addr::UNSPECIFIED,
            server_ip: None,
            boot_file: None,
            sort_offers: false,
            is_do_discover: false,
            address_ok: false,
        }
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Boot file found by the last [`Self::discover_boot_file`].
    #[must_use]
    pub const fn boot_file(&self) -> Option<&BootFileInfo> {
        self.boot_file.as_ref()
    }

    /// DNS servers learned from the selected DHCPv6 offer.
    #[must_use]
    pub fn dns_servers(&self) -> &[Ipv6Addr] {
        &self.dns_servers
    }

    /// The console.
    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    fn require_started(&self) -> Result {
        if self.mode.started {
            Ok(())
        } else {
            Err(Status::NOT_STARTED.into())
        }
    }

    fn print(&mut self, args: fmt::Arguments<'_>) {
        if self.console.write_fmt(args).is_err() {
            debug!("PXE: console write failed");
        }
    }

    fn reset_sessions(&mut self) {
        self.v4 = Session::default();
        self.v6 = Session::default();
        self.dhcp6_request = None;
        self.dns_servers.clear();
        self.router = Ipv4Addr::UNSPECIFIED;
        self.server_ip = None;
        self.boot_file = None;
        self.is_do_discover = false;
        self.address_ok = false;
    }

    /// Enables the base code for IPv4 or IPv6.
    pub fn start(&mut self, use_ipv6: bool) -> Result {
        if self.mode.started {
            return Err(Status::ALREADY_STARTED.into());
        }
        let supported = if use_ipv6 {
            self.stack.dhcp6.is_some()
        } else {
            self.stack.dhcp4.is_some()
        };
        if !supported {
            return Err(Status::UNSUPPORTED.into());
        }

        self.reset_sessions();
        self.mode = Mode {
            started: true,
            using_ipv6: use_ipv6,
            auto_arp: !use_ipv6,
            ..Mode::new(self.mode.ipv6_supported)
        };
        info!("PXE: started over {}", if use_ipv6 { "IPv6" } else { "IPv4" });
        Ok(())
    }

    /// Disables the base code and forgets everything learned.
    pub fn stop(&mut self) -> Result {
        self.require_started()?;
        if self.mode.using_ipv6 {
            if let Some(dhcp6) = self.stack.dhcp6.as_deref_mut() {
                dhcp6::release(dhcp6);
            }
        } else if let Some(dhcp4) = self.stack.dhcp4.as_deref_mut() {
            dhcp4::release(dhcp4);
        }
        self.reset_sessions();
        self.mode = Mode::new(self.mode.ipv6_supported);
        info!("PXE: stopped");
        Ok(())
    }

    /// Runs D.O.R.A. or S.A.R.R. and resolves the selected offer.
    ///
    /// With `sort_offers` the offer is picked by priority, otherwise the
    /// first usable offer in arrival order is taken.
    pub fn dhcp(&mut self, sort_offers: bool) -> Result {
        self.require_started()?;
        self.mode.icmp_error_received = false;
        self.is_do_discover = false;
        self.sort_offers = sort_offers;
        if self.mode.using_ipv6 {
            self.dhcp6_sarr()
        } else {
            self.dhcp4_dora()
        }
    }

    /// Looks for a boot server of `boot_type` and caches its reply.
    ///
    /// Without `info`, the discovery methods and servers come from the
    /// vendor options of the cached offer. A `layer` other than
    /// [`BOOT_LAYER_INITIAL`] asks the server found by the previous discover
    /// again. On success `layer` holds the layer the server answered for.
    pub fn discover(
        &mut self,
        boot_type: BootType,
        layer: &mut u16,
        use_bis: bool,
        info: Option<&DiscoverInfo>,
    ) -> Result {
        self.require_started()?;
        if use_bis {
            return Err(Status::UNSUPPORTED.into());
        }
        self.mode.icmp_error_received = false;
        *layer &= BOOT_LAYER_MASK;

        let info = if *layer != BOOT_LAYER_INITIAL {
            if !self.mode.pxe_discover_valid || !self.mode.pxe_reply_received {
                return Err(Status::INVALID_PARAMETER.into());
            }
            let server = self.server_ip.ok_or(Status::INVALID_PARAMETER)?;
            DiscoverInfo::unicast(boot_type, server)
        } else if let Some(info) = info {
            info.clone()
        } else {
            self.default_discover_info(boot_type)?
        };

        if !(info.use_mcast || info.use_bcast || info.use_ucast)
            || (info.must_use_list && info.servers.is_empty())
        {
            return Err(Status::INVALID_PARAMETER.into());
        }

        self.is_do_discover = true;
        let mut result: Result<Option<u16>> = Err(Status::DEVICE_ERROR.into());
        if info.use_mcast {
            if let Some(mcast) = info.server_mcast_ip.filter(|ip| !ip.is_unspecified()) {
                debug!("PXE: multicast discover to {mcast}");
                result = self.discover_boot_server(boot_type, *layer, Some(mcast), &info.servers);
            }
        }
        if result.is_err() && info.use_bcast {
            debug!("PXE: broadcast discover");
            result = self.discover_boot_server(boot_type, *layer, None, &info.servers);
        }
        if result.is_err() && info.use_ucast {
            for server in info.servers.iter().filter(|s| !s.ip.is_unspecified()) {
                debug!("PXE: unicast discover to {}", server.ip);
                result = self.discover_boot_server(boot_type, *layer, Some(server.ip), &info.servers);
                if result.is_ok() {
                    break;
                }
            }
        }

        if let Some(answered) = result? {
            *layer = answered;
        }
        Ok(())
    }

    fn default_discover_info(&self, boot_type: BootType) -> Result<DiscoverInfo> {
        if self.mode.using_ipv6 {
            let server = self.server_ip.ok_or(Status::DEVICE_ERROR)?;
            return Ok(DiscoverInfo::unicast(boot_type, server));
        }

        let mut info = DiscoverInfo {
            use_mcast: true,
            use_bcast: true,
            use_ucast: true,
            must_use_list: false,
            server_mcast_ip: None,
            servers: Vec::new(),
        };
        let Some(vendor) = self.v4.offer_source().map(Dhcp4Offer::vendor) else {
            return Ok(info);
        };
        if !vendor.is_discover_valid() {
            return Ok(info);
        }

        let control = vendor.discover_control;
        info.use_mcast = !control.contains(DiscoverControl::DISABLE_MULTICAST);
        info.use_bcast = !control.contains(DiscoverControl::DISABLE_BROADCAST);
        info.must_use_list = control.contains(DiscoverControl::USE_SERVER_LIST);
        info.use_ucast = vendor.has(PxeVendorTag::BOOT_SERVERS);
        if info.use_mcast {
            info.server_mcast_ip = vendor.discover_mcast.map(IpAddr::V4);
        }
        if info.use_ucast {
            match vendor.boot_server(boot_type) {
                Some(entry) => {
                    info.servers = entry
                        .addresses
                        .iter()
                        .map(|ip| Server::new(boot_type, Some(IpAddr::V4(*ip))))
                        .collect();
                }
                None if info.must_use_list => return Err(Status::DEVICE_ERROR.into()),
                None => info.use_ucast = false,
            }
        }
        Ok(info)
    }

    /// Sends one discover and caches the reply along with the server that
    /// sent it. Returns the layer the reply names, if any.
    fn discover_boot_server(
        &mut self,
        boot_type: BootType,
        layer: u16,
        dest: Option<IpAddr>,
        servers: &[Server],
    ) -> Result<Option<u16>> {
        if self.mode.using_ipv6 {
            let Some(IpAddr::V6(server)) = dest else {
                return Err(Status::INVALID_PARAMETER.into());
            };
            let reply = Dhcp6Offer::parse(self.dhcp6_discover_request(server)?)?;
            self.server_ip = Some(IpAddr::V6(server));
            self.mode.packets.pxe_reply = reply.bytes().to_vec();
            self.v6.pxe_reply = Some(reply);
            self.mode.pxe_reply_received = true;
            self.mode.pxe_discover_valid = true;
            return Ok(None);
        }

        let dest = match dest {
            None => None,
            Some(IpAddr::V4(ip)) => Some(ip),
            Some(IpAddr::V6(_)) => return Err(Status::INVALID_PARAMETER.into()),
        };
        let reply = Dhcp4Offer::parse(self.dhcp4_discover_request(boot_type, layer, dest, servers)?)?;
        let answered = reply.vendor().boot_item.map(|item| item.layer);
        let replier = Some(reply.packet().siaddr())
            .filter(|ip| !ip.is_unspecified())
            .or_else(|| reply.packet().server_id())
            .or(dest);
        if let Some(replier) = replier {
            self.server_ip = Some(IpAddr::V4(replier));
        }
        self.mode.packets.pxe_reply = reply.bytes().to_vec();
        self.v4.pxe_reply = Some(reply);
        self.mode.pxe_reply_received = true;
        self.mode.pxe_discover_valid = true;
        Ok(answered)
    }

    /// Runs a TFTP operation against `server`.
    ///
    /// Returns the file size for [`TftpOpcode::TFTP_GET_FILE_SIZE`] and the
    /// number of bytes moved otherwise. Multicast operations are not
    /// supported.
    pub fn mtftp(
        &mut self,
        operation: TftpOpcode,
        buffer: Option<&mut [u8]>,
        server: IpAddr,
        filename: &str,
        block_size: Option<usize>,
    ) -> Result<u64> {
        if block_size.is_some_and(|size| size < MIN_BLOCK_SIZE) || !is_unicast(server) {
            return Err(Status::INVALID_PARAMETER.into());
        }
        self.require_started()?;
        self.mode.tftp_error_received = false;
        self.mode.icmp_error_received = false;

        let mtftp = self.stack.mtftp.as_mut();
        let result = match operation {
            TftpOpcode::TFTP_GET_FILE_SIZE => mtftp.get_file_size(server, filename, block_size),
            TftpOpcode::TFTP_READ_FILE => {
                let buffer = buffer.ok_or(Status::INVALID_PARAMETER)?;
                mtftp.read_file(server, filename, buffer, block_size).map(|n| n as u64)
            }
            TftpOpcode::TFTP_WRITE_FILE => {
                let data = buffer.ok_or(Status::INVALID_PARAMETER)?;
                mtftp
                    .write_file(server, filename, data, block_size)
                    .map(|()| data.len() as u64)
            }
            TftpOpcode::TFTP_READ_DIRECTORY => {
                let buffer = buffer.ok_or(Status::INVALID_PARAMETER)?;
                mtftp.read_directory(server, filename, buffer, block_size).map(|n| n as u64)
            }
            TftpOpcode::MTFTP_GET_FILE_SIZE
            | TftpOpcode::MTFTP_READ_FILE
            | TftpOpcode::MTFTP_READ_DIRECTORY => Err(Status::UNSUPPORTED.into()),
            _ => Err(Status::INVALID_PARAMETER.into()),
        };

        if let Err(err) = &result {
            match err.status() {
                Status::ICMP_ERROR => self.mode.icmp_error_received = true,
                Status::TFTP_ERROR => self.mode.tftp_error_received = true,
                _ => {}
            }
        }
        result
    }

    /// Sends `header` followed by `data` as one UDP datagram.
    ///
    /// Off-link IPv4 destinations go through `gateway`, or the router
    /// learned from DHCP.
    #[allow(clippy::too_many_arguments)]
    pub fn udp_write(
        &mut self,
        flags: UdpOpFlags,
        dest_ip: IpAddr,
        dest_port: u16,
        gateway: Option<IpAddr>,
        src_port: u16,
        header: &[u8],
        data: &[u8],
    ) -> Result {
        if !(UdpOpFlags::ANY_SRC_PORT | UdpOpFlags::MAY_FRAGMENT).contains(flags)
            || gateway.is_some_and(|gw| !is_unicast(gw))
        {
            return Err(Status::INVALID_PARAMETER.into());
        }
        self.require_started()?;
        if (self.mode.using_ipv6 && gateway.is_some())
            || dest_ip.is_ipv6() != self.mode.using_ipv6
            || (!self.address_ok && self.mode.station_ip.is_unspecified())
        {
            return Err(Status::INVALID_PARAMETER.into());
        }

        let gateway = gateway.or_else(|| {
            (!self.mode.using_ipv6 && !self.router.is_unspecified()).then_some(IpAddr::V4(self.router))
        });
        let mut payload = Vec::with_capacity(header.len() + data.len());
        payload.extend_from_slice(header);
        payload.extend_from_slice(data);
        self.stack.udp.write(dest_ip, dest_port, gateway, src_port, &payload)
    }

    /// Receives one UDP datagram into `buffer`.
    ///
    /// Each address or port left `None` must be matched by the
    /// corresponding `ANY_*` flag. [`UdpOpFlags::USE_FILTER`] checks the
    /// destination against the IP filter instead of `dest_ip`.
    pub fn udp_read(
        &mut self,
        flags: UdpOpFlags,
        dest_ip: Option<IpAddr>,
        dest_port: Option<u16>,
        src_ip: Option<IpAddr>,
        src_port: Option<u16>,
        buffer: &mut [u8],
    ) -> Result<UdpDatagram> {
        let any_dest_ip = flags.intersects(UdpOpFlags::ANY_DEST_IP | UdpOpFlags::USE_FILTER);
        if (!any_dest_ip && dest_ip.is_none())
            || (!flags.contains(UdpOpFlags::ANY_DEST_PORT) && dest_port.is_none())
            || (!flags.contains(UdpOpFlags::ANY_SRC_IP) && src_ip.is_none())
            || (!flags.contains(UdpOpFlags::ANY_SRC_PORT) && src_port.is_none())
        {
            return Err(Status::INVALID_PARAMETER.into());
        }
        self.require_started()?;

        let listen_port = if flags.contains(UdpOpFlags::ANY_DEST_PORT) {
            None
        } else {
            dest_port
        };
        for _ in 0..UDP_READ_ATTEMPTS {
            let datagram = self.stack.udp.read(listen_port, buffer, UDP_READ_TIMEOUT)?;
            let dest_ok = if flags.contains(UdpOpFlags::USE_FILTER) {
                self.passes_ip_filter(datagram.dest_ip)
            } else {
                flags.contains(UdpOpFlags::ANY_DEST_IP) || dest_ip == Some(datagram.dest_ip)
            };
            let accepted = dest_ok
                && (listen_port.is_none() || listen_port == Some(datagram.dest_port))
                && (flags.contains(UdpOpFlags::ANY_SRC_IP) || src_ip == Some(datagram.src_ip))
                && (flags.contains(UdpOpFlags::ANY_SRC_PORT) || src_port == Some(datagram.src_port));
            if accepted {
                return Ok(datagram);
            }
            debug!(
                "PXE: dropping datagram {}:{} -> {}:{}",
                datagram.src_ip, datagram.src_port, datagram.dest_ip, datagram.dest_port
            );
        }
        Err(Status::TIMEOUT.into())
    }

    fn passes_ip_filter(&self, dest: IpAddr) -> bool {
        let filter = &self.mode.ip_filter;
        if filter.filters.contains(IpFilterFlags::PROMISCUOUS) {
            return true;
        }
        if filter.filters.contains(IpFilterFlags::PROMISCUOUS_MULTICAST) && dest.is_multicast() {
            return true;
        }
        if filter.filters.contains(IpFilterFlags::BROADCAST) && dest == IpAddr::V4(Ipv4Addr::BROADCAST) {
            return true;
        }
        filter.filters.contains(IpFilterFlags::STATION_IP)
            && (dest == self.mode.station_ip || filter.addresses.contains(&dest))
    }

    /// Replaces the receive filter used by [`Self::udp_read`].
    pub fn set_ip_filter(&mut self, filter: &IpFilter) -> Result {
        if filter.addresses.len() > MAX_IPCNT {
            return Err(Status::INVALID_PARAMETER.into());
        }
        self.require_started()?;
        if self.mode.using_ipv6 && filter.filters.contains(IpFilterFlags::BROADCAST) {
            return Err(Status::INVALID_PARAMETER.into());
        }
        let valid = filter.addresses.iter().all(|ip| {
            ip.is_ipv6() == self.mode.using_ipv6 && (is_unicast(*ip) || ip.is_multicast())
        });
        if !valid {
            return Err(Status::INVALID_PARAMETER.into());
        }
        self.mode.ip_filter = filter.clone();
        Ok(())
    }

    /// Resolves `ip` to a hardware address, from the ARP cache if possible.
    pub fn arp(&mut self, ip: Ipv4Addr) -> Result<MacAddress> {
        self.require_started()?;
        if self.mode.using_ipv6 {
            return Err(Status::UNSUPPORTED.into());
        }
        if let Some(entry) = self.mode.arp_cache.iter().find(|e| e.ip == ip) {
            return Ok(entry.mac);
        }
        let arp = self.stack.arp.as_deref_mut().ok_or(Status::NOT_FOUND)?;
        let mac = arp.request(ip)?;
        if self.mode.auto_arp && self.mode.arp_cache.len() < MAX_ARP_ENTRIES {
            self.mode.arp_cache.push(ArpEntry { ip, mac });
        }
        Ok(mac)
    }

    /// Updates the tunable parameters of [`Mode`].
    pub fn set_parameters(&mut self, parameters: &SetParameters) -> Result {
        self.require_started()?;
        if parameters.send_guid == Some(true) && self.identity.system_guid.is_none() {
            return Err(Status::INVALID_PARAMETER.into());
        }
        if let Some(auto_arp) = parameters.auto_arp {
            self.mode.auto_arp = auto_arp;
        }
        if let Some(send_guid) = parameters.send_guid {
            self.mode.send_guid = send_guid;
        }
        if let Some(ttl) = parameters.ttl {
            self.mode.ttl = ttl;
        }
        if let Some(tos) = parameters.tos {
            self.mode.tos = tos;
        }
        if let Some(make_callbacks) = parameters.make_callbacks {
            self.mode.make_callbacks = make_callbacks;
        }
        Ok(())
    }

    /// Sets the station address and, for IPv4, its netmask.
    pub fn set_station_ip(&mut self, station_ip: Option<IpAddr>, subnet_mask: Option<Ipv4Addr>) -> Result {
        if station_ip.is_some_and(|ip| !is_unicast(ip)) || subnet_mask.is_some_and(|m| !is_valid_netmask(m)) {
            return Err(Status::INVALID_PARAMETER.into());
        }
        self.require_started()?;
        if station_ip.is_some_and(|ip| ip.is_ipv6() != self.mode.using_ipv6) {
            return Err(Status::INVALID_PARAMETER.into());
        }
        if let Some(ip) = station_ip {
            self.mode.station_ip = ip;
        }
        if let Some(mask) = subnet_mask {
            self.mode.subnet_mask = mask;
        }
        self.address_ok = true;
        Ok(())
    }

    /// Replaces cached packets and their valid flags.
    ///
    /// Replaced packets are parsed again, so later boot information is read
    /// from them.
    pub fn set_packets(&mut self, update: PacketsUpdate) -> Result {
        self.require_started()?;
        let flags = [
            (update.dhcp_discover_valid, &mut self.mode.dhcp_discover_valid),
            (update.dhcp_ack_received, &mut self.mode.dhcp_ack_received),
            (update.proxy_offer_received, &mut self.mode.proxy_offer_received),
            (update.pxe_discover_valid, &mut self.mode.pxe_discover_valid),
            (update.pxe_reply_received, &mut self.mode.pxe_reply_received),
            (update.pxe_bis_reply_received, &mut self.mode.pxe_bis_reply_received),
        ];
        for (value, flag) in flags {
            if let Some(value) = value {
                *flag = value;
            }
        }

        let packets = &mut self.mode.packets;
        if let Some(packet) = update.dhcp_discover {
            packets.dhcp_discover = packet;
        }
        if let Some(packet) = update.pxe_discover {
            packets.pxe_discover = packet;
        }
        if let Some(packet) = update.pxe_bis_reply {
            packets.pxe_bis_reply = packet;
        }
        if let Some(packet) = update.dhcp_ack {
            packets.dhcp_ack.clone_from(&packet);
            self.reparse(packet, |s| &mut s.ack, |s| &mut s.ack);
        }
        if let Some(packet) = update.proxy_offer {
            self.mode.packets.proxy_offer.clone_from(&packet);
            self.reparse(packet, |s| &mut s.proxy_offer, |s| &mut s.proxy_offer);
        }
        if let Some(packet) = update.pxe_reply {
            self.mode.packets.pxe_reply.clone_from(&packet);
            self.reparse(packet, |s| &mut s.pxe_reply, |s| &mut s.pxe_reply);
        }
        Ok(())
    }

    fn reparse(
        &mut self,
        packet: Vec<u8>,
        v4: fn(&mut Session<Dhcp4Offer>) -> &mut Option<Dhcp4Offer>,
        v6: fn(&mut Session<Dhcp6Offer>) -> &mut Option<Dhcp6Offer>,
    ) {
        if self.mode.using_ipv6 {
            *v6(&mut self.v6) = Dhcp6Offer::parse(packet).ok();
        } else {
            *v4(&mut self.v4) = Dhcp4Offer::parse(packet).ok();
        }
    }

    /// Loads the boot file into `buffer` and returns its size.
    ///
    /// The first call runs [`Self::discover_boot_file`]. When `buffer` is
    /// missing or too small the error is `BUFFER_TOO_SMALL` carrying the
    /// size needed, if known. Failures are reported on the console with
    /// their `PXE-Exx` message.
    pub fn load_file(&mut self, buffer: Option<&mut [u8]>) -> Result<usize, Option<usize>> {
        let has_buffer = buffer.is_some();
        let result = self.load_boot_file(buffer);
        if let Err(err) = &result {
            let status = err.status();
            if status != Status::BUFFER_TOO_SMALL || has_buffer {
                log::error!("PXE: load file failed: {status:?}");
                let message = pxe_error_message(status);
                self.print(format_args!("\n  {message}\n"));
            }
        }
        result
    }

    fn load_boot_file(&mut self, buffer: Option<&mut [u8]>) -> Result<usize, Option<usize>> {
        let no_size = |err: Error| unknown_size(err.status());
        if self.boot_file.is_none() {
            self.discover_boot_file().map_err(no_size)?;
        }
        let file = self.boot_file.clone().ok_or(unknown_size(Status::NOT_FOUND))?;

        if file.size == 0 && self.mode.using_ipv6 {
            let buffer = buffer.ok_or(unknown_size(Status::BUFFER_TOO_SMALL))?;
            return self.read_boot_file(&file, buffer).map_err(no_size);
        }

        let size = usize::try_from(file.size).map_err(|_| unknown_size(Status::BAD_BUFFER_SIZE))?;
        match buffer {
            Some(buffer) if buffer.len() >= size => {
                self.read_boot_file(&file, &mut buffer[..size]).map_err(no_size)
            }
            _ => Err(Error::new(Status::BUFFER_TOO_SMALL, Some(size))),
        }
    }

    fn read_boot_file(&mut self, file: &BootFileInfo, buffer: &mut [u8]) -> Result<usize> {
        info!("PXE: downloading {} from {}", file.name, file.server);
        let read = self.mtftp(TftpOpcode::TFTP_READ_FILE, Some(buffer), file.server, &file.name, None)?;
        usize::try_from(read).map_err(|_| Status::BAD_BUFFER_SIZE.into())
    }
}

const fn unknown_size(status: Status) -> Error<Option<usize>> {
    Error::new(status, None)
}
