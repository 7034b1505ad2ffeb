// SPDX-License-Identifier: MIT OR Apache-2.0

//! PXE base code scenarios against simulated DHCP, UDP and TFTP services.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::rc::Rc;

use efi_netboot::boot::Stall;
use efi_netboot::proto::console::{Console, Key, ScanCode};
use efi_netboot::proto::network::CallbackAction;
use efi_netboot::proto::network::arp::Arp;
use efi_netboot::proto::network::dhcp4::{
    Dhcp4, Dhcp4Callback, Dhcp4Config, Dhcp4Event, Dhcp4ModeData, TransmitReceiveToken,
};
use efi_netboot::proto::network::dhcp6::{
    Dhcp6, Dhcp6Callback, Dhcp6Config, Dhcp6Event, Dhcp6ModeData,
};
use efi_netboot::proto::network::dns6::Dns6;
use efi_netboot::proto::network::mtftp::Mtftp;
use efi_netboot::proto::network::udp::{Udp, UdpDatagram};
use efi_netboot::pxe::offer::{CachedOffer, OfferType};
use efi_netboot::pxe::{
    BaseCode, BootFileInfo, ClientIdentity, Dhcp4Offer, DiscoverInfo, IpFilter, NetworkStack,
    SetParameters,
};
use efi_netboot::{MacAddress, Result, Status};
use efi_netboot_raw::protocol::network::dhcp4::{DHCP4_MAGIC, header};
use efi_netboot_raw::protocol::network::pxe::{BootType, IpFilterFlags, UdpOpFlags};

const CLIENT_MAC: [u8; 6] = [0x02, 0, 0, 0, 0, 0x01];
const CLIENT_IP: [u8; 4] = [10, 0, 0, 5];
const DHCP_SERVER: [u8; 4] = [10, 0, 0, 1];
const STATION_V6: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x100);

// ---- simulated services ----------------------------------------------------

#[derive(Debug, Default)]
struct Dhcp4State {
    offers: Vec<Vec<u8>>,
    start_error: Option<Status>,
    configured: bool,
    stops: usize,
    lease: Option<Dhcp4ModeData>,
    replies: VecDeque<Result<Vec<Vec<u8>>>>,
    tokens: Vec<TransmitReceiveToken>,
}

#[derive(Debug)]
struct MockDhcp4(Rc<RefCell<Dhcp4State>>);

fn discover_packet() -> Vec<u8> {
    let mut p = vec![0; header::OPTIONS];
    p[header::OP] = 1;
    p[header::MAGIC..header::OPTIONS].copy_from_slice(&DHCP4_MAGIC.to_be_bytes());
    p.extend_from_slice(&[53, 1, 1, 57, 2, 0x02, 0x40, 255]);
    p
}

impl Dhcp4 for MockDhcp4 {
    fn configure(&mut self, config: Option<&Dhcp4Config>) -> Result {
        self.0.borrow_mut().configured = config.is_some();
        Ok(())
    }

    fn start(&mut self, callback: &mut dyn Dhcp4Callback) -> Result {
        let mut state = self.0.borrow_mut();
        if let Some(status) = state.start_error {
            return Err(status.into());
        }
        if state.offers.is_empty() {
            return Err(Status::TIMEOUT.into());
        }
        callback.dhcp4_event(Dhcp4Event::SEND_DISCOVER, &mut discover_packet())?;
        for offer in &state.offers {
            callback.dhcp4_event(Dhcp4Event::RCVD_OFFER, &mut offer.clone())?;
        }
        let mut selected = state.offers[0].clone();
        if let CallbackAction::Replace(packet) =
            callback.dhcp4_event(Dhcp4Event::SELECT_OFFER, &mut selected.clone())?
        {
            selected = packet;
        }
        callback.dhcp4_event(Dhcp4Event::SEND_REQUEST, &mut discover_packet())?;
        callback.dhcp4_event(Dhcp4Event::RCVD_ACK, &mut selected.clone())?;

        let yiaddr = &selected[header::YIADDR..header::YIADDR + 4];
        state.lease = Some(Dhcp4ModeData {
            client_address: Ipv4Addr::new(yiaddr[0], yiaddr[1], yiaddr[2], yiaddr[3]),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            router_address: Ipv4Addr::from(DHCP_SERVER),
        });
        Ok(())
    }

    fn stop(&mut self) -> Result {
        self.0.borrow_mut().stops += 1;
        Ok(())
    }

    fn mode_data(&self) -> Result<Dhcp4ModeData> {
        self.0.borrow().lease.ok_or_else(|| Status::NOT_STARTED.into())
    }

    fn transmit_receive(&mut self, token: &TransmitReceiveToken) -> Result<Vec<Vec<u8>>> {
        let mut state = self.0.borrow_mut();
        state.tokens.push(token.clone());
        state
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(Status::TIMEOUT.into()))
    }
}

#[derive(Debug, Default)]
struct Dhcp6State {
    advertises: Vec<Vec<u8>>,
    configured: Option<Dhcp6Config>,
    stops: usize,
}

#[derive(Debug)]
struct MockDhcp6(Rc<RefCell<Dhcp6State>>);

/// Request of the simulated exchange: client id, IA_NA, server id and ORO.
fn dhcp6_request() -> Vec<u8> {
    let mut p = vec![3, 0, 0, 2];
    p.extend_from_slice(&[0, 1, 0, 2, 0xAA, 0xBB]);
    p.extend_from_slice(&[0, 3, 0, 12]);
    p.extend_from_slice(&[0; 12]);
    p.extend_from_slice(&[0, 2, 0, 2, 1, 2]);
    p.extend_from_slice(&[0, 6, 0, 2, 0, 59]);
    p
}

impl Dhcp6 for MockDhcp6 {
    fn configure(&mut self, config: Option<&Dhcp6Config>) -> Result {
        self.0.borrow_mut().configured = config.cloned();
        Ok(())
    }

    fn start(&mut self, callback: &mut dyn Dhcp6Callback) -> Result {
        let state = self.0.borrow();
        if state.advertises.is_empty() {
            return Err(Status::TIMEOUT.into());
        }
        callback.dhcp6_event(Dhcp6Event::SEND_SOLICIT, &mut vec![1, 0, 0, 1])?;
        for advertise in &state.advertises {
            callback.dhcp6_event(Dhcp6Event::RCVD_ADVERTISE, &mut advertise.clone())?;
        }
        let mut selected = state.advertises[0].clone();
        if let CallbackAction::Replace(packet) =
            callback.dhcp6_event(Dhcp6Event::SELECT_ADVERTISE, &mut selected.clone())?
        {
            selected = packet;
        }
        callback.dhcp6_event(Dhcp6Event::SEND_REQUEST, &mut dhcp6_request())?;
        selected[0] = 7;
        callback.dhcp6_event(Dhcp6Event::RCVD_REPLY, &mut selected)?;
        Ok(())
    }

    fn stop(&mut self) -> Result {
        self.0.borrow_mut().stops += 1;
        Ok(())
    }

    fn mode_data(&self) -> Result<Dhcp6ModeData> {
        Ok(Dhcp6ModeData {
            ia_address: Some(STATION_V6),
            client_id: vec![0xAA, 0xBB],
        })
    }
}

#[derive(Debug, Default)]
struct UdpState {
    written: Vec<(IpAddr, u16, u16, Vec<u8>)>,
    incoming: VecDeque<(UdpDatagram, Vec<u8>)>,
    /// Answer to DHCPv6 requests; its transaction id is taken from the
    /// request.
    dhcp6_reply: Option<Vec<u8>>,
}

#[derive(Debug)]
struct MockUdp(Rc<RefCell<UdpState>>);

impl Udp for MockUdp {
    fn write(
        &mut self,
        dest_ip: IpAddr,
        dest_port: u16,
        _gateway: Option<IpAddr>,
        src_port: u16,
        payload: &[u8],
    ) -> Result {
        let mut state = self.0.borrow_mut();
        state.written.push((dest_ip, dest_port, src_port, payload.to_vec()));
        if dest_port == 547 {
            if let Some(mut reply) = state.dhcp6_reply.clone() {
                reply[1..4].copy_from_slice(&payload[1..4]);
                let datagram = UdpDatagram {
                    length: reply.len(),
                    src_ip: dest_ip,
                    src_port: 547,
                    dest_ip: IpAddr::V6(STATION_V6),
                    dest_port: 546,
                };
                state.incoming.push_back((datagram, reply));
            }
        }
        Ok(())
    }

    fn read(&mut self, _listen_port: Option<u16>, buffer: &mut [u8], _timeout: u64) -> Result<UdpDatagram> {
        let (mut datagram, payload) = self
            .0
            .borrow_mut()
            .incoming
            .pop_front()
            .ok_or(Status::TIMEOUT)?;
        buffer[..payload.len()].copy_from_slice(&payload);
        datagram.length = payload.len();
        Ok(datagram)
    }
}

#[derive(Debug, Default)]
struct MtftpState {
    files: BTreeMap<String, Vec<u8>>,
    reads: Vec<(IpAddr, String)>,
}

#[derive(Debug)]
struct MockMtftp(Rc<RefCell<MtftpState>>);

impl Mtftp for MockMtftp {
    fn get_file_size(&mut self, _server: IpAddr, file: &str, _block_size: Option<usize>) -> Result<u64> {
        let state = self.0.borrow();
        let data = state.files.get(file).ok_or(Status::TFTP_ERROR)?;
        Ok(data.len() as u64)
    }

    fn read_file(
        &mut self,
        server: IpAddr,
        file: &str,
        buffer: &mut [u8],
        _block_size: Option<usize>,
    ) -> Result<usize> {
        let mut state = self.0.borrow_mut();
        state.reads.push((server, file.to_string()));
        let data = state.files.get(file).ok_or(Status::TFTP_ERROR)?;
        if data.len() > buffer.len() {
            return Err(Status::BUFFER_TOO_SMALL.into());
        }
        buffer[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn write_file(&mut self, _server: IpAddr, _file: &str, _data: &[u8], _block_size: Option<usize>) -> Result {
        Err(Status::ACCESS_DENIED.into())
    }

    fn read_directory(
        &mut self,
        _server: IpAddr,
        _directory: &str,
        _buffer: &mut [u8],
        _block_size: Option<usize>,
    ) -> Result<usize> {
        Err(Status::TFTP_ERROR.into())
    }
}

#[derive(Debug)]
struct MockDns6(Rc<RefCell<Vec<(Ipv6Addr, String)>>>);

impl Dns6 for MockDns6 {
    fn resolve(&mut self, dns_server: Ipv6Addr, host: &str) -> Result<Ipv6Addr> {
        self.0.borrow_mut().push((dns_server, host.to_string()));
        Ok(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x69))
    }
}

#[derive(Debug)]
struct MockArp(Rc<Cell<usize>>);

impl Arp for MockArp {
    fn request(&mut self, _ip: Ipv4Addr) -> Result<MacAddress> {
        self.0.set(self.0.get() + 1);
        Ok(MacAddress::from([0x02, 0, 0, 0, 0, 0x99]))
    }
}

#[derive(Debug, Default)]
struct MockConsole {
    output: String,
    keys: VecDeque<Key>,
    idle_reads: usize,
    moves: Vec<(usize, usize)>,
}

impl fmt::Write for MockConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.output.push_str(s);
        Ok(())
    }
}

impl Console for MockConsole {
    fn read_key(&mut self) -> Result<Option<Key>> {
        if let Some(key) = self.keys.pop_front() {
            return Ok(Some(key));
        }
        self.idle_reads += 1;
        if self.idle_reads > 10_000 {
            return Err(Status::DEVICE_ERROR.into());
        }
        Ok(None)
    }

    fn cursor_position(&self) -> (usize, usize) {
        (0, 10)
    }

    fn set_cursor_position(&mut self, column: usize, row: usize) -> Result {
        self.moves.push((column, row));
        Ok(())
    }

    fn set_highlight(&mut self, _highlight: bool) -> Result {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CountingStall(Cell<usize>);

impl Stall for CountingStall {
    fn stall(&self, microseconds: usize) {
        self.0.set(self.0.get() + microseconds);
    }
}

#[derive(Debug, Default)]
struct Network {
    dhcp4: Rc<RefCell<Dhcp4State>>,
    dhcp6: Rc<RefCell<Dhcp6State>>,
    udp: Rc<RefCell<UdpState>>,
    mtftp: Rc<RefCell<MtftpState>>,
    dns: Rc<RefCell<Vec<(Ipv6Addr, String)>>>,
    arp_requests: Rc<Cell<usize>>,
}

impl Network {
    fn stack(&self) -> NetworkStack {
        NetworkStack {
            dhcp4: Some(Box::new(MockDhcp4(self.dhcp4.clone()))),
            dhcp6: Some(Box::new(MockDhcp6(self.dhcp6.clone()))),
            udp: Box::new(MockUdp(self.udp.clone())),
            mtftp: Box::new(MockMtftp(self.mtftp.clone())),
            dns6: Some(Box::new(MockDns6(self.dns.clone()))),
            arp: Some(Box::new(MockArp(self.arp_requests.clone()))),
        }
    }

    fn base_code<'a>(&self, stall: &'a CountingStall, keys: &[Key]) -> BaseCode<MockConsole, &'a CountingStall> {
        let console = MockConsole {
            keys: keys.iter().copied().collect(),
            ..MockConsole::default()
        };
        let identity = ClientIdentity {
            mac_address: CLIENT_MAC,
            ..ClientIdentity::default()
        };
        BaseCode::new(self.stack(), console, stall, identity)
    }

    fn add_file(&self, name: &str, len: usize) {
        let data = (0..len).map(|i| i as u8).collect();
        self.mtftp.borrow_mut().files.insert(name.to_string(), data);
    }
}

// ---- packet builders -------------------------------------------------------

const PXE_CLASS: &[u8] = b"\x3c\x09PXEClient";

fn dhcp4_reply(yiaddr: [u8; 4], siaddr: [u8; 4], options: &[&[u8]]) -> Vec<u8> {
    let mut p = vec![0; header::OPTIONS];
    p[header::OP] = 2;
    p[header::YIADDR..header::YIADDR + 4].copy_from_slice(&yiaddr);
    p[header::SIADDR..header::SIADDR + 4].copy_from_slice(&siaddr);
    p[header::MAGIC..header::OPTIONS].copy_from_slice(&DHCP4_MAGIC.to_be_bytes());
    p.extend_from_slice(&[53, 1, 2, 54, 4]);
    p.extend_from_slice(&DHCP_SERVER);
    for option in options {
        p.extend_from_slice(option);
    }
    p.push(255);
    p
}

fn option(tag: u8, data: &[u8]) -> Vec<u8> {
    let mut o = vec![tag, data.len() as u8];
    o.extend_from_slice(data);
    o
}

fn vendor(sub_options: &[Vec<u8>]) -> Vec<u8> {
    let mut data: Vec<u8> = sub_options.concat();
    data.push(255);
    option(43, &data)
}

fn menu_item(boot_type: u16, text: &str) -> Vec<u8> {
    let mut item = boot_type.to_be_bytes().to_vec();
    item.push(text.len() as u8);
    item.extend_from_slice(text.as_bytes());
    item
}

/// A PXE 1.0 offer with a boot menu of "Local" (local boot) then "Linux"
/// (type 0x8000, served by 10.0.0.20), and a prompt of `timeout` seconds.
fn menu_offer(timeout: u8) -> Vec<u8> {
    let menu = [menu_item(0, "Local"), menu_item(0x8000, "Linux")].concat();
    let mut prompt = vec![timeout];
    prompt.extend_from_slice(b"Press F8");
    let vendor = vendor(&[
        option(6, &[0x03]),
        option(8, &[0x80, 0x00, 1, 10, 0, 0, 20]),
        option(9, &menu),
        option(10, &prompt),
    ]);
    dhcp4_reply(CLIENT_IP, [0; 4], &[PXE_CLASS, &vendor])
}

fn dhcp6_option(code: u16, data: &[u8]) -> Vec<u8> {
    let mut o = code.to_be_bytes().to_vec();
    o.extend_from_slice(&(data.len() as u16).to_be_bytes());
    o.extend_from_slice(data);
    o
}

fn dhcp6_pxe_class() -> Vec<u8> {
    let mut data = vec![0, 0, 1, 0x57, 0, 9];
    data.extend_from_slice(b"PXEClient");
    dhcp6_option(16, &data)
}

fn dhcp6_packet(msg_type: u8, options: &[Vec<u8>]) -> Vec<u8> {
    let mut p = vec![msg_type, 0, 0, 1];
    for option in options {
        p.extend_from_slice(option);
    }
    p
}

fn bound_ia_na() -> Vec<u8> {
    let mut ia_na = vec![0; 12];
    ia_na.extend_from_slice(&dhcp6_option(13, &[0, 0]));
    dhcp6_option(3, &ia_na)
}

fn dns_server() -> Vec<u8> {
    dhcp6_option(23, &Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x53).octets())
}

// ---- offer handling --------------------------------------------------------

#[test]
fn offers_are_classified() {
    let kind = |packet: Vec<u8>| Dhcp4Offer::parse(packet).map(|o| o.offer_type());
    let discover = vendor(&[option(6, &[0])]);

    assert_eq!(kind(dhcp4_reply(CLIENT_IP, [0; 4], &[])), Ok(OfferType::DhcpOnly));
    assert_eq!(kind(dhcp4_reply(CLIENT_IP, [0; 4], &[PXE_CLASS])), Ok(OfferType::DhcpBinl));
    assert_eq!(kind(dhcp4_reply([0; 4], [0; 4], &[PXE_CLASS])), Ok(OfferType::ProxyBinl));
    assert_eq!(
        kind(dhcp4_reply(CLIENT_IP, [0; 4], &[PXE_CLASS, &discover])),
        Ok(OfferType::DhcpPxe10)
    );
    assert_eq!(
        kind(dhcp4_reply([0; 4], [0; 4], &[PXE_CLASS, &discover])),
        Ok(OfferType::ProxyPxe10)
    );
}

#[test]
fn sorted_selection_prefers_pxe10_over_arrival_order() {
    let net = Network::default();
    let plain = dhcp4_reply(CLIENT_IP, [0; 4], &[&option(67, b"first.efi")]);
    let pxe10 = dhcp4_reply(
        [10, 0, 0, 6],
        [0; 4],
        &[PXE_CLASS, &vendor(&[option(6, &[0])])],
    );
    net.dhcp4.borrow_mut().offers = vec![plain.clone(), pxe10.clone()];
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);

    pxe.start(false).unwrap();
    pxe.dhcp(true).unwrap();
    assert_eq!(pxe.mode().packets.dhcp_ack, pxe10);
    assert_eq!(pxe.mode().station_ip, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 6)));
    assert!(pxe.mode().dhcp_ack_received);
    assert!(!pxe.mode().packets.dhcp_discover.is_empty());

    pxe.dhcp(false).unwrap();
    assert_eq!(pxe.mode().packets.dhcp_ack, plain);
    assert!(pxe.console_mut().output.contains("Station IP address is 10.0.0.5"));
}

#[test]
fn plain_offer_is_completed_by_proxy() {
    let net = Network::default();
    let proxy = dhcp4_reply(
        [0; 4],
        [10, 0, 0, 2],
        &[PXE_CLASS, &vendor(&[option(6, &[0x08])]), &option(67, b"proxy.efi")],
    );
    net.dhcp4.borrow_mut().offers = vec![dhcp4_reply(CLIENT_IP, [0; 4], &[]), proxy.clone()];
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);

    pxe.start(false).unwrap();
    pxe.dhcp(true).unwrap();
    assert!(pxe.mode().proxy_offer_received);
    assert_eq!(pxe.mode().packets.proxy_offer, proxy);
    assert_eq!(pxe.mode().route_table.len(), 1);
}

#[test]
fn offers_without_boot_file_fail_and_release_dhcp() {
    let net = Network::default();
    net.dhcp4.borrow_mut().offers = vec![dhcp4_reply(CLIENT_IP, [0; 4], &[])];
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);

    pxe.start(false).unwrap();
    let err = pxe.dhcp(true).unwrap_err();
    assert_eq!(err.status(), Status::ABORTED);
    assert_eq!(net.dhcp4.borrow().stops, 1);
    assert!(!net.dhcp4.borrow().configured);
    assert!(!pxe.mode().dhcp_ack_received);
}

#[test]
fn binl_offer_is_asked_again() {
    let net = Network::default();
    let binl_reply = dhcp4_reply([0; 4], DHCP_SERVER, &[PXE_CLASS, &option(67, b"binl.efi")]);
    {
        let mut dhcp4 = net.dhcp4.borrow_mut();
        dhcp4.offers = vec![dhcp4_reply(CLIENT_IP, DHCP_SERVER, &[PXE_CLASS])];
        dhcp4.replies = VecDeque::from([Err(Status::TIMEOUT.into()), Ok(vec![binl_reply.clone()])]);
    }
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);

    pxe.start(false).unwrap();
    pxe.dhcp(true).unwrap();
    assert_eq!(pxe.mode().packets.proxy_offer, binl_reply);

    let dhcp4 = net.dhcp4.borrow();
    assert_eq!(dhcp4.tokens.len(), 2);
    let token = &dhcp4.tokens[1];
    assert_eq!(token.remote_address, Ipv4Addr::from(DHCP_SERVER));
    assert_eq!(token.remote_port, 4011);
    assert_eq!(token.listen_points[0].port, 4011);
    assert_eq!(token.timeout, 2);
    assert_eq!(token.packet[header::OPTIONS..header::OPTIONS + 3], [53, 1, 3]);
    assert_eq!(token.packet[header::SECS..header::SECS + 2], [0, 1]);
    // No boot item is sent outside boot server discovery.
    assert!(!token.packet.windows(3).any(|w| w == [43, 7, 71]));
}

#[test]
fn binl_without_answer_is_no_response() {
    let net = Network::default();
    net.dhcp4.borrow_mut().offers = vec![dhcp4_reply(CLIENT_IP, DHCP_SERVER, &[PXE_CLASS])];
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);

    pxe.start(false).unwrap();
    assert_eq!(pxe.dhcp(true).unwrap_err().status(), Status::NO_RESPONSE);
    assert_eq!(net.dhcp4.borrow().tokens.len(), 4);
}

// ---- boot file -------------------------------------------------------------

#[test]
fn load_file_reports_size_then_downloads() {
    let net = Network::default();
    let offer = dhcp4_reply(
        CLIENT_IP,
        [10, 0, 0, 9],
        &[
            PXE_CLASS,
            &vendor(&[option(6, &[0x08])]),
            &option(67, b"boot.efi"),
            &option(13, &[0, 2]),
        ],
    );
    net.dhcp4.borrow_mut().offers = vec![offer];
    net.add_file("boot.efi", 1024);
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(false).unwrap();

    let err = pxe.load_file(None).unwrap_err();
    assert_eq!(err.status(), Status::BUFFER_TOO_SMALL);
    assert_eq!(*err.data(), Some(1024));
    assert_eq!(
        pxe.boot_file(),
        Some(&BootFileInfo {
            server: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)),
            name: "boot.efi".into(),
            size: 1024,
        })
    );

    let mut buffer = vec![0; 4096];
    assert_eq!(pxe.load_file(Some(&mut buffer)), Ok(1024));
    assert_eq!(buffer[1..4], [1, 2, 3]);
    assert_eq!(
        net.mtftp.borrow().reads,
        [(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)), "boot.efi".to_string())]
    );

    let output = &pxe.console_mut().output;
    assert!(output.contains("NBP filename is boot.efi"));
    assert!(output.contains("NBP filesize is 1024 Bytes"));
    assert!(!output.contains("PXE-E"));
}

#[test]
fn boot_file_size_is_asked_when_not_offered() {
    let net = Network::default();
    let offer = dhcp4_reply(CLIENT_IP, [10, 0, 0, 9], &[&option(67, b"grub.efi")]);
    net.dhcp4.borrow_mut().offers = vec![offer];
    net.add_file("grub.efi", 777);
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(false).unwrap();

    pxe.discover_boot_file().unwrap();
    assert_eq!(pxe.boot_file().map(|f| f.size), Some(777));
}

#[test]
fn failed_boot_prints_pxe_error() {
    let net = Network::default();
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(false).unwrap();

    let mut buffer = vec![0; 16];
    let err = pxe.load_file(Some(&mut buffer)).unwrap_err();
    assert_eq!(err.status(), Status::TIMEOUT);
    assert!(pxe.console_mut().output.contains("PXE-E18: Server response timeout."));
}

#[test]
fn load_file_requires_start() {
    let net = Network::default();
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    assert_eq!(pxe.load_file(None).unwrap_err().status(), Status::NOT_STARTED);
}

// ---- boot prompt and menu --------------------------------------------------

fn linux_server_reply() -> Vec<u8> {
    dhcp4_reply(
        [0; 4],
        [10, 0, 0, 20],
        &[
            PXE_CLASS,
            &vendor(&[option(71, &[0x80, 0, 0, 0])]),
            &option(67, b"linux.efi"),
            &option(13, &[0, 4]),
        ],
    )
}

#[test]
fn menu_choice_is_discovered() {
    let net = Network::default();
    {
        let mut dhcp4 = net.dhcp4.borrow_mut();
        dhcp4.offers = vec![menu_offer(5)];
        dhcp4.replies = VecDeque::from([Ok(vec![linux_server_reply()])]);
    }
    let stall = CountingStall::default();
    let keys = [
        Key::Special(ScanCode::FUNCTION_8),
        Key::Special(ScanCode::DOWN),
        Key::Printable('\r'),
    ];
    let mut pxe = net.base_code(&stall, &keys);
    pxe.start(false).unwrap();

    pxe.discover_boot_file().unwrap();
    assert_eq!(
        pxe.boot_file(),
        Some(&BootFileInfo {
            server: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 20)),
            name: "linux.efi".into(),
            size: 2048,
        })
    );
    assert!(pxe.mode().pxe_reply_received);
    assert!(pxe.mode().proxy_offer_received);
    assert_eq!(pxe.mode().packets.proxy_offer, linux_server_reply());

    let dhcp4 = net.dhcp4.borrow();
    let token = &dhcp4.tokens[0];
    assert_eq!(token.remote_address, Ipv4Addr::new(10, 0, 0, 20));
    assert!(token.packet.windows(9).any(|w| w == [43, 7, 71, 4, 0x80, 0, 0, 0, 255]));
    assert_eq!(pxe.mode().packets.pxe_discover, token.packet);

    let console = pxe.console_mut();
    assert!(console.output.contains("Press F8 "));
    assert!(console.output.contains("(5) "));
    assert!(console.output.contains("Local \nLinux \n"));
    // Menu rows sit just above the cursor; the last move leaves the menu.
    assert_eq!(console.moves.last(), Some(&(0, 10)));
    assert!(console.moves.contains(&(0, 9)));
}

#[test]
fn prompt_timeout_boots_default_item() {
    let net = Network::default();
    net.dhcp4.borrow_mut().offers = vec![menu_offer(1)];
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(false).unwrap();

    // The first item is local boot, which ends the network boot.
    assert_eq!(pxe.discover_boot_file().unwrap_err().status(), Status::ABORTED);
    assert_eq!(stall.0.get(), 1_000_000);
    assert!(net.dhcp4.borrow().tokens.is_empty());
}

#[test]
fn escape_at_prompt_cancels_boot() {
    let net = Network::default();
    net.dhcp4.borrow_mut().offers = vec![menu_offer(5)];
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[Key::Special(ScanCode::ESCAPE)]);
    pxe.start(false).unwrap();

    let mut buffer = vec![0; 16];
    assert_eq!(pxe.load_file(Some(&mut buffer)).unwrap_err().status(), Status::ABORTED);
    assert!(pxe.console_mut().output.contains("PXE-E21: Remote boot cancelled."));
    assert_eq!(stall.0.get(), 0);
}

#[test]
fn menu_is_skipped_with_boot_file_name() {
    let net = Network::default();
    let offer = dhcp4_reply(
        CLIENT_IP,
        [10, 0, 0, 9],
        &[
            PXE_CLASS,
            &vendor(&[option(6, &[0x08]), option(10, b"\x05Press")]),
            &option(67, b"boot.efi"),
            &option(13, &[0, 1]),
        ],
    );
    net.dhcp4.borrow_mut().offers = vec![offer];
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(false).unwrap();

    pxe.discover_boot_file().unwrap();
    assert!(!pxe.console_mut().output.contains("Press"));
    assert_eq!(stall.0.get(), 0);
}

// ---- IPv6 ------------------------------------------------------------------

#[test]
fn dhcp6_boot_file_from_url() {
    let net = Network::default();
    net.dhcp6.borrow_mut().advertises = vec![dhcp6_packet(
        2,
        &[
            bound_ia_na(),
            dns_server(),
            dhcp6_option(59, b"tftp://[2001:db8::9]/efi/boot.efi"),
            dhcp6_option(60, b"\x00\x0216"),
        ],
    )];
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(true).unwrap();

    pxe.discover_boot_file().unwrap();
    assert_eq!(pxe.mode().station_ip, IpAddr::V6(STATION_V6));
    assert_eq!(pxe.dns_servers(), [Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x53)]);
    assert_eq!(
        pxe.boot_file(),
        Some(&BootFileInfo {
            server: "2001:db8::9".parse().unwrap(),
            name: "efi/boot.efi".into(),
            size: 8192,
        })
    );
    assert_eq!(net.dhcp6.borrow().configured.as_ref().map(|c| c.ia_id), Some(0));
}

#[test]
fn dhcp6_binl_offer_is_asked_again() {
    let net = Network::default();
    net.dhcp6.borrow_mut().advertises = vec![dhcp6_packet(
        2,
        &[
            bound_ia_na(),
            dhcp6_pxe_class(),
            dns_server(),
            dhcp6_option(59, b"tftp://[2001:db8::4]/"),
        ],
    )];
    net.udp.borrow_mut().dhcp6_reply = Some(dhcp6_packet(
        7,
        &[dhcp6_pxe_class(), dhcp6_option(59, b"tftp://boot.example/grub.efi")],
    ));
    net.add_file("grub.efi", 3000);
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(true).unwrap();

    pxe.discover_boot_file().unwrap();
    assert!(pxe.mode().proxy_offer_received);

    let (dest, port, src_port, request) = net.udp.borrow().written[0].clone();
    assert_eq!(dest, IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 4)));
    assert_eq!((port, src_port), (547, 546));
    assert_eq!(request[0], 3);
    // Client id and ORO are kept; IA_NA and server id are dropped.
    assert_eq!(request[4..], [0, 1, 0, 2, 0xAA, 0xBB, 0, 6, 0, 2, 0, 59]);

    let resolver = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x53);
    assert_eq!(*net.dns.borrow(), [(resolver, "boot.example".to_string())]);

    let mut buffer = vec![0; 4096];
    assert_eq!(pxe.load_file(Some(&mut buffer)), Ok(3000));
}

#[test]
fn dhcp6_binl_offer_without_url_is_not_asked() {
    let net = Network::default();
    net.dhcp6.borrow_mut().advertises =
        vec![dhcp6_packet(2, &[bound_ia_na(), dhcp6_pxe_class(), dns_server()])];
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(true).unwrap();

    assert_eq!(pxe.dhcp(true).unwrap_err().status(), Status::NO_RESPONSE);
    assert!(net.udp.borrow().written.is_empty());
}

#[test]
fn dhcp6_proxy_binl_without_url_is_skipped() {
    let net = Network::default();
    net.dhcp6.borrow_mut().advertises = vec![
        dhcp6_packet(2, &[bound_ia_na(), dns_server()]),
        dhcp6_packet(2, &[dhcp6_pxe_class()]),
        dhcp6_packet(2, &[dhcp6_pxe_class(), dhcp6_option(59, b"tftp://[2001:db8::7]/")]),
    ];
    net.udp.borrow_mut().dhcp6_reply = Some(dhcp6_packet(
        7,
        &[dhcp6_pxe_class(), dhcp6_option(59, b"tftp://[2001:db8::7]/shim.efi")],
    ));
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(true).unwrap();

    pxe.dhcp(true).unwrap();
    assert!(pxe.mode().proxy_offer_received);
    let written = net.udp.borrow().written.clone();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].0, IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 7)));
}

#[test]
fn dhcp6_without_advertise_releases() {
    let net = Network::default();
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(true).unwrap();

    assert_eq!(pxe.dhcp(true).unwrap_err().status(), Status::TIMEOUT);
    assert_eq!(net.dhcp6.borrow().stops, 1);
    assert!(net.dhcp6.borrow().configured.is_none());
}

// ---- base code operations --------------------------------------------------

#[test]
fn start_and_stop_states() {
    let net = Network::default();
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);

    assert_eq!(pxe.stop().unwrap_err().status(), Status::NOT_STARTED);
    assert_eq!(pxe.dhcp(true).unwrap_err().status(), Status::NOT_STARTED);
    pxe.start(false).unwrap();
    assert!(pxe.mode().started);
    assert!(pxe.mode().auto_arp);
    assert_eq!(pxe.start(true).unwrap_err().status(), Status::ALREADY_STARTED);
    pxe.stop().unwrap();
    assert!(!pxe.mode().started);

    let mut stack = net.stack();
    stack.dhcp6 = None;
    let mut pxe = BaseCode::new(stack, MockConsole::default(), &stall, ClientIdentity::default());
    assert!(!pxe.mode().ipv6_supported);
    assert_eq!(pxe.start(true).unwrap_err().status(), Status::UNSUPPORTED);
}

#[test]
fn udp_read_skips_unmatched_datagrams() {
    let net = Network::default();
    let server = IpAddr::V4(Ipv4Addr::from(DHCP_SERVER));
    let station = IpAddr::V4(Ipv4Addr::from(CLIENT_IP));
    let datagram = |src_port| UdpDatagram {
        length: 0,
        src_ip: server,
        src_port,
        dest_ip: station,
        dest_port: 4011,
    };
    net.udp.borrow_mut().incoming =
        VecDeque::from([(datagram(69), vec![1]), (datagram(4011), vec![2, 3])]);
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(false).unwrap();

    let mut buffer = [0; 8];
    let flags = UdpOpFlags::ANY_DEST_IP;
    assert_eq!(
        pxe.udp_read(flags, None, None, Some(server), Some(4011), &mut buffer)
            .unwrap_err()
            .status(),
        Status::INVALID_PARAMETER
    );
    let received = pxe
        .udp_read(flags, None, Some(4011), Some(server), Some(4011), &mut buffer)
        .unwrap();
    assert_eq!(received.length, 2);
    assert_eq!(buffer[..2], [2, 3]);
    assert_eq!(
        pxe.udp_read(flags, None, Some(4011), Some(server), Some(4011), &mut buffer)
            .unwrap_err()
            .status(),
        Status::TIMEOUT
    );
}

#[test]
fn udp_write_needs_an_address() {
    let net = Network::default();
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(false).unwrap();

    let dest = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 30));
    let err = pxe
        .udp_write(UdpOpFlags::empty(), dest, 69, None, 2000, b"hdr", b"data")
        .unwrap_err();
    assert_eq!(err.status(), Status::INVALID_PARAMETER);

    pxe.set_station_ip(Some(IpAddr::V4(Ipv4Addr::from(CLIENT_IP))), Some(Ipv4Addr::new(255, 255, 255, 0)))
        .unwrap();
    pxe.udp_write(UdpOpFlags::empty(), dest, 69, None, 2000, b"hdr", b"data")
        .unwrap();
    assert_eq!(net.udp.borrow().written[0], (dest, 69, 2000, b"hdrdata".to_vec()));
}

#[test]
fn ip_filter_is_validated() {
    let net = Network::default();
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(true).unwrap();

    let broadcast = IpFilter {
        filters: IpFilterFlags::BROADCAST,
        addresses: Vec::new(),
    };
    assert_eq!(pxe.set_ip_filter(&broadcast).unwrap_err().status(), Status::INVALID_PARAMETER);

    let too_many = IpFilter {
        filters: IpFilterFlags::STATION_IP,
        addresses: vec![IpAddr::V6(STATION_V6); 9],
    };
    assert_eq!(pxe.set_ip_filter(&too_many).unwrap_err().status(), Status::INVALID_PARAMETER);

    let station = IpFilter {
        filters: IpFilterFlags::STATION_IP,
        addresses: vec![IpAddr::V6(STATION_V6)],
    };
    pxe.set_ip_filter(&station).unwrap();
    assert_eq!(pxe.mode().ip_filter, station);
}

#[test]
fn arp_results_are_cached() {
    let net = Network::default();
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(false).unwrap();

    let ip = Ipv4Addr::new(10, 0, 0, 1);
    let mac = pxe.arp(ip).unwrap();
    assert_eq!(pxe.arp(ip), Ok(mac));
    assert_eq!(net.arp_requests.get(), 1);
    assert_eq!(pxe.mode().arp_cache.len(), 1);

    pxe.set_parameters(&SetParameters {
        auto_arp: Some(false),
        ..SetParameters::default()
    })
    .unwrap();
    pxe.arp(Ipv4Addr::new(10, 0, 0, 2)).unwrap();
    assert_eq!(pxe.mode().arp_cache.len(), 1);

    let err = pxe
        .set_parameters(&SetParameters {
            send_guid: Some(true),
            ..SetParameters::default()
        })
        .unwrap_err();
    assert_eq!(err.status(), Status::INVALID_PARAMETER);
}

#[test]
fn discover_with_bis_is_unsupported() {
    let net = Network::default();
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(false).unwrap();

    let mut layer = 0;
    let err = pxe
        .discover(BootType(0x8000), &mut layer, true, None)
        .unwrap_err();
    assert_eq!(err.status(), Status::UNSUPPORTED);
}

#[test]
fn broadcast_discover_remembers_replying_server() {
    let net = Network::default();
    net.dhcp4.borrow_mut().replies =
        VecDeque::from([Ok(vec![linux_server_reply()]), Ok(vec![linux_server_reply()])]);
    let stall = CountingStall::default();
    let mut pxe = net.base_code(&stall, &[]);
    pxe.start(false).unwrap();

    let info = DiscoverInfo {
        use_mcast: false,
        use_bcast: true,
        use_ucast: false,
        must_use_list: false,
        server_mcast_ip: None,
        servers: Vec::new(),
    };
    let mut layer = 0;
    pxe.discover(BootType(0x8000), &mut layer, false, Some(&info)).unwrap();
    assert!(pxe.mode().pxe_reply_received);

    // The next layer is asked from the server that answered the broadcast.
    let mut layer = 1;
    pxe.discover(BootType(0x8000), &mut layer, false, None).unwrap();
    let dhcp4 = net.dhcp4.borrow();
    let tokens = &dhcp4.tokens;
    assert_eq!(tokens[0].remote_address, Ipv4Addr::BROADCAST);
    assert_eq!(tokens[1].remote_address, Ipv4Addr::new(10, 0, 0, 20));
}
