use std::io::{self, Read};
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::{UnixDatagram, UnixStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use toy_router::network::arp::ArpPacket;
use toy_router::network::checksum::{checksum, checksum2, is_valid};
use toy_router::network::ethernet::{EthernetHeader, ETHERTYPE_IPV4};
use toy_router::network::icmp::{IcmpHeader, ICMP_CODE_TTL_IN_TRANSIT, ICMP_TYPE_TIME_EXCEEDED};
use toy_router::network::ipv4::{protocol, Ipv4Header, Ipv4Packet};
use toy_router::{ForwardError, FrameIo, Interface, MacAddr, ParseError, Router, RouterError, Verdict};

const MAC0: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x10]);
const MAC1: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x11]);
const HOST0: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x20]);
const PEER: MacAddr = MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

const ADDR0: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const ADDR1: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 1);
const GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 250);

/// In-memory port: frames are fed through a datagram socket pair so the
/// dispatcher can poll it, and everything sent is recorded.
struct MockPort {
    inbox: UnixDatagram,
    feeder: UnixDatagram,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockPort {
    fn new() -> Arc<Self> {
        let (inbox, feeder) = UnixDatagram::pair().unwrap();
        inbox.set_nonblocking(true).unwrap();
        Arc::new(MockPort {
            inbox,
            feeder,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn feed(&self, frame: &[u8]) {
        self.feeder.send(frame).unwrap();
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl FrameIo for MockPort {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.inbox.recv(buf)
    }

    fn send(&self, frame: &[u8]) -> io::Result<usize> {
        self.sent.lock().unwrap().push(frame.to_vec());
        Ok(frame.len())
    }

    fn raw_fd(&self) -> RawFd {
        self.inbox.as_raw_fd()
    }
}

fn setup() -> (Router, Arc<MockPort>, Arc<MockPort>) {
    let _ = tracing_subscriber::fmt::try_init();
    let (port0, port1) = (MockPort::new(), MockPort::new());
    let mask = Ipv4Addr::new(255, 255, 255, 0);
    let if0 = Interface::new("mock0", MAC0, ADDR0, mask, Box::new(port0.clone()));
    let if1 = Interface::new("mock1", MAC1, ADDR1, mask, Box::new(port1.clone()));
    (Router::with_interfaces([if0, if1], GATEWAY), port0, port1)
}

/// UDP-sized datagram from `src` to `dst` wrapped in a frame for `router_mac`
fn datagram(router_mac: MacAddr, src_mac: MacAddr, src: Ipv4Addr, dst: Ipv4Addr, ttl: u8, id: u16) -> Vec<u8> {
    let payload = [0x5a; 32];
    let mut ip = Ipv4Header::new_simple(protocol::UDP, src, dst, payload.len() as u16);
    ip.ttl = ttl;
    ip.id = id;
    ip.update_checksum();

    let mut frame = EthernetHeader {
        dst: router_mac,
        src: src_mac,
        ethertype: ETHERTYPE_IPV4,
    }
    .to_bytes()
    .to_vec();
    frame.extend_from_slice(&ip.to_bytes());
    frame.extend_from_slice(&payload);
    frame
}

/// ARP reply from `peer_ip`/`peer_mac` to the router port `router_mac`/`router_ip`
fn arp_reply(router_mac: MacAddr, router_ip: Ipv4Addr, peer_mac: MacAddr, peer_ip: Ipv4Addr) -> Vec<u8> {
    ArpPacket::request(router_mac, router_ip, peer_ip)
        .reply_from(peer_mac)
        .to_frame(router_mac)
}

fn ip_of(frame: &[u8]) -> Ipv4Packet<'_> {
    let (_, rest) = EthernetHeader::parse(frame).unwrap();
    Ipv4Packet::parse(rest).unwrap()
}

#[test]
fn test_ttl_one_gets_time_exceeded() {
    let (router, port0, port1) = setup();
    let src = Ipv4Addr::new(10, 0, 0, 5);
    let frame = datagram(MAC0, HOST0, src, Ipv4Addr::new(10, 0, 1, 9), 1, 7);

    assert_eq!(router.handle_frame(0, &frame, Instant::now()), Ok(Verdict::TimeExceeded));

    assert!(port1.sent().is_empty());
    let sent = port0.take();
    assert_eq!(sent.len(), 1);

    let (eth, _) = EthernetHeader::parse(&sent[0]).unwrap();
    assert_eq!(eth.dst, HOST0);
    assert_eq!(eth.src, MAC0);

    let ip = ip_of(&sent[0]);
    assert!(ip.checksum_ok());
    assert_eq!(ip.header.ttl, 64);
    assert_eq!(ip.header.protocol, protocol::ICMP);
    assert_eq!(ip.header.src_addr, ADDR0);
    assert_eq!(ip.header.dst_addr, src);

    let icmp = IcmpHeader::from_bytes(ip.payload).unwrap();
    assert_eq!(icmp.msg_type, ICMP_TYPE_TIME_EXCEEDED);
    assert_eq!(icmp.msg_code, ICMP_CODE_TTL_IN_TRANSIT);
    assert!(is_valid(checksum(ip.payload)));
    // original header and its whole 32-byte payload are quoted
    assert_eq!(&ip.payload[8..], &frame[14..]);

    // nothing was learned or queued
    assert!(router.cache(1).lock().get(Ipv4Addr::new(10, 0, 1, 9)).is_none());
}

#[test]
fn test_ttl_zero_also_expires() {
    let (router, port0, port1) = setup();
    let frame = datagram(MAC0, HOST0, Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 1, 9), 0, 7);
    assert_eq!(router.handle_frame(0, &frame, Instant::now()), Ok(Verdict::TimeExceeded));
    assert_eq!(port0.sent().len(), 1);
    assert!(port1.sent().is_empty());
}

#[test]
fn test_ttl_two_is_forwarded_with_ttl_one() {
    let (router, port0, port1) = setup();
    let now = Instant::now();
    let dst = Ipv4Addr::new(10, 0, 1, 9);
    router
        .handle_frame(1, &arp_reply(MAC1, ADDR1, PEER, dst), now)
        .unwrap();

    let frame = datagram(MAC0, HOST0, Ipv4Addr::new(10, 0, 0, 5), dst, 2, 7);
    assert_eq!(
        router.handle_frame(0, &frame, now),
        Ok(Verdict::Forwarded {
            device: 1,
            next_hop: dst
        })
    );

    assert!(port0.sent().is_empty());
    let sent = port1.take();
    assert_eq!(sent.len(), 1);
    let (eth, _) = EthernetHeader::parse(&sent[0]).unwrap();
    assert_eq!(eth.dst, PEER);
    assert_eq!(eth.src, MAC1);

    let ip = ip_of(&sent[0]);
    assert_eq!(ip.header.ttl, 1);
    assert!(ip.checksum_ok());
    assert_eq!(ip.header.src_addr, Ipv4Addr::new(10, 0, 0, 5));
    assert_eq!(ip.payload, &frame[34..]);
}

#[test]
fn test_queued_frames_flush_in_order() {
    let (router, _port0, port1) = setup();
    let now = Instant::now();
    let dst = Ipv4Addr::new(10, 0, 1, 9);

    for id in 1..=3 {
        let frame = datagram(MAC0, HOST0, Ipv4Addr::new(10, 0, 0, 5), dst, 64, id);
        let verdict = router.handle_frame(0, &frame, now).unwrap();
        assert_eq!(
            verdict,
            Verdict::Queued {
                device: 1,
                next_hop: dst,
                arp_request_sent: id == 1
            }
        );
    }

    // a single ARP request went out
    let sent = port1.take();
    assert_eq!(sent.len(), 1);
    let request = ArpPacket::parse(&sent[0][14..]).unwrap();
    assert_eq!(request.target_ip, dst);

    router
        .handle_frame(1, &arp_reply(MAC1, ADDR1, PEER, dst), now)
        .unwrap();
    assert_eq!(router.send_queue().len(), 1);
    // a second observation does not duplicate the notification
    router
        .handle_frame(1, &arp_reply(MAC1, ADDR1, PEER, dst), now)
        .unwrap();
    assert_eq!(router.send_queue().len(), 1);

    assert_eq!(router.flush_ready(), 3);
    let flushed = port1.take();
    let ids: Vec<u16> = flushed.iter().map(|frame| ip_of(frame).header.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    for frame in &flushed {
        assert_eq!(&frame[0..6], &PEER.0);
        assert_eq!(ip_of(frame).header.ttl, 63);
        assert!(ip_of(frame).checksum_ok());
    }

    // later datagrams go straight out
    let frame = datagram(MAC0, HOST0, Ipv4Addr::new(10, 0, 0, 5), dst, 64, 4);
    assert!(matches!(router.handle_frame(0, &frame, now), Ok(Verdict::Forwarded { .. })));
}

#[test]
fn test_options_survive_forwarding() {
    let (router, _port0, port1) = setup();
    let now = Instant::now();
    let dst = Ipv4Addr::new(10, 0, 1, 9);
    router
        .handle_frame(1, &arp_reply(MAC1, ADDR1, PEER, dst), now)
        .unwrap();

    let options = [0x94, 0x04, 0x00, 0x00];
    let mut ip = Ipv4Header::new_simple(protocol::UDP, Ipv4Addr::new(10, 0, 0, 5), dst, 12);
    ip.ihl = 6;
    ip.checksum = checksum2(&ip.to_bytes(), &options);
    let mut frame = EthernetHeader {
        dst: MAC0,
        src: HOST0,
        ethertype: ETHERTYPE_IPV4,
    }
    .to_bytes()
    .to_vec();
    frame.extend_from_slice(&ip.to_bytes());
    frame.extend_from_slice(&options);
    frame.extend_from_slice(&[1; 8]);

    router.handle_frame(0, &frame, now).unwrap();
    let sent = port1.take();
    let forwarded = ip_of(&sent[0]);
    assert_eq!(forwarded.options, &options);
    assert_eq!(forwarded.header.ttl, 63);
    assert!(forwarded.checksum_ok());
}

#[test]
fn test_unknown_destination_uses_gateway() {
    let (router, _port0, port1) = setup();
    let frame = datagram(MAC0, HOST0, Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(192, 0, 2, 1), 64, 1);
    assert_eq!(
        router.handle_frame(0, &frame, Instant::now()),
        Ok(Verdict::Queued {
            device: 1,
            next_hop: GATEWAY,
            arp_request_sent: true
        })
    );
    let request = ArpPacket::parse(&port1.take()[0][14..]).unwrap();
    assert_eq!(request.target_ip, GATEWAY);
}

#[test]
fn test_short_frame_is_rejected() {
    let (router, port0, port1) = setup();
    let result = router.handle_frame(0, &[0xff; 13], Instant::now());
    assert_eq!(
        result,
        Err(ForwardError::Malformed(ParseError::Truncated {
            layer: "ethernet",
            needed: 14,
            available: 13
        }))
    );
    assert!(port0.sent().is_empty());
    assert!(port1.sent().is_empty());
    assert_eq!(router.cache(0).lock().capacity(), 0);
    assert_eq!(router.cache(1).lock().capacity(), 0);
}

#[test]
fn test_bad_checksum_is_dropped() {
    let (router, port0, port1) = setup();
    let src = Ipv4Addr::new(10, 0, 0, 5);
    let mut frame = datagram(MAC0, HOST0, src, Ipv4Addr::new(10, 0, 1, 9), 64, 1);
    frame[24] ^= 0x01;

    assert_eq!(
        router.handle_frame(0, &frame, Instant::now()),
        Err(ForwardError::ChecksumMismatch(src))
    );
    assert!(port0.sent().is_empty());
    assert!(port1.sent().is_empty());
    assert_eq!(router.cache(1).lock().capacity(), 0);
}

#[test]
fn test_truncated_options_are_rejected() {
    let (router, _port0, port1) = setup();
    let mut frame = datagram(MAC0, HOST0, Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 1, 9), 64, 1);
    frame.truncate(14 + 20);
    frame[14] = 0x4f;
    assert!(matches!(
        router.handle_frame(0, &frame, Instant::now()),
        Err(ForwardError::Malformed(ParseError::Truncated { .. }))
    ));
    assert!(port1.sent().is_empty());
}

#[test]
fn test_total_length_must_match_the_frame() {
    let (router, port0, port1) = setup();
    let now = Instant::now();
    let dst = Ipv4Addr::new(10, 0, 1, 9);
    router
        .handle_frame(1, &arp_reply(MAC1, ADDR1, PEER, dst), now)
        .unwrap();

    // claims 1500 bytes, carries 52
    let mut frame = datagram(MAC0, HOST0, Ipv4Addr::new(10, 0, 0, 5), dst, 64, 1);
    frame[16..18].copy_from_slice(&1500u16.to_be_bytes());
    assert_eq!(
        router.handle_frame(0, &frame, now),
        Err(ForwardError::Malformed(ParseError::Truncated {
            layer: "ipv4 payload",
            needed: 1480,
            available: 32
        }))
    );

    frame[16..18].copy_from_slice(&12u16.to_be_bytes());
    assert_eq!(
        router.handle_frame(0, &frame, now),
        Err(ForwardError::Malformed(ParseError::BadTotalLength {
            total_len: 12,
            header_len: 20
        }))
    );

    assert!(port0.sent().is_empty());
    assert!(port1.sent().is_empty());
}

#[test]
fn test_unanswered_request_is_retried_after_a_second() {
    let (router, _port0, port1) = setup();
    let start = Instant::now();
    let src = Ipv4Addr::new(10, 0, 0, 5);
    let dst = Ipv4Addr::new(10, 0, 1, 9);
    let queued = |arp_request_sent: bool| -> Result<Verdict, ForwardError> {
        Ok(Verdict::Queued {
            device: 1,
            next_hop: dst,
            arp_request_sent,
        })
    };

    let first = datagram(MAC0, HOST0, src, dst, 64, 1);
    assert_eq!(router.handle_frame(0, &first, start), queued(true));
    let second = datagram(MAC0, HOST0, src, dst, 64, 2);
    assert_eq!(
        router.handle_frame(0, &second, start + Duration::from_millis(500)),
        queued(false)
    );

    // the negative entry has aged out: its queue is dropped and a new request goes out
    let third = datagram(MAC0, HOST0, src, dst, 64, 3);
    let later = start + Duration::from_millis(1500);
    assert_eq!(router.handle_frame(0, &third, later), queued(true));

    let requests = port1.take();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        let request = ArpPacket::parse(&request[14..]).unwrap();
        assert!(request.is_request());
        assert_eq!(request.target_ip, dst);
    }
    assert_eq!(router.cache(1).lock().get(dst).map(|e| e.pending.len()), Some(1));

    router
        .handle_frame(1, &arp_reply(MAC1, ADDR1, PEER, dst), later + Duration::from_millis(100))
        .unwrap();
    assert_eq!(router.flush_ready(), 1);
    let flushed = port1.take();
    assert_eq!(flushed.len(), 1);
    assert_eq!(ip_of(&flushed[0]).header.id, 3);
}

/// Port over a stream socket whose peer may already be gone
struct StreamPort(UnixStream);

impl FrameIo for StreamPort {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.0).read(buf)
    }

    fn send(&self, frame: &[u8]) -> io::Result<usize> {
        Ok(frame.len())
    }

    fn raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

#[test]
fn test_hung_up_port_stops_the_router() {
    let _ = tracing_subscriber::fmt::try_init();
    let (end, peer) = UnixStream::pair().unwrap();
    end.set_nonblocking(true).unwrap();
    drop(peer);

    let mask = Ipv4Addr::new(255, 255, 255, 0);
    let if0 = Interface::new("gone0", MAC0, ADDR0, mask, Box::new(StreamPort(end)));
    let if1 = Interface::new("mock1", MAC1, ADDR1, mask, Box::new(MockPort::new()));
    let router = Router::with_interfaces([if0, if1], GATEWAY);

    match router.run() {
        Err(RouterError::Hangup(name)) => assert_eq!(name, "gone0"),
        other => panic!("unexpected result {:?}", other),
    }
}

fn wait_for(port: &MockPort, count: usize) -> Vec<Vec<u8>> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let sent = port.sent();
        if sent.len() >= count || Instant::now() > deadline {
            return sent;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_end_to_end_arp_reply_releases_queued_frame() {
    let (router, port0, port1) = setup();
    let dst = Ipv4Addr::new(10, 0, 0, 5);
    let frame = datagram(MAC1, MAC0, Ipv4Addr::new(10, 0, 1, 9), dst, 17, 42);

    let (request, sent) = thread::scope(|scope| {
        let running = scope.spawn(|| router.run());

        port1.feed(&frame);
        let request = wait_for(&port0, 1);
        port0.feed(&arp_reply(MAC0, ADDR0, PEER, dst));
        let sent = wait_for(&port0, 2);

        router.stop();
        running.join().unwrap().unwrap();
        (request, sent)
    });

    assert_eq!(request.len(), 1);
    let request = ArpPacket::parse(&request[0][14..]).unwrap();
    assert!(request.is_request());
    assert_eq!(request.target_ip, dst);

    assert_eq!(sent.len(), 2);
    let (eth, _) = EthernetHeader::parse(&sent[1]).unwrap();
    assert_eq!(eth.dst, PEER);
    assert_eq!(eth.src, MAC0);
    let ip = ip_of(&sent[1]);
    assert_eq!(ip.header.id, 42);
    assert_eq!(ip.header.ttl, 16);
    assert!(ip.checksum_ok());
    assert!(port1.sent().is_empty());
}
