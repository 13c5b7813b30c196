//! Frame inspection for debug dumps
//!
//! `inspect` decodes a received frame down to the transport header and checks
//! every checksum it finds on the way. Nothing here is on the forwarding path;
//! the dispatcher only calls it when debugging is enabled.

use std::fmt;
use std::net::IpAddr;

use crate::error::ParseError;
use crate::network::arp::ArpPacket;
use crate::network::checksum::{checksum, is_valid, verify_ipv6_payload};
use crate::network::ethernet::{EthernetHeader, ETHERTYPE_ARP, ETHERTYPE_IPV4, ETHERTYPE_IPV6};
use crate::network::icmp::{IcmpHeader, Icmpv6Header};
use crate::network::ipv4::{protocol, Ipv4Header, Ipv4Packet};
use crate::network::ipv6::Ipv6Header;
use crate::transport::{tcp, udp, TcpHeader, UdpHeader};

/// Network layer of an inspected frame
#[derive(Debug, Clone)]
pub enum Network {
    Arp(ArpPacket),
    Ipv4 { header: Ipv4Header, checksum_ok: bool },
    Ipv6(Ipv6Header),
    Other(u16),
}

/// Transport layer of an inspected datagram, with its checksum verdict
#[derive(Debug, Clone)]
pub enum Transport {
    Icmp { header: IcmpHeader, checksum_ok: bool },
    Icmpv6 { header: Icmpv6Header, checksum_ok: bool },
    Tcp { header: TcpHeader, checksum_ok: bool },
    Udp { header: UdpHeader, checksum_ok: bool },
    Other(u8),
}

#[derive(Debug, Clone)]
pub struct Inspection {
    pub ethernet: EthernetHeader,
    pub network: Network,
    pub transport: Option<Transport>,
}

/// Decode a frame as deep as the router understands it
pub fn inspect(frame: &[u8]) -> Result<Inspection, ParseError> {
    let (ethernet, rest) = EthernetHeader::parse(frame)?;

    let (network, transport) = match ethernet.ethertype {
        ETHERTYPE_ARP => (Network::Arp(ArpPacket::parse(rest)?), None),
        ETHERTYPE_IPV4 => {
            let packet = Ipv4Packet::parse(rest)?;
            let src = IpAddr::V4(packet.header.src_addr);
            let dst = IpAddr::V4(packet.header.dst_addr);
            let transport = match packet.header.protocol {
                protocol::ICMP => Transport::Icmp {
                    header: IcmpHeader::from_bytes(packet.payload)?,
                    checksum_ok: is_valid(checksum(packet.payload)),
                },
                other => transport_for(other, src, dst, packet.payload)?,
            };
            let network = Network::Ipv4 {
                checksum_ok: packet.checksum_ok(),
                header: packet.header,
            };
            (network, Some(transport))
        }
        ETHERTYPE_IPV6 => {
            let (header, payload) = Ipv6Header::parse(rest)?;
            let transport = match header.next_header {
                protocol::ICMPV6 => Transport::Icmpv6 {
                    header: Icmpv6Header::from_bytes(payload)?,
                    checksum_ok: verify_ipv6_payload(
                        header.src_addr,
                        header.dst_addr,
                        protocol::ICMPV6,
                        payload,
                    ),
                },
                other => transport_for(
                    other,
                    IpAddr::V6(header.src_addr),
                    IpAddr::V6(header.dst_addr),
                    payload,
                )?,
            };
            (Network::Ipv6(header), Some(transport))
        }
        other => (Network::Other(other), None),
    };

    Ok(Inspection {
        ethernet,
        network,
        transport,
    })
}

fn transport_for(proto: u8, src: IpAddr, dst: IpAddr, payload: &[u8]) -> Result<Transport, ParseError> {
    Ok(match proto {
        protocol::TCP => Transport::Tcp {
            header: TcpHeader::from_bytes(payload)?,
            checksum_ok: tcp::verify_checksum(src, dst, payload),
        },
        protocol::UDP => Transport::Udp {
            header: UdpHeader::from_bytes(payload)?,
            checksum_ok: udp::verify_checksum(src, dst, payload),
        },
        other => Transport::Other(other),
    })
}

fn verdict(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "BAD"
    }
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ether {} > {} type {:#06x}",
            self.ethernet.src, self.ethernet.dst, self.ethernet.ethertype
        )?;

        match &self.network {
            Network::Arp(arp) => write!(
                f,
                " | arp op {} {} ({}) > {} ({})",
                arp.op, arp.sender_ip, arp.sender_mac, arp.target_ip, arp.target_mac
            )?,
            Network::Ipv4 { header, checksum_ok } => write!(
                f,
                " | ip {} > {} ttl {} proto {} len {} sum {}",
                header.src_addr,
                header.dst_addr,
                header.ttl,
                header.protocol,
                header.total_len,
                verdict(*checksum_ok)
            )?,
            Network::Ipv6(header) => write!(
                f,
                " | ip6 {} > {} hlim {} next {} len {}",
                header.src_addr, header.dst_addr, header.hop_limit, header.next_header, header.payload_len
            )?,
            Network::Other(_) => {}
        }

        match &self.transport {
            Some(Transport::Icmp { header, checksum_ok }) => {
                write!(f, " | icmp type {} code {}", header.msg_type, header.msg_code)?;
                if header.is_echo_request() || header.is_echo_reply() {
                    write!(f, " id {} seq {}", header.identifier(), header.sequence())?;
                }
                write!(f, " sum {}", verdict(*checksum_ok))
            }
            Some(Transport::Icmpv6 { header, checksum_ok }) => write!(
                f,
                " | icmp6 type {} code {} sum {}",
                header.msg_type,
                header.msg_code,
                verdict(*checksum_ok)
            ),
            Some(Transport::Tcp { header, checksum_ok }) => write!(
                f,
                " | tcp {} > {} [{}] seq {} sum {}",
                header.src_port,
                header.dst_port,
                header.flag_letters(),
                header.seq_number,
                verdict(*checksum_ok)
            ),
            Some(Transport::Udp { header, checksum_ok }) => write!(
                f,
                " | udp {} > {} len {} sum {}",
                header.src_port,
                header.dst_port,
                header.length,
                verdict(*checksum_ok)
            ),
            Some(Transport::Other(proto)) => write!(f, " | proto {}", proto),
            None => Ok(()),
        }
    }
}
