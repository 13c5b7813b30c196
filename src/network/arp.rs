//! ARP (RFC 826) for Ethernet/IPv4

use byteorder::{BigEndian, ByteOrder};
use std::net::Ipv4Addr;

use crate::error::ParseError;
use crate::network::ethernet::{read_mac, EthernetHeader, MacAddr, ETHERTYPE_ARP, ETHERTYPE_IPV4};

pub const ARP_PACKET_LEN: usize = 28;
pub const ARP_HRD_ETHERNET: u16 = 1;

pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;

/// ARP message for Ethernet hardware and IPv4 protocol addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    pub hrd: u16,
    pub pro: u16,
    pub op: u16,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    /// Parse an ARP message from an Ethernet payload
    ///
    /// Only Ethernet hardware and IPv4 protocol addresses are accepted.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < ARP_PACKET_LEN {
            return Err(ParseError::Truncated {
                layer: "arp",
                needed: ARP_PACKET_LEN,
                available: data.len(),
            });
        }

        let (hln, pln) = (data[4], data[5]);
        if hln != 6 || pln != 4 {
            return Err(ParseError::BadArpSizes { hln, pln });
        }
        let hrd = BigEndian::read_u16(&data[0..2]);
        let pro = BigEndian::read_u16(&data[2..4]);
        if hrd != ARP_HRD_ETHERNET || pro != ETHERTYPE_IPV4 {
            return Err(ParseError::BadArpTypes { hrd, pro });
        }

        Ok(ArpPacket {
            hrd,
            pro,
            op: BigEndian::read_u16(&data[6..8]),
            sender_mac: MacAddr(read_mac(&data[8..14])),
            sender_ip: read_ipv4(&data[14..18]),
            target_mac: MacAddr(read_mac(&data[18..24])),
            target_ip: read_ipv4(&data[24..28]),
        })
    }

    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        ArpPacket {
            hrd: ARP_HRD_ETHERNET,
            pro: ETHERTYPE_IPV4,
            op: ARP_OP_REQUEST,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::ZERO,
            target_ip,
        }
    }

    /// The reply answering this request on behalf of `our_mac`
    pub fn reply_from(&self, our_mac: MacAddr) -> Self {
        ArpPacket {
            hrd: ARP_HRD_ETHERNET,
            pro: ETHERTYPE_IPV4,
            op: ARP_OP_REPLY,
            sender_mac: our_mac,
            sender_ip: self.target_ip,
            target_mac: self.sender_mac,
            target_ip: self.sender_ip,
        }
    }

    pub fn is_request(&self) -> bool {
        self.op == ARP_OP_REQUEST
    }

    pub fn is_reply(&self) -> bool {
        self.op == ARP_OP_REPLY
    }

    pub fn to_bytes(&self) -> [u8; ARP_PACKET_LEN] {
        let mut bytes = [0u8; ARP_PACKET_LEN];
        BigEndian::write_u16(&mut bytes[0..2], self.hrd);
        BigEndian::write_u16(&mut bytes[2..4], self.pro);
        bytes[4] = 6;
        bytes[5] = 4;
        BigEndian::write_u16(&mut bytes[6..8], self.op);
        bytes[8..14].copy_from_slice(&self.sender_mac.0);
        bytes[14..18].copy_from_slice(&self.sender_ip.octets());
        bytes[18..24].copy_from_slice(&self.target_mac.0);
        bytes[24..28].copy_from_slice(&self.target_ip.octets());
        bytes
    }

    /// Wrap the message in an Ethernet frame addressed to `dst`
    pub fn to_frame(&self, dst: MacAddr) -> Vec<u8> {
        let eth = EthernetHeader {
            dst,
            src: self.sender_mac,
            ethertype: ETHERTYPE_ARP,
        };
        let mut frame = Vec::with_capacity(14 + ARP_PACKET_LEN);
        frame.extend_from_slice(&eth.to_bytes());
        frame.extend_from_slice(&self.to_bytes());
        frame
    }
}

pub(crate) fn read_ipv4(data: &[u8]) -> Ipv4Addr {
    Ipv4Addr::new(data[0], data[1], data[2], data[3])
}
