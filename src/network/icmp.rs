//! ICMP (Internet Control Message Protocol) implementation
//!
//! This module provides ICMP header parsing and the Time Exceeded message the
//! router sends when a datagram's TTL runs out. ICMPv6 headers are decoded for
//! inspection only.

use byteorder::{BigEndian, ByteOrder};
use std::net::Ipv4Addr;

use crate::error::ParseError;
use crate::network::checksum::checksum2;
use crate::network::ethernet::{EthernetHeader, MacAddr, ETHERTYPE_IPV4};
use crate::network::ipv4::{protocol, Ipv4Header, Ipv4Packet};

/// Minimum ICMP header length in bytes
pub const ICMP_HEADER_LEN: usize = 8;
pub const ICMPV6_HEADER_LEN: usize = 4;

/// ICMP message types
pub const ICMP_TYPE_ECHO_REPLY: u8 = 0;
pub const ICMP_TYPE_ECHO_REQUEST: u8 = 8;
pub const ICMP_TYPE_TIME_EXCEEDED: u8 = 11;

/// Time Exceeded code: TTL exceeded in transit
pub const ICMP_CODE_TTL_IN_TRANSIT: u8 = 0;

/// Payload bytes of the offending datagram quoted after its header
pub const TIME_EXCEEDED_QUOTE_LEN: usize = 64;

/// ICMP packet header structure
///
/// Represents the standard 8-byte ICMP header as defined in RFC 792
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub msg_type: u8,  // ICMP message type
    pub msg_code: u8,  // ICMP message code
    pub checksum: u16, // ICMP checksum
    pub rest: [u8; 4], // Type-specific data (e.g., identifier and sequence for echo)
}

impl IcmpHeader {
    /// Parse ICMP header from byte slice
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < ICMP_HEADER_LEN {
            return Err(ParseError::Truncated {
                layer: "icmp",
                needed: ICMP_HEADER_LEN,
                available: data.len(),
            });
        }

        let mut rest = [0u8; 4];
        rest.copy_from_slice(&data[4..8]);
        Ok(IcmpHeader {
            msg_type: data[0],
            msg_code: data[1],
            checksum: BigEndian::read_u16(&data[2..4]),
            rest,
        })
    }

    /// Time Exceeded header with a zeroed checksum and unused field
    pub fn time_exceeded() -> Self {
        IcmpHeader {
            msg_type: ICMP_TYPE_TIME_EXCEEDED,
            msg_code: ICMP_CODE_TTL_IN_TRANSIT,
            checksum: 0,
            rest: [0; 4],
        }
    }

    /// Convert ICMP header to bytes
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0] = self.msg_type;
        bytes[1] = self.msg_code;
        BigEndian::write_u16(&mut bytes[2..4], self.checksum);
        bytes[4..8].copy_from_slice(&self.rest);
        bytes
    }

    /// Check if this is an Echo Request message
    pub fn is_echo_request(&self) -> bool {
        self.msg_type == ICMP_TYPE_ECHO_REQUEST
    }

    /// Check if this is an Echo Reply message
    pub fn is_echo_reply(&self) -> bool {
        self.msg_type == ICMP_TYPE_ECHO_REPLY
    }

    /// Get the identifier field for Echo Request/Reply messages
    pub fn identifier(&self) -> u16 {
        BigEndian::read_u16(&self.rest[0..2])
    }

    /// Get the sequence number field for Echo Request/Reply messages
    pub fn sequence(&self) -> u16 {
        BigEndian::read_u16(&self.rest[2..4])
    }
}

/// ICMPv6 header: type, code, checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Icmpv6Header {
    pub msg_type: u8,
    pub msg_code: u8,
    pub checksum: u16,
}

impl Icmpv6Header {
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < ICMPV6_HEADER_LEN {
            return Err(ParseError::Truncated {
                layer: "icmpv6",
                needed: ICMPV6_HEADER_LEN,
                available: data.len(),
            });
        }
        Ok(Icmpv6Header {
            msg_type: data[0],
            msg_code: data[1],
            checksum: BigEndian::read_u16(&data[2..4]),
        })
    }
}

/// Build the Ethernet frame carrying an ICMP Time Exceeded message
///
/// The message quotes the offending datagram's header, options included, and
/// at most the first 64 bytes of its payload. It is addressed back to the
/// datagram's source through the station that handed it to us.
pub fn build_time_exceeded(
    our_mac: MacAddr,
    our_ip: Ipv4Addr,
    peer_mac: MacAddr,
    original: &Ipv4Packet<'_>,
) -> Vec<u8> {
    let quote_len = original.payload.len().min(TIME_EXCEEDED_QUOTE_LEN);
    let mut quote = Vec::with_capacity(original.header_len() + quote_len);
    quote.extend_from_slice(original.raw_header);
    quote.extend_from_slice(original.options);
    quote.extend_from_slice(&original.payload[..quote_len]);

    let mut icmp = IcmpHeader::time_exceeded();
    icmp.checksum = checksum2(&icmp.to_bytes(), &quote);

    let icmp_len = (ICMP_HEADER_LEN + quote.len()) as u16;
    let mut ip = Ipv4Header::new_simple(protocol::ICMP, our_ip, original.header.src_addr, icmp_len);
    ip.update_checksum();

    let eth = EthernetHeader {
        dst: peer_mac,
        src: our_mac,
        ethertype: ETHERTYPE_IPV4,
    };

    let mut frame = Vec::with_capacity(14 + ip.total_len as usize);
    frame.extend_from_slice(&eth.to_bytes());
    frame.extend_from_slice(&ip.to_bytes());
    frame.extend_from_slice(&icmp.to_bytes());
    frame.extend_from_slice(&quote);
    frame
}
