//! IPv4 protocol implementation
//!
//! This module provides IPv4 header parsing with options, checksum
//! validation and the in-place rewrite applied to forwarded datagrams.
//!
//! Features:
//! - Header and options decoding with bounds checks
//! - Checksum calculation over header and options
//! - Header creation for locally generated datagrams
//! - TTL/checksum rewrite of a datagram inside an Ethernet frame

use std::net::Ipv4Addr;

use crate::error::ParseError;
use crate::network::arp::read_ipv4;
use crate::network::checksum::{checksum, checksum2, verify_ipv4_header};
use crate::network::ethernet::ETHERNET_HEADER_LEN;
use byteorder::{BigEndian, ByteOrder};

pub const IPV4_HEADER_LEN: usize = 20;
/// Options this long or longer are refused outright
pub const MAX_OPTIONS_LEN: usize = 1500;

const IPV4_VERSION: u8 = 4;
const DEFAULT_IHL: u8 = 5; // 5 * 4 = 20 bytes (standard header length)
pub const DEFAULT_TTL: u8 = 64;

/// IPv4 packet header structure
///
/// Represents the fixed 20-byte IPv4 header as defined in RFC 791
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    pub ihl: u8, // Internet Header Length
    pub tos: u8, // Type of Service
    pub total_len: u16,
    pub id: u16,
    pub flags_frag_offset: u16, // Flags and Fragment Offset
    pub ttl: u8,                // Time to Live
    pub protocol: u8,           // Next Protocol
    pub checksum: u16,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
}

/// A decoded IPv4 datagram borrowing from the receive buffer
#[derive(Debug, Clone)]
pub struct Ipv4Packet<'a> {
    pub header: Ipv4Header,
    /// The raw fixed header, checksum field included
    pub raw_header: &'a [u8],
    pub options: &'a [u8],
    pub payload: &'a [u8],
}

impl Ipv4Header {
    /// Create a header for a locally generated datagram without options
    ///
    /// The checksum is left at zero; call `update_checksum` once all fields are final.
    pub fn new_simple(protocol: u8, src_addr: Ipv4Addr, dst_addr: Ipv4Addr, payload_len: u16) -> Self {
        Ipv4Header {
            version: IPV4_VERSION,
            ihl: DEFAULT_IHL,
            tos: 0,
            total_len: IPV4_HEADER_LEN as u16 + payload_len,
            id: 0,
            flags_frag_offset: 0,
            ttl: DEFAULT_TTL,
            protocol,
            checksum: 0,
            src_addr,
            dst_addr,
        }
    }

    /// Parse the fixed 20-byte header from a byte slice
    ///
    /// Nothing beyond the fixed header is inspected; use `Ipv4Packet::parse`
    /// to decode options and payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < IPV4_HEADER_LEN {
            return Err(ParseError::Truncated {
                layer: "ipv4",
                needed: IPV4_HEADER_LEN,
                available: data.len(),
            });
        }

        Ok(Ipv4Header {
            version: (data[0] & 0xF0) >> 4,
            ihl: data[0] & 0x0F,
            tos: data[1],
            total_len: BigEndian::read_u16(&data[2..4]),
            id: BigEndian::read_u16(&data[4..6]),
            flags_frag_offset: BigEndian::read_u16(&data[6..8]),
            ttl: data[8],
            protocol: data[9],
            checksum: BigEndian::read_u16(&data[10..12]),
            src_addr: read_ipv4(&data[12..16]),
            dst_addr: read_ipv4(&data[16..20]),
        })
    }

    /// Recalculate the checksum field for a header without options
    pub fn update_checksum(&mut self) {
        self.checksum = 0;
        self.checksum = checksum(&self.to_bytes());
    }

    /// Convert IPv4 header to bytes
    ///
    /// Serializes the fixed header to a 20-byte array ready for transmission
    pub fn to_bytes(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut bytes = [0u8; IPV4_HEADER_LEN];
        bytes[0] = (self.version << 4) | self.ihl;
        bytes[1] = self.tos;
        BigEndian::write_u16(&mut bytes[2..4], self.total_len);
        BigEndian::write_u16(&mut bytes[4..6], self.id);
        BigEndian::write_u16(&mut bytes[6..8], self.flags_frag_offset);
        bytes[8] = self.ttl;
        bytes[9] = self.protocol;
        BigEndian::write_u16(&mut bytes[10..12], self.checksum);
        bytes[12..16].copy_from_slice(&self.src_addr.octets());
        bytes[16..20].copy_from_slice(&self.dst_addr.octets());

        bytes
    }

    /// Get the header length in bytes, options included
    pub fn header_len(&self) -> usize {
        (self.ihl as usize) * 4
    }

    /// Get the options length in bytes
    pub fn options_len(&self) -> usize {
        self.header_len().saturating_sub(IPV4_HEADER_LEN)
    }
}

impl<'a> Ipv4Packet<'a> {
    /// Decode header, options and payload
    ///
    /// The option length is checked against `MAX_OPTIONS_LEN` and against the
    /// bytes actually present before it is trusted, and so is the total
    /// length. Bytes past the total length are Ethernet padding and dropped.
    pub fn parse(data: &'a [u8]) -> Result<Self, ParseError> {
        let header = Ipv4Header::from_bytes(data)?;
        if header.version != IPV4_VERSION {
            return Err(ParseError::BadVersion(header.version));
        }
        if header.ihl < DEFAULT_IHL {
            return Err(ParseError::BadHeaderLength(header.ihl));
        }

        let options_len = header.options_len();
        if options_len >= MAX_OPTIONS_LEN {
            return Err(ParseError::OptionsTooLong(options_len));
        }
        let rest = &data[IPV4_HEADER_LEN..];
        if options_len > rest.len() {
            return Err(ParseError::Truncated {
                layer: "ipv4 options",
                needed: options_len,
                available: rest.len(),
            });
        }

        let (options, rest) = rest.split_at(options_len);
        let header_len = header.header_len();
        if (header.total_len as usize) < header_len {
            return Err(ParseError::BadTotalLength {
                total_len: header.total_len,
                header_len,
            });
        }
        let payload_len = header.total_len as usize - header_len;
        if payload_len > rest.len() {
            return Err(ParseError::Truncated {
                layer: "ipv4 payload",
                needed: payload_len,
                available: rest.len(),
            });
        }
        let payload = &rest[..payload_len];

        Ok(Ipv4Packet {
            header,
            raw_header: &data[..IPV4_HEADER_LEN],
            options,
            payload,
        })
    }

    /// Validate the header checksum over header and options
    pub fn checksum_ok(&self) -> bool {
        verify_ipv4_header(self.raw_header, self.options)
    }

    /// Header length including options
    pub fn header_len(&self) -> usize {
        IPV4_HEADER_LEN + self.options.len()
    }
}

/// Set the TTL of the datagram carried in `frame` and refresh its checksum
///
/// `frame` is a full Ethernet frame whose IPv4 header (and options) were
/// already validated. The checksum covers the fixed header and options.
pub fn rewrite_ttl(frame: &mut [u8], ttl: u8) {
    let ip = &mut frame[ETHERNET_HEADER_LEN..];
    let header_len = ((ip[0] & 0x0F) as usize) * 4;
    ip[8] = ttl;
    ip[10..12].copy_from_slice(&[0, 0]);
    let (fixed, rest) = ip.split_at(IPV4_HEADER_LEN);
    let sum = checksum2(fixed, &rest[..header_len - IPV4_HEADER_LEN]);
    ip[10..12].copy_from_slice(&sum.to_be_bytes());
}

/// IPv4 protocol constants
pub mod protocol {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
    pub const ICMPV6: u8 = 58;
}
