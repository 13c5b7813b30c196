//! UDP (User Datagram Protocol) header decoding
//!
//! The router never terminates UDP; headers are decoded and their checksums
//! verified when received traffic is inspected.

use byteorder::{BigEndian, ByteOrder};
use std::net::IpAddr;

use crate::error::ParseError;
use crate::network::checksum::{verify_ipv4_payload, verify_ipv6_payload};
use crate::network::ipv4::protocol;

/// UDP header length in bytes
pub const UDP_HEADER_LEN: usize = 8;

/// UDP packet header structure
///
/// Represents the standard 8-byte UDP header as defined in RFC 768
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16, // Length of UDP header and data
    pub checksum: u16,
}

impl UdpHeader {
    /// Parse UDP header from byte slice
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < UDP_HEADER_LEN {
            return Err(ParseError::Truncated {
                layer: "udp",
                needed: UDP_HEADER_LEN,
                available: data.len(),
            });
        }

        Ok(UdpHeader {
            src_port: BigEndian::read_u16(&data[0..2]),
            dst_port: BigEndian::read_u16(&data[2..4]),
            length: BigEndian::read_u16(&data[4..6]),
            checksum: BigEndian::read_u16(&data[6..8]),
        })
    }

    /// Convert UDP header to bytes
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        BigEndian::write_u16(&mut bytes[0..2], self.src_port);
        BigEndian::write_u16(&mut bytes[2..4], self.dst_port);
        BigEndian::write_u16(&mut bytes[4..6], self.length);
        BigEndian::write_u16(&mut bytes[6..8], self.checksum);
        bytes
    }
}

/// Verify the checksum of a UDP datagram
///
/// Over IPv4 a zero checksum field means the sender did not compute one.
/// Mixed address families never validate.
pub fn verify_checksum(src: IpAddr, dst: IpAddr, datagram: &[u8]) -> bool {
    match (src, dst) {
        (IpAddr::V4(src), IpAddr::V4(dst)) => {
            let unused = datagram.len() >= UDP_HEADER_LEN && datagram[6..8] == [0, 0];
            unused || verify_ipv4_payload(src, dst, protocol::UDP, datagram)
        }
        (IpAddr::V6(src), IpAddr::V6(dst)) => verify_ipv6_payload(src, dst, protocol::UDP, datagram),
        _ => false,
    }
}
