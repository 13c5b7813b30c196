//! IPv6 header decoding
//!
//! IPv6 traffic is never forwarded; the header is decoded so received
//! datagrams can be inspected and their upper-layer checksums verified.

use byteorder::{BigEndian, ByteOrder};
use std::net::Ipv6Addr;

use crate::error::ParseError;

pub const IPV6_HEADER_LEN: usize = 40;

/// Fixed IPv6 header (RFC 2460)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6Header {
    pub version: u8,
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_len: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub src_addr: Ipv6Addr,
    pub dst_addr: Ipv6Addr,
}

impl Ipv6Header {
    /// Parse the header, returning it with the payload it announces
    ///
    /// Extension headers are not walked: the payload starts right after the
    /// fixed header and is cut at `payload_len`, which must fit the buffer.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), ParseError> {
        if data.len() < IPV6_HEADER_LEN {
            return Err(ParseError::Truncated {
                layer: "ipv6",
                needed: IPV6_HEADER_LEN,
                available: data.len(),
            });
        }

        let first = BigEndian::read_u32(&data[0..4]);
        let header = Ipv6Header {
            version: (first >> 28) as u8,
            traffic_class: ((first >> 20) & 0xFF) as u8,
            flow_label: first & 0x000F_FFFF,
            payload_len: BigEndian::read_u16(&data[4..6]),
            next_header: data[6],
            hop_limit: data[7],
            src_addr: read_ipv6(&data[8..24]),
            dst_addr: read_ipv6(&data[24..40]),
        };

        let rest = &data[IPV6_HEADER_LEN..];
        let len = header.payload_len as usize;
        if len > rest.len() {
            return Err(ParseError::Truncated {
                layer: "ipv6 payload",
                needed: len,
                available: rest.len(),
            });
        }
        Ok((header, &rest[..len]))
    }
}

fn read_ipv6(data: &[u8]) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&data[..16]);
    Ipv6Addr::from(octets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let mut data = vec![0x60, 0x12, 0x34, 0x56, 0x00, 0x04, 58, 255];
        data.extend_from_slice(&"fe80::1".parse::<Ipv6Addr>().unwrap().octets());
        data.extend_from_slice(&"ff02::1".parse::<Ipv6Addr>().unwrap().octets());
        data.extend_from_slice(&[1, 2, 3, 4, 0, 0]);

        let (header, payload) = Ipv6Header::parse(&data).unwrap();
        assert_eq!(header.version, 6);
        assert_eq!(header.traffic_class, 0x01);
        assert_eq!(header.flow_label, 0x23456);
        assert_eq!(header.next_header, 58);
        assert_eq!(header.hop_limit, 255);
        assert_eq!(header.src_addr, "fe80::1".parse::<Ipv6Addr>().unwrap());
        assert_eq!(payload, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(
            Ipv6Header::parse(&[0x60; 39]),
            Err(ParseError::Truncated { layer: "ipv6", .. })
        ));

        let mut data = vec![0x60, 0, 0, 0, 0x00, 0x10, 17, 64];
        data.extend_from_slice(&[0; 32]);
        data.extend_from_slice(&[0; 8]);
        assert_eq!(
            Ipv6Header::parse(&data),
            Err(ParseError::Truncated {
                layer: "ipv6 payload",
                needed: 16,
                available: 8
            })
        );
    }
}
