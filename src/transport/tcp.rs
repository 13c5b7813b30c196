//! TCP (Transmission Control Protocol) header decoding
//!
//! This module provides TCP header parsing and checksum verification for
//! inspected traffic. Connections are never terminated by the router.

use std::net::IpAddr;

use crate::error::ParseError;
use crate::network::checksum::{verify_ipv4_payload, verify_ipv6_payload};
use crate::network::ipv4::protocol;

pub const TCP_HEADER_LEN: usize = 20;

/// TCP packet header structure
///
/// Represents the standard 20-byte TCP header as defined in RFC 793
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq_number: u32,
    pub ack_number: u32,
    pub data_offset_and_flags: u16, // Data offset (4 bits) + Reserved (3 bits) + Flags (9 bits)
    pub window_size: u16,
    pub checksum: u16,
    pub urgent_ptr: u16,
}

impl TcpHeader {
    /// Parse TCP header from byte slice
    ///
    /// The data offset must cover at least the fixed header and fit the slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < TCP_HEADER_LEN {
            return Err(ParseError::Truncated {
                layer: "tcp",
                needed: TCP_HEADER_LEN,
                available: data.len(),
            });
        }

        let header = TcpHeader {
            src_port: u16::from_be_bytes([data[0], data[1]]),
            dst_port: u16::from_be_bytes([data[2], data[3]]),
            seq_number: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ack_number: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            data_offset_and_flags: u16::from_be_bytes([data[12], data[13]]),
            window_size: u16::from_be_bytes([data[14], data[15]]),
            checksum: u16::from_be_bytes([data[16], data[17]]),
            urgent_ptr: u16::from_be_bytes([data[18], data[19]]),
        };

        let offset = header.data_offset();
        if offset < TCP_HEADER_LEN {
            return Err(ParseError::BadDataOffset(offset));
        }
        if offset > data.len() {
            return Err(ParseError::Truncated {
                layer: "tcp options",
                needed: offset,
                available: data.len(),
            });
        }
        Ok(header)
    }

    /// Check if SYN flag is set
    pub fn is_syn(&self) -> bool {
        (self.data_offset_and_flags & 0x0002) != 0
    }

    /// Check if ACK flag is set
    pub fn is_ack(&self) -> bool {
        (self.data_offset_and_flags & 0x0010) != 0
    }

    /// Check if FIN flag is set
    pub fn is_fin(&self) -> bool {
        (self.data_offset_and_flags & 0x0001) != 0
    }

    /// Check if RST flag is set
    pub fn is_rst(&self) -> bool {
        (self.data_offset_and_flags & 0x0004) != 0
    }

    /// Get the data offset (header length) in bytes
    pub fn data_offset(&self) -> usize {
        ((self.data_offset_and_flags >> 12) as usize) * 4
    }

    /// Flags rendered as the usual letters, e.g. "SA" for SYN+ACK
    pub fn flag_letters(&self) -> String {
        [
            (self.is_syn(), 'S'),
            (self.is_ack(), 'A'),
            (self.is_fin(), 'F'),
            (self.is_rst(), 'R'),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, letter)| *letter)
        .collect()
    }
}

/// Verify the checksum of a TCP segment against its pseudo-header
pub fn verify_checksum(src: IpAddr, dst: IpAddr, segment: &[u8]) -> bool {
    match (src, dst) {
        (IpAddr::V4(src), IpAddr::V4(dst)) => verify_ipv4_payload(src, dst, protocol::TCP, segment),
        (IpAddr::V6(src), IpAddr::V6(dst)) => verify_ipv6_payload(src, dst, protocol::TCP, segment),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syn_segment() -> [u8; 20] {
        let mut data = [0u8; 20];
        data[0..2].copy_from_slice(&40000u16.to_be_bytes());
        data[2..4].copy_from_slice(&80u16.to_be_bytes());
        data[4..8].copy_from_slice(&1000u32.to_be_bytes());
        data[12..14].copy_from_slice(&0x5002u16.to_be_bytes());
        data[14..16].copy_from_slice(&64240u16.to_be_bytes());
        data
    }

    #[test]
    fn test_parse_syn() {
        let header = TcpHeader::from_bytes(&syn_segment()).unwrap();
        assert_eq!(header.src_port, 40000);
        assert_eq!(header.dst_port, 80);
        assert_eq!(header.seq_number, 1000);
        assert_eq!(header.data_offset(), 20);
        assert!(header.is_syn());
        assert!(!header.is_ack());
        assert_eq!(header.flag_letters(), "S");
    }

    #[test]
    fn test_bad_data_offset() {
        let mut data = syn_segment();
        data[12] = 0x40;
        assert_eq!(
            TcpHeader::from_bytes(&data).unwrap_err(),
            ParseError::BadDataOffset(16)
        );
        data[12] = 0x60;
        assert!(matches!(
            TcpHeader::from_bytes(&data),
            Err(ParseError::Truncated { layer: "tcp options", .. })
        ));
    }
}
