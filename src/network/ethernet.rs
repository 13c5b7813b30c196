//! Ethernet II framing

use byteorder::{BigEndian, ByteOrder};
use std::fmt;

use crate::error::ParseError;

pub const ETHERNET_HEADER_LEN: usize = 14;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;

/// 48-bit hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl std::str::FromStr for MacAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(format!("invalid MAC address: {}", s));
        }
        let mut mac = [0u8; 6];
        for (byte, part) in mac.iter_mut().zip(parts) {
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| format!("invalid MAC address: {}", s))?;
        }
        Ok(MacAddr(mac))
    }
}

/// Ethernet header: destination, source, ethertype
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

impl EthernetHeader {
    /// Parse the header, returning it together with the frame payload
    pub fn parse(frame: &[u8]) -> Result<(Self, &[u8]), ParseError> {
        if frame.len() < ETHERNET_HEADER_LEN {
            return Err(ParseError::Truncated {
                layer: "ethernet",
                needed: ETHERNET_HEADER_LEN,
                available: frame.len(),
            });
        }

        let header = EthernetHeader {
            dst: MacAddr(read_mac(&frame[0..6])),
            src: MacAddr(read_mac(&frame[6..12])),
            ethertype: BigEndian::read_u16(&frame[12..14]),
        };
        Ok((header, &frame[ETHERNET_HEADER_LEN..]))
    }

    pub fn to_bytes(&self) -> [u8; ETHERNET_HEADER_LEN] {
        let mut bytes = [0u8; ETHERNET_HEADER_LEN];
        bytes[0..6].copy_from_slice(&self.dst.0);
        bytes[6..12].copy_from_slice(&self.src.0);
        BigEndian::write_u16(&mut bytes[12..14], self.ethertype);
        bytes
    }
}

pub(crate) fn read_mac(data: &[u8]) -> [u8; 6] {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&data[..6]);
    mac
}

/// Overwrite the destination and source addresses of a frame in place
pub fn rewrite_addresses(frame: &mut [u8], dst: MacAddr, src: MacAddr) {
    frame[0..6].copy_from_slice(&dst.0);
    frame[6..12].copy_from_slice(&src.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 1]);
        frame.extend_from_slice(&[0x08, 0x06]);
        frame.extend_from_slice(&[1, 2, 3]);

        let (header, payload) = EthernetHeader::parse(&frame).unwrap();
        assert!(header.dst.is_broadcast());
        assert_eq!(header.src, MacAddr([0x02, 0, 0, 0, 0, 1]));
        assert_eq!(header.ethertype, ETHERTYPE_ARP);
        assert_eq!(payload, &[1, 2, 3]);
        assert_eq!(&header.to_bytes()[..], &frame[..14]);
    }

    #[test]
    fn test_short_frame_rejected() {
        let err = EthernetHeader::parse(&[0u8; 13]).unwrap_err();
        assert_eq!(
            err,
            ParseError::Truncated {
                layer: "ethernet",
                needed: 14,
                available: 13
            }
        );
    }

    #[test]
    fn test_mac_round_trip_text() {
        let mac: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(mac.0, [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
        assert!("aa:bb:cc".parse::<MacAddr>().is_err());
        assert!("zz:bb:cc:dd:ee:ff".parse::<MacAddr>().is_err());
    }
}
