//! Link and network layer protocols
//!
//! This module contains decoders and builders for:
//! - Ethernet II framing
//! - ARP: Address Resolution Protocol
//! - IPv4: Internet Protocol version 4 (forwarded)
//! - IPv6: Internet Protocol version 6 (inspected only)
//! - ICMP and ICMPv6
//!
//! plus the Internet checksum shared by all of them.

pub mod arp;
pub mod checksum;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
pub mod ipv6;

// Re-export commonly used items
pub use arp::ArpPacket;
pub use checksum::{checksum, checksum2};
pub use ethernet::{EthernetHeader, MacAddr};
pub use icmp::{IcmpHeader, ICMP_TYPE_TIME_EXCEEDED};
pub use ipv4::{protocol, Ipv4Header, Ipv4Packet};
pub use ipv6::Ipv6Header;
