//! A minimal two-interface IPv4 software router
//!
//! This library provides everything the `toy-router` binary needs:
//! - Ethernet, ARP, IPv4/IPv6, ICMP, TCP and UDP decoding
//! - Internet checksum computation and validation
//! - Per-interface ARP caches with aging and pending-datagram queues
//! - Forwarding with TTL handling and ICMP Time Exceeded generation
//! - Raw socket and TAP device ports

pub mod config;
pub mod error;
pub mod iface;
pub mod network;
pub mod packet;
pub mod router;
pub mod transport;

// Re-export commonly used types
pub use config::{InterfaceSpec, RouterConfig};
pub use error::{ForwardError, ParseError, RouterError};
pub use iface::{FrameIo, Interface};
pub use network::ethernet::MacAddr;
pub use router::{Router, Verdict};
