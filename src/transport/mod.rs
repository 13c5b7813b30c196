//! Transport layer protocols
//!
//! The router does not terminate transport connections. These decoders are
//! used when received traffic is inspected:
//! - TCP: Transmission Control Protocol
//! - UDP: User Datagram Protocol

pub mod tcp;
pub mod udp;

// Re-export commonly used items
pub use tcp::TcpHeader;
pub use udp::UdpHeader;
