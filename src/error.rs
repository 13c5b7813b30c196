//! Error types for the router.

use std::io;
use std::net::Ipv4Addr;
use thiserror::Error;

use crate::network::ethernet::MacAddr;

/// Decode failures. Every one of them drops the frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{layer}: need {needed} bytes, have {available}")]
    Truncated {
        layer: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("ipv4: header length field {0} is below the minimum of 5")]
    BadHeaderLength(u8),

    #[error("ipv4: option length {0} is too big")]
    OptionsTooLong(usize),

    #[error("ipv4: version {0} is not 4")]
    BadVersion(u8),

    #[error("arp: unsupported address sizes hln={hln} pln={pln}")]
    BadArpSizes { hln: u8, pln: u8 },

    #[error("arp: unsupported address types hrd={hrd:#06x} pro={pro:#06x}")]
    BadArpTypes { hrd: u16, pro: u16 },

    #[error("ipv4: total length {total_len} is shorter than the {header_len}-byte header")]
    BadTotalLength { total_len: u16, header_len: usize },

    #[error("tcp: data offset {0} is below the minimum of 20 bytes")]
    BadDataOffset(usize),
}

/// Reasons a received frame is not forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error("malformed packet: {0}")]
    Malformed(#[from] ParseError),

    #[error("frame addressed to {0}, not to this interface")]
    NotForUs(MacAddr),

    #[error("bad ip checksum from {0}")]
    ChecksumMismatch(Ipv4Addr),
}

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Failed to get {what} of '{name}': {source}")]
    InterfaceInfo {
        name: String,
        what: &'static str,
        source: io::Error,
    },

    #[error("Interface '{0}' has no IPv4 address")]
    NotIpv4(String),

    #[error("Interface name too long: {0} (max 15 chars)")]
    NameTooLong(String),

    #[error("Failed to open raw socket on '{name}': {source}")]
    Socket { name: String, source: io::Error },

    #[error("Failed to open TAP device '{name}': {source}")]
    Tap { name: String, source: io::Error },

    #[error("Invalid interface spec '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    #[error("Failed to spawn flush thread: {0}")]
    Thread(io::Error),

    #[error("poll failed: {0}")]
    Poll(io::Error),

    #[error("Interface '{0}' hung up")]
    Hangup(String),
}

pub type Result<T> = std::result::Result<T, RouterError>;
