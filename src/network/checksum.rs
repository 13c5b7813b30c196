//! Internet checksum (RFC 1071)
//!
//! Ones-complement sum of big-endian 16-bit words, folded and inverted.
//! `checksum2` sums two discontiguous buffers as if they were one, which lets
//! callers combine a pseudo-header (or a fixed header and its options) with
//! a payload without copying.

use byteorder::{BigEndian, ByteOrder};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Add one 16-bit word, folding whenever the top bit of the accumulator is set
#[inline]
fn add_word(sum: u32, word: u16) -> u32 {
    let sum = sum + word as u32;
    if sum & 0x8000_0000 != 0 {
        (sum & 0xFFFF) + (sum >> 16)
    } else {
        sum
    }
}

/// Sum every complete word of `data`, returning the odd trailing byte if any
fn sum_words(mut sum: u32, data: &[u8]) -> (u32, Option<u8>) {
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum = add_word(sum, BigEndian::read_u16(word));
    }
    (sum, words.remainder().first().copied())
}

fn finish(mut sum: u32, trailing: Option<u8>) -> u16 {
    if let Some(byte) = trailing {
        sum = add_word(sum, (byte as u16) << 8);
    }
    while (sum >> 16) > 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !sum as u16
}

/// Calculate Internet checksum
///
/// Odd-length data is padded with a zero byte.
pub fn checksum(data: &[u8]) -> u16 {
    let (sum, trailing) = sum_words(0, data);
    finish(sum, trailing)
}

/// Calculate the Internet checksum of `first` followed by `second`
///
/// When `first` has odd length its last byte is the high half of a word whose
/// low half is the first byte of `second`; summing then continues over the
/// rest of `second`. The result always equals `checksum` of the concatenation.
pub fn checksum2(first: &[u8], second: &[u8]) -> u16 {
    let (sum, trailing) = sum_words(0, first);
    match (trailing, second.split_first()) {
        (Some(high), Some((&low, rest))) => {
            let sum = add_word(sum, u16::from_be_bytes([high, low]));
            let (sum, trailing) = sum_words(sum, rest);
            finish(sum, trailing)
        }
        (Some(high), None) => finish(sum, Some(high)),
        (None, _) => {
            let (sum, trailing) = sum_words(sum, second);
            finish(sum, trailing)
        }
    }
}

/// A folded sum over data that carries its own checksum is all ones (or zero)
#[inline]
pub fn is_valid(sum: u16) -> bool {
    sum == 0x0000 || sum == 0xFFFF
}

/// Validate an IPv4 header checksum over the fixed header and its options
pub fn verify_ipv4_header(header: &[u8], options: &[u8]) -> bool {
    is_valid(checksum2(header, options))
}

/// Build the 12-byte IPv4 pseudo-header used by TCP and UDP (RFC 793, RFC 768)
pub fn ipv4_pseudo_header(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, len: u16) -> [u8; 12] {
    let mut pseudo = [0u8; 12];
    pseudo[0..4].copy_from_slice(&src.octets());
    pseudo[4..8].copy_from_slice(&dst.octets());
    pseudo[9] = protocol;
    BigEndian::write_u16(&mut pseudo[10..12], len);
    pseudo
}

/// Build the 40-byte IPv6 pseudo-header (RFC 2460 section 8.1)
pub fn ipv6_pseudo_header(src: Ipv6Addr, dst: Ipv6Addr, next_header: u8, len: u32) -> [u8; 40] {
    let mut pseudo = [0u8; 40];
    pseudo[0..16].copy_from_slice(&src.octets());
    pseudo[16..32].copy_from_slice(&dst.octets());
    BigEndian::write_u32(&mut pseudo[32..36], len);
    pseudo[39] = next_header;
    pseudo
}

/// Validate a TCP or UDP segment carried over IPv4
pub fn verify_ipv4_payload(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, payload: &[u8]) -> bool {
    let pseudo = ipv4_pseudo_header(src, dst, protocol, payload.len() as u16);
    is_valid(checksum2(&pseudo, payload))
}

/// Validate an ICMPv6, TCP or UDP payload carried over IPv6
pub fn verify_ipv6_payload(src: Ipv6Addr, dst: Ipv6Addr, next_header: u8, payload: &[u8]) -> bool {
    let pseudo = ipv6_pseudo_header(src, dst, next_header, payload.len() as u32);
    is_valid(checksum2(&pseudo, payload))
}
