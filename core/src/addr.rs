//! Address string parsing
//!
//! MAC addresses are six colon-separated hex octets (`44:39:c4:7f:e0:59`),
//! IPv4 addresses four dot-separated decimal octets (`192.168.1.10`).
//! Partial matches are rejected rather than zero-padded.

use wiz_hal::{Ipv4Address, MacAddress};

use crate::error::AddressFormatError;

/// Split `s` on `sep` into exactly `N` octets parsed by `octet`.
fn parse_octets<const N: usize>(
    s: &str,
    sep: char,
    octet: fn(&str) -> Option<u8>,
) -> Result<[u8; N], AddressFormatError> {
    let found = s.split(sep).count();
    if found != N {
        return Err(AddressFormatError::TokenCount {
            expected: N as u8,
            found: found.min(u8::MAX as usize) as u8,
        });
    }

    let mut out = [0u8; N];
    for (slot, token) in out.iter_mut().zip(s.split(sep)) {
        *slot = octet(token).ok_or(AddressFormatError::InvalidOctet)?;
    }
    Ok(out)
}

fn hex_octet(token: &str) -> Option<u8> {
    // from_str_radix accepts a leading '+', so check the digits first
    if token.is_empty() || token.len() > 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(token, 16).ok()
}

fn dec_octet(token: &str) -> Option<u8> {
    if token.is_empty() || token.len() > 3 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Parse `xx:xx:xx:xx:xx:xx`.
pub fn parse_mac(s: &str) -> Result<MacAddress, AddressFormatError> {
    parse_octets::<6>(s, ':', hex_octet)
}

/// Parse `d.d.d.d`.
pub fn parse_ipv4(s: &str) -> Result<Ipv4Address, AddressFormatError> {
    parse_octets::<4>(s, '.', dec_octet)
}
