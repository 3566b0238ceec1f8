// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Expected-text helpers for operation vectors.
//!
//! Address and key renderings are computed through the same codec
//! primitives the decoder uses, so the assertions pin the parser's wiring
//! (which bytes reach which renderer) while the primitives themselves are
//! covered by their own vector tests.

use ledger_tez_core::format;

/// Expected rendering of a tagged public key hash.
pub fn pkh_text(data: &[u8]) -> String {
    let mut buf = [0u8; 64];
    let n = format::pkh(data, &mut buf).expect("pkh");
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

/// Expected rendering of a tagged destination address.
pub fn address_text(data: &[u8]) -> String {
    let mut buf = [0u8; 64];
    let n = format::address(data, &mut buf).expect("address");
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

/// Expected rendering of a tagged public key.
pub fn pk_text(data: &[u8]) -> String {
    let mut buf = [0u8; 128];
    let n = format::pk(data, &mut buf).expect("pk");
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

/// Expected rendering of a payload under a registered prefix.
pub fn checked_text(prefix: format::Prefix, data: &[u8]) -> String {
    let mut buf = [0u8; 128];
    let n = format::base58check(prefix, data, &mut buf).expect("base58check");
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

/// Expected rendering of a protocol hash.
pub fn proto_text(data: &[u8]) -> String {
    checked_text(format::Prefix::Protocol, data)
}
