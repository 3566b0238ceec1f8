// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Human rendering of Tezos binary formats.
//!
//! Single-shot codecs over fully-buffered inputs: arbitrary-precision
//! decimal, base58 / checksummed base58, and the tag-dispatching renderers
//! for addresses, public keys and hashes. All functions write ASCII into a
//! caller buffer and return the written length.
//!
//! The renderers deconstruct the one-byte binary header to pick the kind
//! within the type (e.g. the curve for keys), check the payload length and
//! feed the matching [`Prefix`] to [`base58check`]. They need updating when
//! a protocol upgrade adds formats; existing formats never change.

use sha2::{Digest, Sha256};
use strum::{Display, EnumIter};

pub mod michelson;

/// Errors raised by the formatting primitives.
///
/// The decoders treat any of these as proof of malformed input.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
pub enum FormatError {
    /// Unknown tag byte in a tagged payload
    #[cfg_attr(feature = "thiserror", error("unknown tag byte"))]
    UnknownTag,

    /// Payload length does not match the registered prefix
    #[cfg_attr(feature = "thiserror", error("payload length mismatch"))]
    LengthMismatch,

    /// Caller buffer too small for the rendered text
    #[cfg_attr(feature = "thiserror", error("output buffer too small"))]
    BufferTooSmall,
}

/// Output bound for [`decimal`] over an `l`-byte magnitude
/// (`l * log10(256)` digits, rounded up).
pub const fn decimal_buffer_size(l: usize) -> usize {
    (l * 241) / 100 + 1
}

/// Output bound for [`base58`] over `l` input bytes
/// (`l * log58(256)` characters, rounded up).
pub const fn base58_buffer_size(l: usize) -> usize {
    (l * 138) / 100 + 1
}

/// Output bound for [`base58check`] over an `l`-byte payload behind a
/// `p`-byte version prefix.
pub const fn base58check_buffer_size(l: usize, p: usize) -> usize {
    base58_buffer_size(l + p + 4)
}

/// Largest magnitude accepted by [`decimal`].
const DECIMAL_INPUT_MAX: usize = 64;

/// version prefix (4) + BLS public key (48) + checksum (4)
const CHECKED_INPUT_MAX: usize = 56;

/// Registered base58check prefixes.
///
/// Additive evolution only: a protocol upgrade may append entries but the
/// version bytes and payload lengths of existing entries are frozen.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, EnumIter)]
pub enum Prefix {
    /// ed25519 public key hash, `tz1`
    Tz1,
    /// secp256k1 public key hash, `tz2`
    Tz2,
    /// p256 public key hash, `tz3`
    Tz3,
    /// BLS public key hash, `tz4`
    Tz4,
    /// originated contract hash, `KT1`
    Kt1,
    /// transaction rollup address, `txr1`
    Txr1,
    /// smart rollup address, `sr1`
    Sr1,
    /// smart rollup commitment hash, `src1`
    Src1,
    /// block hash, `B`
    BlockHash,
    /// operation hash, `o`
    OperationHash,
    /// protocol hash, `P`
    Protocol,
    /// script expression hash, `expr`
    Expr,
    /// ed25519 public key, `edpk`
    Edpk,
    /// secp256k1 public key, `sppk`
    Sppk,
    /// p256 public key, `p2pk`
    P2pk,
    /// BLS public key, `BLpk`
    Blpk,
}

impl Prefix {
    /// Binary version bytes prepended before checksumming.
    pub const fn version(self) -> &'static [u8] {
        match self {
            Prefix::Tz1 => &[6, 161, 159],
            Prefix::Tz2 => &[6, 161, 161],
            Prefix::Tz3 => &[6, 161, 164],
            Prefix::Tz4 => &[6, 161, 166],
            Prefix::Kt1 => &[2, 90, 121],
            Prefix::Txr1 => &[1, 128, 120, 31],
            Prefix::Sr1 => &[6, 124, 117],
            Prefix::Src1 => &[17, 165, 134, 138],
            Prefix::BlockHash => &[1, 52],
            Prefix::OperationHash => &[5, 116],
            Prefix::Protocol => &[2, 170],
            Prefix::Expr => &[13, 44, 64, 27],
            Prefix::Edpk => &[13, 15, 37, 217],
            Prefix::Sppk => &[3, 254, 226, 86],
            Prefix::P2pk => &[3, 178, 139, 127],
            Prefix::Blpk => &[6, 149, 135, 204],
        }
    }

    /// Exact payload length accepted for this prefix.
    pub const fn data_len(self) -> usize {
        match self {
            Prefix::Tz1 | Prefix::Tz2 | Prefix::Tz3 | Prefix::Tz4 => 20,
            Prefix::Kt1 | Prefix::Txr1 | Prefix::Sr1 => 20,
            Prefix::Src1 => 32,
            Prefix::BlockHash | Prefix::OperationHash => 32,
            Prefix::Protocol | Prefix::Expr => 32,
            Prefix::Edpk => 32,
            Prefix::Sppk | Prefix::P2pk => 33,
            Prefix::Blpk => 48,
        }
    }

    /// Text the rendered string starts with.
    pub const fn text(self) -> &'static str {
        match self {
            Prefix::Tz1 => "tz1",
            Prefix::Tz2 => "tz2",
            Prefix::Tz3 => "tz3",
            Prefix::Tz4 => "tz4",
            Prefix::Kt1 => "KT1",
            Prefix::Txr1 => "txr1",
            Prefix::Sr1 => "sr1",
            Prefix::Src1 => "src1",
            Prefix::BlockHash => "B",
            Prefix::OperationHash => "o",
            Prefix::Protocol => "P",
            Prefix::Expr => "expr",
            Prefix::Edpk => "edpk",
            Prefix::Sppk => "sppk",
            Prefix::P2pk => "p2pk",
            Prefix::Blpk => "BLpk",
        }
    }
}

/// Render a positive arbitrary-precision number as ASCII decimal.
///
/// The magnitude is stored little-endian in `n`; an empty or all-zero `n`
/// renders as `0`. The output buffer must hold
/// [`decimal_buffer_size`]`(n.len())` bytes.
pub fn decimal(n: &[u8], out: &mut [u8]) -> Result<usize, FormatError> {
    if n.len() > DECIMAL_INPUT_MAX {
        return Err(FormatError::LengthMismatch);
    }

    let mut scratch = [0u8; DECIMAL_INPUT_MAX];
    scratch[..n.len()].copy_from_slice(n);
    let mut len = n.len();
    while len > 0 && scratch[len - 1] == 0 {
        len -= 1;
    }

    if len == 0 {
        if out.is_empty() {
            return Err(FormatError::BufferTooSmall);
        }
        out[0] = b'0';
        return Ok(1);
    }

    // Repeated division by 10, least significant digit first
    let mut digits = [0u8; decimal_buffer_size(DECIMAL_INPUT_MAX)];
    let mut n_digits = 0;
    while len > 0 {
        let mut rem = 0u16;
        for b in scratch[..len].iter_mut().rev() {
            let acc = (rem << 8) | *b as u16;
            *b = (acc / 10) as u8;
            rem = acc % 10;
        }
        digits[n_digits] = b'0' + rem as u8;
        n_digits += 1;
        while len > 0 && scratch[len - 1] == 0 {
            len -= 1;
        }
    }

    if out.len() < n_digits {
        return Err(FormatError::BufferTooSmall);
    }
    for (i, d) in digits[..n_digits].iter().rev().enumerate() {
        out[i] = *d;
    }
    Ok(n_digits)
}

/// base58-encode `data` (Bitcoin alphabet).
///
/// The output buffer must hold [`base58_buffer_size`]`(data.len())` bytes.
pub fn base58(data: &[u8], out: &mut [u8]) -> Result<usize, FormatError> {
    bs58::encode(data)
        .onto(&mut out[..])
        .map_err(|_| FormatError::BufferTooSmall)
}

/// base58check-encode `data` under a registered [`Prefix`].
///
/// Prepends the prefix version bytes, appends the first four bytes of a
/// double-SHA256 of the result, and base58-encodes. Rejects payloads whose
/// length does not match the table entry.
pub fn base58check(prefix: Prefix, data: &[u8], out: &mut [u8]) -> Result<usize, FormatError> {
    if data.len() != prefix.data_len() {
        return Err(FormatError::LengthMismatch);
    }

    let version = prefix.version();
    let mut buf = [0u8; CHECKED_INPUT_MAX];
    let len = version.len() + data.len();
    buf[..version.len()].copy_from_slice(version);
    buf[version.len()..len].copy_from_slice(data);

    let check = Sha256::digest(Sha256::digest(&buf[..len]));
    buf[len..len + 4].copy_from_slice(&check[..4]);

    base58(&buf[..len + 4], out)
}

/// Render a tagged public key hash (tag + 20-byte hash).
///
/// Tags 0..=3 select the signature curve (`tz1`..`tz4`).
pub fn pkh(data: &[u8], out: &mut [u8]) -> Result<usize, FormatError> {
    if data.len() != 21 {
        return Err(FormatError::LengthMismatch);
    }
    let prefix = match data[0] {
        0 => Prefix::Tz1,
        1 => Prefix::Tz2,
        2 => Prefix::Tz3,
        3 => Prefix::Tz4,
        _ => return Err(FormatError::UnknownTag),
    };
    base58check(prefix, &data[1..], out)
}

/// Render a tagged public key (tag + curve-specific key bytes).
///
/// Tag 0: 32-byte ed25519 (`edpk`), 1: 33-byte secp256k1 (`sppk`),
/// 2: 33-byte p256 (`p2pk`), 3: 48-byte BLS (`BLpk`).
pub fn pk(data: &[u8], out: &mut [u8]) -> Result<usize, FormatError> {
    let (prefix, len) = match data.first() {
        Some(0) => (Prefix::Edpk, 33),
        Some(1) => (Prefix::Sppk, 34),
        Some(2) => (Prefix::P2pk, 34),
        Some(3) => (Prefix::Blpk, 49),
        _ => return Err(FormatError::UnknownTag),
    };
    if data.len() != len {
        return Err(FormatError::LengthMismatch);
    }
    base58check(prefix, &data[1..], out)
}

/// Render a tagged contract-or-rollup address (tag + 21 bytes).
///
/// Tag 0 nests a tagged public key hash; tags 1..=3 carry a 20-byte hash
/// plus one padding byte (`KT1`, `txr1`, `sr1`).
pub fn address(data: &[u8], out: &mut [u8]) -> Result<usize, FormatError> {
    if data.len() != 22 {
        return Err(FormatError::LengthMismatch);
    }
    let prefix = match data[0] {
        0 => return pkh(&data[1..], out),
        1 => Prefix::Kt1,
        2 => Prefix::Txr1,
        3 => Prefix::Sr1,
        _ => return Err(FormatError::UnknownTag),
    };
    base58check(prefix, &data[1..21], out)
}

/// Render a 32-byte operation hash (`o`).
#[deprecated(note = "use base58check(Prefix::OperationHash, ..) instead")]
pub fn operation_hash(data: &[u8], out: &mut [u8]) -> Result<usize, FormatError> {
    base58check(Prefix::OperationHash, data, out)
}

/// Render a 32-byte block hash (`B`).
#[deprecated(note = "use base58check(Prefix::BlockHash, ..) instead")]
pub fn block_hash(data: &[u8], out: &mut [u8]) -> Result<usize, FormatError> {
    base58check(Prefix::BlockHash, data, out)
}
