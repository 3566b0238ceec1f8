// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Incremental decoder for base-128 continuation-coded numbers.
//!
//! Both wire formats carry integers as a little-endian base-128 sequence:
//! every byte except the last has bit 7 set, and for signed values bit 6 of
//! the first byte carries the sign while the remaining six bits carry the
//! lowest magnitude bits (naturals use all seven value bits of every byte).
//!
//! The decoder is fed one byte per call; magnitude bits accumulate into a
//! fixed little-endian scratch, and the decimal digit string is rendered
//! when the stop byte arrives. Inputs whose magnitude would overflow the
//! scratch are rejected as [`Error::TooLarge`], never truncated.

use heapless::Vec;
use static_assertions::const_assert;

use super::{fail, Error, Interrupt};
use crate::format;

/// Magnitude scratch capacity, in bits.
pub(crate) const NUM_BITS: usize = 256;

/// Magnitude scratch capacity, in bytes.
pub(crate) const NUM_BYTES: usize = NUM_BITS / 8;

/// Decimal rendering capacity.
pub(crate) const NUM_DECIMAL_SIZE: usize = format::decimal_buffer_size(NUM_BYTES);

const_assert!(NUM_DECIMAL_SIZE >= 78); // 2^256 - 1 has 78 digits

/// Per-number decoder registers, small enough to live in a decoder frame.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) struct NumRegs {
    /// Magnitude bits accumulated so far
    pub bits: u16,
    /// Sign of the value (signed encodings only)
    pub sign: bool,
    /// Set once the stop byte has been consumed
    pub stop: bool,
}

/// Shared magnitude / decimal scratch.
///
/// One number is decoded at a time, so a single buffer is shared by every
/// frame holding [`NumRegs`].
pub(crate) struct NumBuffer {
    /// Little-endian magnitude
    pub bytes: [u8; NUM_BYTES],
    /// ASCII digits of the magnitude, valid once `NumRegs::stop` is set
    pub decimal: Vec<u8, NUM_DECIMAL_SIZE>,
}

impl NumBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; NUM_BYTES],
            decimal: Vec::new(),
        }
    }

    /// Prepare for a fresh number.
    pub fn reset(&mut self) {
        self.bytes = [0; NUM_BYTES];
        self.decimal.clear();
    }
}

/// Consume one byte of a continuation-coded number.
///
/// `natural` selects the unsigned layout. Once this returns with
/// `regs.stop` set, `buf.decimal` holds the magnitude digits and
/// `regs.sign` the sign.
pub(crate) fn num_step(
    buf: &mut NumBuffer,
    regs: &mut NumRegs,
    b: u8,
    natural: bool,
) -> Result<(), Interrupt> {
    let cont = b & 0x80 != 0;
    let (v, nbits) = if regs.bits == 0 && !natural {
        regs.sign = b & 0x40 != 0;
        (b & 0x3f, 6)
    } else {
        (b & 0x7f, 7)
    };

    let bit = regs.bits as usize;
    if bit + nbits > NUM_BITS {
        return fail(Error::TooLarge);
    }

    let w = (v as u16) << (bit % 8);
    buf.bytes[bit / 8] |= w as u8;
    let spill = (w >> 8) as u8;
    if spill != 0 {
        match buf.bytes.get_mut(bit / 8 + 1) {
            Some(slot) => *slot |= spill,
            None => return fail(Error::TooLarge),
        }
    }
    regs.bits += nbits as u16;

    if !cont {
        regs.stop = true;
        let mut tmp = [0u8; NUM_DECIMAL_SIZE];
        let n = format::decimal(&buf.bytes, &mut tmp).map_err(|_| Error::TooLarge)?;
        buf.decimal.clear();
        let _ = buf.decimal.extend_from_slice(&tmp[..n]);
    }
    Ok(())
}

/// Signed variant of [`num_step`].
pub(crate) fn int_step(buf: &mut NumBuffer, regs: &mut NumRegs, b: u8) -> Result<(), Interrupt> {
    num_step(buf, regs, b, false)
}

/// Parse a decimal digit string as a mutez value, rejecting overflow.
pub(crate) fn parse_mutez(digits: &[u8]) -> Option<u64> {
    core::str::from_utf8(digits).ok()?.parse::<u64>().ok()
}
