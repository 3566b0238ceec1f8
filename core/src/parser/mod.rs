// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Streaming parser state and the suspension substrate shared by the
//! Micheline and operation decoders.
//!
//! The [`Parser`] owns no I/O: the transport layer grants it byte windows
//! over caller-owned buffers ([`refill`][Parser::refill],
//! [`flush`][Parser::flush]) and repeatedly invokes a step function
//! ([`micheline_step`][Parser::micheline_step],
//! [`operation_step`][Parser::operation_step]). Each invocation consumes at
//! most one input byte and produces at most a few output characters, then
//! reports a [`Status`]; all intermediate progress lives in the decoder
//! frame stacks so a step can suspend between any two bytes.
//!
//! Internally every step helper returns `Result<(), Interrupt>` and
//! propagates non-progress outcomes unchanged with `?` — a helper never
//! swallows a suspension or an error of a callee. Errors latch: after the
//! first [`Status::Error`] every further call returns the same error
//! without touching state.

use core::fmt::Write;

use heapless::{String, Vec};
use static_assertions::const_assert;
use zeroize::Zeroize;

use crate::format;

mod num;
use num::NumBuffer;

mod micheline;
use micheline::MichelineState;

mod operation;
use operation::OperationState;
pub use operation::UNKNOWN_SIZE;

pub mod schema;

/// Capacity of the field-name side channel.
pub const FIELD_NAME_SIZE: usize = 30;

/// Capacity of the capture buffer used to stage rendered values.
pub(crate) const CAPTURE_SIZE: usize = 256;

// the longest staged value is a base58check-encoded BLS public key
const_assert!(CAPTURE_SIZE >= format::base58check_buffer_size(48, 4));

/// Outcome of one decode step.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Status {
    /// Progress was made, step again
    Continue,
    /// Decoding complete, nothing left to do
    Done,
    /// Input window exhausted, refill and step again
    FeedMe,
    /// Output window full, flush and step again
    ImFull,
    /// Decoding failed; latched, every further step repeats it
    Error(Error),
}

impl Status {
    /// Whether the decoder is blocked (suspended or finished)
    pub fn is_blocked(&self) -> bool {
        !matches!(self, Status::Continue)
    }

    /// Stable diagnostic name
    pub fn name(&self) -> &'static str {
        match self {
            Status::Continue => "CONTINUE",
            Status::Done => "DONE",
            Status::FeedMe => "FEED_ME",
            Status::ImFull => "IM_FULL",
            Status::Error(e) => e.name(),
        }
    }
}

/// Decode errors.
///
/// All of them are terminal: the input cannot be trusted past the first
/// malformed byte, so there is no field-level recovery. The caller falls
/// back to showing raw bytes or rejecting the payload.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[repr(u8)]
pub enum Error {
    /// Invalid tag byte
    #[cfg_attr(feature = "thiserror", error("invalid tag"))]
    InvalidTag = 0x00,

    /// Invalid Michelson opcode
    #[cfg_attr(feature = "thiserror", error("invalid Michelson opcode"))]
    InvalidOp = 0x01,

    /// Data failed validation (e.g. a non-mutez amount)
    #[cfg_attr(feature = "thiserror", error("invalid data"))]
    InvalidData = 0x02,

    /// Recognized but unsupported construct
    #[cfg_attr(feature = "thiserror", error("unsupported construct"))]
    Unsupported = 0x03,

    /// Declared length exceeds the 16-bit budget
    #[cfg_attr(feature = "thiserror", error("data too large"))]
    TooLarge = 0x04,

    /// Nesting deeper than the fixed frame stack
    #[cfg_attr(feature = "thiserror", error("data too deeply nested"))]
    TooDeep = 0x05,

    /// Automaton reached a state combination that should be unreachable;
    /// always a defect, distinct from untrusted-input errors
    #[cfg_attr(feature = "thiserror", error("invalid parser state"))]
    InvalidState = 0x06,
}

impl Error {
    /// Stable diagnostic name
    pub fn name(&self) -> &'static str {
        match self {
            Error::InvalidTag => "ERR_INVALID_TAG",
            Error::InvalidOp => "ERR_INVALID_OP",
            Error::InvalidData => "ERR_INVALID_DATA",
            Error::Unsupported => "ERR_UNSUPPORTED",
            Error::TooLarge => "ERR_TOO_LARGE",
            Error::TooDeep => "ERR_TOO_DEEP",
            Error::InvalidState => "ERR_INVALID_STATE",
        }
    }
}

/// Internal early-return carrier: a step helper either made progress
/// (`Ok`), or suspended / failed (`Err`), in which case every caller
/// propagates unchanged.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Interrupt {
    Done,
    FeedMe,
    ImFull,
    Failed(Error),
}

impl From<Error> for Interrupt {
    fn from(e: Error) -> Self {
        Interrupt::Failed(e)
    }
}

pub(crate) type StepResult = Result<(), Interrupt>;

/// Shorthand for raising a decode error from a step helper.
pub(crate) fn fail<T>(e: Error) -> Result<T, Interrupt> {
    Err(Interrupt::Failed(e))
}

/// Information about the field currently being rendered.
///
/// Refreshed whenever a displayable (non-suppressed) field starts
/// decoding; the display layer reads it to label the text it drains and to
/// gate complex fields behind expert-mode acknowledgement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldInfo {
    /// Display name of the field
    pub name: String<FIELD_NAME_SIZE>,
    /// Whether the field is considered too complex for a common user
    pub is_complex: bool,
    /// Ordinal of the field within the decode
    pub index: u16,
}

/// Input / output window registers.
///
/// Invariant between two grants: `iofs + ilen` (resp. `oofs + olen`) equals
/// the window length, so the decoder never reads past the granted input nor
/// writes past the granted capacity.
#[derive(Copy, Clone, Debug, Default)]
struct Regs {
    /// input read cursor
    iofs: usize,
    /// remaining readable input bytes
    ilen: usize,
    /// output write cursor (== produced, undrained bytes)
    oofs: usize,
    /// remaining writable output bytes
    olen: usize,
}

/// Scratch buffers shared by both decoders.
pub(crate) struct Buffers {
    /// Number magnitude / digit scratch
    pub num: NumBuffer,
    /// Staging area for rendered values and escapes
    pub capture: Vec<u8, CAPTURE_SIZE>,
}

/// The streaming payload parser.
///
/// Lifecycle: [`new`][Parser::new] (or a previous decode ending), then one
/// of the `init_*` entry points, then repeated grant / step rounds until
/// [`Status::Done`] or a latched [`Status::Error`].
///
/// A parser instance must not be shared: there is exactly one logical
/// thread of control, and all suspension state lives in this value.
pub struct Parser {
    regs: Regs,
    /// Total input bytes consumed since init
    pub(crate) ofs: usize,
    pub(crate) field_info: FieldInfo,
    pub(crate) micheline: MichelineState,
    pub(crate) operation: OperationState,
    pub(crate) buffers: Buffers,
    /// Latched error, set on first failure
    errno: Option<Error>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create an idle parser.
    pub const fn new() -> Self {
        Self {
            regs: Regs {
                iofs: 0,
                ilen: 0,
                oofs: 0,
                olen: 0,
            },
            ofs: 0,
            field_info: FieldInfo {
                name: String::new(),
                is_complex: false,
                index: 0,
            },
            micheline: MichelineState::new(),
            operation: OperationState::new(),
            buffers: Buffers {
                num: NumBuffer::new(),
                capture: Vec::new(),
            },
            errno: None,
        }
    }

    /// Start decoding a bare Micheline expression.
    ///
    /// Input and output windows must be (re)granted after this call.
    pub fn init_micheline(&mut self) {
        self.reset_common();
        self.micheline.reset();
    }

    /// Start decoding a signing payload of `size` total bytes
    /// ([`UNKNOWN_SIZE`] if the total length is not yet known — fix it
    /// later with [`set_total_size`][Parser::set_total_size]).
    ///
    /// With `skip_magic` the leading magic byte is assumed already consumed
    /// and the payload starts directly at the branch hash.
    pub fn init_operation(&mut self, size: u16, skip_magic: bool) {
        self.reset_common();
        self.operation.reset();
        self.op_init_frames(size, skip_magic);
    }

    /// Pin the total envelope length once the caller learns it.
    pub fn set_total_size(&mut self, size: u16) {
        self.op_set_total_size(size);
    }

    fn reset_common(&mut self) {
        self.regs = Regs::default();
        self.ofs = 0;
        self.errno = None;
        self.field_info.name.clear();
        self.field_info.is_complex = false;
        self.field_info.index = 0;
        self.buffers.num.reset();
        self.buffers.capture.clear();
    }

    /// Grant a new input window.
    ///
    /// The previous window must have been fully consumed; the same slice
    /// must then be passed to every step call until the next refill.
    pub fn refill(&mut self, input: &[u8]) {
        debug_assert!(self.regs.ilen == 0, "input window not fully consumed");
        self.regs.iofs = 0;
        self.regs.ilen = input.len();
    }

    /// Grant a fresh output window over `output`, discarding drained text.
    pub fn flush(&mut self, output: &mut [u8]) {
        let oofs = self.regs.oofs;
        self.flush_up_to(output, oofs);
    }

    /// Grant an output window over `output`, keeping the produced-but-not-
    /// yet-drained text past `up_to`: that tail is shifted to the front and
    /// the freed remainder is zero-filled.
    pub fn flush_up_to(&mut self, output: &mut [u8], up_to: usize) {
        let mut kept = self.regs.oofs.saturating_sub(up_to);
        if kept > output.len() || up_to + kept > output.len() {
            kept = 0;
        }
        if kept > 0 {
            output.copy_within(up_to..up_to + kept, 0);
        }
        output[kept..].fill(0);
        self.regs.oofs = kept;
        self.regs.olen = output.len() - kept;
    }

    /// Produced output bytes not yet drained.
    pub fn output_len(&self) -> usize {
        self.regs.oofs
    }

    /// Total input bytes consumed since init.
    pub fn consumed(&self) -> usize {
        self.ofs
    }

    /// Field currently being rendered.
    pub fn field_info(&self) -> &FieldInfo {
        &self.field_info
    }

    /// Whether the decoded expression was a bare annotation-free `Unit`
    /// (typically: no meaningful payload).
    pub fn is_unit(&self) -> bool {
        self.micheline.is_unit
    }

    /// Wipe the scratch buffers of payload-derived data.
    ///
    /// For callers abandoning a decode mid-flight; the parser must be
    /// re-initialised before reuse.
    pub fn wipe(&mut self) {
        self.buffers.num.bytes.zeroize();
        wipe_vec(&mut self.buffers.num.decimal);
        wipe_vec(&mut self.buffers.capture);
        self.field_info.name.clear();
        self.errno = Some(Error::InvalidState);
    }

    // --- byte-level primitives -------------------------------------------

    /// Consume one input byte, suspending if the window is empty.
    pub(crate) fn read(&mut self, input: &[u8]) -> Result<u8, Interrupt> {
        if self.regs.ilen < 1 {
            return Err(Interrupt::FeedMe);
        }
        let b = match input.get(self.regs.iofs) {
            Some(b) => *b,
            None => return fail(Error::InvalidState),
        };
        self.regs.iofs += 1;
        self.regs.ilen -= 1;
        self.ofs += 1;
        Ok(b)
    }

    /// Look at the next input byte without consuming it.
    pub(crate) fn peek(&self, input: &[u8]) -> Result<u8, Interrupt> {
        if self.regs.ilen < 1 {
            return Err(Interrupt::FeedMe);
        }
        match input.get(self.regs.iofs) {
            Some(b) => Ok(*b),
            None => fail(Error::InvalidState),
        }
    }

    /// Consume the byte previously returned by [`peek`][Parser::peek].
    pub(crate) fn skip(&mut self) {
        self.regs.iofs += 1;
        self.regs.ilen = self.regs.ilen.saturating_sub(1);
        self.ofs += 1;
    }

    /// Append one character to the output window, suspending if full.
    pub(crate) fn put(&mut self, output: &mut [u8], c: u8) -> StepResult {
        if self.regs.olen < 1 {
            return Err(Interrupt::ImFull);
        }
        match output.get_mut(self.regs.oofs) {
            Some(slot) => *slot = c,
            None => return fail(Error::InvalidState),
        }
        self.regs.oofs += 1;
        self.regs.olen -= 1;
        Ok(())
    }

    // --- shared step plumbing --------------------------------------------

    /// Latched error, if any.
    pub(crate) fn latched(&self) -> Option<Error> {
        self.errno
    }

    /// Translate a step outcome into the public status, latching errors.
    pub(crate) fn finish_step(&mut self, r: StepResult) -> Status {
        match r {
            Ok(()) => Status::Continue,
            Err(Interrupt::Done) => Status::Done,
            Err(Interrupt::FeedMe) => Status::FeedMe,
            Err(Interrupt::ImFull) => Status::ImFull,
            Err(Interrupt::Failed(e)) => {
                #[cfg(feature = "log")]
                log::error!("decode failed: {}", e.name());

                self.errno = Some(e);
                Status::Error(e)
            }
        }
    }

    /// Replace the field name.
    pub(crate) fn set_field_name(&mut self, name: &str) {
        self.field_info.name.clear();
        for c in name.chars() {
            if self.field_info.name.push(c).is_err() {
                break;
            }
        }
    }

    /// Replace the field name with `name (index)`.
    pub(crate) fn set_field_name_indexed(&mut self, name: &str, index: u16) {
        self.field_info.name.clear();
        let _ = write!(self.field_info.name, "{name} ({index})");
    }

    /// Stage `text` in the capture buffer.
    pub(crate) fn set_capture(&mut self, text: &[u8]) {
        self.buffers.capture.clear();
        let _ = self.buffers.capture.extend_from_slice(text);
    }
}

/// Zero a heapless byte vector through its full capacity.
fn wipe_vec<const N: usize>(v: &mut Vec<u8, N>) {
    let _ = v.resize(N, 0);
    v[..].zeroize();
    v.clear();
}
