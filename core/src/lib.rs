// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Tezos hardware wallet decoding core
//!
//! This provides the streaming [Parser][parser::Parser] used to render
//! untrusted signing payloads (Micheline expressions and operation groups)
//! into human-readable text on memory-constrained devices.
//!
//! The payload arrives in chunks over the command channel and must be
//! displayed while chunks are still in flight, so both decoders are
//! re-entrant at byte granularity: the transport layer grants input and
//! output windows with [`refill`][parser::Parser::refill] and
//! [`flush`][parser::Parser::flush], then invokes a step function until it
//! reports a blocking [`Status`][parser::Status]:
//!
//! 1. [`Status::FeedMe`][parser::Status::FeedMe] — the input window is
//!    exhausted, fetch the next chunk and `refill`
//! 2. [`Status::ImFull`][parser::Status::ImFull] — the output window is
//!    full (or a field finished rendering), drain it to the display and
//!    `flush`
//! 3. [`Status::Done`][parser::Status::Done] — the payload is fully decoded
//!
//! All decode progress lives in explicit fixed-capacity frame stacks, so a
//! step may suspend between any two bytes and resume later; oversized or
//! overly nested input is rejected with a typed
//! [`Error`][parser::Error] rather than exhausting device memory. Once an
//! error is reported the decode is dead: every further step returns the same
//! error.
//!
//! While decoding an operation group the parser accumulates
//! security-relevant aggregates (total fee, total amount, batch index,
//! source consistency) which the caller reads once decoding completes, and
//! publishes the name of the field currently being rendered through the
//! [`FieldInfo`][parser::FieldInfo] side channel.
//!
//! [`format`] holds the single-shot codec primitives (arbitrary-precision
//! decimal, base58 / base58check, address, key and hash renderers) shared by
//! both decoders.
//!
//! Transport framing, signing, key derivation and screen paging are
//! deliberately out of scope: this crate only turns bytes into text and
//! status codes.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod format;

pub mod parser;

pub use parser::{Error, FieldInfo, Parser, Status};
