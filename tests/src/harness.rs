// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Streaming decode harness.

use anyhow::{bail, Result};
use ledger_tez_core::{parser::UNKNOWN_SIZE, Parser, Status};

/// How to drive a decode.
#[derive(Copy, Clone, Debug)]
pub struct Options {
    /// Input granted `chunk` bytes at a time (0: everything at once)
    pub chunk: usize,
    /// Output window capacity per flush
    pub window: usize,
    /// Start at the branch hash, magic byte already consumed
    pub skip_magic: bool,
    /// Start with [`UNKNOWN_SIZE`] and pin the envelope length only when
    /// granting the final chunk, as the transport does
    pub late_size: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            chunk: 0,
            window: 64,
            skip_magic: false,
            late_size: false,
        }
    }
}

/// Everything a decode produced.
#[derive(Clone, Debug, Default)]
pub struct Decoded {
    /// (field name, rendered text) in display order, consecutive drains of
    /// the same field merged
    pub fields: Vec<(String, String)>,
    /// Names of fields flagged complex while rendering
    pub complex_fields: Vec<String>,
    /// Concatenation of every output byte, in production order
    pub text: String,
    pub total_fee: u64,
    pub total_amount: u64,
    pub batch_index: u16,
    pub is_unit: bool,
    pub seen_reveal: bool,
}

impl Decoded {
    /// Rendered text of the first field with this name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Decode a bare Micheline value.
pub fn decode_micheline(payload: &[u8], opts: Options) -> Result<Decoded> {
    let mut parser = Parser::new();
    parser.init_micheline();
    drive(parser, Parser::micheline_step, payload, opts)
}

/// Decode a signing payload (operation group or magic-prefixed expression).
pub fn decode_operation(payload: &[u8], opts: Options) -> Result<Decoded> {
    let mut parser = Parser::new();
    let size = if opts.late_size {
        UNKNOWN_SIZE
    } else {
        u16::try_from(payload.len())?
    };
    parser.init_operation(size, opts.skip_magic);
    drive(parser, Parser::operation_step, payload, opts)
}

/// Step until done, granting windows on every suspension.
fn drive(
    mut parser: Parser,
    step: fn(&mut Parser, &[u8], &mut [u8]) -> Status,
    payload: &[u8],
    opts: Options,
) -> Result<Decoded> {
    assert!(opts.window > 0, "output window must hold at least one byte");

    let chunk = if opts.chunk == 0 {
        payload.len().max(1)
    } else {
        opts.chunk
    };
    let mut chunks = payload.chunks(chunk);
    let mut granted = chunks.len();
    let mut current: &[u8] = &[];

    let mut out = vec![0u8; opts.window];
    parser.flush(&mut out);
    parser.refill(current);

    let mut decoded = Decoded::default();
    // generous bound: every step either consumes input, emits output or
    // pops a frame, so a healthy decode is far below this
    let budget = 64 * (payload.len() + 16) * (1 + 512 / opts.window);

    for _ in 0..budget {
        match step(&mut parser, current, &mut out) {
            Status::Continue => (),
            Status::FeedMe => {
                current = match chunks.next() {
                    Some(c) => c,
                    None => bail!("decoder starved: consumed {}", parser.consumed()),
                };
                granted -= 1;
                parser.refill(current);
                if granted == 0 && opts.late_size {
                    parser.set_total_size(u16::try_from(payload.len())?);
                }
            }
            Status::ImFull => drain(&mut parser, &mut out, &mut decoded),
            Status::Done => {
                drain(&mut parser, &mut out, &mut decoded);
                decoded.total_fee = parser.total_fee();
                decoded.total_amount = parser.total_amount();
                decoded.batch_index = parser.batch_index();
                decoded.is_unit = parser.is_unit();
                decoded.seen_reveal = parser.seen_reveal();
                return Ok(decoded);
            }
            Status::Error(e) => bail!("decode error: {}", e.name()),
        }
    }
    bail!("decoder did not terminate within {budget} steps")
}

/// Move produced text into the result, labelled with the current field.
fn drain(parser: &mut Parser, out: &mut [u8], decoded: &mut Decoded) {
    let n = parser.output_len();
    if n > 0 {
        let text = String::from_utf8_lossy(&out[..n]).into_owned();
        decoded.text.push_str(&text);

        let name = parser.field_info().name.as_str().to_string();
        if parser.field_info().is_complex && decoded.complex_fields.last() != Some(&name) {
            decoded.complex_fields.push(name.clone());
        }
        match decoded.fields.last_mut() {
            Some((last, value)) if *last == name => value.push_str(&text),
            _ => decoded.fields.push((name, text)),
        }
    }
    parser.flush(out);
}
