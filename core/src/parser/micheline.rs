// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Micheline binary-to-text decoder.
//!
//! A fixed-depth stack automaton producing the textual notation of one
//! Micheline value, one output character (and at most one input byte) per
//! invocation. Each frame captures one in-flight grammar rule: the step to
//! perform next, the offset at which the current length-delimited region
//! ends, and step-specific scratch.
//!
//! Wire layout: a tag byte selects the node kind — 0 int (continuation-
//! coded), 1 string, 2 sequence and 10 bytes (all three length-delimited by
//! a 4-byte big-endian size), 3..=8 primitives with 0/1/2 arguments with or
//! without an annotation, 9 primitive with size-prefixed arguments and
//! annotation.

use strum::Display;

use super::num::{self, NumRegs};
use super::{fail, Error, Interrupt, Parser, Status, StepResult};
use crate::format::michelson;

/// Maximum nesting depth handled.
pub(crate) const MICHELINE_STACK_DEPTH: usize = 45;

/// Accumulated-size guard enforcing the 16-bit length budget: a size
/// accumulator above this before the final shift would not fit.
pub(crate) const SIZE_ACC_LIMIT: u16 = 255;

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Next action of a frame, with its scratch payload.
#[derive(Copy, Clone, Debug, Display)]
pub(crate) enum MichStep {
    /// Read a tag byte and plan the node it selects
    Tag,
    /// Read and validate the primitive opcode
    PrimOp { nargs: u8, wrap: bool, annot: bool },
    /// Stream out the primitive mnemonic
    PrimName {
        op: u8,
        ofs: u8,
        nargs: u8,
        wrap: bool,
        annot: bool,
        first: bool,
    },
    /// Walk primitive arguments and trailing annotation
    Prim {
        nargs: u8,
        wrap: bool,
        annot: bool,
        spc: bool,
    },
    /// Read a 4-byte big-endian size, then fix the parent's stop offset
    Size { size: u16 },
    /// Stream out `{ ; }`-separated child values
    Seq { first: bool },
    /// Stream out a `0x` hex literal, one nibble of scratch
    Bytes { first: bool, rem_half: Option<u8> },
    /// Stream out a quoted, escaped string literal
    Str { first: bool },
    /// Stream out a primitive annotation
    Annot { first: bool },
    /// Feed the number decoder
    Int(NumRegs),
    /// Flush the decoded number, sign first
    PrintInt { sign: bool, ofs: usize },
    /// Flush the capture buffer (escape sequences)
    PrintCapture { ofs: usize },
}

/// One saved point of progress.
#[derive(Copy, Clone, Debug)]
pub(crate) struct MichFrame {
    pub step: MichStep,
    /// Offset at which the current length-delimited region ends
    pub stop: usize,
}

const IDLE_FRAME: MichFrame = MichFrame {
    step: MichStep::Tag,
    stop: 0,
};

/// Micheline decoder state: the frame stack and the unit flag.
pub(crate) struct MichelineState {
    stack: [MichFrame; MICHELINE_STACK_DEPTH],
    /// Current frame index; `None` once the root frame has popped
    depth: Option<usize>,
    /// Whether the value was a bare annotation-free `Unit`
    pub is_unit: bool,
}

impl MichelineState {
    pub const fn new() -> Self {
        Self {
            stack: [IDLE_FRAME; MICHELINE_STACK_DEPTH],
            depth: None,
            is_unit: false,
        }
    }

    /// Arm the automaton for one value.
    pub fn reset(&mut self) {
        self.stack[0] = IDLE_FRAME;
        self.depth = Some(0);
        self.is_unit = false;
    }
}

impl Parser {
    /// Advance the Micheline decode by one step.
    ///
    /// `input` and `output` must be the buffers granted by the last
    /// [`refill`][Parser::refill] / [`flush`][Parser::flush].
    #[cfg_attr(feature = "noinline", inline(never))]
    pub fn micheline_step(&mut self, input: &[u8], output: &mut [u8]) -> Status {
        if let Some(e) = self.latched() {
            return Status::Error(e);
        }
        let r = self.mich_step_once(input, output);
        self.finish_step(r)
    }

    /// One micro-step; also driven by the operation decoder for
    /// expression fields.
    pub(crate) fn mich_step_once(&mut self, input: &[u8], output: &mut [u8]) -> StepResult {
        let depth = match self.micheline.depth {
            Some(d) => d,
            None => return Err(Interrupt::Done),
        };
        let frame = self.micheline.stack[depth];

        #[cfg(feature = "log")]
        log::trace!(
            "micheline(frame: {}, offset: {}/{}, step: {})",
            depth,
            self.ofs,
            frame.stop,
            frame.step
        );

        match frame.step {
            MichStep::Tag => self.mich_step_tag(input, depth),
            MichStep::PrimOp { nargs, wrap, annot } => {
                self.mich_step_prim_op(input, depth, nargs, wrap, annot)
            }
            MichStep::PrimName {
                op,
                ofs,
                nargs,
                wrap,
                annot,
                first,
            } => self.mich_step_prim_name(output, depth, op, ofs, nargs, wrap, annot, first),
            MichStep::Prim {
                nargs,
                wrap,
                annot,
                spc,
            } => self.mich_step_prim(output, depth, frame.stop, nargs, wrap, annot, spc),
            MichStep::Size { size } => self.mich_step_size(input, depth, size),
            MichStep::Seq { first } => self.mich_step_seq(output, depth, frame.stop, first),
            MichStep::Bytes { first, rem_half } => {
                self.mich_step_bytes(input, output, depth, frame.stop, first, rem_half)
            }
            MichStep::Str { first } => self.mich_step_str(input, output, depth, frame.stop, first),
            MichStep::Annot { first } => {
                self.mich_step_annot(input, output, depth, frame.stop, first)
            }
            MichStep::Int(regs) => self.mich_step_int(input, depth, regs),
            MichStep::PrintInt { sign, ofs } => self.mich_step_print_int(output, depth, sign, ofs),
            MichStep::PrintCapture { ofs } => self.mich_step_print_capture(output, depth, ofs),
        }
    }

    // --- stack primitives ------------------------------------------------

    fn mich_push(&mut self, step: MichStep) -> StepResult {
        let m = &mut self.micheline;
        match m.depth {
            Some(d) if d + 1 < MICHELINE_STACK_DEPTH => {
                m.depth = Some(d + 1);
                m.stack[d + 1] = MichFrame { step, stop: 0 };
                Ok(())
            }
            Some(_) => fail(Error::TooDeep),
            None => fail(Error::InvalidState),
        }
    }

    fn mich_pop(&mut self) -> StepResult {
        let m = &mut self.micheline;
        match m.depth {
            Some(0) => {
                m.depth = None;
                Err(Interrupt::Done)
            }
            Some(d) => {
                m.depth = Some(d - 1);
                Ok(())
            }
            None => fail(Error::InvalidState),
        }
    }

    /// Push a frame reading the 4-byte size of the region that follows.
    fn mich_begin_sized(&mut self) -> StepResult {
        self.mich_push(MichStep::Size { size: 0 })?;
        if let Some(d) = self.micheline.depth {
            self.micheline.stack[d].stop = self.ofs + 4;
        }
        Ok(())
    }

    // --- steps -----------------------------------------------------------

    /// Plan the steps for the node selected by a tag byte.
    fn mich_step_tag(&mut self, input: &[u8], depth: usize) -> StepResult {
        let t = self.read(input)?;
        match t {
            // int
            0 => {
                self.buffers.num.reset();
                self.micheline.stack[depth].step = MichStep::Int(NumRegs::default());
            }
            // string
            1 => {
                self.micheline.stack[depth].step = MichStep::Str { first: true };
                self.mich_begin_sized()?;
            }
            // sequence
            2 => {
                self.micheline.stack[depth].step = MichStep::Seq { first: true };
                self.mich_begin_sized()?;
            }
            // primitives with fixed arity; even tags carry an annotation
            3..=8 => {
                let nargs = (t - 3) >> 1;
                let annot = t & 1 == 0;
                let wrap = self.mich_in_prim(depth) && (nargs > 0 || annot);
                self.micheline.stack[depth].step = MichStep::PrimOp { nargs, wrap, annot };
            }
            // primitive with size-prefixed arguments
            9 => {
                let wrap = self.mich_in_prim(depth);
                self.micheline.stack[depth].step = MichStep::PrimOp {
                    nargs: 3,
                    wrap,
                    annot: true,
                };
            }
            // bytes
            10 => {
                self.micheline.stack[depth].step = MichStep::Bytes {
                    first: true,
                    rem_half: None,
                };
                self.mich_begin_sized()?;
            }
            _ => return fail(Error::InvalidTag),
        }
        Ok(())
    }

    /// Whether the current node is an argument of a primitive (and thus a
    /// candidate for parenthesisation).
    fn mich_in_prim(&self, depth: usize) -> bool {
        depth > 0
            && matches!(
                self.micheline.stack[depth - 1].step,
                MichStep::Prim { .. }
            )
    }

    fn mich_step_prim_op(
        &mut self,
        input: &[u8],
        depth: usize,
        nargs: u8,
        wrap: bool,
        annot: bool,
    ) -> StepResult {
        let op = self.read(input)?;
        if michelson::op_name(op).is_none() {
            return fail(Error::InvalidOp);
        }
        self.micheline.is_unit =
            depth == 0 && op == michelson::OP_UNIT && nargs == 0 && !annot;
        self.micheline.stack[depth].step = MichStep::PrimName {
            op,
            ofs: 0,
            nargs,
            wrap,
            annot,
            first: true,
        };
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn mich_step_prim_name(
        &mut self,
        output: &mut [u8],
        depth: usize,
        op: u8,
        mut ofs: u8,
        nargs: u8,
        wrap: bool,
        annot: bool,
        mut first: bool,
    ) -> StepResult {
        if wrap && first {
            self.put(output, b'(')?;
            first = false;
            self.micheline.stack[depth].step = MichStep::PrimName {
                op,
                ofs,
                nargs,
                wrap,
                annot,
                first,
            };
        }
        let name = match michelson::op_name(op) {
            Some(n) => n.as_bytes(),
            None => return fail(Error::InvalidState),
        };
        if let Some(c) = name.get(ofs as usize) {
            self.put(output, *c)?;
            ofs += 1;
            self.micheline.stack[depth].step = MichStep::PrimName {
                op,
                ofs,
                nargs,
                wrap,
                annot,
                first,
            };
        } else {
            self.micheline.stack[depth].step = MichStep::Prim {
                nargs,
                wrap,
                annot,
                spc: false,
            };
            if nargs == 3 {
                self.mich_begin_sized()?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn mich_step_prim(
        &mut self,
        output: &mut [u8],
        depth: usize,
        stop: usize,
        nargs: u8,
        wrap: bool,
        annot: bool,
        spc: bool,
    ) -> StepResult {
        if nargs == 0 || (nargs == 3 && stop == self.ofs) {
            if annot {
                self.micheline.stack[depth].step = MichStep::Prim {
                    nargs,
                    wrap,
                    annot: false,
                    spc,
                };
                self.mich_push(MichStep::Annot { first: true })?;
                self.mich_begin_sized()?;
            } else {
                if wrap {
                    self.put(output, b')')?;
                }
                self.mich_pop()?;
            }
        } else if !spc {
            self.put(output, b' ')?;
            self.micheline.stack[depth].step = MichStep::Prim {
                nargs,
                wrap,
                annot,
                spc: true,
            };
        } else {
            let nargs = if nargs < 3 { nargs - 1 } else { nargs };
            self.micheline.stack[depth].step = MichStep::Prim {
                nargs,
                wrap,
                annot,
                spc: false,
            };
            self.mich_push(MichStep::Tag)?;
        }
        Ok(())
    }

    fn mich_step_size(&mut self, input: &[u8], depth: usize, mut size: u16) -> StepResult {
        let b = self.read(input)?;
        if size > SIZE_ACC_LIMIT {
            return fail(Error::TooLarge);
        }
        size = (size << 8) | b as u16;
        self.micheline.stack[depth].step = MichStep::Size { size };
        if self.micheline.stack[depth].stop == self.ofs {
            let parent = match depth.checked_sub(1) {
                Some(p) => p,
                None => return fail(Error::InvalidState),
            };
            self.micheline.stack[parent].stop = self.ofs + size as usize;
            self.mich_pop()?;
        }
        Ok(())
    }

    fn mich_step_seq(
        &mut self,
        output: &mut [u8],
        depth: usize,
        stop: usize,
        first: bool,
    ) -> StepResult {
        if stop == self.ofs {
            if first {
                self.put(output, b'{')?;
                self.micheline.stack[depth].step = MichStep::Seq { first: false };
            } else {
                self.put(output, b'}')?;
                self.mich_pop()?;
            }
        } else {
            if first {
                self.put(output, b'{')?;
                self.micheline.stack[depth].step = MichStep::Seq { first: false };
            } else {
                self.put(output, b';')?;
            }
            self.mich_push(MichStep::Tag)?;
        }
        Ok(())
    }

    fn mich_step_bytes(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        depth: usize,
        stop: usize,
        first: bool,
        rem_half: Option<u8>,
    ) -> StepResult {
        if let Some(c) = rem_half {
            self.put(output, c)?;
            self.micheline.stack[depth].step = MichStep::Bytes {
                first,
                rem_half: None,
            };
        } else if first {
            self.put(output, b'0')?;
            self.micheline.stack[depth].step = MichStep::Bytes {
                first: false,
                rem_half: Some(b'x'),
            };
        } else if stop == self.ofs {
            self.mich_pop()?;
        } else {
            let b = self.peek(input)?;
            self.put(output, HEX_UPPER[(b >> 4) as usize])?;
            self.micheline.stack[depth].step = MichStep::Bytes {
                first,
                rem_half: Some(HEX_UPPER[(b & 0x0f) as usize]),
            };
            self.skip();
        }
        Ok(())
    }

    fn mich_step_str(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        depth: usize,
        stop: usize,
        first: bool,
    ) -> StepResult {
        if first {
            self.put(output, b'"')?;
            self.micheline.stack[depth].step = MichStep::Str { first: false };
        } else if stop == self.ofs {
            self.put(output, b'"')?;
            self.mich_pop()?;
        } else {
            let b = self.peek(input)?;
            if (0x20..0x80).contains(&b) && b != b'"' && b != b'\\' {
                self.put(output, b)?;
                self.skip();
            } else {
                self.skip();
                self.mich_print_escaped(b)?;
            }
        }
        Ok(())
    }

    /// Stage the escape sequence for `b` and print it.
    fn mich_print_escaped(&mut self, b: u8) -> StepResult {
        self.mich_push(MichStep::PrintCapture { ofs: 0 })?;
        match b {
            b'\\' => self.set_capture(b"\\\\"),
            b'"' => self.set_capture(b"\\\""),
            b'\r' => self.set_capture(b"\\r"),
            b'\n' => self.set_capture(b"\\n"),
            b'\t' => self.set_capture(b"\\t"),
            _ => self.set_capture(&[
                b'0' + b / 100,
                b'0' + (b / 10) % 10,
                b'0' + b % 10,
            ]),
        }
        Ok(())
    }

    fn mich_step_annot(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        depth: usize,
        stop: usize,
        first: bool,
    ) -> StepResult {
        if first {
            // propagate the annotation end to the enclosing primitive
            let parent = match depth.checked_sub(1) {
                Some(p) => p,
                None => return fail(Error::InvalidState),
            };
            self.micheline.stack[parent].stop = stop;
        }
        if stop == self.ofs {
            self.mich_pop()?;
        } else {
            if first {
                self.put(output, b' ')?;
                self.micheline.stack[depth].step = MichStep::Annot { first: false };
            }
            let b = self.peek(input)?;
            self.put(output, b)?;
            self.skip();
        }
        Ok(())
    }

    fn mich_step_int(&mut self, input: &[u8], depth: usize, mut regs: NumRegs) -> StepResult {
        let b = self.read(input)?;
        num::int_step(&mut self.buffers.num, &mut regs, b)?;
        if regs.stop {
            self.micheline.stack[depth].step = MichStep::PrintInt {
                sign: regs.sign,
                ofs: 0,
            };
        } else {
            self.micheline.stack[depth].step = MichStep::Int(regs);
        }
        Ok(())
    }

    fn mich_step_print_int(
        &mut self,
        output: &mut [u8],
        depth: usize,
        sign: bool,
        ofs: usize,
    ) -> StepResult {
        if sign {
            self.put(output, b'-')?;
            self.micheline.stack[depth].step = MichStep::PrintInt { sign: false, ofs };
        } else if let Some(c) = self.buffers.num.decimal.get(ofs).copied() {
            self.put(output, c)?;
            self.micheline.stack[depth].step = MichStep::PrintInt {
                sign: false,
                ofs: ofs + 1,
            };
        } else {
            self.mich_pop()?;
        }
        Ok(())
    }

    fn mich_step_print_capture(
        &mut self,
        output: &mut [u8],
        depth: usize,
        ofs: usize,
    ) -> StepResult {
        if let Some(c) = self.buffers.capture.get(ofs).copied() {
            self.put(output, c)?;
            self.micheline.stack[depth].step = MichStep::PrintCapture { ofs: ofs + 1 };
        } else {
            self.mich_pop()?;
        }
        Ok(())
    }
}
