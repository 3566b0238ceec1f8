// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Operation-group decoder.
//!
//! A second, shallower stack automaton driven by the declarative field
//! [`schema`]: a magic byte selects between a bare Micheline expression and
//! an operation group; a group is a 32-byte branch hash followed by
//! operations (one-byte kind tag, then the descriptor's fields) until the
//! declared envelope is consumed. Micheline sub-values are delegated to the
//! Micheline automaton, numbers to the incremental number decoder.
//!
//! Every displayable leaf refreshes the field-info side channel before it
//! renders, and completing a value forces an output drain so the display
//! layer always sees whole labelled lines. Fee and amount fields also feed
//! the running per-batch totals, whether or not they are displayed.

use heapless::Vec;
use strum::Display;

use super::num::{self, NumRegs, NUM_DECIMAL_SIZE};
use super::schema::{self, FieldDescriptor, FieldKind, OperationTag};
use super::{fail, Error, Interrupt, Parser, Status, StepResult};
use crate::format::{self, Prefix};

/// Maximum descriptor nesting handled (option / tuple / expression).
pub(crate) const OPERATION_STACK_DEPTH: usize = 6;

/// Envelope-size sentinel used until the caller knows the total length.
pub const UNKNOWN_SIZE: u16 = u16::MAX;

/// 16-bit length-budget guard, shared with the Micheline automaton.
const SIZE_ACC_LIMIT: u16 = super::micheline::SIZE_ACC_LIMIT;

const HEX_LOWER: &[u8; 16] = b"0123456789abcdef";

const UNSET_MESSAGE: &str = "Field unset";
const EXPRESSION_NAME: &str = "Expression";
const BRANCH_NAME: &str = "Branch";

/// Where a print step takes its characters from.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum PrintSource {
    /// Compiled-in text
    Static(&'static str),
    /// The capture buffer (cleared once fully printed)
    Capture,
    /// The number decoder's digit scratch
    Decimal,
}

/// Fixed-width payload kinds read through the capture buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum BytesKind {
    Source,
    Pkh,
    Pk,
    Rollup,
    RollupCommitment,
    Proto,
    Destination,
    BlockHash,
}

/// Number kinds; amounts and fees feed the batch totals.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum NumKind {
    Int,
    Nat,
    Amount,
    Fee,
}

/// Next action of a frame, with its scratch payload.
#[derive(Copy, Clone, Debug, Display)]
pub(crate) enum OpStep {
    /// Read the presence byte of an optional field
    Option {
        field: &'static FieldDescriptor,
        display_none: bool,
    },
    /// Walk the fields of a descriptor list
    Tuple {
        fields: &'static [FieldDescriptor],
        index: usize,
    },
    /// Read the leading magic byte
    Magic,
    /// Consume the branch hash, then loop over operations
    Branch,
    /// Loop over operations until the envelope ends
    Batch,
    /// Read a one-byte operation kind tag
    Tag,
    /// Read a `len`-byte big-endian size, then fix the parent's stop offset
    Size { size: u16, len: u8 },
    /// Plan the steps for one field
    Field { field: &'static FieldDescriptor },
    /// Stream out text; non-partial prints force a drain when done
    Print {
        source: PrintSource,
        ofs: usize,
        partial: bool,
    },
    /// Feed the number decoder
    ReadNum {
        regs: NumRegs,
        kind: NumKind,
        skip: bool,
        natural: bool,
    },
    /// Read a 4-byte big-endian signed integer
    ReadInt32 { acc: u32, ofs: u8, skip: bool },
    /// Peek the curve tag of a public key to learn its length
    ReadPk { skip: bool },
    /// Read `len` bytes into the capture buffer, then render them
    ReadBytes {
        kind: BytesKind,
        skip: bool,
        len: usize,
    },
    /// Read a length-delimited literal string
    ReadString { skip: bool },
    /// Read length-delimited raw bytes, rendered as hex (chunked through
    /// the capture buffer for arbitrarily long payloads)
    ReadBinary { skip: bool },
    /// Read an entrypoint tag byte
    ReadEntrypoint { skip: bool },
    /// Delegate a length-delimited region to the Micheline decoder
    ReadMicheline { name: &'static str, inited: bool },
    /// Read a list of length-prefixed rollup messages
    ReadRollupMessages {
        name: &'static str,
        index: u16,
        skip: bool,
    },
    /// Read a rollup kind tag byte
    ReadRollupKind { skip: bool },
    /// Read a ballot tag byte
    ReadBallot { skip: bool },
    /// Read a list of protocol hashes
    ReadProtos {
        name: &'static str,
        index: u16,
        skip: bool,
    },
    /// Read a list of public key hashes
    ReadPkhList {
        name: &'static str,
        index: u16,
        skip: bool,
    },
}

/// One saved point of progress.
#[derive(Copy, Clone, Debug)]
pub(crate) struct OpFrame {
    pub step: OpStep,
    /// Offset at which the current length-delimited region ends
    pub stop: usize,
}

const IDLE_FRAME: OpFrame = OpFrame {
    step: OpStep::Magic,
    stop: 0,
};

/// Operation decoder state: frame stack plus per-batch aggregates.
pub(crate) struct OperationState {
    stack: [OpFrame; OPERATION_STACK_DEPTH],
    /// Current frame index; `None` once the root frame has popped
    depth: Option<usize>,
    /// A Reveal operation has been seen in this batch
    pub seen_reveal: bool,
    /// Raw source of the last manager operation, for batch consistency
    pub source: [u8; 22],
    /// Raw destination of the last transfer, for entrypoint dispatch
    pub destination: [u8; 22],
    /// Operations consumed so far
    pub batch_index: u16,
    #[cfg(feature = "swap")]
    /// Kind of the most recent operation
    pub last_tag: Option<OperationTag>,
    #[cfg(feature = "swap")]
    /// Number of Reveal operations seen
    pub nb_reveal: u16,
    /// Running fee total, in mutez
    pub total_fee: u64,
    /// Running transfer total, in mutez
    pub total_amount: u64,
}

impl OperationState {
    pub const fn new() -> Self {
        Self {
            stack: [IDLE_FRAME; OPERATION_STACK_DEPTH],
            depth: None,
            seen_reveal: false,
            source: [0; 22],
            destination: [0; 22],
            batch_index: 0,
            #[cfg(feature = "swap")]
            last_tag: None,
            #[cfg(feature = "swap")]
            nb_reveal: 0,
            total_fee: 0,
            total_amount: 0,
        }
    }

    /// Clear all aggregates for a fresh decode.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Parser {
    /// Advance the operation decode by one step.
    ///
    /// `input` and `output` must be the buffers granted by the last
    /// [`refill`][Parser::refill] / [`flush`][Parser::flush].
    #[cfg_attr(feature = "noinline", inline(never))]
    pub fn operation_step(&mut self, input: &[u8], output: &mut [u8]) -> Status {
        if let Some(e) = self.latched() {
            return Status::Error(e);
        }
        let r = self.op_step_once(input, output);
        self.finish_step(r)
    }

    fn op_step_once(&mut self, input: &[u8], output: &mut [u8]) -> StepResult {
        let depth = match self.operation.depth {
            Some(d) => d,
            None => return Err(Interrupt::Done),
        };
        let frame = self.operation.stack[depth];

        #[cfg(feature = "log")]
        log::trace!(
            "operation(frame: {}, offset: {}/{}, step: {})",
            depth,
            self.ofs,
            frame.stop,
            frame.step
        );

        match frame.step {
            OpStep::Option {
                field,
                display_none,
            } => self.op_step_option(input, depth, field, display_none),
            OpStep::Tuple { fields, index } => self.op_step_tuple(depth, fields, index),
            OpStep::Magic => self.op_step_magic(input, depth),
            OpStep::Branch => self.op_step_branch(depth),
            OpStep::Batch => self.op_step_batch(depth, frame.stop),
            OpStep::Tag => self.op_step_tag(input, depth),
            OpStep::Size { size, len } => self.op_step_size(input, depth, size, len),
            OpStep::Field { field } => self.op_step_field(depth, field),
            OpStep::Print {
                source,
                ofs,
                partial,
            } => self.op_step_print(output, depth, source, ofs, partial),
            OpStep::ReadNum {
                regs,
                kind,
                skip,
                natural,
            } => self.op_step_read_num(input, depth, regs, kind, skip, natural),
            OpStep::ReadInt32 { acc, ofs, skip } => {
                self.op_step_read_int32(input, depth, acc, ofs, skip)
            }
            OpStep::ReadPk { skip } => self.op_step_read_pk(input, depth, skip),
            OpStep::ReadBytes { kind, skip, len } => {
                self.op_step_read_bytes(input, depth, kind, skip, len)
            }
            OpStep::ReadString { skip } => self.op_step_read_string(input, depth, frame.stop, skip),
            OpStep::ReadBinary { skip } => self.op_step_read_binary(input, depth, frame.stop, skip),
            OpStep::ReadEntrypoint { skip } => self.op_step_read_entrypoint(input, depth, skip),
            OpStep::ReadMicheline { name, inited } => {
                self.op_step_read_micheline(input, output, depth, name, inited, frame.stop)
            }
            OpStep::ReadRollupMessages { name, index, skip } => {
                self.op_step_read_rollup_messages(depth, frame.stop, name, index, skip)
            }
            OpStep::ReadRollupKind { skip } => self.op_step_read_rollup_kind(input, depth, skip),
            OpStep::ReadBallot { skip } => self.op_step_read_ballot(input, depth, skip),
            OpStep::ReadProtos { name, index, skip } => {
                self.op_step_read_protos(depth, frame.stop, name, index, skip)
            }
            OpStep::ReadPkhList { name, index, skip } => {
                self.op_step_read_pkh_list(depth, frame.stop, name, index, skip)
            }
        }
    }

    // --- lifecycle -------------------------------------------------------

    /// Arm the root frame; see [`Parser::init_operation`].
    pub(crate) fn op_init_frames(&mut self, size: u16, skip_magic: bool) {
        self.operation.depth = Some(0);
        self.operation.stack[0] = OpFrame {
            step: OpStep::Magic,
            stop: size as usize,
        };
        if skip_magic {
            let _ = self.op_begin_branch();
        }
    }

    pub(crate) fn op_set_total_size(&mut self, size: u16) {
        self.operation.stack[0].stop = size as usize;
    }

    // --- aggregate accessors ---------------------------------------------

    /// Running fee total of the batch, in mutez.
    pub fn total_fee(&self) -> u64 {
        self.operation.total_fee
    }

    /// Running transferred-amount total of the batch, in mutez.
    pub fn total_amount(&self) -> u64 {
        self.operation.total_amount
    }

    /// Number of operations consumed so far.
    pub fn batch_index(&self) -> u16 {
        self.operation.batch_index
    }

    /// Whether the batch contains a Reveal operation.
    pub fn seen_reveal(&self) -> bool {
        self.operation.seen_reveal
    }

    /// Raw tagged source of the last manager operation.
    pub fn source(&self) -> &[u8; 22] {
        &self.operation.source
    }

    /// Raw tagged destination of the last transfer.
    pub fn destination(&self) -> &[u8; 22] {
        &self.operation.destination
    }

    /// Kind of the most recent operation.
    #[cfg(feature = "swap")]
    pub fn last_tag(&self) -> Option<OperationTag> {
        self.operation.last_tag
    }

    /// Number of Reveal operations seen.
    #[cfg(feature = "swap")]
    pub fn nb_reveal(&self) -> u16 {
        self.operation.nb_reveal
    }

    // --- stack primitives ------------------------------------------------

    fn op_push(&mut self, step: OpStep) -> StepResult {
        let op = &mut self.operation;
        match op.depth {
            Some(d) if d + 1 < OPERATION_STACK_DEPTH => {
                op.depth = Some(d + 1);
                op.stack[d + 1] = OpFrame { step, stop: 0 };
                Ok(())
            }
            Some(_) => fail(Error::TooDeep),
            None => fail(Error::InvalidState),
        }
    }

    fn op_pop(&mut self) -> StepResult {
        let op = &mut self.operation;
        match op.depth {
            Some(0) => {
                op.depth = None;
                Err(Interrupt::Done)
            }
            Some(d) => {
                op.depth = Some(d - 1);
                Ok(())
            }
            None => fail(Error::InvalidState),
        }
    }

    /// Push a frame reading a `len`-byte size for the region that follows.
    fn op_push_size(&mut self, len: u8) -> StepResult {
        self.op_push(OpStep::Size { size: 0, len })
    }

    /// Enter the operation-group path: consume the 32-byte branch hash.
    fn op_begin_branch(&mut self) -> StepResult {
        self.set_field_name(BRANCH_NAME);
        if let Some(d) = self.operation.depth {
            self.operation.stack[d].step = OpStep::Branch;
        }
        self.buffers.capture.clear();
        self.op_push(OpStep::ReadBytes {
            kind: BytesKind::BlockHash,
            skip: true,
            len: 32,
        })
    }

    /// Render the capture buffer, or just drop it for skipped fields.
    fn op_print_capture(&mut self, depth: usize, skip: bool) -> StepResult {
        if skip {
            self.op_pop()?;
            return Ok(());
        }
        self.operation.stack[depth].step = OpStep::Print {
            source: PrintSource::Capture,
            ofs: 0,
            partial: false,
        };
        Ok(())
    }

    // --- steps -----------------------------------------------------------

    fn op_step_magic(&mut self, input: &[u8], depth: usize) -> StepResult {
        let b = self.read(input)?;
        match b {
            // operation group
            3 => self.op_begin_branch()?,
            // bare Micheline expression
            5 => {
                self.operation.stack[depth].step = OpStep::ReadMicheline {
                    name: EXPRESSION_NAME,
                    inited: false,
                };
                self.operation.stack[depth].stop = 0;
            }
            _ => return fail(Error::InvalidTag),
        }
        Ok(())
    }

    fn op_step_branch(&mut self, depth: usize) -> StepResult {
        self.operation.stack[depth].step = OpStep::Batch;
        self.op_push(OpStep::Tag)
    }

    fn op_step_batch(&mut self, _depth: usize, stop: usize) -> StepResult {
        self.operation.batch_index += 1;
        if self.ofs == stop {
            self.op_pop()?;
        } else if self.ofs > stop {
            return fail(Error::TooLarge);
        } else {
            self.op_push(OpStep::Tag)?;
        }
        Ok(())
    }

    fn op_step_tag(&mut self, input: &[u8], depth: usize) -> StepResult {
        let t = self.read(input)?;
        let tag = match OperationTag::try_from(t) {
            Ok(tag) => tag,
            Err(_) => return fail(Error::InvalidTag),
        };

        if tag == OperationTag::Reveal {
            self.operation.seen_reveal = true;
        }
        #[cfg(feature = "swap")]
        {
            self.operation.last_tag = Some(tag);
            if tag == OperationTag::Reveal {
                self.operation.nb_reveal += 1;
            }
        }

        let desc = match schema::lookup(tag) {
            Some(d) => d,
            None => return fail(Error::InvalidTag),
        };
        self.operation.stack[depth].step = OpStep::Tuple {
            fields: desc.fields,
            index: 0,
        };
        let index = self.operation.batch_index;
        self.set_field_name_indexed("Operation", index);
        self.op_push(OpStep::Print {
            source: PrintSource::Static(desc.name),
            ofs: 0,
            partial: false,
        })
    }

    fn op_step_size(&mut self, input: &[u8], depth: usize, mut size: u16, len: u8) -> StepResult {
        let b = self.read(input)?;
        if size > SIZE_ACC_LIMIT {
            return fail(Error::TooLarge);
        }
        size = (size << 8) | b as u16;
        let len = len - 1;
        self.operation.stack[depth].step = OpStep::Size { size, len };
        if len == 0 {
            let parent = match depth.checked_sub(1) {
                Some(p) => p,
                None => return fail(Error::InvalidState),
            };
            self.operation.stack[parent].stop = self.ofs + size as usize;
            self.op_pop()?;
        }
        Ok(())
    }

    fn op_step_option(
        &mut self,
        input: &[u8],
        depth: usize,
        field: &'static FieldDescriptor,
        display_none: bool,
    ) -> StepResult {
        let present = self.read(input)?;
        if present == 0 {
            if display_none {
                if field.skip {
                    return fail(Error::InvalidState);
                }
                self.operation.stack[depth].step = OpStep::Print {
                    source: PrintSource::Static(UNSET_MESSAGE),
                    ofs: 0,
                    partial: false,
                };
            } else {
                self.op_pop()?;
            }
        } else {
            self.operation.stack[depth].step = OpStep::Field { field };
        }
        Ok(())
    }

    fn op_step_tuple(
        &mut self,
        depth: usize,
        fields: &'static [FieldDescriptor],
        index: usize,
    ) -> StepResult {
        // remaining text from the previous field is displayed first
        if self.output_len() > 0 {
            return Err(Interrupt::ImFull);
        }

        match fields.get(index) {
            None => {
                // complexity gate does not outlive the field list
                self.field_info.is_complex = false;
                self.op_pop()?;
            }
            Some(field) => {
                self.operation.stack[depth].step = OpStep::Tuple {
                    fields,
                    index: index + 1,
                };
                self.op_push(OpStep::Field { field })?;
            }
        }
        Ok(())
    }

    /// Plan the steps for one field, refreshing the side channel for
    /// displayable fields.
    fn op_step_field(&mut self, depth: usize, field: &'static FieldDescriptor) -> StepResult {
        if !field.skip {
            self.set_field_name(field.name);
            self.field_info.is_complex = field.complex;
            self.field_info.index += 1;
        }

        match field.kind {
            FieldKind::Option {
                field: inner,
                display_none,
            } => {
                self.operation.stack[depth].step = OpStep::Option {
                    field: inner,
                    display_none,
                };
            }
            FieldKind::Tuple { fields } => {
                self.operation.stack[depth].step = OpStep::Tuple { fields, index: 0 };
            }
            FieldKind::Binary => {
                self.operation.stack[depth].step = OpStep::ReadBinary { skip: field.skip };
                self.buffers.capture.clear();
                self.op_push_size(4)?;
            }
            FieldKind::Source => self.op_read_bytes(depth, BytesKind::Source, field.skip, 21),
            FieldKind::Pkh => self.op_read_bytes(depth, BytesKind::Pkh, field.skip, 21),
            FieldKind::Pk => {
                self.operation.stack[depth].step = OpStep::ReadPk { skip: field.skip };
            }
            FieldKind::Rollup => self.op_read_bytes(depth, BytesKind::Rollup, field.skip, 20),
            FieldKind::RollupCommitment => {
                self.op_read_bytes(depth, BytesKind::RollupCommitment, field.skip, 32)
            }
            FieldKind::Proto => self.op_read_bytes(depth, BytesKind::Proto, field.skip, 32),
            FieldKind::Protos => {
                self.operation.stack[depth].step = OpStep::ReadProtos {
                    name: field.name,
                    index: 0,
                    skip: field.skip,
                };
                self.op_push_size(4)?;
            }
            FieldKind::Destination => {
                self.op_read_bytes(depth, BytesKind::Destination, field.skip, 22)
            }
            FieldKind::Nat | FieldKind::Fee | FieldKind::Amount => {
                self.buffers.num.reset();
                self.operation.stack[depth].step = OpStep::ReadNum {
                    regs: NumRegs::default(),
                    kind: match field.kind {
                        FieldKind::Fee => NumKind::Fee,
                        FieldKind::Amount => NumKind::Amount,
                        _ => NumKind::Nat,
                    },
                    skip: field.skip,
                    natural: true,
                };
            }
            FieldKind::Int => {
                self.buffers.num.reset();
                self.operation.stack[depth].step = OpStep::ReadNum {
                    regs: NumRegs::default(),
                    kind: NumKind::Int,
                    skip: field.skip,
                    natural: false,
                };
            }
            FieldKind::Int32 => {
                self.operation.stack[depth].step = OpStep::ReadInt32 {
                    acc: 0,
                    ofs: 0,
                    skip: field.skip,
                };
            }
            FieldKind::SmartEntrypoint => {
                self.operation.stack[depth].step = OpStep::ReadEntrypoint { skip: field.skip };
            }
            FieldKind::Expr => {
                self.operation.stack[depth].step = OpStep::ReadMicheline {
                    name: field.name,
                    inited: false,
                };
                self.op_push_size(4)?;
            }
            FieldKind::String => {
                self.operation.stack[depth].step = OpStep::ReadString { skip: field.skip };
                self.buffers.capture.clear();
                self.op_push_size(4)?;
            }
            FieldKind::RollupMessages => {
                self.operation.stack[depth].step = OpStep::ReadRollupMessages {
                    name: field.name,
                    index: 0,
                    skip: field.skip,
                };
                self.op_push_size(4)?;
            }
            FieldKind::RollupKind => {
                self.operation.stack[depth].step = OpStep::ReadRollupKind { skip: field.skip };
            }
            FieldKind::PkhList => {
                self.operation.stack[depth].step = OpStep::ReadPkhList {
                    name: field.name,
                    index: 0,
                    skip: field.skip,
                };
                self.op_push_size(4)?;
            }
            FieldKind::Ballot => {
                self.operation.stack[depth].step = OpStep::ReadBallot { skip: field.skip };
            }
        }
        Ok(())
    }

    /// Arm a fixed-width capture read.
    fn op_read_bytes(&mut self, depth: usize, kind: BytesKind, skip: bool, len: usize) {
        self.operation.stack[depth].step = OpStep::ReadBytes { kind, skip, len };
        self.buffers.capture.clear();
    }

    fn op_step_read_micheline(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        depth: usize,
        name: &'static str,
        inited: bool,
        stop: usize,
    ) -> StepResult {
        if !inited {
            self.operation.stack[depth].step = OpStep::ReadMicheline { name, inited: true };
            self.set_field_name(name);
            self.micheline.reset();
        }
        match self.mich_step_once(input, output) {
            Err(Interrupt::Done) => {
                if self.micheline.is_unit {
                    self.field_info.is_complex = false;
                }
                if stop != 0 && self.ofs != stop {
                    return fail(Error::TooLarge);
                }
                self.op_pop()?;
                if self.output_len() > 0 {
                    return Err(Interrupt::ImFull);
                }
                Ok(())
            }
            other => other,
        }
    }

    fn op_step_read_num(
        &mut self,
        input: &[u8],
        depth: usize,
        mut regs: NumRegs,
        kind: NumKind,
        skip: bool,
        natural: bool,
    ) -> StepResult {
        let b = self.read(input)?;
        num::num_step(&mut self.buffers.num, &mut regs, b, natural)?;
        self.operation.stack[depth].step = OpStep::ReadNum {
            regs,
            kind,
            skip,
            natural,
        };
        if !regs.stop {
            return Ok(());
        }

        let value = match num::parse_mutez(&self.buffers.num.decimal) {
            Some(v) => v,
            None => return fail(Error::InvalidData),
        };
        match kind {
            NumKind::Amount => {
                self.operation.total_amount = self.operation.total_amount.saturating_add(value)
            }
            NumKind::Fee => {
                self.operation.total_fee = self.operation.total_fee.saturating_add(value)
            }
            NumKind::Int | NumKind::Nat => (),
        }

        if skip {
            self.op_pop()?;
            return Ok(());
        }
        if matches!(kind, NumKind::Fee | NumKind::Amount) {
            format_amount(&mut self.buffers.num.decimal);
        }
        self.operation.stack[depth].step = OpStep::Print {
            source: PrintSource::Decimal,
            ofs: 0,
            partial: false,
        };
        Ok(())
    }

    fn op_step_read_int32(
        &mut self,
        input: &[u8],
        depth: usize,
        acc: u32,
        ofs: u8,
        skip: bool,
    ) -> StepResult {
        if ofs < 4 {
            let b = self.read(input)?;
            self.operation.stack[depth].step = OpStep::ReadInt32 {
                acc: (acc << 8) | b as u32,
                ofs: ofs + 1,
                skip,
            };
        } else {
            let value = acc as i32;
            let mut text: heapless::String<12> = heapless::String::new();
            let _ = core::fmt::Write::write_fmt(&mut text, format_args!("{value}"));
            self.set_capture(text.as_bytes());
            self.op_print_capture(depth, skip)?;
        }
        Ok(())
    }

    fn op_step_read_pk(&mut self, input: &[u8], depth: usize, skip: bool) -> StepResult {
        let b = self.peek(input)?;
        // curve tag is part of the key payload
        let len = match b {
            0 => 33, // edpk
            1 => 34, // sppk
            2 => 34, // p2pk
            3 => 49, // BLpk
            _ => return fail(Error::InvalidTag),
        };
        self.op_read_bytes(depth, BytesKind::Pk, skip, len);
        Ok(())
    }

    fn op_step_read_bytes(
        &mut self,
        input: &[u8],
        depth: usize,
        kind: BytesKind,
        skip: bool,
        len: usize,
    ) -> StepResult {
        if self.buffers.capture.len() < len {
            let b = self.read(input)?;
            if self.buffers.capture.push(b).is_err() {
                return fail(Error::TooLarge);
            }
            return Ok(());
        }

        if skip {
            self.op_pop()?;
            return Ok(());
        }

        let mut payload = [0u8; 49];
        payload[..len].copy_from_slice(&self.buffers.capture[..len]);
        let payload = &payload[..len];

        let mut out = [0u8; 96];
        let rendered = match kind {
            BytesKind::Source => {
                self.operation.source[..len].copy_from_slice(payload);
                format::pkh(payload, &mut out)
            }
            BytesKind::Pkh => format::pkh(payload, &mut out),
            BytesKind::Pk => format::pk(payload, &mut out),
            BytesKind::Rollup => format::base58check(Prefix::Sr1, payload, &mut out),
            BytesKind::RollupCommitment => format::base58check(Prefix::Src1, payload, &mut out),
            BytesKind::Proto => format::base58check(Prefix::Protocol, payload, &mut out),
            BytesKind::Destination => {
                self.operation.destination[..len].copy_from_slice(payload);
                format::address(payload, &mut out)
            }
            BytesKind::BlockHash => format::base58check(Prefix::BlockHash, payload, &mut out),
        };
        let n = match rendered {
            Ok(n) => n,
            Err(_) => return fail(Error::InvalidTag),
        };

        self.set_capture(&out[..n]);
        self.operation.stack[depth].step = OpStep::Print {
            source: PrintSource::Capture,
            ofs: 0,
            partial: false,
        };
        Ok(())
    }

    fn op_step_read_string(
        &mut self,
        input: &[u8],
        depth: usize,
        stop: usize,
        skip: bool,
    ) -> StepResult {
        if self.ofs == stop {
            self.op_print_capture(depth, skip)?;
        } else {
            let b = self.read(input)?;
            if self.buffers.capture.push(b).is_err() {
                return fail(Error::TooLarge);
            }
        }
        Ok(())
    }

    fn op_step_read_binary(
        &mut self,
        input: &[u8],
        depth: usize,
        stop: usize,
        skip: bool,
    ) -> StepResult {
        if self.ofs == stop {
            self.op_print_capture(depth, skip)?;
        } else if self.buffers.capture.len() + 2 >= super::CAPTURE_SIZE {
            // stage is full: page it out and keep reading
            if skip {
                self.buffers.capture.clear();
            } else {
                self.op_push(OpStep::Print {
                    source: PrintSource::Capture,
                    ofs: 0,
                    partial: true,
                })?;
            }
        } else {
            let b = self.read(input)?;
            let _ = self.buffers.capture.push(HEX_LOWER[(b >> 4) as usize]);
            let _ = self.buffers.capture.push(HEX_LOWER[(b & 0x0f) as usize]);
        }
        Ok(())
    }

    fn op_step_read_entrypoint(&mut self, input: &[u8], depth: usize, skip: bool) -> StepResult {
        let b = self.read(input)?;
        let name: &[u8] = match b {
            0 => b"default",
            1 => b"root",
            2 => b"do",
            3 => b"set_delegate",
            4 => b"remove_delegate",
            5 => b"deposit",
            6 => b"stake",
            7 => b"unstake",
            8 => b"finalize_unstake",
            9 => b"set_delegate_parameters",
            0xff => {
                // named entrypoint: one-byte length then the string
                self.operation.stack[depth].step = OpStep::ReadString { skip };
                self.buffers.capture.clear();
                self.op_push_size(1)?;
                return Ok(());
            }
            _ => return fail(Error::InvalidTag),
        };
        self.set_capture(name);
        self.op_print_capture(depth, skip)?;
        Ok(())
    }

    fn op_step_read_rollup_kind(&mut self, input: &[u8], depth: usize, skip: bool) -> StepResult {
        let b = self.read(input)?;
        let name: &[u8] = match b {
            0 => b"arith",
            1 => b"wasm_2_0_0",
            2 => b"riscv", // present in the encoding, not yet activated
            _ => return fail(Error::InvalidTag),
        };
        self.set_capture(name);
        self.op_print_capture(depth, skip)?;
        Ok(())
    }

    fn op_step_read_ballot(&mut self, input: &[u8], depth: usize, skip: bool) -> StepResult {
        let b = self.read(input)?;
        let name: &[u8] = match b {
            0 => b"yay",
            1 => b"nay",
            2 => b"pass",
            _ => return fail(Error::InvalidTag),
        };
        self.set_capture(name);
        self.op_print_capture(depth, skip)?;
        Ok(())
    }

    fn op_step_read_protos(
        &mut self,
        depth: usize,
        stop: usize,
        name: &'static str,
        index: u16,
        skip: bool,
    ) -> StepResult {
        // text from the previous element is displayed first
        if self.output_len() > 0 {
            return Err(Interrupt::ImFull);
        }
        if stop == self.ofs {
            self.op_pop()?;
        } else {
            self.operation.stack[depth].step = OpStep::ReadProtos {
                name,
                index: index + 1,
                skip,
            };
            self.set_field_name_indexed(name, index);
            self.buffers.capture.clear();
            self.op_push(OpStep::ReadBytes {
                kind: BytesKind::Proto,
                skip,
                len: 32,
            })?;
        }
        Ok(())
    }

    fn op_step_read_pkh_list(
        &mut self,
        depth: usize,
        stop: usize,
        name: &'static str,
        index: u16,
        skip: bool,
    ) -> StepResult {
        if self.output_len() > 0 {
            return Err(Interrupt::ImFull);
        }
        if stop == self.ofs {
            self.op_pop()?;
        } else {
            self.operation.stack[depth].step = OpStep::ReadPkhList {
                name,
                index: index + 1,
                skip,
            };
            self.set_field_name_indexed(name, index);
            self.buffers.capture.clear();
            self.op_push(OpStep::ReadBytes {
                kind: BytesKind::Pkh,
                skip,
                len: 21,
            })?;
        }
        Ok(())
    }

    fn op_step_read_rollup_messages(
        &mut self,
        depth: usize,
        stop: usize,
        name: &'static str,
        index: u16,
        skip: bool,
    ) -> StepResult {
        if self.output_len() > 0 {
            return Err(Interrupt::ImFull);
        }
        if stop == self.ofs {
            self.op_pop()?;
        } else {
            self.operation.stack[depth].step = OpStep::ReadRollupMessages {
                name,
                index: index + 1,
                skip,
            };
            self.set_field_name_indexed(name, index);
            self.buffers.capture.clear();
            self.op_push(OpStep::ReadBinary { skip })?;
            self.op_push_size(4)?;
        }
        Ok(())
    }

    fn op_step_print(
        &mut self,
        output: &mut [u8],
        depth: usize,
        source: PrintSource,
        ofs: usize,
        partial: bool,
    ) -> StepResult {
        let c = match source {
            PrintSource::Static(s) => s.as_bytes().get(ofs).copied(),
            PrintSource::Capture => self.buffers.capture.get(ofs).copied(),
            PrintSource::Decimal => self.buffers.num.decimal.get(ofs).copied(),
        };
        match c {
            Some(c) => {
                self.put(output, c)?;
                self.operation.stack[depth].step = OpStep::Print {
                    source,
                    ofs: ofs + 1,
                    partial,
                };
            }
            None => {
                if source == PrintSource::Capture {
                    self.buffers.capture.clear();
                }
                self.op_pop()?;
                if !partial {
                    // a completed value is a whole display line: drain it
                    return Err(Interrupt::ImFull);
                }
            }
        }
        Ok(())
    }
}

/// Turn a mutez digit string into a currency amount in place: shift in a
/// decimal point six digits from the right, drop non-significant zeros
/// (and the point itself for integral values), append the ticker.
fn format_amount(dec: &mut Vec<u8, NUM_DECIMAL_SIZE>) {
    let digits: Vec<u8, NUM_DECIMAL_SIZE> = dec.clone();
    dec.clear();

    let (whole, frac): (&[u8], [u8; 6]) = if digits.len() <= 6 {
        let mut frac = [b'0'; 6];
        frac[6 - digits.len()..].copy_from_slice(&digits);
        (b"0", frac)
    } else {
        let split = digits.len() - 6;
        let mut frac = [b'0'; 6];
        frac.copy_from_slice(&digits[split..]);
        (&digits[..split], frac)
    };

    let _ = dec.extend_from_slice(whole);
    let mut frac_len = 6;
    while frac_len > 0 && frac[frac_len - 1] == b'0' {
        frac_len -= 1;
    }
    if frac_len > 0 {
        let _ = dec.push(b'.');
        let _ = dec.extend_from_slice(&frac[..frac_len]);
    }
    let _ = dec.extend_from_slice(b" XTZ");
}
