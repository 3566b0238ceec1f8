// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Declarative operation grammar.
//!
//! The operation wire format is described as data: a table of per-kind
//! descriptors, each listing the named fields to decode in order. The
//! operation engine interprets the table by pattern matching, so new
//! operation kinds and fields are added here without touching the
//! automaton.
//!
//! Tags and field layouts track the protocol's operation encoding; the
//! table is additive, existing entries never change.

use num_enum::TryFromPrimitive;
use strum::Display;

/// One-byte operation kind discriminants.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, TryFromPrimitive)]
#[repr(u8)]
pub enum OperationTag {
    Proposals = 5,
    Ballot = 6,
    FailingNoop = 17,
    Reveal = 107,
    Transaction = 108,
    Origination = 109,
    Delegation = 110,
    RegisterGlobalConstant = 111,
    SetDepositsLimit = 112,
    IncreasePaidStorage = 113,
    UpdateConsensusKey = 114,
    TransferTicket = 158,
    SmartRollupOriginate = 200,
    SmartRollupAddMessages = 201,
    SmartRollupExecuteOutboxMessage = 206,
}

/// What one field decodes as.
#[derive(Copy, Clone, Debug)]
pub enum FieldKind {
    /// Presence byte then the wrapped field; `display_none` renders an
    /// explicit "Field unset" line when absent
    Option {
        field: &'static FieldDescriptor,
        display_none: bool,
    },
    /// Fields decoded in order
    Tuple { fields: &'static [FieldDescriptor] },
    /// 4-byte length then raw bytes, rendered as hex
    Binary,
    /// Continuation-coded signed number
    Int,
    /// Continuation-coded natural
    Nat,
    /// Natural rendered as a currency amount, added to the amount total
    Amount,
    /// Natural rendered as a currency amount, added to the fee total
    Fee,
    /// 4-byte big-endian signed integer
    Int32,
    /// 4-byte length then a literal string
    String,
    /// Tagged public key hash of the paying account (snapshotted)
    Source,
    /// Tagged public key hash
    Pkh,
    /// Tagged public key, curve-specific length
    Pk,
    /// Smart rollup address
    Rollup,
    /// Smart rollup commitment hash
    RollupCommitment,
    /// Protocol hash
    Proto,
    /// 4-byte length then protocol hashes
    Protos,
    /// Tagged contract-or-rollup address (snapshotted)
    Destination,
    /// Entrypoint tag byte, possibly a named entrypoint
    SmartEntrypoint,
    /// Length-delimited Micheline expression
    Expr,
    /// 4-byte length then length-prefixed rollup messages
    RollupMessages,
    /// Rollup kind tag byte
    RollupKind,
    /// 4-byte length then public key hashes
    PkhList,
    /// Ballot tag byte
    Ballot,
}

/// How to decode and display one named field.
#[derive(Debug)]
pub struct FieldDescriptor {
    /// Display name
    pub name: &'static str,
    pub kind: FieldKind,
    /// Consume without rendering (internal bookkeeping fields)
    pub skip: bool,
    /// Requires an extra expert-mode acknowledgement upstream
    pub complex: bool,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            skip: false,
            complex: false,
        }
    }

    pub const fn skipped(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            skip: true,
            complex: false,
        }
    }

    pub const fn complex(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            skip: false,
            complex: true,
        }
    }
}

/// One operation kind: tag, display name, field list.
#[derive(Debug)]
pub struct OperationDescriptor {
    pub tag: OperationTag,
    pub name: &'static str,
    pub fields: &'static [FieldDescriptor],
}

/// Shared preamble of every manager operation. Counter and gas limit are
/// consumed but never shown.
macro_rules! manager_op_fields {
    ($($field:expr),* $(,)?) => {
        &[
            FieldDescriptor::new("Source", FieldKind::Source),
            FieldDescriptor::new("Fee", FieldKind::Fee),
            FieldDescriptor::skipped("_Counter", FieldKind::Nat),
            FieldDescriptor::skipped("_Gas", FieldKind::Nat),
            FieldDescriptor::new("Storage limit", FieldKind::Nat),
            $($field),*
        ]
    };
}

const DELEGATE_FIELD: FieldDescriptor = FieldDescriptor::new("Delegate", FieldKind::Pkh);

const STAKING_LIMIT_FIELD: FieldDescriptor =
    FieldDescriptor::new("Staking limit", FieldKind::Amount);

const WHITELIST_FIELD: FieldDescriptor = FieldDescriptor::new("Whitelist", FieldKind::PkhList);

const TRANSACTION_PARAMETERS_FIELD: FieldDescriptor = FieldDescriptor::new(
    "_Parameters",
    FieldKind::Tuple {
        fields: &[
            FieldDescriptor::new("Entrypoint", FieldKind::SmartEntrypoint),
            FieldDescriptor::complex("Parameter", FieldKind::Expr),
        ],
    },
);

/// Every handled operation kind.
pub static OPERATIONS: &[OperationDescriptor] = &[
    OperationDescriptor {
        tag: OperationTag::Proposals,
        name: "Proposals",
        fields: &[
            FieldDescriptor::new("Source", FieldKind::Pkh),
            FieldDescriptor::new("Period", FieldKind::Int32),
            FieldDescriptor::new("Proposal", FieldKind::Protos),
        ],
    },
    OperationDescriptor {
        tag: OperationTag::Ballot,
        name: "Ballot",
        fields: &[
            FieldDescriptor::new("Source", FieldKind::Pkh),
            FieldDescriptor::new("Period", FieldKind::Int32),
            FieldDescriptor::new("Proposal", FieldKind::Proto),
            FieldDescriptor::new("Ballot", FieldKind::Ballot),
        ],
    },
    OperationDescriptor {
        tag: OperationTag::FailingNoop,
        name: "Failing noop",
        fields: &[FieldDescriptor::new("Message", FieldKind::Binary)],
    },
    OperationDescriptor {
        tag: OperationTag::Reveal,
        name: "Reveal",
        fields: manager_op_fields!(FieldDescriptor::new("Public key", FieldKind::Pk)),
    },
    OperationDescriptor {
        tag: OperationTag::Transaction,
        name: "Transaction",
        fields: manager_op_fields!(
            FieldDescriptor::new("Amount", FieldKind::Amount),
            FieldDescriptor::new("Destination", FieldKind::Destination),
            FieldDescriptor::new(
                "_Parameters",
                FieldKind::Option {
                    field: &TRANSACTION_PARAMETERS_FIELD,
                    display_none: false,
                }
            ),
        ),
    },
    OperationDescriptor {
        tag: OperationTag::Origination,
        name: "Origination",
        fields: manager_op_fields!(
            FieldDescriptor::new("Balance", FieldKind::Amount),
            FieldDescriptor::new(
                "Delegate",
                FieldKind::Option {
                    field: &DELEGATE_FIELD,
                    display_none: true,
                }
            ),
            FieldDescriptor::complex("Code", FieldKind::Expr),
            FieldDescriptor::complex("Storage", FieldKind::Expr),
        ),
    },
    OperationDescriptor {
        tag: OperationTag::Delegation,
        name: "Delegation",
        fields: manager_op_fields!(FieldDescriptor::new(
            "Delegate",
            FieldKind::Option {
                field: &DELEGATE_FIELD,
                display_none: true,
            }
        )),
    },
    OperationDescriptor {
        tag: OperationTag::RegisterGlobalConstant,
        name: "Register global constant",
        fields: manager_op_fields!(FieldDescriptor::complex("Value", FieldKind::Expr)),
    },
    OperationDescriptor {
        tag: OperationTag::SetDepositsLimit,
        name: "Set deposit limit",
        fields: manager_op_fields!(FieldDescriptor::new(
            "Staking limit",
            FieldKind::Option {
                field: &STAKING_LIMIT_FIELD,
                display_none: true,
            }
        )),
    },
    OperationDescriptor {
        tag: OperationTag::IncreasePaidStorage,
        name: "Increase paid storage",
        fields: manager_op_fields!(
            FieldDescriptor::new("Amount", FieldKind::Int),
            FieldDescriptor::new("Destination", FieldKind::Destination),
        ),
    },
    OperationDescriptor {
        tag: OperationTag::UpdateConsensusKey,
        name: "Set consensus key",
        fields: manager_op_fields!(FieldDescriptor::new("Public key", FieldKind::Pk)),
    },
    OperationDescriptor {
        tag: OperationTag::TransferTicket,
        name: "Transfer ticket",
        fields: manager_op_fields!(
            FieldDescriptor::complex("Contents", FieldKind::Expr),
            FieldDescriptor::complex("Type", FieldKind::Expr),
            FieldDescriptor::new("Ticketer", FieldKind::Destination),
            FieldDescriptor::new("Amount", FieldKind::Nat),
            FieldDescriptor::new("Destination", FieldKind::Destination),
            FieldDescriptor::new("Entrypoint", FieldKind::String),
        ),
    },
    OperationDescriptor {
        tag: OperationTag::SmartRollupAddMessages,
        name: "SR: send messages",
        fields: manager_op_fields!(FieldDescriptor::new("Message", FieldKind::RollupMessages)),
    },
    OperationDescriptor {
        tag: OperationTag::SmartRollupExecuteOutboxMessage,
        name: "SR: execute outbox message",
        fields: manager_op_fields!(
            FieldDescriptor::new("Rollup", FieldKind::Rollup),
            FieldDescriptor::new("Commitment", FieldKind::RollupCommitment),
            FieldDescriptor::complex("Output proof", FieldKind::Binary),
        ),
    },
    OperationDescriptor {
        tag: OperationTag::SmartRollupOriginate,
        name: "SR: originate",
        fields: manager_op_fields!(
            FieldDescriptor::new("Kind", FieldKind::RollupKind),
            FieldDescriptor::complex("Kernel", FieldKind::Binary),
            FieldDescriptor::complex("Parameters", FieldKind::Expr),
            FieldDescriptor::new(
                "Whitelist",
                FieldKind::Option {
                    field: &WHITELIST_FIELD,
                    display_none: false,
                }
            ),
        ),
    },
];

/// Find the descriptor for an operation tag.
pub fn lookup(tag: OperationTag) -> Option<&'static OperationDescriptor> {
    OPERATIONS.iter().find(|d| d.tag == tag)
}
