// Copyright (c) 2023-2024 Nomadic Labs <contact@nomadic-labs.com>

//! Shared decode vectors and a streaming harness for Tezos hardware
//! wallet decoders.
//!
//! The harness drives a [`Parser`][ledger_tez_core::Parser] the way the
//! device transport does — granting input in chunks and output in small
//! windows, draining labelled text on every suspension — so the same
//! vectors exercise resumability at every configuration.

pub mod encode;

pub mod harness;

pub mod micheline;

pub mod operation;
