// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Diehard style statistical tests for streams of random bytes.
//!
//! A test is created with a [`config::BatteryConfig`], given a
//! [`stream::RandomStream`] to read from and run once. It records detail
//! lines, error lines and a [`base::ResultKind`], and can print them to any
//! number of [`output::OutputSink`]s. [`battery`] runs a selection of tests
//! together and summarises them.

pub mod base;
pub mod battery;
pub mod conditioning;
pub mod config;
pub mod error;
pub mod output;
pub mod rngs;
pub mod stats;
pub mod stream;
pub mod strings;
pub mod suite;
pub mod utils;

pub use base::{CancelToken, ResultKind, Test};
pub use battery::{format_summary, run_battery, Outcome, RunOptions, Status, TestKind};
pub use config::{BatteryConfig, KsMode};
pub use error::{BatteryError, Result};
