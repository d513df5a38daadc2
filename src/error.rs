// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Error type shared by the harness, the numeric helpers and the battery.

use thiserror::Error;

/// Errors raised by the battery.
///
/// Stream failures are not represented here: they are absorbed by the
/// stream itself and surface as a closed stream.
#[derive(Debug, Error)]
pub enum BatteryError {
    /// Results were requested before the test completed a run.
    #[error("test `{0}` has not been run")]
    NotRun(&'static str),

    /// `run_test` was called a second time on the same instance.
    #[error("test `{0}` has already been run")]
    AlreadyRun(&'static str),

    /// The half-integer gamma function only accepts positive multiples of 1/2.
    #[error("gamma is only defined here for positive multiples of 1/2, got {0}")]
    InvalidGammaArgument(f64),

    /// Chi-square distributions need at least one degree of freedom.
    #[error("chi-square needs at least one degree of freedom")]
    InvalidDegreesOfFreedom,

    /// The stream ended before the test had its minimum sample count.
    #[error("test `{test}` needs at least {needed} samples, stream gave {got}")]
    InsufficientData {
        test: &'static str,
        needed: usize,
        got: usize,
    },

    /// The run was stopped through its cancel token.
    #[error("test `{0}` was cancelled")]
    Cancelled(&'static str),

    /// A test name did not match any known test.
    #[error("unknown test `{0}`")]
    UnknownTest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BatteryError>;
