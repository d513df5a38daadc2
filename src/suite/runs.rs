// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Runs up and runs down.
//!
//! Counts ascending and descending runs in sequences of floats and compares
//! the counts of lengths 1 to 5, and 6 or more, with their expectation
//! through Knuth's quadratic form. The form is chi-square with six degrees
//! of freedom.

use log::debug;

use crate::{
    base::{Base, Test},
    config::BatteryConfig,
    error::{BatteryError, Result},
    stats, utils,
};

use super::open_or_fail;

const RUN_CLASSES: usize = 6;
const DEFAULT_SEQUENCES: usize = 10;
const DEFAULT_LENGTH: usize = 10_000;
/// Shortest usable sequence.
const MIN_LENGTH: usize = 4000;

/// Inverse covariance of the run counts, scaled by the sequence length.
const A: [[f64; RUN_CLASSES]; RUN_CLASSES] = [
    [4529.4, 9044.9, 13568.0, 18091.0, 22615.0, 27892.0],
    [9044.9, 18097.0, 27139.0, 36187.0, 45234.0, 55789.0],
    [13568.0, 27139.0, 40721.0, 54281.0, 67852.0, 83685.0],
    [18091.0, 36187.0, 54281.0, 72414.0, 90470.0, 111580.0],
    [22615.0, 45234.0, 67852.0, 90470.0, 113262.0, 139476.0],
    [27892.0, 55789.0, 83685.0, 111580.0, 139476.0, 172860.0],
];

/// Expected number of runs of each class per value.
const B: [f64; RUN_CLASSES] = [
    1.0 / 6.0,
    5.0 / 24.0,
    11.0 / 120.0,
    19.0 / 720.0,
    29.0 / 5040.0,
    1.0 / 840.0,
];

/// Run length counts of `data`, runs of six or more pooled.
/// `continues(prev, next)` decides whether `next` extends the current run.
pub fn count_runs(data: &[f64], continues: impl Fn(f64, f64) -> bool) -> [u64; RUN_CLASSES] {
    let mut counts = [0u64; RUN_CLASSES];
    if data.is_empty() {
        return counts;
    }
    let mut length = 1;
    for pair in data.windows(2) {
        if continues(pair[0], pair[1]) {
            length += 1;
        } else {
            counts[length.min(RUN_CLASSES) - 1] += 1;
            length = 1;
        }
    }
    counts[length.min(RUN_CLASSES) - 1] += 1;
    counts
}

/// Knuth's statistic for the run counts of a sequence of `n` values.
pub fn runs_statistic(counts: &[u64; RUN_CLASSES], n: usize) -> f64 {
    let n = n as f64;
    let deviation: Vec<f64> = counts
        .iter()
        .zip(B)
        .map(|(&c, b)| c as f64 - n * b)
        .collect();
    let mut statistic = 0.0;
    for i in 0..RUN_CLASSES {
        for j in 0..RUN_CLASSES {
            statistic += deviation[i] * deviation[j] * A[i][j];
        }
    }
    statistic / n
}

pub struct Runs {
    base: Base,
    sequences: usize,
    length: usize,
}

impl Runs {
    pub fn new(config: BatteryConfig) -> Self {
        Runs {
            base: Base::new("Run", config),
            sequences: DEFAULT_SEQUENCES,
            length: DEFAULT_LENGTH,
        }
    }

    pub fn with_sequences(mut self, sequences: usize) -> Self {
        self.sequences = sequences;
        self
    }

    /// Floats per sequence, never below the usable minimum.
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length.max(MIN_LENGTH);
        self
    }

    fn read_sequence(&mut self, sequence: &mut Vec<f64>) {
        sequence.clear();
        while sequence.len() < self.length {
            match self.base.read_unit() {
                Some(u) => sequence.push(u),
                None => break,
            }
        }
    }
}

impl Test for Runs {
    fn help(&self) -> &'static str {
        "Counts runs up and runs down in sequences of floats and compares the \
         run length counts with their expected covariance structure."
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn execute(&mut self) -> Result<()> {
        self.base.add_detail(format!(
            "sequences\t\t: {} of {} floats",
            self.sequences, self.length
        ));
        if !open_or_fail(&mut self.base) {
            return Ok(());
        }

        let mut sequence = Vec::with_capacity(self.length);
        let mut up_p = Vec::with_capacity(self.sequences);
        let mut down_p = Vec::with_capacity(self.sequences);
        for index in 1..=self.sequences {
            self.base.check_cancelled()?;
            self.read_sequence(&mut sequence);
            let n = sequence.len();
            if n < self.length {
                if index == 1 && n < MIN_LENGTH {
                    return Err(BatteryError::InsufficientData {
                        test: self.base.name(),
                        needed: MIN_LENGTH,
                        got: n,
                    });
                }
                self.base.add_error(format!(
                    "sequence {index}: stream ended after {n} of {} floats",
                    self.length
                ));
                if n < MIN_LENGTH {
                    break;
                }
            }

            let up = runs_statistic(&count_runs(&sequence, |a, b| b > a), n);
            let down = runs_statistic(&count_runs(&sequence, |a, b| b < a), n);
            let (p_up, p_down) = (
                stats::chisq_p_value(RUN_CLASSES as u32, up)?,
                stats::chisq_p_value(RUN_CLASSES as u32, down)?,
            );
            debug!("sequence {index}: up {up}, down {down}");
            self.base.add_detail(format!(
                "sequence {index:>2}\t\t: up {} p {}\tdown {} p {}",
                utils::d4(up),
                utils::d4(p_up),
                utils::d4(down),
                utils::d4(p_down)
            ));
            up_p.push(p_up);
            down_p.push(p_down);
            if n < self.length {
                break;
            }
        }
        self.base.close_input_stream();

        let p = if up_p.len() == 1 {
            up_p[0].min(down_p[0])
        } else {
            let ks_up = stats::ks_test(&up_p);
            let ks_down = stats::ks_test(&down_p);
            self.base
                .add_detail(format!("KS p-value runs up\t: {}", utils::d4(ks_up)));
            self.base
                .add_detail(format!("KS p-value runs down\t: {}", utils::d4(ks_down)));
            ks_up.min(ks_down)
        };
        self.base.decide(p);
        Ok(())
    }
}
