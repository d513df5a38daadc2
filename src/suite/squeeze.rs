// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Squeeze test.
//!
//! Starting from k = 2^31 - 1, repeat k = ceil(k * U) with U uniform on
//! [0, 1) until k reaches 1, and record the number of steps j. The counts
//! of j, pooled at 6 or fewer and at 48 or more, are compared with their
//! exact distribution.

use log::debug;

use crate::{
    base::{Base, ResultKind, Test},
    config::BatteryConfig,
    error::Result,
    stats, utils,
};

use super::open_or_fail;

const START: u64 = 2_147_483_647;
const MIN_STEPS: usize = 6;
const MAX_STEPS: usize = 48;
const BUCKETS: usize = MAX_STEPS - MIN_STEPS + 1;
const DEFAULT_TRIALS: usize = 100_000;

/// Expected count of each step bucket per million trials, from j <= 6 to
/// j >= 48.
const EXPECTED_PER_MILLION: [f64; BUCKETS] = [
    21.03, 57.8, 175.55, 467.36, 1107.91, 2368.0, 4609.74, 8241.66, 13628.57, 20969.56, 30177.51,
    40803.63, 52043.86, 62840.12, 72058.05, 78695.84, 82068.39, 81919.62, 78439.77, 72193.3,
    63985.58, 54707.84, 45196.95, 36135.05, 27998.84, 21054.41, 15385.47, 10939.36, 7577.31,
    5119.08, 3376.91, 2177.62, 1374.22, 849.59, 515.11, 306.61, 179.36, 103.22, 58.5, 32.69,
    18.02, 9.82, 11.21,
];

pub struct Squeeze {
    base: Base,
    trials: usize,
}

impl Squeeze {
    pub fn new(config: BatteryConfig) -> Self {
        Squeeze {
            base: Base::new("Squeeze", config),
            trials: DEFAULT_TRIALS,
        }
    }

    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    /// Steps needed to squeeze k down to 1, capped at 48.
    /// `None` if the stream ended during the trial.
    fn squeeze_once(&mut self) -> Option<usize> {
        let mut k = START;
        let mut steps = 0;
        while k != 1 && steps < MAX_STEPS {
            let u = self.base.read_unit()?;
            k = (k as f64 * u).ceil() as u64;
            steps += 1;
        }
        Some(steps)
    }
}

impl Test for Squeeze {
    fn help(&self) -> &'static str {
        "Counts how many multiplications by uniform floats it takes to squeeze \
         2^31 - 1 down to 1 and compares the counts with their distribution."
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn execute(&mut self) -> Result<()> {
        if !open_or_fail(&mut self.base) {
            return Ok(());
        }
        let mut counts = [0u64; BUCKETS];
        let mut done = 0usize;
        while done < self.trials {
            if done % 1000 == 0 {
                self.base.check_cancelled()?;
            }
            let Some(steps) = self.squeeze_once() else {
                break;
            };
            counts[steps.clamp(MIN_STEPS, MAX_STEPS) - MIN_STEPS] += 1;
            done += 1;
        }
        self.base.close_input_stream();

        let base = &mut self.base;
        base.add_detail(format!("trials\t\t\t: {done}"));
        if done < self.trials {
            base.add_error(format!(
                "stream ended after {done} of {} trials",
                self.trials
            ));
        }
        if done == 0 {
            base.set_result(ResultKind::Fail);
            return Ok(());
        }

        let scale = done as f64 / 1e6;
        let mut chi_square = 0.0;
        let table = counts.iter().zip(&EXPECTED_PER_MILLION);
        for (i, (&observed, &per_million)) in table.enumerate() {
            let expected = per_million * scale;
            let term = (observed as f64 - expected).powi(2) / expected;
            chi_square += term;
            let j = i + MIN_STEPS;
            let label = match j {
                MIN_STEPS => format!("j<={j}"),
                MAX_STEPS => format!("j>={j}"),
                _ => format!("j={j}"),
            };
            base.add_detail(format!(
                "{label}\t\t\t: {observed}\texpected {}\tchi {}",
                utils::d4(expected).trim(),
                utils::d4(term).trim()
            ));
        }
        let degrees_of_freedom = (BUCKETS - 1) as u32;
        let p_value = stats::chisq_p_value(degrees_of_freedom, chi_square)?;
        debug!("squeeze: chi-square {chi_square}, p {p_value}");
        base.add_detail(format!("chi-square\t\t: {}", utils::d4(chi_square)));
        base.add_detail(format!("degrees of freedom\t: {degrees_of_freedom}"));
        base.add_detail(format!("p-value\t\t\t: {}", utils::d4(p_value)));
        base.decide(p_value);
        Ok(())
    }
}
