// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Birthday spacings test.
//!
//! Choose m birthdays in a year of n days and sort them. The number of
//! values that occur more than once among the spacings between consecutive
//! birthdays is asymptotically Poisson with mean m^3 / (4n). Birthdays are
//! 24 bit windows of 32 bit words; the window is slid over the word, one
//! pass per offset, and the Poisson fits of all passes are summarised with
//! a KS test.

use log::debug;

use crate::{
    base::{Base, Test},
    conditioning,
    config::BatteryConfig,
    error::Result,
    stats, utils,
};

use super::{bit_range_label, decide_on_ks, open_or_fail};

const BIRTHDAYS: usize = 1024;
const DAY_BITS: u32 = 24;
const SAMPLES_PER_PASS: usize = 500;

pub struct BirthdaySpacings {
    base: Base,
    samples: usize,
    shifts: Vec<u32>,
}

impl BirthdaySpacings {
    pub fn new(config: BatteryConfig) -> Self {
        BirthdaySpacings {
            base: Base::new("BirthdaySpacings", config),
            samples: SAMPLES_PER_PASS,
            shifts: (0..=32 - DAY_BITS).rev().collect(),
        }
    }

    /// Number of samples of 1024 birthdays drawn per pass.
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Bit offsets of the 24 bit window, one pass each.
    pub fn with_shifts(mut self, shifts: Vec<u32>) -> Self {
        self.shifts = shifts
            .into_iter()
            .filter(|&s| s + DAY_BITS <= 32)
            .collect();
        self
    }

    /// Duplicate spacings of each sample read at `shift`.
    /// Stops early when the stream runs dry.
    fn collect_pass(&mut self, shift: u32) -> Vec<u32> {
        let base = &mut self.base;
        let mut observations = Vec::with_capacity(self.samples);
        let mut birthdays = vec![0u32; BIRTHDAYS];
        let mut spacings = vec![0u32; BIRTHDAYS];
        'samples: for _ in 0..self.samples {
            for slot in birthdays.iter_mut() {
                match base.read_u32() {
                    Some(word) => *slot = conditioning::extract_bits(word, shift, DAY_BITS),
                    None => break 'samples,
                }
            }
            birthdays.sort_unstable();
            spacings[0] = birthdays[0];
            for i in 1..BIRTHDAYS {
                spacings[i] = birthdays[i] - birthdays[i - 1];
            }
            spacings.sort_unstable();
            let duplicates = spacings.windows(2).filter(|w| w[0] == w[1]).count();
            observations.push(duplicates as u32);
        }
        observations
    }
}

impl Test for BirthdaySpacings {
    fn help(&self) -> &'static str {
        "Counts repeated spacings between sorted birthdays drawn from 24 bit \
         windows and fits the counts to a Poisson distribution."
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn execute(&mut self) -> Result<()> {
        let days = (1u64 << DAY_BITS) as f64;
        let lambda = (BIRTHDAYS as f64).powi(3) / (4.0 * days);
        self.base.add_detail(format!("birthdays\t\t: {BIRTHDAYS}"));
        self.base.add_detail(format!("days in year\t\t: 2^{DAY_BITS}"));
        self.base
            .add_detail(format!("lambda\t\t\t: {}", utils::d4(lambda)));

        let mut p_values = Vec::with_capacity(self.shifts.len());
        for shift in self.shifts.clone() {
            self.base.check_cancelled()?;
            if !open_or_fail(&mut self.base) {
                break;
            }
            let observations = self.collect_pass(shift);
            let base = &mut self.base;
            base.close_input_stream();

            let label = bit_range_label(shift, DAY_BITS);
            let complete = observations.len() == self.samples;
            if !complete {
                base.add_error(format!(
                    "{label}: stream ended after {} of {} samples",
                    observations.len(),
                    self.samples
                ));
            }
            match stats::poisson_fit(lambda, &observations) {
                Ok(fit) => {
                    debug!("{label}: {fit:?}");
                    base.add_detail(format!(
                        "{label}\t: dof {}\tchi-square {}\tp-value {}",
                        fit.degrees_of_freedom,
                        utils::d4(fit.chi_square),
                        utils::d4(fit.p_value)
                    ));
                    p_values.push(fit.p_value);
                }
                Err(err) => base.add_error(format!("{label}: {err}")),
            }
            // Every pass rereads the same stream, later ones would end early too.
            if !complete {
                break;
            }
        }
        decide_on_ks(&mut self.base, "p-values", &p_values);
        Ok(())
    }
}
