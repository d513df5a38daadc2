// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Frequency of bit groups: Count1Bit, Count2Bits, Count3Bits, Count4Bits,
//! Count8Bits and Count16Bits.
//!
//! The stream is read as one continuous bit string, most significant bit of
//! each byte first, and cut into groups of a fixed width. Every possible
//! group value should turn up equally often.

use crate::{
    base::{Base, ResultKind, Test},
    config::{BatteryConfig, KsMode},
    error::Result,
    stats, utils,
};

use super::{open_or_fail, CANCEL_CHECK_INTERVAL};

/// Tables larger than this only report their largest deviation.
const MAX_LISTED_BUCKETS: usize = 256;

/// Width of the counted bit groups.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BitGroup {
    One,
    Two,
    Three,
    Four,
    Eight,
    Sixteen,
}

impl BitGroup {
    pub fn bits(self) -> u32 {
        match self {
            BitGroup::One => 1,
            BitGroup::Two => 2,
            BitGroup::Three => 3,
            BitGroup::Four => 4,
            BitGroup::Eight => 8,
            BitGroup::Sixteen => 16,
        }
    }

    pub fn buckets(self) -> usize {
        1 << self.bits()
    }

    pub fn test_name(self) -> &'static str {
        match self {
            BitGroup::One => "Count1Bit",
            BitGroup::Two => "Count2Bits",
            BitGroup::Three => "Count3Bits",
            BitGroup::Four => "Count4Bits",
            BitGroup::Eight => "Count8Bits",
            BitGroup::Sixteen => "Count16Bits",
        }
    }

    fn bucket_label(self, value: usize) -> String {
        match self {
            BitGroup::One => format!("bit {value}"),
            _ => format!("bits {value:0width$b}", width = self.bits() as usize),
        }
    }
}

pub struct CountBits {
    base: Base,
    group: BitGroup,
}

impl CountBits {
    pub fn new(group: BitGroup, config: BatteryConfig) -> Self {
        CountBits {
            base: Base::new(group.test_name(), config),
            group,
        }
    }

    /// Read the whole stream and count every group value.
    /// Returns the counts and the number of bytes read.
    fn count_groups(&mut self) -> Result<(Vec<u64>, u64)> {
        let bits = self.group.bits();
        let mask = (1u32 << bits) - 1;
        let mut counts = vec![0u64; self.group.buckets()];
        let base = &mut self.base;

        let mut pending: u32 = 0;
        let mut pending_bits: u32 = 0;
        let mut bytes_read: u64 = 0;
        while let Some(byte) = base.read_byte() {
            bytes_read += 1;
            if bytes_read % CANCEL_CHECK_INTERVAL == 0 {
                base.check_cancelled()?;
            }
            pending = (pending << 8) | byte as u32;
            pending_bits += 8;
            while pending_bits >= bits {
                pending_bits -= bits;
                counts[((pending >> pending_bits) & mask) as usize] += 1;
            }
            pending &= (1u32 << pending_bits) - 1;
        }
        Ok((counts, bytes_read))
    }
}

impl Test for CountBits {
    fn help(&self) -> &'static str {
        "Counts how often every value of a fixed width bit group occurs in the \
         stream and compares the counts with a uniform distribution."
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn execute(&mut self) -> Result<()> {
        self.base.check_cancelled()?;
        if !open_or_fail(&mut self.base) {
            return Ok(());
        }
        let (counts, bytes_read) = self.count_groups()?;
        let group = self.group;
        let buckets = group.buckets();
        let base = &mut self.base;
        base.close_input_stream();

        let samples: u64 = counts.iter().sum();
        base.add_detail(format!("bits per group\t\t: {}", group.bits()));
        base.add_detail(format!("bytes read\t\t: {bytes_read}"));
        base.add_detail(format!("total groups\t\t: {samples}"));
        let avg = samples / buckets as u64;
        base.add_detail(format!("expected average\t: {avg}"));
        if avg == 0 {
            base.add_error("expected average is zero, the stream is too short");
            base.set_result(ResultKind::Fail);
            return Ok(());
        }

        let deviations: Vec<i64> = counts.iter().map(|&c| c as i64 - avg as i64).collect();
        if buckets <= MAX_LISTED_BUCKETS {
            for (value, (&count, &deviation)) in counts.iter().zip(&deviations).enumerate() {
                base.add_detail(format!(
                    "{}\t\t: {count}\tdeviation {deviation}",
                    group.bucket_label(value)
                ));
            }
        } else if let Some((value, deviation)) = deviations
            .iter()
            .enumerate()
            .max_by_key(|(_, d)| d.unsigned_abs())
        {
            base.add_detail(format!(
                "largest deviation\t: {deviation} ({})",
                group.bucket_label(value)
            ));
        }
        let sum: i64 = deviations.iter().sum();
        base.add_detail(format!("the sum is\t\t: {sum}"));

        let observed: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        let mean = stats::mean(&observed);
        base.add_detail(format!(
            "stdev is\t\t: {}",
            utils::d4(stats::stdev(&observed, mean))
        ));

        let expected = samples as f64 / buckets as f64;
        let chi_square = stats::chi_square(&observed, expected);
        let degrees_of_freedom = (buckets - 1) as u32;
        let p_chi = stats::chisq_p_value(degrees_of_freedom, chi_square)?;
        base.add_detail(format!("chi-square\t\t: {}", utils::d4(chi_square)));
        base.add_detail(format!("degrees of freedom\t: {degrees_of_freedom}"));
        base.add_detail(format!("chi-square p-value\t: {}", utils::d4(p_chi)));

        let ks_mode = base.config().ks_mode;
        let ks_input: Vec<f64> = match ks_mode {
            KsMode::RawCounts => observed,
            KsMode::NormalPValues => {
                let share = 1.0 / buckets as f64;
                let sigma = (samples as f64 * share * (1.0 - share)).sqrt();
                observed
                    .iter()
                    .map(|&c| stats::std_normal_cdf((c - expected) / sigma))
                    .collect()
            }
        };
        base.add_detail(format!(
            "KS p-value ({ks_mode})\t: {}",
            utils::d4(stats::ks_test(&ks_input))
        ));

        base.decide(p_chi);
        Ok(())
    }
}
