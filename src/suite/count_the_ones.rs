// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Count-the-1s tests on a stream of bytes and on specific bytes of words.
//!
//! Each byte becomes one of five letters by its number of set bits:
//! 0-2 A, 3 B, 4 C, 5 D, 6-8 E. Overlapping five letter words are counted
//! together with their four letter suffixes. Q5 - Q4, the difference of the
//! two chi-square sums, should be normal with mean 2500 and variance 5000.

use log::debug;

use crate::{
    base::{Base, Test},
    conditioning,
    config::BatteryConfig,
    error::Result,
    stats, utils,
};

use super::{bit_range_label, decide_on_ks, open_or_fail};

const LETTERS: usize = 5;
const WORDS_4: usize = LETTERS.pow(4);
const WORDS_5: usize = LETTERS.pow(5);
const DEFAULT_WORDS: usize = 256_000;
const MEAN: f64 = 2500.0;

/// Number of bytes out of 256 with each letter's popcount.
const LETTER_WEIGHTS: [f64; LETTERS] = [37.0, 56.0, 70.0, 56.0, 37.0];

/// Which bytes are turned into letters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteSource {
    /// Every byte of the stream, for consecutive samples.
    Stream { samples: usize },
    /// The byte at each shift of 32 bit words, one pass per shift.
    SpecificBytes(Vec<u32>),
}

impl ByteSource {
    pub fn stream() -> Self {
        ByteSource::Stream { samples: 2 }
    }

    pub fn specific_bytes() -> Self {
        ByteSource::SpecificBytes((0..=24).rev().collect())
    }
}

/// Letter of a byte, from 0 (A) to 4 (E).
pub fn letter(byte: u8) -> usize {
    match byte.count_ones() {
        0..=2 => 0,
        3 => 1,
        4 => 2,
        5 => 3,
        _ => 4,
    }
}

/// Probability of every word of `len` letters, indexed base 5 with the
/// first letter most significant.
fn word_probabilities(len: u32) -> Vec<f64> {
    let letter_p = LETTER_WEIGHTS.map(|w| w / 256.0);
    (0..LETTERS.pow(len))
        .map(|mut word| {
            let mut p = 1.0;
            for _ in 0..len {
                p *= letter_p[word % LETTERS];
                word /= LETTERS;
            }
            p
        })
        .collect()
}

fn q_statistic(counts: &[u64], probabilities: &[f64], words: usize) -> f64 {
    counts
        .iter()
        .zip(probabilities)
        .map(|(&observed, &p)| {
            let expected = words as f64 * p;
            (observed as f64 - expected).powi(2) / expected
        })
        .sum()
}

pub struct CountTheOnes {
    base: Base,
    source: ByteSource,
    words: usize,
}

impl CountTheOnes {
    pub fn new(source: ByteSource, config: BatteryConfig) -> Self {
        let name = match source {
            ByteSource::Stream { .. } => "CountThe1sStream",
            ByteSource::SpecificBytes(_) => "CountThe1sSpecificBytes",
        };
        CountTheOnes {
            base: Base::new(name, config),
            source,
            words: DEFAULT_WORDS,
        }
    }

    /// Overlapping words counted per sample.
    pub fn with_words(mut self, words: usize) -> Self {
        self.words = words;
        self
    }

    /// Number of consecutive samples of the stream form.
    pub fn with_samples(mut self, samples: usize) -> Self {
        if let ByteSource::Stream { samples: current } = &mut self.source {
            *current = samples;
        }
        self
    }

    /// Byte positions of the specific byte form.
    pub fn with_shifts(mut self, shifts: Vec<u32>) -> Self {
        if let ByteSource::SpecificBytes(current) = &mut self.source {
            *current = shifts.into_iter().filter(|&s| s <= 24).collect();
        }
        self
    }

    /// Q5 - Q4 over one sample, `None` if the stream ran dry.
    fn sample(
        &mut self,
        tables: &(Vec<f64>, Vec<f64>),
        mut next_byte: impl FnMut(&mut Base) -> Option<u8>,
    ) -> Option<f64> {
        let mut count_4 = vec![0u64; WORDS_4];
        let mut count_5 = vec![0u64; WORDS_5];
        let mut word = 0usize;
        for _ in 1..LETTERS {
            word = word * LETTERS + letter(next_byte(&mut self.base)?);
        }
        for _ in 0..self.words {
            word = (word % WORDS_4) * LETTERS + letter(next_byte(&mut self.base)?);
            count_5[word] += 1;
            count_4[word % WORDS_4] += 1;
        }
        let (p_4, p_5) = tables;
        Some(q_statistic(&count_5, p_5, self.words) - q_statistic(&count_4, p_4, self.words))
    }

    /// Record one sample. Returns false when the sample was incomplete.
    fn record(&mut self, label: &str, statistic: Option<f64>, p_values: &mut Vec<f64>) -> bool {
        let Some(statistic) = statistic else {
            self.base.add_error(format!(
                "{label}: stream ended before {} words",
                self.words
            ));
            return false;
        };
        let z = (statistic - MEAN) / (2.0 * MEAN).sqrt();
        // One sided: a huge Q5 - Q4 maps to p near 1 and only the KS summary
        // over several samples rejects it.
        let p_value = stats::std_normal_cdf(z);
        debug!("{label}: Q5-Q4 {statistic}, z {z}");
        self.base.add_detail(format!(
            "{label}\t: Q5-Q4 {}\tz-score {}\tp-value {}",
            utils::d4(statistic),
            utils::d4(z),
            utils::d4(p_value)
        ));
        p_values.push(p_value);
        true
    }
}

impl Test for CountTheOnes {
    fn help(&self) -> &'static str {
        "Turns bytes into letters by their number of set bits and compares the \
         frequencies of overlapping four and five letter words with theory."
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn execute(&mut self) -> Result<()> {
        let tables = (word_probabilities(4), word_probabilities(5));
        self.base
            .add_detail(format!("words per sample\t: {}", self.words));

        let mut p_values = Vec::new();
        match self.source.clone() {
            ByteSource::Stream { samples } => {
                if open_or_fail(&mut self.base) {
                    for sample in 1..=samples {
                        self.base.check_cancelled()?;
                        let statistic = self.sample(&tables, |base| base.read_byte());
                        let label = format!("sample {sample:>2}");
                        if !self.record(&label, statistic, &mut p_values) {
                            break;
                        }
                    }
                    self.base.close_input_stream();
                }
            }
            ByteSource::SpecificBytes(shifts) => {
                for shift in shifts {
                    self.base.check_cancelled()?;
                    if !open_or_fail(&mut self.base) {
                        break;
                    }
                    let statistic = self.sample(&tables, |base| {
                        base.read_u32()
                            .map(|w| conditioning::extract_bits(w, shift, 8) as u8)
                    });
                    self.base.close_input_stream();
                    let label = bit_range_label(shift, 8);
                    if !self.record(&label, statistic, &mut p_values) {
                        break;
                    }
                }
            }
        }
        decide_on_ks(&mut self.base, "p-values", &p_values);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::ResultKind,
        rngs::ReferenceRand,
        stream::{MemoryStream, RngStream},
    };

    #[test]
    fn letters_follow_popcount() {
        assert_eq!(letter(0x00), 0);
        assert_eq!(letter(0x03), 0);
        assert_eq!(letter(0x07), 1);
        assert_eq!(letter(0x0f), 2);
        assert_eq!(letter(0x1f), 3);
        assert_eq!(letter(0x3f), 4);
        assert_eq!(letter(0xff), 4);
        let mut weights = [0.0; LETTERS];
        for byte in 0..=255u8 {
            weights[letter(byte)] += 1.0;
        }
        assert_eq!(weights, LETTER_WEIGHTS);
    }

    #[test]
    fn word_tables_are_distributions() {
        for len in [4, 5] {
            let total: f64 = word_probabilities(len).iter().sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
        let p = word_probabilities(5);
        assert_eq!(p.len(), WORDS_5);
        assert!((p[0] - (37.0f64 / 256.0).powi(5)).abs() < 1e-15);
    }

    #[test]
    fn constant_stream_fails() {
        let mut t = CountTheOnes::new(ByteSource::stream(), BatteryConfig::default())
            .with_words(10_000);
        t.register_input(Box::new(MemoryStream::new(vec![0u8; 20_010])));
        t.run_test().unwrap();
        assert_eq!(t.result().unwrap(), ResultKind::Fail);
        assert!(t.errors().unwrap().is_empty());
    }

    #[test]
    fn constant_stream_is_caught_by_the_summary() {
        let mut single = CountTheOnes::new(ByteSource::stream(), BatteryConfig::default())
            .with_words(10_000)
            .with_samples(1);
        single.register_input(Box::new(MemoryStream::new(vec![0u8; 10_004])));
        single.run_test().unwrap();
        assert_eq!(single.result().unwrap(), ResultKind::Pass);
        assert!(single.details().unwrap()[1].ends_with("p-value     1.0000"));

        let mut pair = CountTheOnes::new(ByteSource::stream(), BatteryConfig::default())
            .with_words(10_000)
            .with_samples(2);
        pair.register_input(Box::new(MemoryStream::new(vec![0u8; 20_008])));
        pair.run_test().unwrap();
        assert!(pair
            .details()
            .unwrap()
            .contains(&"KS p-value of 2 p-values\t:     0.0000".to_owned()));
        assert_eq!(pair.result().unwrap(), ResultKind::Fail);
    }

    #[test]
    fn specific_bytes_make_one_pass_per_shift() {
        let mut t = CountTheOnes::new(ByteSource::specific_bytes(), BatteryConfig::default())
            .with_words(20_000)
            .with_shifts(vec![24, 16, 8, 0]);
        t.register_input(Box::new(RngStream::<ReferenceRand>::new(23, None)));
        t.run_test().unwrap();
        let passes = t
            .details()
            .unwrap()
            .iter()
            .filter(|d| d.starts_with("bits"))
            .count();
        assert_eq!(passes, 4);
        assert!(t
            .details()
            .unwrap()
            .iter()
            .any(|d| d.starts_with("bits  1 to  8")));
    }

    #[test]
    fn second_sample_needs_more_data() {
        let mut t = CountTheOnes::new(ByteSource::stream(), BatteryConfig::default())
            .with_words(1000);
        t.register_input(Box::new(MemoryStream::new(vec![0x55u8; 1500])));
        t.run_test().unwrap();
        assert_eq!(t.errors().unwrap(), ["sample  2: stream ended before 1000 words"]);
        assert_eq!(t.name(), "CountThe1sStream");
    }
}
