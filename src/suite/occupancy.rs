// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Overlapping occupancy tests: OPSO, OQSO, DNA and Bitstream.
//!
//! The stream is turned into a sequence of letters from a small alphabet and
//! every run of consecutive letters spelling 20 bits is treated as a word.
//! After 2^21 overlapping words the number of the 2^20 possible words that
//! never appeared should be close to normal with mean 141909.

use log::debug;

use crate::{
    base::{Base, Test},
    conditioning,
    config::BatteryConfig,
    error::Result,
    stats, utils,
};

use super::{bit_range_label, decide_on_ks, open_or_fail};

const WORD_BITS: u32 = 20;
const WORDS_PER_PASS: usize = 1 << 21;
const MEAN_MISSING: f64 = 141909.0;

/// Where the letters of a word come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LetterSource {
    /// One letter per 32 bit word, taken at each listed shift in turn,
    /// one pass per shift.
    Shifted(Vec<u32>),
    /// The stream as one continuous bit string, MSB first, cut into letters.
    /// Passes follow each other without reopening the stream.
    Continuous { repetitions: usize },
}

/// Alphabet and reference standard deviation of an occupancy test.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyConfig {
    pub name: &'static str,
    pub letter_bits: u32,
    pub sigma: f64,
    pub source: LetterSource,
}

impl OccupancyConfig {
    /// Overlapping pairs of 10 bit letters.
    pub fn opso() -> Self {
        OccupancyConfig {
            name: "OPSO",
            letter_bits: 10,
            sigma: 290.0,
            source: LetterSource::Shifted((0..=22).rev().collect()),
        }
    }

    /// Overlapping quadruples of 5 bit letters.
    pub fn oqso() -> Self {
        OccupancyConfig {
            name: "OQSO",
            letter_bits: 5,
            sigma: 295.0,
            source: LetterSource::Shifted((0..=27).rev().collect()),
        }
    }

    /// Overlapping 10 letter words over a four letter alphabet.
    pub fn dna() -> Self {
        OccupancyConfig {
            name: "DNA",
            letter_bits: 2,
            sigma: 339.0,
            source: LetterSource::Shifted((0..=30).rev().collect()),
        }
    }

    /// Overlapping 20 bit words of the raw bit string.
    pub fn bitstream() -> Self {
        OccupancyConfig {
            name: "Bitstream",
            letter_bits: 1,
            sigma: 428.0,
            source: LetterSource::Continuous { repetitions: 20 },
        }
    }

    pub fn letters_per_word(&self) -> u32 {
        WORD_BITS / self.letter_bits
    }
}

/// MSB first reader of single bits.
#[derive(Default)]
struct BitReader {
    byte: u8,
    left: u32,
}

impl BitReader {
    fn next_bit(&mut self, base: &mut Base) -> Option<u32> {
        if self.left == 0 {
            self.byte = base.read_byte()?;
            self.left = 8;
        }
        self.left -= 1;
        Some(((self.byte >> self.left) & 1) as u32)
    }
}

/// Set of the 2^20 possible words.
struct WordSet {
    bits: Vec<u64>,
}

impl WordSet {
    fn new() -> Self {
        WordSet {
            bits: vec![0; (1 << WORD_BITS) / 64],
        }
    }

    fn insert(&mut self, word: u32) {
        self.bits[(word >> 6) as usize] |= 1 << (word & 63);
    }

    fn missing(&self) -> u32 {
        (1u32 << WORD_BITS) - self.bits.iter().map(|b| b.count_ones()).sum::<u32>()
    }
}

pub struct Occupancy {
    base: Base,
    alphabet: OccupancyConfig,
}

impl Occupancy {
    pub fn new(alphabet: OccupancyConfig, config: BatteryConfig) -> Self {
        Occupancy {
            base: Base::new(alphabet.name, config),
            alphabet,
        }
    }

    /// Shifts for the word based alphabets. Ignored by Bitstream.
    pub fn with_shifts(mut self, shifts: Vec<u32>) -> Self {
        if let LetterSource::Shifted(current) = &mut self.alphabet.source {
            let letter_bits = self.alphabet.letter_bits;
            *current = shifts
                .into_iter()
                .filter(|&s| s + letter_bits <= 32)
                .collect();
        }
        self
    }

    /// Number of consecutive passes of Bitstream. Ignored by the others.
    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        if let LetterSource::Continuous { repetitions: current } = &mut self.alphabet.source {
            *current = repetitions;
        }
        self
    }

    /// Count missing words over one pass, `None` if the stream ran dry.
    fn missing_words(
        &mut self,
        mut next_letter: impl FnMut(&mut Base) -> Option<u32>,
    ) -> Option<u32> {
        let letter_bits = self.alphabet.letter_bits;
        let mask = (1u32 << WORD_BITS) - 1;
        let mut word = 0u32;
        for _ in 1..self.alphabet.letters_per_word() {
            word = (word << letter_bits) | next_letter(&mut self.base)?;
        }
        let mut seen = WordSet::new();
        for _ in 0..WORDS_PER_PASS {
            word = ((word << letter_bits) | next_letter(&mut self.base)?) & mask;
            seen.insert(word);
        }
        Some(seen.missing())
    }

    /// Record one pass. Returns false when the pass was incomplete.
    fn record_pass(
        &mut self,
        label: &str,
        missing: Option<u32>,
        p_values: &mut Vec<f64>,
    ) -> bool {
        let Some(missing) = missing else {
            self.base
                .add_error(format!("{label}: stream ended before {WORDS_PER_PASS} words"));
            return false;
        };
        let z = (missing as f64 - MEAN_MISSING) / self.alphabet.sigma;
        let p_value = 1.0 - stats::std_normal_cdf(z);
        debug!("{label}: {missing} missing words, z {z}");
        self.base.add_detail(format!(
            "{label}\t: missing {missing}\tz-score {}\tp-value {}",
            utils::d4(z),
            utils::d4(p_value)
        ));
        p_values.push(p_value);
        true
    }
}

impl Test for Occupancy {
    fn help(&self) -> &'static str {
        "Forms overlapping 20 bit words from letters of the stream and compares \
         the number of words that never occur with its expected value."
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn execute(&mut self) -> Result<()> {
        let letter_bits = self.alphabet.letter_bits;
        self.base.add_detail(format!(
            "letters\t\t\t: {} bits, {} per word",
            letter_bits,
            self.alphabet.letters_per_word()
        ));
        self.base
            .add_detail(format!("words per pass\t\t: {WORDS_PER_PASS}"));
        self.base.add_detail(format!(
            "expected missing\t: {MEAN_MISSING}\tsigma {}",
            self.alphabet.sigma
        ));

        let mut p_values = Vec::new();
        match self.alphabet.source.clone() {
            LetterSource::Shifted(shifts) => {
                for shift in shifts {
                    self.base.check_cancelled()?;
                    if !open_or_fail(&mut self.base) {
                        break;
                    }
                    let missing = self.missing_words(|base| {
                        base.read_u32()
                            .map(|w| conditioning::extract_bits(w, shift, letter_bits))
                    });
                    self.base.close_input_stream();
                    let label = bit_range_label(shift, letter_bits);
                    if !self.record_pass(&label, missing, &mut p_values) {
                        break;
                    }
                }
            }
            LetterSource::Continuous { repetitions } => {
                if open_or_fail(&mut self.base) {
                    let mut bits = BitReader::default();
                    for repetition in 1..=repetitions {
                        self.base.check_cancelled()?;
                        let missing = self.missing_words(|base| bits.next_bit(base));
                        let label = format!("pass {repetition:>2}");
                        if !self.record_pass(&label, missing, &mut p_values) {
                            break;
                        }
                    }
                    self.base.close_input_stream();
                }
            }
        }
        decide_on_ks(&mut self.base, "p-values", &p_values);
        Ok(())
    }
}
