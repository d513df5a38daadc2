// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Binary rank tests for 6x8, 31x31 and 32x32 matrices.
//!
//! Rows of a binary matrix are taken from consecutive 32 bit words and the
//! rank of the matrix over GF(2) is computed. Low ranks are pooled into one
//! bucket and the bucket counts are compared with the exact rank
//! distribution of random binary matrices.

use log::debug;

use crate::{
    base::{Base, Test},
    conditioning,
    config::BatteryConfig,
    error::Result,
    stats, utils,
};

use super::{bit_range_label, decide_on_ks, open_or_fail};

/// Shape and sample size of a binary rank test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankConfig {
    pub name: &'static str,
    pub rows: usize,
    /// Bits per row, at most 32.
    pub cols: u32,
    /// Bit offsets inside each word, one pass per offset.
    pub shifts: Vec<u32>,
    pub matrices: usize,
    /// Ranks up to and including this value share a bucket.
    pub rank_floor: usize,
}

impl RankConfig {
    /// 100 000 6x8 matrices for each of the 25 byte positions in a word.
    pub fn six_by_eight() -> Self {
        RankConfig {
            name: "BinaryRankTestFor6x8Matrices",
            rows: 6,
            cols: 8,
            shifts: (0..=24).rev().collect(),
            matrices: 100_000,
            rank_floor: 4,
        }
    }

    /// 40 000 31x31 matrices built from the leftmost 31 bits of each word.
    pub fn thirty_one_by_thirty_one() -> Self {
        RankConfig {
            name: "BinaryRankTestFor31x31Matrices",
            rows: 31,
            cols: 31,
            shifts: vec![1],
            matrices: 40_000,
            rank_floor: 28,
        }
    }

    /// 40 000 32x32 matrices built from whole words.
    pub fn thirty_two_by_thirty_two() -> Self {
        RankConfig {
            name: "BinaryRankTestFor32x32Matrices",
            rows: 32,
            cols: 32,
            shifts: vec![0],
            matrices: 40_000,
            rank_floor: 29,
        }
    }

    fn max_rank(&self) -> usize {
        self.rows.min(self.cols as usize)
    }

    fn buckets(&self) -> usize {
        self.max_rank() - self.rank_floor + 1
    }

    /// Probability of each bucket, the pooled low ranks first.
    pub fn bucket_probabilities(&self) -> Vec<f64> {
        let cols = self.cols as usize;
        let mut probabilities: Vec<f64> = (self.rank_floor + 1..=self.max_rank())
            .map(|r| rank_probability(self.rows, cols, r))
            .collect();
        let pooled = 1.0 - probabilities.iter().sum::<f64>();
        probabilities.insert(0, pooled);
        probabilities
    }
}

/// Probability that a random binary `rows` x `cols` matrix has rank `rank`:
///     2^(r(m+n-r)-mn) * prod_{i<r} (1-2^(i-m)) (1-2^(i-n)) / (1-2^(i-r))
pub fn rank_probability(rows: usize, cols: usize, rank: usize) -> f64 {
    if rank > rows.min(cols) {
        return 0.0;
    }
    let (m, n, r) = (rows as i32, cols as i32, rank as i32);
    let mut p = 2f64.powi(r * (m + n - r) - m * n);
    for i in 0..r {
        p *= (1.0 - 2f64.powi(i - m)) * (1.0 - 2f64.powi(i - n)) / (1.0 - 2f64.powi(i - r));
    }
    p
}

/// Rank over GF(2) of a matrix whose rows are the low `cols` bits of each
/// entry. The rows are reduced in place.
pub fn rank_binary_matrix(rows: &mut [u32], cols: u32) -> usize {
    let mut rank = 0;
    for col in (0..cols).rev() {
        let bit = 1u32 << col;
        let Some(pivot) = (rank..rows.len()).find(|&r| rows[r] & bit != 0) else {
            continue;
        };
        rows.swap(rank, pivot);
        let pivot_row = rows[rank];
        for row in rows.iter_mut().skip(rank + 1) {
            if *row & bit != 0 {
                *row ^= pivot_row;
            }
        }
        rank += 1;
        if rank == rows.len() {
            break;
        }
    }
    rank
}

pub struct BinaryRank {
    base: Base,
    shape: RankConfig,
}

impl BinaryRank {
    pub fn new(shape: RankConfig, config: BatteryConfig) -> Self {
        BinaryRank {
            base: Base::new(shape.name, config),
            shape,
        }
    }

    pub fn with_matrices(mut self, matrices: usize) -> Self {
        self.shape.matrices = matrices;
        self
    }

    pub fn with_shifts(mut self, shifts: Vec<u32>) -> Self {
        let cols = self.shape.cols;
        self.shape.shifts = shifts.into_iter().filter(|&s| s + cols <= 32).collect();
        self
    }

    /// Rank bucket counts of one pass, stopping early when the stream ends.
    fn count_ranks(&mut self, shift: u32) -> Vec<u64> {
        let shape = &self.shape;
        let base = &mut self.base;
        let mut counts = vec![0u64; shape.buckets()];
        let mut matrix = vec![0u32; shape.rows];
        'matrices: for _ in 0..shape.matrices {
            for row in matrix.iter_mut() {
                match base.read_u32() {
                    Some(word) => *row = conditioning::extract_bits(word, shift, shape.cols),
                    None => break 'matrices,
                }
            }
            let rank = rank_binary_matrix(&mut matrix, shape.cols);
            counts[rank.saturating_sub(shape.rank_floor)] += 1;
        }
        counts
    }
}

impl Test for BinaryRank {
    fn help(&self) -> &'static str {
        "Builds binary matrices from stream words, computes their rank over \
         GF(2) and compares the rank counts with the theoretical distribution."
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn execute(&mut self) -> Result<()> {
        let probabilities = self.shape.bucket_probabilities();
        let floor = self.shape.rank_floor;
        self.base.add_detail(format!(
            "matrix size\t\t: {}x{}",
            self.shape.rows, self.shape.cols
        ));
        self.base
            .add_detail(format!("matrices per pass\t: {}", self.shape.matrices));
        let expected_line: Vec<String> = probabilities
            .iter()
            .map(|p| utils::d4(p * self.shape.matrices as f64).trim().to_owned())
            .collect();
        self.base.add_detail(format!(
            "expected r<={floor}..r={}\t: {}",
            self.shape.max_rank(),
            expected_line.join("\t")
        ));

        let mut p_values = Vec::with_capacity(self.shape.shifts.len());
        for shift in self.shape.shifts.clone() {
            self.base.check_cancelled()?;
            if !open_or_fail(&mut self.base) {
                break;
            }
            let counts = self.count_ranks(shift);
            let base = &mut self.base;
            base.close_input_stream();

            let label = bit_range_label(shift, self.shape.cols);
            let done: u64 = counts.iter().sum();
            let complete = done as usize == self.shape.matrices;
            if !complete {
                base.add_error(format!(
                    "{label}: stream ended after {done} of {} matrices",
                    self.shape.matrices
                ));
            }
            if done == 0 {
                break;
            }
            let chi_square: f64 = counts
                .iter()
                .zip(&probabilities)
                .map(|(&observed, &p)| {
                    let expected = done as f64 * p;
                    (observed as f64 - expected).powi(2) / expected
                })
                .sum();
            let p_value = stats::chisq_p_value((counts.len() - 1) as u32, chi_square)?;
            debug!("{label}: ranks {counts:?}, chi-square {chi_square}");
            let observed_line: Vec<String> = counts.iter().map(|c| c.to_string()).collect();
            base.add_detail(format!(
                "{label}\t: {}\tchi-square {}\tp-value {}",
                observed_line.join("\t"),
                utils::d4(chi_square),
                utils::d4(p_value)
            ));
            p_values.push(p_value);
            if !complete {
                break;
            }
        }
        decide_on_ks(&mut self.base, "p-values", &p_values);
        Ok(())
    }
}
