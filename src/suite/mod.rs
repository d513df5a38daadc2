// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! The statistical tests of the battery.
//!
//! Every test reads its stream, buckets what it sees, compares the buckets
//! with their theoretical distribution and turns the comparison into a
//! p-value. Tests that make several passes summarise the pass p-values with
//! a KS test. Sample sizes default to the classical values and can be
//! reduced with the `with_*` builders.

pub mod birthday_spacings;
pub mod binary_rank;
pub mod count_bits;
pub mod count_the_ones;
pub mod minimum_distance;
pub mod monte_carlo;
pub mod occupancy;
pub mod runs;
pub mod squeeze;

pub use birthday_spacings::BirthdaySpacings;
pub use binary_rank::{BinaryRank, RankConfig};
pub use count_bits::{BitGroup, CountBits};
pub use count_the_ones::{ByteSource, CountTheOnes};
pub use minimum_distance::MinimumDistance;
pub use monte_carlo::MonteCarlo;
pub use occupancy::{LetterSource, Occupancy, OccupancyConfig};
pub use runs::Runs;
pub use squeeze::Squeeze;

use crate::{
    base::{Base, ResultKind},
    stats, utils,
};

/// Number of reads between two checks of the cancel token in tests that
/// stream without an outer loop.
pub(crate) const CANCEL_CHECK_INTERVAL: u64 = 1 << 20;

/// Open the input stream, recording a failed result when that is impossible.
pub(crate) fn open_or_fail(base: &mut Base) -> bool {
    if base.open_input_stream() {
        return true;
    }
    base.add_error("input stream could not be opened");
    base.set_result(ResultKind::Fail);
    false
}

/// Record the KS summary of per pass p-values and decide the result on it.
/// A single pass is decided on its own p-value.
pub(crate) fn decide_on_ks(base: &mut Base, label: &str, p_values: &[f64]) {
    if p_values.is_empty() {
        base.add_error("no complete pass, nothing to summarise");
        base.set_result(ResultKind::Fail);
        return;
    }
    if let [p] = p_values {
        base.decide(*p);
        return;
    }
    let p = stats::ks_test(p_values);
    base.add_detail(format!(
        "KS p-value of {} {label}\t: {}",
        p_values.len(),
        utils::d4(p)
    ));
    base.decide(p);
}

/// Name the bits of a 32 bit word that `(word >> shift)` masked to `width`
/// bits selects, counting from 1 at the most significant bit.
pub(crate) fn bit_range_label(shift: u32, width: u32) -> String {
    let last = 32 - shift;
    let first = last + 1 - width;
    format!("bits {first:>2} to {last:>2}")
}
