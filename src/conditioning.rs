// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Methods to turn random bits into more constrained data types.

/// 2^32, the number of distinct 32 bit words.
pub const UNIMAX: f64 = 4294967296.0;

/// Maps a u32 to the 0..1 range in f64.
/// 1.0 itself is never produced.
pub fn u32_to_unit(word: u32) -> f64 {
    word as f64 / UNIMAX
}

/// Extract `width` bits of `word` starting `shift` bits above the least
/// significant bit.
pub fn extract_bits(word: u32, shift: u32, width: u32) -> u32 {
    debug_assert!(width >= 1 && shift + width <= 32);
    let mask = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
    (word >> shift) & mask
}
