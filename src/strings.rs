// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! User interaction strings are stored here.

pub const FAIL_STR: &str = "FAILED!!";
pub const LOW_STR: &str = "LOW";
pub const MEDIUM_STR: &str = "MEDIUM";
pub const HIGH_STR: &str = "HIGH";
pub const PASS_STR: &str = "PASSED";

pub const NOT_RUN_STR: &str = "NOT RUN";
pub const CANCELLED_STR: &str = "CANCELLED";
