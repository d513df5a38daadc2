// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Settings shared by every test of a battery run.

use std::{fmt, str::FromStr};

/// Significance level below which a summary p-value fails a test.
pub const DEFAULT_SIGNIFICANCE: f64 = 0.01;

/// What the bit counting tests hand to the KS helper.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum KsMode {
    /// Feed the raw bucket counts, as the classic implementation does.
    /// Counts are not p-values, so the resulting KS value is only
    /// comparable with earlier reports.
    #[default]
    RawCounts,
    /// Turn each bucket's deviation into a normal p-value first.
    NormalPValues,
}

impl fmt::Display for KsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KsMode::RawCounts => write!(f, "raw-counts"),
            KsMode::NormalPValues => write!(f, "normal-p-values"),
        }
    }
}

impl FromStr for KsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw-counts" => Ok(KsMode::RawCounts),
            "normal-p-values" => Ok(KsMode::NormalPValues),
            other => Err(format!(
                "unknown KS mode `{other}` (expected raw-counts or normal-p-values)"
            )),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BatteryConfig {
    pub significance: f64,
    pub ks_mode: KsMode,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        BatteryConfig {
            significance: DEFAULT_SIGNIFICANCE,
            ks_mode: KsMode::default(),
        }
    }
}

impl BatteryConfig {
    pub fn with_significance(mut self, significance: f64) -> Self {
        self.significance = significance;
        self
    }

    pub fn with_ks_mode(mut self, ks_mode: KsMode) -> Self {
        self.ks_mode = ks_mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ks_mode_round_trips_through_text() {
        for mode in [KsMode::RawCounts, KsMode::NormalPValues] {
            assert_eq!(mode.to_string().parse::<KsMode>(), Ok(mode));
        }
        assert!("counts".parse::<KsMode>().is_err());
    }
}
