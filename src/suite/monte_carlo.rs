// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Monte Carlo estimation of pi from byte pairs.

use log::debug;

use crate::{
    base::{Base, ResultKind, Test},
    config::BatteryConfig,
    error::Result,
    stats, utils,
};

use super::{open_or_fail, CANCEL_CHECK_INTERVAL};

const DEFAULT_PAIRS: usize = 1_000_000;
const RADIUS_SQUARED: u32 = 256 * 256;

/// Share of the 256x256 byte grid that lies inside the quarter circle.
fn grid_hit_probability() -> f64 {
    let hits: u32 = (0..256u32)
        .map(|x| (0..256u32).filter(|y| x * x + y * y <= RADIUS_SQUARED).count() as u32)
        .sum();
    hits as f64 / RADIUS_SQUARED as f64
}

pub struct MonteCarlo {
    base: Base,
    pairs: usize,
}

impl MonteCarlo {
    pub fn new(config: BatteryConfig) -> Self {
        MonteCarlo {
            base: Base::new("MonteCarlo", config),
            pairs: DEFAULT_PAIRS,
        }
    }

    /// Number of (x, y) byte pairs to draw.
    pub fn with_pairs(mut self, pairs: usize) -> Self {
        self.pairs = pairs;
        self
    }
}

impl Test for MonteCarlo {
    fn help(&self) -> &'static str {
        "Uses byte pairs as points in a square and estimates pi from the share \
         of points that fall inside the inscribed quarter circle."
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
        let base = &mut self.base;
        let mut bytes = Vec::with_capacity(2 * self.pairs);
        let mut hits: u64 = 0;
        let mut pairs: u64 = 0;
        while (pairs as usize) < self.pairs {
            let (Some(x), Some(y)) = (base.read_byte(), base.read_byte()) else {
                break;
            };
            let (x, y) = (x as u32, y as u32);
            if x * x + y * y <= RADIUS_SQUARED {
                hits += 1;
            }
            bytes.push(x as f64);
            bytes.push(y as f64);
            pairs += 1;
            if pairs % CANCEL_CHECK_INTERVAL == 0 {
                base.check_cancelled()?;
            }
        }
        base.close_input_stream();

        base.add_detail(format!("pairs read\t\t: {pairs}"));
        if pairs == 0 {
            base.add_error("no byte pairs could be read");
            base.set_result(ResultKind::Fail);
            return Ok(());
        }
        if (pairs as usize) < self.pairs {
            base.add_error(format!(
                "stream ended after {pairs} of {} pairs",
                self.pairs
            ));
        }

        let n = pairs as f64;
        let p_hit = grid_hit_probability();
        let pi = 4.0 * hits as f64 / n;
        let z = (hits as f64 - n * p_hit) / (n * p_hit * (1.0 - p_hit)).sqrt();
        let p_value = 2.0 * (1.0 - stats::std_normal_cdf(z.abs()));
        debug!("{hits} hits of {pairs} pairs, z {z}");

        base.add_detail(format!("hits\t\t\t: {hits}"));
        base.add_detail(format!("pi estimate\t\t: {}", utils::d4(pi)));
        base.add_detail(format!(
            "relative error\t\t: {}%",
            utils::d4(100.0 * (pi - std::f64::consts::PI).abs() / std::f64::consts::PI)
        ));
        base.add_detail(format!(
            "expected pi on grid\t: {}",
            utils::d4(4.0 * p_hit)
        ));
        base.add_detail(format!("z-score\t\t\t: {}", utils::d4(z)));
        base.add_detail(format!("p-value\t\t\t: {}", utils::d4(p_value)));
        base.add_detail(format!(
            "serial correlation\t: {}",
            utils::d4(stats::serial_correlation(&bytes))
        ));
        base.decide(p_value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        rngs::ReferenceRand,
        stream::{MemoryStream, RngStream},
    };

    fn detail(t: &MonteCarlo, prefix: &str) -> String {
        t.details()
            .unwrap()
            .iter()
            .find(|d| d.starts_with(prefix))
            .cloned()
            .unwrap_or_default()
    }

    #[test]
    fn zero_stream_reports_four() {
        let mut t = MonteCarlo::new(BatteryConfig::default()).with_pairs(1000);
        t.register_input(Box::new(MemoryStream::new(vec![0u8; 2000])));
        t.run_test().unwrap();
        assert_eq!(detail(&t, "pi estimate"), "pi estimate\t\t:     4.0000");
        assert_eq!(t.result().unwrap(), ResultKind::Fail);
        assert!(t.errors().unwrap().is_empty());
    }

    #[test]
    fn grid_probability_counts_lattice_points() {
        assert_eq!(grid_hit_probability(), 51720.0 / 65536.0);
    }

    #[test]
    fn random_pairs_estimate_pi() {
        let mut t = MonteCarlo::new(BatteryConfig::default()).with_pairs(100_000);
        t.register_input(Box::new(RngStream::<ReferenceRand>::new(3, None)));
        t.run_test().unwrap();
        let line = detail(&t, "pi estimate");
        let pi: f64 = line.rsplit(':').next().unwrap().trim().parse().unwrap();
        assert!((pi - std::f64::consts::PI).abs() < 0.1, "{pi}");
    }

    #[test]
    fn odd_trailing_byte_is_ignored() {
        let mut t = MonteCarlo::new(BatteryConfig::default()).with_pairs(10);
        t.register_input(Box::new(MemoryStream::new(vec![0u8; 7])));
        t.run_test().unwrap();
        assert_eq!(detail(&t, "pairs read"), "pairs read\t\t: 3");
        assert_eq!(t.errors().unwrap()[0], "stream ended after 3 of 10 pairs");
    }
}
