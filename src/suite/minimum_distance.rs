// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Minimum distance test.
//!
//! Scatter n points in a square of side 10000 and find the smallest
//! distance between any two of them. For n = 8000 the squared minimum
//! distance is close to exponential with mean 0.995, so
//! 1 - exp(-d^2 / 0.995) is uniform on [0, 1).

use std::f64::consts::PI;

use log::debug;

use crate::{
    base::{Base, Test},
    config::BatteryConfig,
    error::Result,
    stats,
    utils::{self, Point},
};

use super::{decide_on_ks, open_or_fail};

const SIDE: f64 = 10000.0;
const DEFAULT_SAMPLES: usize = 100;
const DEFAULT_POINTS: usize = 8000;
const DEFAULT_MEAN_D2: f64 = 0.995;

/// Smallest squared distance between two of `points`. Sorts the points by y.
pub fn min_distance_squared(points: &mut [Point]) -> f64 {
    let dim = points.len();
    utils::sort_points_by_y(points, dim);
    let mut d_min = f64::INFINITY;
    for i in 0..dim {
        for j in i + 1..dim {
            let dy = points[j].y - points[i].y;
            if dy * dy >= d_min {
                break;
            }
            let dx = points[j].x - points[i].x;
            d_min = d_min.min(dx * dx + dy * dy);
        }
    }
    d_min
}

pub struct MinimumDistance {
    base: Base,
    samples: usize,
    points: usize,
    mean_d2: f64,
}

impl MinimumDistance {
    pub fn new(config: BatteryConfig) -> Self {
        MinimumDistance {
            base: Base::new("MinimumDistance", config),
            samples: DEFAULT_SAMPLES,
            points: DEFAULT_POINTS,
            mean_d2: DEFAULT_MEAN_D2,
        }
    }

    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Points per sample, at least two. The expected mean of the squared
    /// minimum distance follows the point count.
    pub fn with_points(mut self, points: usize) -> Self {
        let points = points.max(2);
        self.points = points;
        self.mean_d2 = if points == DEFAULT_POINTS {
            DEFAULT_MEAN_D2
        } else {
            2.0 * SIDE * SIDE / (PI * points as f64 * (points - 1) as f64)
        };
        self
    }

    /// Fill `points` from the stream. Returns how many were read.
    fn read_points(&mut self, points: &mut [Point]) -> usize {
        for (filled, point) in points.iter_mut().enumerate() {
            let (Some(x), Some(y)) = (self.base.read_unit(), self.base.read_unit()) else {
                return filled;
            };
            *point = Point {
                x: SIDE * x,
                y: SIDE * y,
            };
        }
        points.len()
    }
}

impl Test for MinimumDistance {
    fn help(&self) -> &'static str {
        "Scatters points in a square, finds the smallest distance between any \
         two of them and compares its square with an exponential distribution."
    }

    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn execute(&mut self) -> Result<()> {
        self.base
            .add_detail(format!("points per sample\t: {}", self.points));
        self.base
            .add_detail(format!("expected mean d^2\t: {}", utils::d4(self.mean_d2)));
        if !open_or_fail(&mut self.base) {
            return Ok(());
        }

        let mut points = vec![Point::default(); self.points];
        let mut distances = Vec::with_capacity(self.samples);
        let mut p_values = Vec::with_capacity(self.samples);
        for sample in 0..self.samples {
            self.base.check_cancelled()?;
            let filled = self.read_points(&mut points);
            if filled < self.points {
                self.base.add_error(format!(
                    "stream ended in sample {} after {filled} of {} points",
                    sample + 1,
                    self.points
                ));
                break;
            }
            let d2 = min_distance_squared(&mut points);
            debug!("sample {}: d^2 {d2}", sample + 1);
            distances.push(d2);
            p_values.push(1.0 - (-d2 / self.mean_d2).exp());
        }
        self.base.close_input_stream();

        if !distances.is_empty() {
            self.base
                .add_detail(format!("samples\t\t\t: {}", distances.len()));
            self.base.add_detail(format!(
                "average d^2\t\t: {}",
                utils::d4(stats::mean(&distances))
            ));
        }
        decide_on_ks(&mut self.base, "samples", &p_values);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::ResultKind,
        rngs::{testgens::OnlyZero, ReferenceRand},
        stream::{MemoryStream, RngStream},
    };

    #[test]
    fn closest_pair_is_found() {
        let mut points = [
            Point { x: 0.0, y: 0.0 },
            Point { x: 3.0, y: 4.0 },
            Point { x: 10.0, y: 10.0 },
            Point { x: 3.5, y: 4.5 },
            Point { x: 9.0, y: 0.2 },
        ];
        assert_eq!(min_distance_squared(&mut points), 0.5);
        assert!(points.windows(2).all(|w| w[0].y <= w[1].y));
    }

    #[test]
    fn default_mean_is_classical() {
        let t = MinimumDistance::new(BatteryConfig::default());
        assert_eq!(t.mean_d2, 0.995);
        let t = t.with_points(8000);
        assert_eq!(t.mean_d2, 0.995);
        let t = t.with_points(4000);
        assert!((t.mean_d2 - 3.98).abs() < 0.01, "{}", t.mean_d2);
    }

    #[test]
    fn coincident_points_fail() {
        let mut t = MinimumDistance::new(BatteryConfig::default())
            .with_samples(10)
            .with_points(100);
        t.register_input(Box::new(RngStream::<OnlyZero>::new(0, None)));
        t.run_test().unwrap();
        assert_eq!(t.result().unwrap(), ResultKind::Fail);
        assert!(t.errors().unwrap().is_empty());
    }

    #[test]
    fn random_points_are_summarised() {
        let mut t = MinimumDistance::new(BatteryConfig::default())
            .with_samples(20)
            .with_points(500);
        t.register_input(Box::new(RngStream::<ReferenceRand>::new(9, None)));
        t.run_test().unwrap();
        assert!(t
            .details()
            .unwrap()
            .iter()
            .any(|d| d.starts_with("KS p-value of 20 samples")));
    }

    #[test]
    fn short_stream_keeps_complete_samples() {
        // Two full samples of 10 points and half of a third.
        let mut t = MinimumDistance::new(BatteryConfig::default())
            .with_samples(5)
            .with_points(10);
        t.register_input(Box::new(MemoryStream::new(vec![7u8; 25 * 8])));
        t.run_test().unwrap();
        assert_eq!(
            t.errors().unwrap(),
            ["stream ended in sample 3 after 5 of 10 points"]
        );
        assert!(t.details().unwrap().contains(&"samples\t\t\t: 2".to_owned()));
    }
}
