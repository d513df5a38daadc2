// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Misc utility functions.

use std::time::Duration;

pub const INV_ROOT2: f64 = 0.7071067811865475;

/// Width of the numeric field produced by [`d4`].
const D4_WIDTH: usize = 10;

/// A point in the plane, used by the minimum distance test.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Round up to 4 decimal places.
pub fn d4d_d(d: f64) -> f64 {
    // Adding 0.0 turns a negative zero into a positive one.
    (d * 10000.0).ceil() / 10000.0 + 0.0
}

/// Render `d` with exactly 4 decimals, rounded up, right aligned in a
/// 10 character field (as in C "%10.4f"). Wider values are not truncated.
pub fn d4(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_owned();
    }
    format!("{:>width$.4}", d4d_d(d), width = D4_WIDTH)
}

/// Sort the first `dim` entries of `arr` in ascending order.
pub fn sort_prefix_f64(arr: &mut [f64], dim: usize) {
    let dim = dim.min(arr.len());
    arr[..dim].sort_unstable_by(|a, b| a.total_cmp(b));
}

/// Sort the first `dim` entries of `arr` in ascending order.
pub fn sort_prefix_u32(arr: &mut [u32], dim: usize) {
    let dim = dim.min(arr.len());
    arr[..dim].sort_unstable();
}

/// Sort the first `dim` points of `arr` by their y coordinate.
pub fn sort_points_by_y(arr: &mut [Point], dim: usize) {
    let dim = dim.min(arr.len());
    arr[..dim].sort_unstable_by(|a, b| a.y.total_cmp(&b.y));
}

/// Format a number of bytes into a pretty String.
/// e.g. 1048576 is 1 MiB
pub fn format_byte_count(num_bytes: usize) -> String {
    // 2**30 = 1073741824
    if num_bytes > 1073741824 {
        format!("{:.2} GiB", (num_bytes as f64 / 1073741824.0))
    // 2**20 = 1048576
    } else if num_bytes > 1048576 {
        format!("{:.2} MiB", (num_bytes as f64 / 1048576.0))
    // 2**10 = 1024
    } else if num_bytes > 1024 {
        format!("{:.2} KiB", (num_bytes as f64 / 1024.0))
    } else {
        format!("{:.2} B", num_bytes as f64)
    }
}

/// Format a duration with a unit matching its size.
pub fn format_elapsed_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs >= 60.0 {
        format!("{:.2} min", secs / 60.0)
    } else if secs >= 1.0 {
        format!("{:.2} s", secs)
    } else {
        format!("{:.2} ms", secs * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn d4_pads_and_rounds_up() {
        assert_eq!(d4(0.0), "    0.0000");
        assert_eq!(d4(1.0), "    1.0000");
        assert_eq!(d4(0.12341), "    0.1235");
        assert_eq!(d4(-0.12349), "   -0.1234");
        assert_eq!(d4(-0.00001), "    0.0000");
        assert_eq!(d4(123456.5), "123456.5000");
        assert_eq!(d4(f64::NAN), "NaN");
    }

    #[test]
    fn d4d_d_is_ceiling() {
        assert_eq!(d4d_d(0.00001), 0.0001);
        assert_eq!(d4d_d(2.5), 2.5);
    }

    #[test]
    fn prefix_sorts_leave_tail_alone() {
        let mut values = [3.0, 1.0, 2.0, 0.5];
        sort_prefix_f64(&mut values, 3);
        assert_eq!(values, [1.0, 2.0, 3.0, 0.5]);

        let mut ints = [9u32, 4, 7, 1];
        sort_prefix_u32(&mut ints, 10);
        assert_eq!(ints, [1, 4, 7, 9]);

        let mut points = [
            Point { x: 0.0, y: 5.0 },
            Point { x: 1.0, y: -1.0 },
            Point { x: 2.0, y: 3.0 },
        ];
        sort_points_by_y(&mut points, 3);
        let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![-1.0, 3.0, 5.0]);
    }

    #[test]
    fn byte_counts() {
        assert_eq!(format_byte_count(512), "512.00 B");
        assert_eq!(format_byte_count(2048), "2.00 KiB");
        assert_eq!(format_byte_count(3 * 1048576), "3.00 MiB");
    }
}
