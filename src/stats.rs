// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Collection of methods for statistical analysis.
//!
//! Everything in here is pure: no I/O, same output for the same input.
//! The chi-square and gamma functions follow the classical Diehard formulation
//! (half-integer gamma, chi-square cdf built up two degrees of freedom at a
//! time) so reported p-values line up with the published tables.

use std::f64::consts::PI;

use statrs::function::erf::erf;

use crate::error::{BatteryError, Result};
use crate::utils;

/// Lower clamp used by the KS statistic before taking logarithms.
const KS_EPSILON: f64 = 1e-20;

/// Upper bound on Poisson bins scanned while pooling expected counts.
const MAX_POISSON_BINS: u32 = 10_000;

fn check_half_integer(z: f64) -> Result<()> {
    let twice = 2.0 * z;
    if !z.is_finite() || z <= 0.0 || twice.fract() != 0.0 {
        return Err(BatteryError::InvalidGammaArgument(z));
    }
    Ok(())
}

/// Gamma function for arguments where 2z is a positive integer.
///     G(0.5) = sqrt(pi), G(1) = 1, G(z) = (z - 1) * G(z - 1)
pub fn gamma_half_integer(z: f64) -> Result<f64> {
    check_half_integer(z)?;
    let (mut value, mut k) = if (2.0 * z) as u64 % 2 == 1 {
        (PI.sqrt(), 0.5)
    } else {
        (1.0, 1.0)
    };
    while k < z {
        value *= k;
        k += 1.0;
    }
    Ok(value)
}

/// Natural logarithm of [`gamma_half_integer`], usable far beyond f64 overflow.
pub fn ln_gamma_half_integer(z: f64) -> Result<f64> {
    check_half_integer(z)?;
    let (mut value, mut k) = if (2.0 * z) as u64 % 2 == 1 {
        (0.5 * PI.ln(), 0.5)
    } else {
        (0.0, 1.0)
    };
    while k < z {
        value += f64::ln(k);
        k += 1.0;
    }
    Ok(value)
}

/// p.d.f. of the standard normal distribution.
pub fn std_normal_pdf(x: f64) -> f64 {
    (-x * x / 2.0).exp() / (2.0 * PI).sqrt()
}

/// c.d.f. of the standard normal distribution.
pub fn std_normal_cdf(x: f64) -> f64 {
    (1.0 + erf(x * utils::INV_ROOT2)) / 2.0
}

/// p.d.f. of the chi-square distribution with `df` degrees of freedom.
pub fn chisq_pdf(df: u32, x: f64) -> Result<f64> {
    if df == 0 {
        return Err(BatteryError::InvalidDegreesOfFreedom);
    }
    if x < 0.0 {
        return Ok(0.0);
    }
    if x == 0.0 {
        return Ok(match df {
            1 => f64::INFINITY,
            2 => 0.5,
            _ => 0.0,
        });
    }
    Ok(ln_chisq_pdf(df, x)?.exp())
}

fn ln_chisq_pdf(df: u32, x: f64) -> Result<f64> {
    let half_df = df as f64 / 2.0;
    Ok((half_df - 1.0) * (x / 2.0).ln() - x / 2.0 - 2f64.ln() - ln_gamma_half_integer(half_df)?)
}

/// c.d.f. of the chi-square distribution with `df` degrees of freedom.
///
/// Closed forms for one and two degrees of freedom, every further step uses
///     Chisq(df, x) = Chisq(df - 2, x) - 2 * chisq(df, x)
/// The recursion is unrolled so that tables with 65535 degrees of freedom
/// do not exhaust the stack.
pub fn chisq_cdf(df: u32, x: f64) -> Result<f64> {
    if df == 0 {
        return Err(BatteryError::InvalidDegreesOfFreedom);
    }
    if x <= 0.0 {
        return Ok(0.0);
    }
    let (mut cdf, mut current) = if df % 2 == 1 {
        (2.0 * std_normal_cdf(x.sqrt()) - 1.0, 1)
    } else {
        (1.0 - (-x / 2.0).exp(), 2)
    };
    // chisq(k + 2, x) = chisq(k, x) * x / k
    let mut ln_density: Option<f64> = None;
    while current < df {
        let next = match ln_density {
            Some(ln) => ln + x.ln() - (current as f64).ln(),
            None => ln_chisq_pdf(current + 2, x)?,
        };
        current += 2;
        cdf -= 2.0 * next.exp();
        ln_density = Some(next);
    }
    Ok(cdf.clamp(0.0, 1.0))
}

/// Upper tail probability of a chi-square statistic.
pub fn chisq_p_value(df: u32, chi_square: f64) -> Result<f64> {
    Ok(1.0 - chisq_cdf(df, chi_square)?)
}

/// p.d.f. of the Poisson distribution.
/// Evaluated in log space, `lambda^k` alone overflows long before `k!` does.
pub fn poisson_pdf(lambda: f64, k: u32) -> Result<f64> {
    if k == 0 {
        return Ok((-lambda).exp());
    }
    let ln_p = -lambda + k as f64 * lambda.ln() - ln_gamma_half_integer(k as f64 + 1.0)?;
    Ok(ln_p.exp())
}

/// c.d.f. of the Anderson-Darling statistic (quick approximation).
pub fn anderson_darling_cdf(z: f64) -> f64 {
    if z < 0.01 {
        0.0
    } else if z <= 2.0 {
        2.0 * (-1.2337 / z).exp() * (1.0 + z / 8.0 - 0.04958 * z * z / (1.325 + z)) / z.sqrt()
    } else if z <= 4.0 {
        1.0 - 0.6621361 * (-1.091638 * z).exp() - 0.95095 * (-2.005138 * z).exp()
    } else {
        1.0 - 0.4938691 * (-1.050321 * z).exp() - 0.5946335 * (-1.527198 * z).exp()
    }
}

/// Modified Kolmogorov-Smirnov test for uniformity on [0, 1).
///
/// Uses the Anderson-Darling statistic (FN(X) - X)^2 / (X (1 - X)) and its
/// quick c.d.f. approximation. The input is not modified.
/// Returns NaN for an empty sample.
pub fn ks_test(x: &[f64]) -> f64 {
    let dim = x.len();
    if dim == 0 {
        return f64::NAN;
    }
    let mut sorted = x.to_vec();
    utils::sort_prefix_f64(&mut sorted, dim);

    let n = dim as f64;
    let mut z = -n * n;
    for i in 0..dim {
        let tmp = (sorted[i] * (1.0 - sorted[dim - 1 - i])).max(KS_EPSILON);
        z -= (2 * i + 1) as f64 * tmp.ln();
    }
    z /= n;
    1.0 - anderson_darling_cdf(z)
}

/// Result of a chi-square goodness of fit against a Poisson distribution.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PoissonFit {
    pub degrees_of_freedom: u32,
    pub chi_square: f64,
    pub p_value: f64,
}

/// Goodness of fit of `observations` to a Poisson distribution with mean `lambda`.
///
/// Bins are grown from zero until each one expects at least five hits;
/// once the remaining expectation drops below five it is merged into the
/// current bin. Used by the birthday spacings test.
pub fn poisson_fit(lambda: f64, observations: &[u32]) -> Result<PoissonFit> {
    let no_obs = observations.len();
    let n = no_obs as f64;
    let dim = no_obs / 5;
    if dim < 2 {
        return Err(BatteryError::InvalidDegreesOfFreedom);
    }
    let mut obs = observations.to_vec();
    utils::sort_prefix_u32(&mut obs, no_obs);

    let mut observed = vec![0usize; dim];
    let mut expected = vec![0.0f64; dim];
    let mut next_value: u32 = 0;
    let mut k = 0usize;
    let mut rest = n;
    let mut last = 0usize;
    let mut merged = false;
    for j in 0..dim {
        last = j;
        while expected[j] < 5.0 && next_value < MAX_POISSON_BINS {
            expected[j] += n * poisson_pdf(lambda, next_value)?;
            next_value += 1;
        }
        // Bin j covers every value below next_value.
        while k < no_obs && obs[k] < next_value {
            observed[j] += 1;
            k += 1;
        }
        rest -= expected[j];
        if rest < 5.0 {
            expected[j] += rest;
            observed[j] += no_obs - k;
            merged = true;
            break;
        }
    }
    if !merged {
        expected[last] += rest;
        observed[last] += no_obs - k;
    }

    let chi_square: f64 = observed[..=last]
        .iter()
        .zip(&expected[..=last])
        .map(|(&f, &ef)| (f as f64 - ef).powi(2) / ef)
        .sum();
    let degrees_of_freedom = last as u32;
    let p_value = chisq_p_value(degrees_of_freedom, chi_square)?;
    Ok(PoissonFit {
        degrees_of_freedom,
        chi_square,
        p_value,
    })
}

/// Chi-square sum of `data` against a single expected count.
/// Returns 0 when nothing was expected.
pub fn chi_square(data: &[f64], expected: f64) -> f64 {
    if expected == 0.0 {
        return 0.0;
    }
    data.iter()
        .map(|&d| (d - expected) * (d - expected) / expected)
        .sum()
}

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation of `data` around its mean `avg`.
pub fn stdev(data: &[f64], avg: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data.len() as f64;
    let mean_square: f64 = data.iter().map(|&d| d * d / n).sum();
    (mean_square - avg * avg).max(0.0).sqrt()
}

/// Lag one serial correlation coefficient of `data`.
/// NaN when the series is constant or shorter than three values.
pub fn serial_correlation(data: &[f64]) -> f64 {
    let k = data.len();
    if k < 3 {
        return f64::NAN;
    }
    let n = (k - 1) as f64;
    let (mut sum_x, mut sum_sq_x, mut sum_y, mut sum_sq_y, mut sum_xy) =
        (0.0, 0.0, 0.0, 0.0, 0.0);
    for pair in data.windows(2) {
        let (p1, p) = (pair[0], pair[1]);
        sum_x += p;
        sum_sq_x += p * p;
        sum_y += p1;
        sum_sq_y += p1 * p1;
        sum_xy += p * p1;
    }
    let ss_x = sum_sq_x - sum_x * sum_x / n;
    let ss_y = sum_sq_y - sum_y * sum_y / n;
    let ss_xy = sum_xy - sum_x * sum_y / n;
    ss_xy / (ss_x * ss_y).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::distribution::{ChiSquared, ContinuousCDF, Discrete, Poisson};

    #[test]
    fn gamma_fixed_points() {
        assert_eq!(gamma_half_integer(0.5).unwrap(), PI.sqrt());
        assert_eq!(gamma_half_integer(1.0).unwrap(), 1.0);
        assert_eq!(gamma_half_integer(1.5).unwrap(), 0.5 * PI.sqrt());
        assert_eq!(gamma_half_integer(5.0).unwrap(), 24.0);
    }

    #[test]
    fn gamma_rejects_other_arguments() {
        for z in [0.0, -1.0, 0.3, 2.25, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                gamma_half_integer(z),
                Err(BatteryError::InvalidGammaArgument(_))
            ));
        }
    }

    #[test]
    fn ln_gamma_matches_plain_gamma() {
        for twice in 1..60 {
            let z = twice as f64 / 2.0;
            let plain = gamma_half_integer(z).unwrap();
            let ln = ln_gamma_half_integer(z).unwrap();
            assert!((plain.ln() - ln).abs() < 1e-9, "z = {z}");
        }
    }

    #[test]
    fn normal_cdf_symmetry() {
        assert!((std_normal_cdf(0.0) - 0.5).abs() < 1e-15);
        for x in [0.1, 0.5, 1.0, 1.96, 3.0] {
            assert!((std_normal_cdf(x) + std_normal_cdf(-x) - 1.0).abs() < 1e-12);
        }
        assert!((std_normal_cdf(1.96) - 0.9750021).abs() < 1e-6);
        assert!((std_normal_pdf(0.0) - 0.3989422804014327).abs() < 1e-15);
    }

    #[test]
    fn chisq_pdf_matches_closed_forms() {
        // df = 2 is the exponential density with mean 2.
        for x in [0.5, 1.0, 4.0] {
            assert!((chisq_pdf(2, x).unwrap() - 0.5 * (-x / 2.0).exp()).abs() < 1e-12);
        }
        let x: f64 = 3.0;
        let df_4 = x * (-x / 2.0).exp() / 4.0;
        assert!((chisq_pdf(4, x).unwrap() - df_4).abs() < 1e-12);
        assert_eq!(chisq_pdf(2, 0.0).unwrap(), 0.5);
        assert_eq!(chisq_pdf(1, 0.0).unwrap(), f64::INFINITY);
        assert_eq!(chisq_pdf(3, -1.0).unwrap(), 0.0);
        assert!(matches!(
            chisq_pdf(0, 1.0),
            Err(BatteryError::InvalidDegreesOfFreedom)
        ));
    }

    #[test]
    fn chisq_cdf_boundaries() {
        for df in [1, 2, 3, 4, 6] {
            assert_eq!(chisq_cdf(df, 0.0).unwrap(), 0.0);
            assert!((chisq_cdf(df, 500.0).unwrap() - 1.0).abs() < 1e-12);
        }
        assert!(matches!(
            chisq_cdf(0, 1.0),
            Err(BatteryError::InvalidDegreesOfFreedom)
        ));
    }

    #[test]
    fn chisq_cdf_agrees_with_statrs() {
        for df in [1u32, 2, 3, 5, 10, 42, 255] {
            let reference = ChiSquared::new(df as f64).unwrap();
            for x in [0.5, 1.0, df as f64, 2.0 * df as f64] {
                let ours = chisq_cdf(df, x).unwrap();
                assert!(
                    (ours - reference.cdf(x)).abs() < 1e-7,
                    "df {df}, x {x}: {ours} vs {}",
                    reference.cdf(x)
                );
            }
        }
    }

    #[test]
    fn chisq_cdf_handles_large_tables() {
        let df = 65535;
        let p = chisq_cdf(df, df as f64).unwrap();
        assert!(p > 0.4 && p < 0.6, "p = {p}");
    }

    #[test]
    fn poisson_pdf_sums_to_one() {
        let total: f64 = (0..200).map(|k| poisson_pdf(16.0, k).unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-10);
        assert!((poisson_pdf(2.0, 0).unwrap() - (-2.0f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn poisson_pdf_survives_large_means() {
        for (lambda, k) in [(200.0, 160), (100.0, 160), (300.0, 170), (200.0, 200)] {
            let reference = Poisson::new(lambda).unwrap().pmf(k as u64);
            let ours = poisson_pdf(lambda, k).unwrap();
            assert!(
                ((ours - reference) / reference).abs() < 1e-9,
                "lambda {lambda}, k {k}: {ours} vs {reference}"
            );
        }
    }

    #[test]
    fn anderson_darling_branches() {
        assert_eq!(anderson_darling_cdf(0.0), 0.0);
        assert!(anderson_darling_cdf(1.0) > 0.0);
        // The approximation is close to continuous at the branch points.
        assert!((anderson_darling_cdf(2.0) - anderson_darling_cdf(2.0 + 1e-9)).abs() < 1e-3);
        assert!((anderson_darling_cdf(4.0) - anderson_darling_cdf(4.0 + 1e-9)).abs() < 1e-3);
        assert!(anderson_darling_cdf(50.0) > 0.999);
    }

    #[test]
    fn ks_test_uniform_grid() {
        let grid: Vec<f64> = (0..100).map(|i| (i as f64 + 0.5) / 100.0).collect();
        let p = ks_test(&grid);
        assert!(p > 0.5, "p = {p}");
        let clustered = vec![0.001; 100];
        assert!(ks_test(&clustered) < 0.001);
        assert!(ks_test(&[]).is_nan());
    }

    #[test]
    fn ks_test_leaves_input_untouched() {
        let data = vec![0.9, 0.1, 0.5];
        let _ = ks_test(&data);
        assert_eq!(data, vec![0.9, 0.1, 0.5]);
    }

    #[test]
    fn poisson_fit_on_expected_counts() {
        // Lay out 500 observations in the proportions Poisson(2) predicts.
        let lambda = 2.0;
        let mut obs = Vec::new();
        for k in 0..12u32 {
            let count = (500.0 * poisson_pdf(lambda, k).unwrap()).round() as usize;
            obs.extend(std::iter::repeat(k).take(count));
        }
        obs.truncate(500);
        while obs.len() < 500 {
            obs.push(2);
        }
        let fit = poisson_fit(lambda, &obs).unwrap();
        assert!(fit.degrees_of_freedom >= 3);
        assert!(fit.p_value > 0.9, "{fit:?}");
    }

    #[test]
    fn poisson_fit_with_large_mean() {
        let lambda = 200.0;
        let mut obs = Vec::new();
        for k in 100..300u32 {
            let count = (500.0 * poisson_pdf(lambda, k).unwrap()).round() as usize;
            obs.extend(std::iter::repeat(k).take(count));
        }
        obs.truncate(500);
        while obs.len() < 500 {
            obs.push(200);
        }
        let fit = poisson_fit(lambda, &obs).unwrap();
        assert!(fit.degrees_of_freedom > 10, "{fit:?}");
        assert!(fit.p_value > 0.1, "{fit:?}");
    }

    #[test]
    fn poisson_fit_rejects_wrong_mean() {
        let obs = vec![9u32; 500];
        let fit = poisson_fit(2.0, &obs).unwrap();
        assert!(fit.p_value < 1e-6, "{fit:?}");
    }

    #[test]
    fn summary_helpers() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let avg = mean(&data);
        assert_eq!(avg, 5.0);
        assert!((stdev(&data, avg) - 2.0).abs() < 1e-12);
        assert_eq!(chi_square(&[5.0, 5.0], 5.0), 0.0);
        assert_eq!(chi_square(&[1.0, 9.0], 0.0), 0.0);
        assert!((chi_square(&[3.0, 7.0], 5.0) - 1.6).abs() < 1e-12);
        let ramp: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!((serial_correlation(&ramp) - 1.0).abs() < 1e-12);
    }
}
