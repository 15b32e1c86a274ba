//! Closed-form ordinary least squares
//!
//! Fits `y = intercept + slope * x` and reports the usual fit-quality statistics.
//! Two-sided p-values use the Student-t distribution with `n - 2` degrees of freedom,
//! evaluated through the regularised incomplete beta function.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub slope_std_error: f64,
    pub intercept_std_error: f64,
    pub slope_p_value: f64,
    pub intercept_p_value: f64,
    pub r_squared: f64,
    pub rmse: f64,
    /// Number of points used in the fit.
    pub n: usize,
}

/// Least-squares line through the finite `(x, y)` pairs.
///
/// Returns `None` when fewer than three usable points remain or when the spread of `x`
/// is lost in rounding relative to its magnitude, in which case no slope can be
/// identified. The test is independent of the units of `x`.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect();
    let n = points.len();
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let x_mean = points.iter().map(|p| p.0).sum::<f64>() / nf;
    let y_mean = points.iter().map(|p| p.1).sum::<f64>() / nf;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for &(a, b) in &points {
        let (dx, dy) = (a - x_mean, b - y_mean);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    let sum_sq: f64 = points.iter().map(|p| p.0 * p.0).sum();
    if sxx <= f64::EPSILON * sum_sq {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let sse: f64 = points
        .iter()
        .map(|&(a, b)| {
            let r = b - (intercept + slope * a);
            r * r
        })
        .sum();

    let dof = nf - 2.0;
    let variance = sse / dof;
    let slope_std_error = (variance / sxx).sqrt();
    let intercept_std_error = (variance * (1.0 / nf + x_mean * x_mean / sxx)).sqrt();

    Some(LinearFit {
        slope,
        intercept,
        slope_std_error,
        intercept_std_error,
        slope_p_value: t_test_p_value(slope, slope_std_error, dof),
        intercept_p_value: t_test_p_value(intercept, intercept_std_error, dof),
        r_squared: if syy > 0.0 { 1.0 - sse / syy } else { 1.0 },
        rmse: (sse / nf).sqrt(),
        n,
    })
}

fn t_test_p_value(estimate: f64, std_error: f64, dof: f64) -> f64 {
    if std_error > 0.0 {
        student_t_two_sided(estimate / std_error, dof)
    } else if estimate == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// `P(|T| > |t|)` for a Student-t variable with `dof` degrees of freedom.
pub fn student_t_two_sided(t: f64, dof: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    regularized_incomplete_beta(dof / (dof + t * t), 0.5 * dof, 0.5)
}

/// Lanczos approximation of `ln Γ(x)` for `x > 0`.
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = COEFFICIENTS[0];
    for (i, c) in COEFFICIENTS.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    let t = x + G + 0.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Regularised incomplete beta function `I_x(a, b)`.
pub fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front =
        (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(x, a, b) / a
    } else {
        1.0 - front * beta_continued_fraction(1.0 - x, b, a) / b
    }
}

/// Modified Lentz evaluation of the incomplete beta continued fraction.
fn beta_continued_fraction(x: f64, a: f64, b: f64) -> f64 {
    const MAX_ITERATIONS: usize = 300;
    const TOLERANCE: f64 = 3.0e-14;
    const TINY: f64 = 1.0e-300;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };

    let (qab, qap, qam) = (a + b, a + 1.0, a - 1.0);
    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;
    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < TOLERANCE {
            break;
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| 3.0 - 2.0 * v).collect();
        let fit = linear_regression(&x, &y).unwrap();
        assert_relative_eq!(fit.slope, -2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 3.0, epsilon = 1e-12);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
        assert!(fit.rmse < 1e-12);
        assert!(fit.slope_p_value < 1e-6);
    }

    #[test]
    fn test_noisy_fit_statistics() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 5.0, 4.0, 5.0];
        let fit = linear_regression(&x, &y).unwrap();
        assert_relative_eq!(fit.slope, 0.6, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 2.2, epsilon = 1e-12);
        assert_relative_eq!(fit.r_squared, 0.6, epsilon = 1e-12);
        assert_relative_eq!(fit.rmse, (2.4f64 / 5.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(fit.slope_std_error, 0.08f64.sqrt(), epsilon = 1e-12);
        assert!(fit.slope_p_value > 0.1 && fit.slope_p_value < 0.15);
        assert_eq!(fit.n, 5);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(linear_regression(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(linear_regression(&[1.0, 2.0], &[1.0, 2.0]).is_none());
        assert!(linear_regression(&[1.0, f64::NAN, 2.0], &[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn test_fit_independent_of_effort_scale() {
        let effort: Vec<f64> = (1..=13).map(f64::from).collect();
        let cpue: Vec<f64> = effort.iter().map(|e| 2.0 - 0.1 * e).collect();
        for scale in [1.0, 1.0e-9, 1.0e6] {
            let x: Vec<f64> = effort.iter().map(|e| e * scale).collect();
            let fit = linear_regression(&x, &cpue).unwrap();
            assert_relative_eq!(fit.slope * scale, -0.1, max_relative = 1e-9);
            assert_relative_eq!(fit.intercept, 2.0, max_relative = 1e-9);
        }
        // Identical tiny efforts still have no spread
        assert!(linear_regression(&[1.0e-9; 4], &[1.0, 2.0, 3.0, 4.0]).is_none());
    }

    #[test]
    fn test_student_t_reference_values() {
        // Cauchy distribution
        assert_relative_eq!(student_t_two_sided(1.0, 1.0), 0.5, epsilon = 1e-10);
        assert_relative_eq!(student_t_two_sided(0.0, 5.0), 1.0, epsilon = 1e-10);
        // Critical value of the 95% interval for 10 degrees of freedom
        assert_relative_eq!(student_t_two_sided(2.228_138_85, 10.0), 0.05, epsilon = 1e-6);
    }

    #[test]
    fn test_incomplete_beta_symmetry() {
        let v = regularized_incomplete_beta(0.3, 2.0, 5.0);
        let w = regularized_incomplete_beta(0.7, 5.0, 2.0);
        assert_relative_eq!(v + w, 1.0, epsilon = 1e-12);
        // I_x(1, 1) = x
        assert_relative_eq!(regularized_incomplete_beta(0.42, 1.0, 1.0), 0.42, epsilon = 1e-12);
    }
}
