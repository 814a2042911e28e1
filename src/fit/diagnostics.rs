//! Residual-based goodness-of-fit diagnostics.
//!
//! Computed from a fitted model's standardized residuals: a one-sample
//! Kolmogorov-Smirnov test against the standard normal, plus sample skewness
//! and excess kurtosis. Failures degrade to missing fields, never errors.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Fit-quality statistics for one fitted model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResidualDiagnostics {
    /// P-value of the KS test of the standardized residuals against N(0, 1).
    pub normality_p: Option<f64>,
    /// Sample skewness (Fisher adjusted).
    pub skewness: Option<f64>,
    /// Excess kurtosis (Fisher adjusted).
    pub kurtosis: Option<f64>,
}

/// Compute diagnostics from standardized residuals.
///
/// Non-finite entries are dropped first. Skewness and kurtosis require at
/// least two distinct values (and enough observations for the small-sample
/// adjustments); otherwise they are reported missing rather than computed on
/// a degenerate sample.
pub fn residual_diagnostics(residuals: &[f64]) -> ResidualDiagnostics {
    let finite: Vec<f64> = residuals.iter().copied().filter(|r| r.is_finite()).collect();

    let distinct = count_distinct(&finite);
    let (skewness, kurtosis) = if distinct < 2 {
        (None, None)
    } else {
        (sample_skewness(&finite), sample_kurtosis(&finite))
    };

    ResidualDiagnostics {
        normality_p: ks_normal_p(&finite),
        skewness,
        kurtosis,
    }
}

fn count_distinct(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted.dedup();
    sorted.len()
}

/// Fisher-adjusted sample skewness; `None` below 3 observations or with
/// zero variance.
fn sample_skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let n_f = n as f64;
    let mean = values.iter().sum::<f64>() / n_f;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n_f;
    let std_dev = var.sqrt();
    if std_dev.abs() < f64::EPSILON {
        return None;
    }

    let m3: f64 = values.iter().map(|x| ((x - mean) / std_dev).powi(3)).sum();
    let adjustment = (n_f * (n_f - 1.0)).sqrt() / (n_f - 2.0);
    Some(adjustment * m3 / n_f)
}

/// Fisher-adjusted excess kurtosis; `None` below 4 observations or with
/// zero variance.
fn sample_kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 4 {
        return None;
    }
    let n_f = n as f64;
    let mean = values.iter().sum::<f64>() / n_f;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n_f;
    let std_dev = var.sqrt();
    if std_dev.abs() < f64::EPSILON {
        return None;
    }

    let m4: f64 = values.iter().map(|x| ((x - mean) / std_dev).powi(4)).sum();
    let g2 = m4 / n_f - 3.0;
    let adjustment = (n_f - 1.0) / ((n_f - 2.0) * (n_f - 3.0));
    Some(
        adjustment * ((n_f + 1.0) * g2 + 6.0)
            - 3.0 * (n_f - 1.0).powi(2) / ((n_f - 2.0) * (n_f - 3.0)),
    )
}

/// One-sample Kolmogorov-Smirnov test against the standard normal, with the
/// asymptotic p-value. `None` on an empty sample or numerical failure.
fn ks_normal_p(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let normal = Normal::new(0.0, 1.0).ok()?;

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n_f = n as f64;
    let mut d: f64 = 0.0;
    for (i, &x) in sorted.iter().enumerate() {
        let cdf = normal.cdf(x);
        let upper = (i + 1) as f64 / n_f - cdf;
        let lower = cdf - i as f64 / n_f;
        d = d.max(upper).max(lower);
    }
    if !d.is_finite() {
        return None;
    }

    // Asymptotic Kolmogorov distribution with the Stephens small-sample
    // adjustment.
    let lambda = (n_f.sqrt() + 0.12 + 0.11 / n_f.sqrt()) * d;
    let mut p = 0.0;
    for k in 1..=100 {
        let k_f = k as f64;
        let term = (-2.0 * k_f * k_f * lambda * lambda).exp();
        p += if k % 2 == 1 { 2.0 * term } else { -2.0 * term };
        if term < 1e-12 {
            break;
        }
    }
    Some(p.clamp(0.0, 1.0))
}
