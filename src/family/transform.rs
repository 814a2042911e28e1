//! Validity transforms mapping raw feature values onto a family's support.

use crate::family::Support;

/// Margin used when rescaling onto the unit interval, so that the maximum
/// does not land exactly on 1.
const UNIT_EPS: f64 = 1e-6;

/// Result of transforming one feature's values for one family.
///
/// Invalid entries are marked with `NaN` and excluded from fitting; the
/// per-sample positions are preserved so the design matrix rows can be
/// subset consistently.
#[derive(Debug, Clone)]
pub struct TransformedValues {
    /// Transformed values, `NaN` where the value is invalid for the family.
    pub values: Vec<f64>,
    /// Number of valid (finite) entries.
    pub n_valid: usize,
}

impl TransformedValues {
    fn new(values: Vec<f64>) -> Self {
        let n_valid = values.iter().filter(|v| v.is_finite()).count();
        Self { values, n_valid }
    }

    /// True when every entry was invalidated.
    pub fn all_invalid(&self) -> bool {
        self.n_valid == 0
    }
}

/// Transform raw values onto the support of a family.
///
/// - `Counts`: negatives become invalid, the rest round to the nearest
///   integer.
/// - `Positive`: values at or below zero become invalid.
/// - `Unit`: values are min-max rescaled to `(x - min) / (max - min + eps)`;
///   results at or beyond the interval boundary become invalid.
/// - `Real`: values are standardized with the feature's own mean and
///   standard deviation.
/// - `Unspecified`: values pass through unchanged.
///
/// Non-finite inputs are invalid for every constrained support class.
pub fn transform(values: &[f64], support: Support) -> TransformedValues {
    match support {
        Support::Unspecified => TransformedValues::new(values.to_vec()),
        Support::Counts => TransformedValues::new(
            values
                .iter()
                .map(|&v| {
                    if v.is_finite() && v >= 0.0 {
                        v.round()
                    } else {
                        f64::NAN
                    }
                })
                .collect(),
        ),
        Support::Positive => TransformedValues::new(
            values
                .iter()
                .map(|&v| if v.is_finite() && v > 0.0 { v } else { f64::NAN })
                .collect(),
        ),
        Support::Unit => {
            let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
            let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
            let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            TransformedValues::new(
                values
                    .iter()
                    .map(|&v| {
                        if !v.is_finite() {
                            return f64::NAN;
                        }
                        let scaled = (v - min) / (max - min + UNIT_EPS);
                        if scaled > 0.0 && scaled < 1.0 {
                            scaled
                        } else {
                            f64::NAN
                        }
                    })
                    .collect(),
            )
        }
        Support::Real => {
            let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
            let n = finite.len() as f64;
            let mean = finite.iter().sum::<f64>() / n.max(1.0);
            let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n.max(1.0);
            let sd = var.sqrt();
            TransformedValues::new(
                values
                    .iter()
                    .map(|&v| {
                        if v.is_finite() && sd > 0.0 {
                            (v - mean) / sd
                        } else {
                            f64::NAN
                        }
                    })
                    .collect(),
            )
        }
    }
}
