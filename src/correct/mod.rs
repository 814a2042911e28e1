//! Multiple testing correction across features.

pub mod bh;
pub mod fwer;

pub use bh::correct_bh;
pub use fwer::{correct_bonferroni, correct_holm};

use crate::error::FamselError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named correction method applied to the p-value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionMethod {
    /// Benjamini-Hochberg false discovery rate control.
    Bh,
    /// Holm step-down family-wise error control.
    Holm,
    /// Bonferroni family-wise error control.
    Bonferroni,
}

impl CorrectionMethod {
    /// Apply the method to a vector of raw p-values.
    pub fn adjust(&self, p_values: &[f64]) -> Vec<f64> {
        match self {
            CorrectionMethod::Bh => correct_bh(p_values),
            CorrectionMethod::Holm => correct_holm(p_values),
            CorrectionMethod::Bonferroni => correct_bonferroni(p_values),
        }
    }
}

impl fmt::Display for CorrectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CorrectionMethod::Bh => "bh",
            CorrectionMethod::Holm => "holm",
            CorrectionMethod::Bonferroni => "bonferroni",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for CorrectionMethod {
    type Err = FamselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bh" | "fdr" | "benjamini-hochberg" => Ok(CorrectionMethod::Bh),
            "holm" => Ok(CorrectionMethod::Holm),
            "bonferroni" => Ok(CorrectionMethod::Bonferroni),
            other => Err(FamselError::InvalidParameter(format!(
                "Unknown correction method '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("bh".parse::<CorrectionMethod>().unwrap(), CorrectionMethod::Bh);
        assert_eq!("FDR".parse::<CorrectionMethod>().unwrap(), CorrectionMethod::Bh);
        assert_eq!(
            "holm".parse::<CorrectionMethod>().unwrap(),
            CorrectionMethod::Holm
        );
        assert!("storey".parse::<CorrectionMethod>().is_err());
    }

    #[test]
    fn test_every_method_only_inflates() {
        let p_values = vec![0.001, 0.01, 0.02, 0.04, 0.1, 0.6];
        for method in [
            CorrectionMethod::Bh,
            CorrectionMethod::Holm,
            CorrectionMethod::Bonferroni,
        ] {
            let adjusted = method.adjust(&p_values);
            for (p, q) in p_values.iter().zip(adjusted.iter()) {
                assert!(q >= p, "{} produced q < p", method);
                assert!(*q <= 1.0);
            }
        }
    }
}
