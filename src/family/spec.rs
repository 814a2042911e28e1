//! Family identifiers and support classes.

use crate::error::FamselError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Support class of a distribution family.
///
/// Determines which validity transform is applied to raw feature values
/// before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Support {
    /// Non-negative integers (count data).
    Counts,
    /// Strictly positive reals.
    Positive,
    /// Open unit interval (0, 1).
    Unit,
    /// Unbounded reals.
    Real,
    /// No constraint known; values pass through untouched.
    Unspecified,
}

/// A parametric distribution family available for per-feature fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilySpec {
    /// Poisson with log link.
    Poisson,
    /// Negative binomial with log link and method-of-moments dispersion.
    #[serde(rename = "nbinom")]
    NegativeBinomial,
    /// Gamma with log link.
    Gamma,
    /// Log-normal (least squares on the log scale).
    #[serde(rename = "lognormal")]
    LogNormal,
    /// Beta regression with logit link.
    Beta,
    /// Gaussian with identity link.
    Gaussian,
    /// Student-t location model (heavy-tailed, fixed degrees of freedom).
    #[serde(rename = "studentt")]
    StudentT,
}

impl FamilySpec {
    /// Support class used to pick the validity transform.
    pub fn support(&self) -> Support {
        match self {
            FamilySpec::Poisson | FamilySpec::NegativeBinomial => Support::Counts,
            FamilySpec::Gamma | FamilySpec::LogNormal => Support::Positive,
            FamilySpec::Beta => Support::Unit,
            FamilySpec::Gaussian | FamilySpec::StudentT => Support::Real,
        }
    }

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            FamilySpec::Poisson => "poisson",
            FamilySpec::NegativeBinomial => "nbinom",
            FamilySpec::Gamma => "gamma",
            FamilySpec::LogNormal => "lognormal",
            FamilySpec::Beta => "beta",
            FamilySpec::Gaussian => "gaussian",
            FamilySpec::StudentT => "studentt",
        }
    }

    /// Number of nuisance parameters estimated beyond the regression
    /// coefficients (dispersion, scale).
    pub fn n_nuisance(&self) -> usize {
        match self {
            FamilySpec::Poisson => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for FamilySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for FamilySpec {
    type Err = FamselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poisson" => Ok(FamilySpec::Poisson),
            "nbinom" | "negative_binomial" | "count" => Ok(FamilySpec::NegativeBinomial),
            "gamma" => Ok(FamilySpec::Gamma),
            "lognormal" | "log_normal" => Ok(FamilySpec::LogNormal),
            "beta" => Ok(FamilySpec::Beta),
            "gaussian" | "normal" => Ok(FamilySpec::Gaussian),
            "studentt" | "student_t" | "t" => Ok(FamilySpec::StudentT),
            other => Err(FamselError::UnknownFamily(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("poisson".parse::<FamilySpec>().unwrap(), FamilySpec::Poisson);
        assert_eq!(
            "count".parse::<FamilySpec>().unwrap(),
            FamilySpec::NegativeBinomial
        );
        assert_eq!(
            "normal".parse::<FamilySpec>().unwrap(),
            FamilySpec::Gaussian
        );
        assert_eq!("t".parse::<FamilySpec>().unwrap(), FamilySpec::StudentT);
        assert!("weibull".parse::<FamilySpec>().is_err());
    }

    #[test]
    fn test_support_classes() {
        assert_eq!(FamilySpec::Poisson.support(), Support::Counts);
        assert_eq!(FamilySpec::Gamma.support(), Support::Positive);
        assert_eq!(FamilySpec::Beta.support(), Support::Unit);
        assert_eq!(FamilySpec::StudentT.support(), Support::Real);
    }

    #[test]
    fn test_nuisance_counts() {
        assert_eq!(FamilySpec::Poisson.n_nuisance(), 0);
        assert_eq!(FamilySpec::NegativeBinomial.n_nuisance(), 1);
        assert_eq!(FamilySpec::Gaussian.n_nuisance(), 1);
    }

    #[test]
    fn test_display_round_trip() {
        for fam in [
            FamilySpec::Poisson,
            FamilySpec::NegativeBinomial,
            FamilySpec::Gamma,
            FamilySpec::LogNormal,
            FamilySpec::Beta,
            FamilySpec::Gaussian,
            FamilySpec::StudentT,
        ] {
            assert_eq!(fam.to_string().parse::<FamilySpec>().unwrap(), fam);
        }
    }
}
