//! Criterion-based selection among a feature's candidate fits.

use crate::error::FamselError;
use crate::fit::adapter::FitRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Criterion for ranking candidate fitted families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionCriterion {
    /// Akaike information criterion (minimized).
    Aic,
    /// Bayesian information criterion (minimized).
    Bic,
    /// Generalized AIC at the configured penalty (minimized).
    Gaic,
    /// Log-likelihood (maximized).
    #[serde(rename = "loglik")]
    LogLikelihood,
}

impl fmt::Display for SelectionCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectionCriterion::Aic => "aic",
            SelectionCriterion::Bic => "bic",
            SelectionCriterion::Gaic => "gaic",
            SelectionCriterion::LogLikelihood => "loglik",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for SelectionCriterion {
    type Err = FamselError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aic" => Ok(SelectionCriterion::Aic),
            "bic" => Ok(SelectionCriterion::Bic),
            "gaic" => Ok(SelectionCriterion::Gaic),
            "loglik" | "log_likelihood" | "loglikelihood" => {
                Ok(SelectionCriterion::LogLikelihood)
            }
            other => Err(FamselError::InvalidParameter(format!(
                "Unknown selection criterion '{}'",
                other
            ))),
        }
    }
}

/// The winning fit for one feature.
#[derive(Debug)]
pub struct SelectionResult<'a> {
    /// The selected record.
    pub record: &'a FitRecord,
    /// Criterion that ranked it.
    pub criterion: SelectionCriterion,
    /// Criterion value of the winner.
    pub value: f64,
}

/// Score under which candidates are minimized.
fn score(record: &FitRecord, criterion: SelectionCriterion) -> f64 {
    match criterion {
        SelectionCriterion::Aic => record.aic,
        SelectionCriterion::Bic => record.bic,
        SelectionCriterion::Gaic => record.gaic,
        SelectionCriterion::LogLikelihood => -record.log_likelihood,
    }
}

/// Pick the best fit under `criterion`.
///
/// Strict-inequality comparison keeps the first candidate on ties, so the
/// input family order doubles as the priority order. Candidates with a
/// non-finite criterion value are only chosen when no finite one exists.
/// Returns `None` on an empty set.
pub fn select_best(
    fits: &[FitRecord],
    criterion: SelectionCriterion,
) -> Option<SelectionResult<'_>> {
    let mut best: Option<(&FitRecord, f64)> = None;
    for record in fits {
        let s = score(record, criterion);
        if !s.is_finite() {
            continue;
        }
        match best {
            Some((_, current)) if s >= current => {}
            _ => best = Some((record, s)),
        }
    }

    let (record, _) = best.or_else(|| fits.first().map(|r| (r, score(r, criterion))))?;
    Some(SelectionResult {
        record,
        criterion,
        value: criterion_value(record, criterion),
    })
}

/// Reported criterion value (log-likelihood reported unnegated).
fn criterion_value(record: &FitRecord, criterion: SelectionCriterion) -> f64 {
    match criterion {
        SelectionCriterion::LogLikelihood => record.log_likelihood,
        _ => score(record, criterion),
    }
}
