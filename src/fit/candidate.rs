//! Candidate fitting: try every configured family on one feature.

use crate::data::DesignMatrix;
use crate::family::{transform, FamilySpec};
use crate::fit::adapter::{fit_bounded, FitError, FitOptions, FitRecord};

/// All attempts for one feature: successful fits plus the per-family
/// failure reasons (diagnostic detail, not fatal).
#[derive(Debug)]
pub struct CandidateSet {
    /// Successful fits, in the caller-supplied family order.
    pub fits: Vec<FitRecord>,
    /// Families that produced no fit, with the reason.
    pub failures: Vec<(FamilySpec, FitError)>,
}

impl CandidateSet {
    /// True when no family converged.
    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }
}

/// Outcome of candidate fitting for one feature.
#[derive(Debug)]
pub enum CandidateOutcome {
    /// The feature is trivially degenerate (no non-zero finite value);
    /// nothing was attempted.
    Skip,
    /// Families were attempted; the set may still be empty.
    Fitted(CandidateSet),
}

/// Fit every family in `families` to one feature's raw values.
///
/// All-zero (or all-non-finite) features short-circuit to `Skip` before any
/// family is attempted. A family whose transform invalidates every value is
/// recorded as `InvalidData` without calling the fitting primitive.
pub fn fit_candidates(
    values: &[f64],
    design: &DesignMatrix,
    families: &[FamilySpec],
    opts: &FitOptions,
) -> CandidateOutcome {
    let degenerate = values.iter().all(|v| !v.is_finite() || *v == 0.0);
    if degenerate {
        return CandidateOutcome::Skip;
    }

    let mut fits = Vec::new();
    let mut failures = Vec::new();

    for &family in families {
        let transformed = transform(values, family.support());
        if transformed.all_invalid() {
            failures.push((family, FitError::InvalidData));
            continue;
        }
        match fit_bounded(&transformed.values, design, family, opts) {
            Ok(record) => fits.push(record),
            Err(reason) => failures.push((family, reason)),
        }
    }

    CandidateOutcome::Fitted(CandidateSet { fits, failures })
}
