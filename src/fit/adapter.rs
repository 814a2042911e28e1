//! Time-boxed wrapper around the fitting primitive.
//!
//! A single attempt runs on a scratch thread and is abandoned once the
//! wall-clock budget expires; the fitters also check the deadline
//! cooperatively so abandoned attempts wind down promptly. Every failure
//! mode, including a panic inside the primitive, becomes a typed
//! [`FitError`] rather than an unwound stack.

use crate::data::DesignMatrix;
use crate::family::FamilySpec;
use crate::fit::diagnostics::{residual_diagnostics, ResidualDiagnostics};
use crate::fit::glm::{attempt_fit, Deadline, FitFailure, FittedModel};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Extra wait beyond the budget before abandoning the attempt thread, so
/// the cooperative deadline inside the fitter usually reports first.
const RECV_GRACE: Duration = Duration::from_millis(50);

/// Why a (feature, family) attempt produced no fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitError {
    /// Every value was invalid for the family's support, or too few were
    /// left to identify the coefficients.
    InvalidData,
    /// The primitive failed to reach a solution.
    NonConvergence,
    /// The wall-clock budget expired.
    Timeout,
    /// The weighted cross-product matrix was numerically singular.
    Singular,
}

/// Whether to keep the full fitted model on the record or only the
/// distilled summary fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Keep only the distilled `FitRecord` fields (default).
    Distilled,
    /// Additionally retain the full `FittedModel`.
    FullModel,
}

/// Options for one bounded fitting attempt.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Wall-clock budget per attempt.
    pub time_budget: Duration,
    /// Penalty for the generalized AIC.
    pub gaic_penalty: f64,
    /// Model retention policy.
    pub retention: Retention,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(5),
            gaic_penalty: 3.0,
            retention: Retention::Distilled,
        }
    }
}

/// Distilled result of one successful (feature, family) fit.
#[derive(Debug, Clone)]
pub struct FitRecord {
    /// Family that was fit.
    pub family: FamilySpec,
    /// Log-likelihood at the solution.
    pub log_likelihood: f64,
    /// Akaike information criterion.
    pub aic: f64,
    /// Bayesian information criterion.
    pub bic: f64,
    /// Generalized AIC at the configured penalty.
    pub gaic: f64,
    /// Number of estimated parameters.
    pub n_params: usize,
    /// Number of observations used.
    pub n_obs: usize,
    /// Residual degrees of freedom.
    pub df_residual: usize,
    /// Fitted coefficients in design order.
    pub coefficients: Vec<f64>,
    /// Coefficient names from the design matrix.
    pub coefficient_names: Vec<String>,
    /// Coefficient covariance from the weighted QR factorization.
    pub covariance: DMatrix<f64>,
    /// Residual-based fit diagnostics.
    pub diagnostics: ResidualDiagnostics,
    /// Full model, kept only under [`Retention::FullModel`].
    pub model: Option<FittedModel>,
}

impl FitRecord {
    fn from_model(model: FittedModel, opts: &FitOptions) -> Self {
        let k = model.n_params as f64;
        let n = model.n_obs as f64;
        let ll = model.log_likelihood;
        let diagnostics = residual_diagnostics(&model.residuals);

        Self {
            family: model.family,
            log_likelihood: ll,
            aic: -2.0 * ll + 2.0 * k,
            bic: -2.0 * ll + k * n.ln(),
            gaic: -2.0 * ll + opts.gaic_penalty * k,
            n_params: model.n_params,
            n_obs: model.n_obs,
            df_residual: model.df_residual,
            coefficients: model.coefficients.clone(),
            coefficient_names: model.coefficient_names.clone(),
            covariance: model.covariance.clone(),
            diagnostics,
            model: match opts.retention {
                Retention::Distilled => None,
                Retention::FullModel => Some(model),
            },
        }
    }

    /// Index of a coefficient by name.
    pub fn coefficient_index(&self, name: &str) -> Option<usize> {
        self.coefficient_names.iter().position(|n| n == name)
    }

    /// Standard error for a coefficient index, computed on demand from the
    /// covariance diagonal.
    pub fn std_error(&self, index: usize) -> Option<f64> {
        if index >= self.covariance.nrows() {
            return None;
        }
        let var = self.covariance[(index, index)];
        if var.is_finite() && var > 0.0 {
            Some(var.sqrt())
        } else {
            None
        }
    }
}

/// Attempt one (feature, family) fit under a hard wall-clock budget.
///
/// The transformed values and design are moved onto a scratch thread; on
/// expiry the thread is abandoned and `Timeout` returned without partial
/// state. Panics and numerical failures in the primitive map to
/// `NonConvergence`, never an unwound stack.
pub fn fit_bounded(
    y: &[f64],
    design: &DesignMatrix,
    family: FamilySpec,
    opts: &FitOptions,
) -> Result<FitRecord, FitError> {
    let (tx, rx) = mpsc::channel();
    let y_owned = y.to_vec();
    let design_owned = design.clone();
    let deadline = Deadline::after(opts.time_budget);

    thread::spawn(move || {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            attempt_fit(&y_owned, &design_owned, family, deadline)
        }))
        .unwrap_or(Err(FitFailure::NonConverged));
        let _ = tx.send(outcome);
    });

    let outcome = match rx.recv_timeout(opts.time_budget + RECV_GRACE) {
        Ok(outcome) => outcome,
        Err(mpsc::RecvTimeoutError::Timeout) => return Err(FitError::Timeout),
        Err(mpsc::RecvTimeoutError::Disconnected) => return Err(FitError::NonConvergence),
    };

    match outcome {
        Ok(model) => Ok(FitRecord::from_model(model, opts)),
        Err(FitFailure::Expired) => Err(FitError::Timeout),
        Err(FitFailure::TooFewObservations) => Err(FitError::InvalidData),
        Err(FitFailure::Singular) => Err(FitError::Singular),
        Err(FitFailure::NonConverged) => Err(FitError::NonConvergence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn two_group_design(n: usize) -> DesignMatrix {
        let mut m = DMatrix::zeros(n, 2);
        for i in 0..n {
            m[(i, 0)] = 1.0;
            if i >= n / 2 {
                m[(i, 1)] = 1.0;
            }
        }
        DesignMatrix::from_matrix(
            m,
            vec!["(Intercept)".into(), "grouptreatment".into()],
            (0..n).map(|i| format!("S{}", i)).collect(),
        )
    }

    #[test]
    fn test_successful_fit_distills_record() {
        let design = two_group_design(10);
        let y = [10.0, 12.0, 9.0, 11.0, 10.0, 55.0, 60.0, 58.0, 57.0, 56.0];
        let opts = FitOptions::default();

        let record = fit_bounded(&y, &design, FamilySpec::Gaussian, &opts).unwrap();
        assert_eq!(record.family, FamilySpec::Gaussian);
        assert!(record.aic.is_finite());
        // With 10 observations ln(n) > 2, so BIC penalizes harder than AIC.
        assert!(record.bic > record.aic);
        assert!(record.model.is_none());
        assert!(record.std_error(1).unwrap() > 0.0);
    }

    #[test]
    fn test_gaic_uses_configured_penalty() {
        let design = two_group_design(6);
        let y = [10.0, 12.0, 9.0, 55.0, 60.0, 58.0];

        let opts2 = FitOptions {
            gaic_penalty: 2.0,
            ..FitOptions::default()
        };
        let opts5 = FitOptions {
            gaic_penalty: 5.0,
            ..FitOptions::default()
        };
        let r2 = fit_bounded(&y, &design, FamilySpec::Gaussian, &opts2).unwrap();
        let r5 = fit_bounded(&y, &design, FamilySpec::Gaussian, &opts5).unwrap();

        // Penalty 2 matches AIC; larger penalties are strictly worse.
        assert!((r2.gaic - r2.aic).abs() < 1e-9);
        assert!(r5.gaic > r2.gaic);
    }

    #[test]
    fn test_full_model_retention() {
        let design = two_group_design(6);
        let y = [10.0, 12.0, 9.0, 55.0, 60.0, 58.0];
        let opts = FitOptions {
            retention: Retention::FullModel,
            ..FitOptions::default()
        };

        let record = fit_bounded(&y, &design, FamilySpec::Gaussian, &opts).unwrap();
        let model = record.model.as_ref().unwrap();
        assert_eq!(model.fitted_values.len(), 6);
        assert_eq!(model.residuals.len(), 6);
    }

    #[test]
    fn test_zero_budget_times_out() {
        let design = two_group_design(6);
        let y = [10.0, 12.0, 9.0, 55.0, 60.0, 58.0];
        let opts = FitOptions {
            time_budget: Duration::ZERO,
            ..FitOptions::default()
        };

        let result = fit_bounded(&y, &design, FamilySpec::NegativeBinomial, &opts);
        assert_eq!(result.unwrap_err(), FitError::Timeout);
    }

    #[test]
    fn test_degenerate_data_is_invalid_not_panic() {
        let design = two_group_design(6);
        let y = [1.0, f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN];
        let result = fit_bounded(&y, &design, FamilySpec::Gaussian, &FitOptions::default());
        assert_eq!(result.unwrap_err(), FitError::InvalidData);
    }
}
