//! Wald test for a single coefficient of a selected fit.

use crate::fit::FitRecord;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Wald test result for one feature's selected model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContrastResult {
    /// Coefficient name being tested.
    pub coefficient: String,
    /// Estimated coefficient value.
    pub estimate: f64,
    /// Standard error from the coefficient covariance.
    pub std_error: f64,
    /// Wald z-statistic.
    pub statistic: f64,
    /// Two-sided p-value under asymptotic normality.
    pub p_value: f64,
}

/// Test H0: beta = 0 for one coefficient of a selected fit.
///
/// The standard error is the square root of the matching diagonal entry of
/// the QR-derived coefficient covariance; p = 2 * Phi(-|z|). Returns `None`
/// when the coefficient is absent from the fit or its covariance entry is
/// not a usable variance (singular or non-finite).
pub fn test_contrast(record: &FitRecord, coefficient: &str) -> Option<ContrastResult> {
    let idx = record.coefficient_index(coefficient)?;
    let estimate = record.coefficients.get(idx).copied()?;
    let std_error = record.std_error(idx)?;
    if !estimate.is_finite() {
        return None;
    }

    let statistic = estimate / std_error;
    let normal = Normal::new(0.0, 1.0).unwrap();
    let p_value = 2.0 * normal.cdf(-statistic.abs());

    Some(ContrastResult {
        coefficient: coefficient.to_string(),
        estimate,
        std_error,
        statistic,
        p_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DesignMatrix;
    use crate::family::FamilySpec;
    use crate::fit::{fit_bounded, FitOptions};
    use approx::assert_relative_eq;
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

    fn fit_separated_groups() -> crate::fit::FitRecord {
        let design = two_group_design(8);
        let y = [1.0, 1.1, 0.9, 1.0, 3.0, 3.1, 2.9, 3.0];
        fit_bounded(&y, &design, FamilySpec::Gaussian, &FitOptions::default()).unwrap()
    }

    #[test]
    fn test_separated_groups_significant() {
        let record = fit_separated_groups();
        let result = test_contrast(&record, "grouptreatment").unwrap();

        assert_relative_eq!(result.estimate, 2.0, epsilon = 0.01);
        assert!(result.statistic.abs() > 5.0);
        assert!(result.p_value < 0.001);
    }

    #[test]
    fn test_p_value_in_unit_interval() {
        let record = fit_separated_groups();
        let result = test_contrast(&record, "grouptreatment").unwrap();
        assert!(result.p_value >= 0.0 && result.p_value <= 1.0);

        let intercept = test_contrast(&record, "(Intercept)").unwrap();
        assert!(intercept.p_value >= 0.0 && intercept.p_value <= 1.0);
    }

    #[test]
    fn test_symmetric_in_sign_of_estimate() {
        let design = two_group_design(8);
        let y = [1.0, 1.1, 0.9, 1.0, 3.0, 3.1, 2.9, 3.0];
        let flipped: Vec<f64> = y.iter().map(|v| -v + 4.0).collect();

        let up = fit_bounded(&y, &design, FamilySpec::Gaussian, &FitOptions::default()).unwrap();
        let down =
            fit_bounded(&flipped, &design, FamilySpec::Gaussian, &FitOptions::default()).unwrap();

        let p_up = test_contrast(&up, "grouptreatment").unwrap();
        let p_down = test_contrast(&down, "grouptreatment").unwrap();

        assert_relative_eq!(p_up.estimate, -p_down.estimate, epsilon = 1e-9);
        assert_relative_eq!(p_up.p_value, p_down.p_value, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_coefficient_is_absent() {
        let record = fit_separated_groups();
        assert!(test_contrast(&record, "batch").is_none());
    }

    #[test]
    fn test_degenerate_variance_is_absent() {
        let mut record = fit_separated_groups();
        let idx = record.coefficient_index("grouptreatment").unwrap();
        record.covariance[(idx, idx)] = 0.0;
        assert!(test_contrast(&record, "grouptreatment").is_none());

        record.covariance[(idx, idx)] = f64::NAN;
        assert!(test_contrast(&record, "grouptreatment").is_none());
    }
}
