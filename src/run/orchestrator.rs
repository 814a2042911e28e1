//! Per-feature pipeline: candidate fitting, selection, contrast testing.
//!
//! Drives one feature from raw values to exactly one [`FeatureRecord`]:
//! `pending -> {skipped | fitting}`, `fitting -> {no_fit | fitted}`,
//! `fitted -> {tested | untestable}`. Fields that do not apply to the
//! terminal state stay explicit `None` markers on the record.

use crate::contrast::test_contrast;
use crate::data::{DesignMatrix, FeatureRecord, FeatureStatus};
use crate::fit::{fit_candidates, select_best, CandidateOutcome, FitRecord};
use crate::run::RunConfig;

/// Run the full pipeline for one feature and normalize the outcome.
pub fn analyze_feature(
    feature_id: &str,
    values: &[f64],
    design: &DesignMatrix,
    coefficient: &str,
    config: &RunConfig,
) -> FeatureRecord {
    let set = match fit_candidates(values, design, &config.families, &config.fit_options()) {
        CandidateOutcome::Skip => {
            return FeatureRecord::empty(feature_id, FeatureStatus::Skipped)
        }
        CandidateOutcome::Fitted(set) => set,
    };

    if set.is_empty() {
        return FeatureRecord::empty(feature_id, FeatureStatus::NoFit);
    }

    // Guarded by the emptiness check above.
    let selection = match select_best(&set.fits, config.criterion) {
        Some(selection) => selection,
        None => return FeatureRecord::empty(feature_id, FeatureStatus::NoFit),
    };

    match test_contrast(selection.record, coefficient) {
        Some(contrast) => {
            let mut record = fitted_record(feature_id, FeatureStatus::Tested, selection.record);
            record.criterion_value = Some(selection.value);
            record.estimate = Some(contrast.estimate);
            record.std_error = Some(contrast.std_error);
            record.statistic = Some(contrast.statistic);
            record.p_value = Some(contrast.p_value);
            record
        }
        None => {
            let mut record =
                fitted_record(feature_id, FeatureStatus::Untestable, selection.record);
            record.criterion_value = Some(selection.value);
            record
        }
    }
}

/// Record carrying the selected fit's summary fields.
fn fitted_record(feature_id: &str, status: FeatureStatus, fit: &FitRecord) -> FeatureRecord {
    let mut record = FeatureRecord::empty(feature_id, status);
    record.family = Some(fit.family.name().to_string());
    record.log_likelihood = Some(fit.log_likelihood);
    record.aic = Some(fit.aic);
    record.bic = Some(fit.bic);
    record.gaic = Some(fit.gaic);
    record.df_residual = Some(fit.df_residual);
    record.normality_p = fit.diagnostics.normality_p;
    record.skewness = fit.diagnostics.skewness;
    record.kurtosis = fit.diagnostics.kurtosis;
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::FamilySpec;
    use nalgebra::DMatrix;
    use std::time::Duration;

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

    fn count_gaussian_config() -> RunConfig {
        RunConfig::default()
            .families(vec![FamilySpec::NegativeBinomial, FamilySpec::Gaussian])
    }

    #[test]
    fn test_all_zero_feature_is_skipped() {
        let design = two_group_design(5);
        let record = analyze_feature(
            "silent",
            &[0.0; 5],
            &design,
            "grouptreatment",
            &count_gaussian_config(),
        );

        assert_eq!(record.status, FeatureStatus::Skipped);
        assert!(record.family.is_none());
        assert!(record.p_value.is_none());
    }

    #[test]
    fn test_separated_groups_are_tested() {
        let design = two_group_design(6);
        let record = analyze_feature(
            "responder",
            &[10.0, 12.0, 9.0, 55.0, 60.0, 58.0],
            &design,
            "grouptreatment",
            &count_gaussian_config(),
        );

        assert_eq!(record.status, FeatureStatus::Tested);
        let family = record.family.as_deref().unwrap();
        assert!(family == "nbinom" || family == "gaussian");
        assert!(record.aic.is_some());
        assert!(record.statistic.unwrap().abs() > 2.0);
        assert!(record.p_value.unwrap() < 0.05);
    }

    #[test]
    fn test_unknown_coefficient_is_untestable() {
        let design = two_group_design(6);
        let record = analyze_feature(
            "responder",
            &[10.0, 12.0, 9.0, 55.0, 60.0, 58.0],
            &design,
            "batchB",
            &count_gaussian_config(),
        );

        assert_eq!(record.status, FeatureStatus::Untestable);
        assert!(record.family.is_some());
        assert!(record.aic.is_some());
        assert!(record.p_value.is_none());
        assert!(record.estimate.is_none());
    }

    #[test]
    fn test_zero_budget_lands_in_no_fit() {
        let design = two_group_design(6);
        let config = count_gaussian_config().fit_timeout(Duration::ZERO);
        let record = analyze_feature(
            "responder",
            &[10.0, 12.0, 9.0, 55.0, 60.0, 58.0],
            &design,
            "grouptreatment",
            &config,
        );

        assert_eq!(record.status, FeatureStatus::NoFit);
        assert!(record.family.is_none());
    }
}
