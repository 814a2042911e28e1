//! Run configuration, per-feature orchestration and parallel dispatch.

mod dispatch;
mod orchestrator;
mod report;

pub use dispatch::run_selection;
pub use orchestrator::analyze_feature;
pub use report::{Reporter, SilentReporter, StderrReporter};

use crate::correct::CorrectionMethod;
use crate::error::{FamselError, Result};
use crate::family::FamilySpec;
use crate::fit::{FitOptions, Retention, SelectionCriterion};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a full selection run.
///
/// Serializes to YAML for config-file driven runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Ordered list of families to attempt; the order doubles as the
    /// tie-break priority during selection.
    pub families: Vec<FamilySpec>,
    /// Criterion for picking the best family per feature.
    pub criterion: SelectionCriterion,
    /// Penalty for the generalized AIC.
    pub gaic_penalty: f64,
    /// Wall-clock budget per fitting attempt, in milliseconds.
    pub fit_timeout_ms: u64,
    /// Multiple testing correction applied across tested features.
    pub correction: CorrectionMethod,
    /// Worker pool size; `None` uses the available parallelism.
    pub threads: Option<usize>,
    /// Model retention policy on fit records.
    pub retention: Retention,
    /// Fail fast when the requested coefficient is absent from the design.
    /// Disable to let every feature degrade to `untestable` instead.
    pub check_coefficient: bool,
    /// Emit a progress line every N features; 0 keeps progress quiet.
    pub progress_every: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            families: vec![
                FamilySpec::NegativeBinomial,
                FamilySpec::Poisson,
                FamilySpec::Gaussian,
            ],
            criterion: SelectionCriterion::Aic,
            gaic_penalty: 3.0,
            fit_timeout_ms: 5000,
            correction: CorrectionMethod::Bh,
            threads: None,
            retention: Retention::Distilled,
            check_coefficient: true,
            progress_every: 0,
        }
    }
}

impl RunConfig {
    /// Load from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        if config.families.is_empty() {
            return Err(FamselError::InvalidParameter(
                "Family list must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    /// Save to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(FamselError::from)
    }

    /// Set the ordered family list.
    pub fn families(mut self, families: Vec<FamilySpec>) -> Self {
        self.families = families;
        self
    }

    /// Set the selection criterion.
    pub fn criterion(mut self, criterion: SelectionCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the generalized-AIC penalty.
    pub fn gaic_penalty(mut self, penalty: f64) -> Self {
        self.gaic_penalty = penalty;
        self
    }

    /// Set the per-fit wall-clock budget.
    pub fn fit_timeout(mut self, budget: Duration) -> Self {
        self.fit_timeout_ms = budget.as_millis() as u64;
        self
    }

    /// Set the correction method.
    pub fn correction(mut self, method: CorrectionMethod) -> Self {
        self.correction = method;
        self
    }

    /// Set the worker pool size.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Set the model retention policy.
    pub fn retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// Toggle the upfront coefficient check.
    pub fn check_coefficient(mut self, check: bool) -> Self {
        self.check_coefficient = check;
        self
    }

    /// Per-attempt options derived from this configuration.
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            time_budget: Duration::from_millis(self.fit_timeout_ms),
            gaic_penalty: self.gaic_penalty,
            retention: self.retention,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_usable() {
        let config = RunConfig::default();
        assert!(!config.families.is_empty());
        assert_eq!(config.criterion, SelectionCriterion::Aic);
        assert!(config.check_coefficient);
        assert_eq!(config.fit_options().gaic_penalty, 3.0);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = RunConfig::default()
            .families(vec![FamilySpec::Gaussian, FamilySpec::StudentT])
            .criterion(SelectionCriterion::Bic)
            .fit_timeout(Duration::from_millis(250))
            .correction(CorrectionMethod::Holm)
            .threads(4);

        let yaml = config.to_yaml().unwrap();
        let parsed = RunConfig::from_yaml(&yaml).unwrap();

        assert_eq!(parsed.families, vec![FamilySpec::Gaussian, FamilySpec::StudentT]);
        assert_eq!(parsed.criterion, SelectionCriterion::Bic);
        assert_eq!(parsed.fit_timeout_ms, 250);
        assert_eq!(parsed.correction, CorrectionMethod::Holm);
        assert_eq!(parsed.threads, Some(4));
    }

    #[test]
    fn test_empty_family_list_rejected() {
        let yaml = RunConfig::default().families(vec![]).to_yaml().unwrap();
        assert!(RunConfig::from_yaml(&yaml).is_err());
    }
}
