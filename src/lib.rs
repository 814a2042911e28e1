//! Per-Feature Distributional Model Selection
//!
//! This library fits several candidate distribution families to every row
//! (feature) of a numeric matrix under a shared design matrix, picks the
//! best-fitting family per feature by an information criterion, tests one
//! coefficient of interest with a Wald test, and aggregates the results
//! with multiple-testing correction.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (ExpressionMatrix, Metadata,
//!   DesignMatrix, ResultsTable)
//! - **family**: Distribution families and support-constrained transforms
//! - **fit**: Bounded-time fitting, residual diagnostics, model selection
//! - **contrast**: Wald testing of a selected coefficient
//! - **correct**: Multiple testing correction (BH, Holm, Bonferroni)
//! - **run**: Configuration, per-feature orchestration, parallel dispatch
//!
//! # Example
//!
//! ```no_run
//! use famsel::prelude::*;
//!
//! // Load data
//! let matrix = ExpressionMatrix::from_tsv("expression.tsv").unwrap();
//! let metadata = Metadata::from_tsv("metadata.tsv").unwrap();
//!
//! // Build the shared design and run the selection pipeline
//! let formula = Formula::parse("~ group").unwrap();
//! let design = DesignMatrix::from_formula(&metadata, &formula).unwrap();
//!
//! let config = RunConfig::default()
//!     .families(vec![FamilySpec::NegativeBinomial, FamilySpec::Gaussian])
//!     .criterion(SelectionCriterion::Aic);
//!
//! let results =
//!     run_selection(&matrix, &design, "grouptreatment", &config, &SilentReporter).unwrap();
//! results.to_tsv("results.tsv").unwrap();
//! ```

pub mod contrast;
pub mod correct;
pub mod data;
pub mod error;
pub mod family;
pub mod fit;
pub mod run;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::contrast::{test_contrast, ContrastResult};
    pub use crate::correct::{correct_bh, CorrectionMethod};
    pub use crate::data::{
        DesignMatrix, ExpressionMatrix, FeatureRecord, FeatureStatus, Formula, Metadata,
        ResultsTable, RunSummary,
    };
    pub use crate::error::{FamselError, Result};
    pub use crate::family::{transform, FamilySpec, Support};
    pub use crate::fit::{
        fit_bounded, fit_candidates, select_best, CandidateOutcome, FitError, FitOptions,
        FitRecord, Retention, SelectionCriterion,
    };
    pub use crate::run::{
        analyze_feature, run_selection, Reporter, RunConfig, SilentReporter, StderrReporter,
    };
}
