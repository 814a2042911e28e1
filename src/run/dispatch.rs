//! Parallel dispatch across features and result aggregation.
//!
//! Feature tasks are fully independent; the dispatcher owns an explicit
//! worker pool for the run (no process-wide ambient state), isolates
//! per-feature faults, and is the single writer merging records into the
//! results table.

use crate::data::{DesignMatrix, ExpressionMatrix, FeatureRecord, FeatureStatus, ResultsTable};
use crate::error::{FamselError, Result};
use crate::run::orchestrator::analyze_feature;
use crate::run::report::Reporter;
use crate::run::RunConfig;
use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Run the full selection pipeline over every feature of the matrix.
///
/// Structural errors (dimension mismatch, unknown coefficient while the
/// upfront check is enabled) fail fast before any fitting starts. Every
/// feature contributes exactly one record; per-feature failures, including
/// panics, are folded into the record's terminal state. After aggregation
/// the configured correction is applied across the `tested` rows.
pub fn run_selection(
    matrix: &ExpressionMatrix,
    design: &DesignMatrix,
    coefficient: &str,
    config: &RunConfig,
    reporter: &dyn Reporter,
) -> Result<ResultsTable> {
    if design.n_samples() != matrix.n_samples() {
        return Err(FamselError::DimensionMismatch {
            expected: matrix.n_samples(),
            actual: design.n_samples(),
        });
    }
    if config.families.is_empty() {
        return Err(FamselError::InvalidParameter(
            "Family list must not be empty".to_string(),
        ));
    }
    if config.check_coefficient && !design.has_coefficient(coefficient) {
        return Err(FamselError::UnknownCoefficient {
            name: coefficient.to_string(),
            available: design.coefficient_names().to_vec(),
        });
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.unwrap_or(0))
        .build()
        .map_err(|e| FamselError::Pipeline(format!("Failed to build worker pool: {}", e)))?;

    let total = matrix.n_features();
    let completed = AtomicUsize::new(0);

    let mut records: Vec<FeatureRecord> = pool.install(|| {
        (0..total)
            .into_par_iter()
            .map(|i| {
                let feature_id = &matrix.feature_ids()[i];
                let values = matrix.row_dense(i);

                // One feature's pathological data must never abort the
                // batch: fold a panic into a no-fit record.
                let record = catch_unwind(AssertUnwindSafe(|| {
                    analyze_feature(feature_id, &values, design, coefficient, config)
                }))
                .unwrap_or_else(|_| FeatureRecord::empty(feature_id, FeatureStatus::NoFit));

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                reporter.event(done, total);
                record
            })
            .collect()
    });

    apply_correction(&mut records, config);

    let table = ResultsTable {
        coefficient: coefficient.to_string(),
        criterion: config.criterion,
        records,
    };
    reporter.summary(&table.summary());
    Ok(table)
}

/// Adjust p-values over the tested rows only; everything else keeps a
/// missing adjusted value and does not count toward the correction.
fn apply_correction(records: &mut [FeatureRecord], config: &RunConfig) {
    let tested: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.status == FeatureStatus::Tested && r.p_value.is_some())
        .map(|(i, _)| i)
        .collect();

    let p_values: Vec<f64> = tested
        .iter()
        .map(|&i| records[i].p_value.unwrap_or(f64::NAN))
        .collect();
    let adjusted = config.correction.adjust(&p_values);

    for (&i, &q) in tested.iter().zip(adjusted.iter()) {
        records[i].p_adjusted = Some(q);
    }
}
