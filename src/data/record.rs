//! Per-feature result records and the aggregated results table.

use crate::error::Result;
use crate::fit::SelectionCriterion;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Terminal state of one feature's pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    /// All values invalid or zero; no family attempted.
    Skipped,
    /// Every attempted family failed to produce a fit.
    NoFit,
    /// A family was selected but the contrast was not estimable.
    Untestable,
    /// Selection and contrast both succeeded.
    Tested,
}

impl FeatureStatus {
    /// Descriptive name used in output tables.
    pub fn name(&self) -> &'static str {
        match self {
            FeatureStatus::Skipped => "skipped",
            FeatureStatus::NoFit => "no_fit",
            FeatureStatus::Untestable => "untestable",
            FeatureStatus::Tested => "tested",
        }
    }
}

/// The final row for one feature.
///
/// Every feature produces exactly one record; fields that do not apply to
/// the terminal state are explicit `None`, written as `NA` in TSV output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Feature identifier.
    pub feature_id: String,
    /// Terminal state.
    pub status: FeatureStatus,
    /// Selected family name, if any fit was selected.
    pub family: Option<String>,
    /// Criterion value of the selected fit.
    pub criterion_value: Option<f64>,
    /// Log-likelihood of the selected fit.
    pub log_likelihood: Option<f64>,
    /// AIC of the selected fit.
    pub aic: Option<f64>,
    /// BIC of the selected fit.
    pub bic: Option<f64>,
    /// Generalized AIC of the selected fit.
    pub gaic: Option<f64>,
    /// Residual degrees of freedom of the selected fit.
    pub df_residual: Option<usize>,
    /// Residual normality test p-value.
    pub normality_p: Option<f64>,
    /// Residual skewness.
    pub skewness: Option<f64>,
    /// Residual excess kurtosis.
    pub kurtosis: Option<f64>,
    /// Contrast estimate.
    pub estimate: Option<f64>,
    /// Contrast standard error.
    pub std_error: Option<f64>,
    /// Wald z-statistic.
    pub statistic: Option<f64>,
    /// Raw two-sided p-value.
    pub p_value: Option<f64>,
    /// Adjusted p-value after multiple testing correction.
    pub p_adjusted: Option<f64>,
}

impl FeatureRecord {
    /// Record with every analysis field missing, in the given state.
    pub fn empty(feature_id: &str, status: FeatureStatus) -> Self {
        Self {
            feature_id: feature_id.to_string(),
            status,
            family: None,
            criterion_value: None,
            log_likelihood: None,
            aic: None,
            bic: None,
            gaic: None,
            df_residual: None,
            normality_p: None,
            skewness: None,
            kurtosis: None,
            estimate: None,
            std_error: None,
            statistic: None,
            p_value: None,
            p_adjusted: None,
        }
    }
}

/// Aggregated results, one row per analyzed feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsTable {
    /// Coefficient that was tested.
    pub coefficient: String,
    /// Criterion used for selection.
    pub criterion: SelectionCriterion,
    /// Per-feature records.
    pub records: Vec<FeatureRecord>,
}

impl ResultsTable {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get the record for a specific feature.
    pub fn get_feature(&self, feature_id: &str) -> Option<&FeatureRecord> {
        self.records.iter().find(|r| r.feature_id == feature_id)
    }

    /// Records sorted by raw p-value, missing values last.
    pub fn sorted_by_pvalue(&self) -> Vec<&FeatureRecord> {
        let mut sorted: Vec<_> = self.records.iter().collect();
        sorted.sort_by(|a, b| match (a.p_value, b.p_value) {
            (Some(pa), Some(pb)) => pa.partial_cmp(&pb).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        sorted
    }

    /// Count of rows significant at `alpha` after adjustment.
    pub fn n_significant(&self, alpha: f64) -> usize {
        self.records
            .iter()
            .filter(|r| r.p_adjusted.is_some_and(|q| q < alpha))
            .count()
    }

    /// Summary counts across terminal states.
    pub fn summary(&self) -> RunSummary {
        let mut counts = HashMap::new();
        for r in &self.records {
            if let Some(family) = &r.family {
                *counts.entry(family.clone()).or_insert(0usize) += 1;
            }
        }
        let top_family = counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)));

        RunSummary {
            total: self.records.len(),
            skipped: self.count_status(FeatureStatus::Skipped),
            no_fit: self.count_status(FeatureStatus::NoFit),
            untestable: self.count_status(FeatureStatus::Untestable),
            tested: self.count_status(FeatureStatus::Tested),
            top_family,
        }
    }

    fn count_status(&self, status: FeatureStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// Write the table to a TSV file, `NA` for missing fields.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "feature\tstatus\tselected_family\tlog_likelihood\taic\tbic\tgaic\tdf_residual\t\
             gof_p\tskewness\tkurtosis\testimate\tstd_error\tstatistic\tp_value\tp_adjusted"
        )?;

        for r in &self.records {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                r.feature_id,
                r.status.name(),
                r.family.as_deref().unwrap_or("NA"),
                fmt_opt(r.log_likelihood, 4),
                fmt_opt(r.aic, 4),
                fmt_opt(r.bic, 4),
                fmt_opt(r.gaic, 4),
                r.df_residual
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "NA".to_string()),
                fmt_opt_sci(r.normality_p),
                fmt_opt(r.skewness, 4),
                fmt_opt(r.kurtosis, 4),
                fmt_opt(r.estimate, 6),
                fmt_opt(r.std_error, 6),
                fmt_opt(r.statistic, 4),
                fmt_opt_sci(r.p_value),
                fmt_opt_sci(r.p_adjusted),
            )?;
        }

        Ok(())
    }

    /// Iterate over records.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureRecord> {
        self.records.iter()
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "NA".to_string(),
    }
}

fn fmt_opt_sci(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.3e}", v),
        None => "NA".to_string(),
    }
}

/// Summary counts reported at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total features analyzed.
    pub total: usize,
    /// Features skipped before any fitting.
    pub skipped: usize,
    /// Features where no family converged.
    pub no_fit: usize,
    /// Features fitted but with a non-estimable contrast.
    pub untestable: usize,
    /// Features with a complete test.
    pub tested: usize,
    /// Most frequently selected family and its count.
    pub top_family: Option<(String, usize)>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Features analyzed: {}", self.total)?;
        writeln!(f, "  tested:     {}", self.tested)?;
        writeln!(f, "  untestable: {}", self.untestable)?;
        writeln!(f, "  no fit:     {}", self.no_fit)?;
        writeln!(f, "  skipped:    {}", self.skipped)?;
        if let Some((family, count)) = &self.top_family {
            writeln!(f, "Most selected family: {} ({} features)", family, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn tested_record(id: &str, p: f64) -> FeatureRecord {
        FeatureRecord {
            family: Some("gaussian".to_string()),
            criterion_value: Some(10.0),
            log_likelihood: Some(-5.0),
            aic: Some(10.0),
            bic: Some(11.0),
            gaic: Some(12.0),
            df_residual: Some(4),
            estimate: Some(1.0),
            std_error: Some(0.2),
            statistic: Some(5.0),
            p_value: Some(p),
            p_adjusted: Some(p),
            ..FeatureRecord::empty(id, FeatureStatus::Tested)
        }
    }

    #[test]
    fn test_summary_counts() {
        let table = ResultsTable {
            coefficient: "grouptreatment".to_string(),
            criterion: SelectionCriterion::Aic,
            records: vec![
                tested_record("a", 0.01),
                tested_record("b", 0.5),
                FeatureRecord::empty("c", FeatureStatus::Skipped),
                FeatureRecord::empty("d", FeatureStatus::NoFit),
                FeatureRecord::empty("e", FeatureStatus::Untestable),
            ],
        };

        let summary = table.summary();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.tested, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.no_fit, 1);
        assert_eq!(summary.untestable, 1);
        assert_eq!(summary.top_family, Some(("gaussian".to_string(), 2)));
    }

    #[test]
    fn test_sorted_by_pvalue_missing_last() {
        let table = ResultsTable {
            coefficient: "g".to_string(),
            criterion: SelectionCriterion::Aic,
            records: vec![
                tested_record("slow", 0.8),
                FeatureRecord::empty("none", FeatureStatus::Skipped),
                tested_record("fast", 0.001),
            ],
        };

        let sorted = table.sorted_by_pvalue();
        assert_eq!(sorted[0].feature_id, "fast");
        assert_eq!(sorted[1].feature_id, "slow");
        assert_eq!(sorted[2].feature_id, "none");
    }

    #[test]
    fn test_to_tsv_writes_na_markers() {
        let table = ResultsTable {
            coefficient: "g".to_string(),
            criterion: SelectionCriterion::Aic,
            records: vec![
                tested_record("a", 0.01),
                FeatureRecord::empty("b", FeatureStatus::Skipped),
            ],
        };

        let file = NamedTempFile::new().unwrap();
        table.to_tsv(file.path()).unwrap();
        let contents = std::fs::read_to_string(file.path()).unwrap();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("feature\tstatus\tselected_family"));
        assert!(lines[2].contains("skipped"));
        assert!(lines[2].contains("NA"));
    }

    #[test]
    fn test_n_significant() {
        let table = ResultsTable {
            coefficient: "g".to_string(),
            criterion: SelectionCriterion::Aic,
            records: vec![
                tested_record("a", 0.01),
                tested_record("b", 0.2),
                FeatureRecord::empty("c", FeatureStatus::Skipped),
            ],
        };
        assert_eq!(table.n_significant(0.05), 1);
        assert_eq!(table.n_significant(0.5), 2);
    }
}
