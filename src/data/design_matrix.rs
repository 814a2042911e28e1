//! Design matrix construction from metadata and formula.

use crate::data::{Formula, Metadata, Term, Variable, VariableType};
use crate::error::{FamselError, Result};
use nalgebra::DMatrix;
use std::collections::HashMap;

/// The linear-predictor covariate matrix shared across all features.
///
/// Rows are samples, columns are named coefficients. Categorical variables
/// are dummy coded against an alphabetically-first reference level.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// The design matrix (samples × coefficients).
    matrix: DMatrix<f64>,
    /// Names of the coefficients (columns).
    coefficient_names: Vec<String>,
    /// Sample IDs (rows).
    sample_ids: Vec<String>,
    /// Reference levels for categorical variables.
    reference_levels: HashMap<String, String>,
}

impl DesignMatrix {
    /// Create a design matrix directly from components.
    ///
    /// Useful for tests and callers with a pre-built design.
    pub fn from_matrix(
        matrix: DMatrix<f64>,
        coefficient_names: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Self {
        Self {
            matrix,
            coefficient_names,
            sample_ids,
            reference_levels: HashMap::new(),
        }
    }

    /// Build a design matrix from metadata and formula.
    pub fn from_formula(metadata: &Metadata, formula: &Formula) -> Result<Self> {
        let sample_ids = metadata.sample_ids().to_vec();
        let n_samples = sample_ids.len();

        for var in formula.variables() {
            if !metadata.has_column(var) {
                return Err(FamselError::MissingColumn(var.to_string()));
            }
        }

        // Reference level for each categorical variable: alphabetically
        // first.
        let mut reference_levels = HashMap::new();
        for var in formula.variables() {
            if metadata.column_type(var) == Some(VariableType::Categorical) {
                let levels = metadata.levels(var)?;
                if !levels.is_empty() {
                    reference_levels.insert(var.to_string(), levels[0].clone());
                }
            }
        }

        let mut coefficient_names = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();

        if formula.intercept {
            coefficient_names.push("(Intercept)".to_string());
            columns.push(vec![1.0; n_samples]);
        }

        for term in &formula.terms {
            match term {
                Term::Intercept => {}
                Term::Main(var_name) => {
                    let mut cols =
                        Self::term_columns(metadata, var_name, &reference_levels, formula.intercept)?;
                    for (name, col) in cols.drain(..) {
                        coefficient_names.push(name);
                        columns.push(col);
                    }
                }
                Term::Interaction(var1, var2) => {
                    let cols1 =
                        Self::term_columns(metadata, var1, &reference_levels, formula.intercept)?;
                    let cols2 =
                        Self::term_columns(metadata, var2, &reference_levels, formula.intercept)?;

                    for (name1, col1) in &cols1 {
                        for (name2, col2) in &cols2 {
                            coefficient_names.push(format!("{}:{}", name1, name2));
                            columns.push(
                                col1.iter().zip(col2.iter()).map(|(a, b)| a * b).collect(),
                            );
                        }
                    }
                }
            }
        }

        let n_coef = columns.len();
        let mut matrix = DMatrix::zeros(n_samples, n_coef);
        for (col_idx, col) in columns.iter().enumerate() {
            for (row_idx, &val) in col.iter().enumerate() {
                matrix[(row_idx, col_idx)] = val;
            }
        }

        Ok(Self {
            matrix,
            coefficient_names,
            sample_ids,
            reference_levels,
        })
    }

    /// Named columns for one variable: one numeric column for a continuous
    /// variable, dummy columns (reference level skipped when an intercept is
    /// present) for a categorical one.
    fn term_columns(
        metadata: &Metadata,
        var_name: &str,
        reference_levels: &HashMap<String, String>,
        intercept: bool,
    ) -> Result<Vec<(String, Vec<f64>)>> {
        let values = metadata.column(var_name)?;
        let mut result = Vec::new();

        match metadata.column_type(var_name) {
            Some(VariableType::Continuous) => {
                let col: Vec<f64> = values
                    .iter()
                    .map(|v| v.as_continuous().unwrap_or(0.0))
                    .collect();
                result.push((var_name.to_string(), col));
            }
            Some(VariableType::Categorical) | None => {
                let levels = metadata.levels(var_name)?;
                let ref_level = reference_levels.get(var_name);

                for level in &levels {
                    if intercept && Some(level) == ref_level {
                        continue;
                    }
                    let col: Vec<f64> = values
                        .iter()
                        .map(|v| match v {
                            Variable::Categorical(s) if s == level => 1.0,
                            _ => 0.0,
                        })
                        .collect();
                    result.push((format!("{}{}", var_name, level), col));
                }
            }
        }

        Ok(result)
    }

    /// Get the design matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Get coefficient names.
    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    /// Get sample IDs.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Number of samples (rows).
    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of coefficients (columns).
    pub fn n_coefficients(&self) -> usize {
        self.matrix.ncols()
    }

    /// Get the reference level for a categorical variable.
    pub fn reference_level(&self, variable: &str) -> Option<&str> {
        self.reference_levels.get(variable).map(|s| s.as_str())
    }

    /// Get the index of a coefficient by name.
    pub fn coefficient_index(&self, name: &str) -> Option<usize> {
        self.coefficient_names.iter().position(|n| n == name)
    }

    /// Check whether a coefficient name exists.
    pub fn has_coefficient(&self, name: &str) -> bool {
        self.coefficient_index(name).is_some()
    }
}
