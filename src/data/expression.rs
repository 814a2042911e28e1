//! Expression matrix with sparse storage for feature measurements.

use crate::error::{FamselError, Result};
use sprs::{CsMat, TriMat};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A sparse matrix of non-negative measurements across samples.
///
/// Rows represent features (genes/transcripts), columns represent samples.
/// Uses CSR (Compressed Sparse Row) format for efficient row-wise access;
/// zeros are implicit. Non-finite cells (`NA`/`NaN` in the input) are stored
/// explicitly and treated as invalid observations downstream.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    /// Sparse matrix in CSR format (features × samples).
    data: CsMat<f64>,
    /// Feature identifiers (row names).
    feature_ids: Vec<String>,
    /// Sample identifiers (column names).
    sample_ids: Vec<String>,
}

impl ExpressionMatrix {
    /// Create a new ExpressionMatrix from a sparse matrix and identifiers.
    pub fn new(
        data: CsMat<f64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(FamselError::DimensionMismatch {
                expected: nrows,
                actual: feature_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(FamselError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        Ok(Self {
            data,
            feature_ids,
            sample_ids,
        })
    }

    /// Load an expression matrix from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with sample IDs (first column is the feature ID
    ///   header)
    /// - Subsequent rows: feature ID followed by numeric values; `NA` marks
    ///   a missing measurement
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| FamselError::EmptyData("Empty TSV file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(FamselError::EmptyData(
                "TSV must have at least one sample".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        let mut feature_ids: Vec<String> = Vec::new();

        for (row_idx, line_result) in lines.enumerate() {
            let line = line_result?;
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.is_empty() {
                continue;
            }

            feature_ids.push(fields[0].to_string());

            for (col_idx, value_str) in fields[1..].iter().enumerate() {
                if col_idx >= n_samples {
                    break;
                }
                let raw = value_str.trim();
                let value: f64 = if raw.is_empty() || raw == "NA" || raw == "na" {
                    f64::NAN
                } else {
                    raw.parse().map_err(|_| FamselError::InvalidValue {
                        value: raw.to_string(),
                        row: row_idx,
                        col: col_idx,
                    })?
                };
                if value != 0.0 {
                    triplets.push((row_idx, col_idx, value));
                }
            }
        }

        let n_features = feature_ids.len();
        if n_features == 0 {
            return Err(FamselError::EmptyData("No features in TSV".to_string()));
        }

        let mut tri_mat = TriMat::new((n_features, n_samples));
        for (row, col, val) in triplets {
            tri_mat.add_triplet(row, col, val);
        }
        let data: CsMat<f64> = tri_mat.to_csr();

        Self::new(data, feature_ids, sample_ids)
    }

    /// Get the value at (row, col), returning 0 for missing entries.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data.get(row, col).copied().unwrap_or(0.0)
    }

    /// Number of features (rows).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.rows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    /// Total number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.nnz()
    }

    /// Feature identifiers.
    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get a dense vector for a specific row (feature).
    pub fn row_dense(&self, row: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_samples()];
        if let Some(row_vec) = self.data.outer_view(row) {
            for (col, &val) in row_vec.iter() {
                dense[col] = val;
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_tsv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "feature_id\tS1\tS2\tS3\tS4").unwrap();
        writeln!(file, "gene_A\t10.5\t20\t0\t5").unwrap();
        writeln!(file, "gene_B\t100\t200\t150\t175").unwrap();
        writeln!(file, "gene_C\t1\tNA\t0\t0").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_from_tsv() {
        let file = create_test_tsv();
        let matrix = ExpressionMatrix::from_tsv(file.path()).unwrap();

        assert_eq!(matrix.n_features(), 3);
        assert_eq!(matrix.n_samples(), 4);
        assert_eq!(matrix.feature_ids(), &["gene_A", "gene_B", "gene_C"]);
        assert_eq!(matrix.sample_ids(), &["S1", "S2", "S3", "S4"]);
    }

    #[test]
    fn test_zeros_are_implicit() {
        let file = create_test_tsv();
        let matrix = ExpressionMatrix::from_tsv(file.path()).unwrap();

        assert_eq!(matrix.get(0, 2), 0.0);
        assert_eq!(matrix.get(0, 0), 10.5);
        // gene_A has 3 stored entries, gene_B 4, gene_C 2 (the NA included).
        assert_eq!(matrix.nnz(), 9);
    }

    #[test]
    fn test_na_becomes_nan() {
        let file = create_test_tsv();
        let matrix = ExpressionMatrix::from_tsv(file.path()).unwrap();

        let row = matrix.row_dense(2);
        assert_eq!(row[0], 1.0);
        assert!(row[1].is_nan());
        assert_eq!(row[2], 0.0);
    }

    #[test]
    fn test_row_dense() {
        let file = create_test_tsv();
        let matrix = ExpressionMatrix::from_tsv(file.path()).unwrap();

        assert_eq!(matrix.row_dense(1), vec![100.0, 200.0, 150.0, 175.0]);
    }

    #[test]
    fn test_invalid_value_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "feature_id\tS1\tS2").unwrap();
        writeln!(file, "gene_A\t10\tabc").unwrap();
        file.flush().unwrap();

        let result = ExpressionMatrix::from_tsv(file.path());
        assert!(matches!(
            result,
            Err(FamselError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let tri = TriMat::new((2, 3));
        let result = ExpressionMatrix::new(
            tri.to_csr(),
            vec!["a".into()],
            vec!["S1".into(), "S2".into(), "S3".into()],
        );
        assert!(result.is_err());
    }
}
