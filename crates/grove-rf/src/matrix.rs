//! Validated, column-major view of a training feature matrix.

use crate::error::RfError;

/// A rectangular, finite-valued feature matrix stored column by column.
///
/// Built once per `fit` from row-major input. Trees and split finding only
/// ever address it through row-index slices, so bootstrap samples and node
/// subsets never copy feature values.
#[derive(Debug, Clone)]
pub(crate) struct FeatureMatrix {
    columns: Vec<Vec<f64>>,
    n_samples: usize,
}

impl FeatureMatrix {
    /// Validate row-major `rows` and transpose them into columns.
    ///
    /// # Errors
    ///
    /// | Variant                           | When                              |
    /// |-----------------------------------|-----------------------------------|
    /// | [`RfError::EmptyDataset`]         | `rows` is empty                   |
    /// | [`RfError::ZeroFeatures`]         | rows have zero feature columns    |
    /// | [`RfError::FeatureCountMismatch`] | rows have inconsistent lengths    |
    /// | [`RfError::NonFiniteValue`]       | any value is NaN or infinite      |
    pub(crate) fn from_rows(rows: &[Vec<f64>]) -> Result<Self, RfError> {
        let first = rows.first().ok_or(RfError::EmptyDataset)?;
        let n_samples = rows.len();
        let n_features = first.len();
        if n_features == 0 {
            return Err(RfError::ZeroFeatures);
        }

        for (sample_index, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(RfError::FeatureCountMismatch {
                    expected: n_features,
                    got: row.len(),
                    sample_index,
                });
            }
            if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
                return Err(RfError::NonFiniteValue {
                    sample_index,
                    feature_index,
                });
            }
        }

        let columns = (0..n_features)
            .map(|feat_idx| rows.iter().map(|row| row[feat_idx]).collect())
            .collect();

        Ok(Self { columns, n_samples })
    }

    /// Return the number of rows.
    pub(crate) fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Return the number of feature columns.
    pub(crate) fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Borrow one feature column.
    pub(crate) fn column(&self, feature: usize) -> &[f64] {
        &self.columns[feature]
    }

    /// Return the value at (`sample`, `feature`).
    pub(crate) fn value(&self, sample: usize, feature: usize) -> f64 {
        self.columns[feature][sample]
    }
}

/// Check that the target vector matches the row count.
pub(crate) fn check_target_len(n_rows: usize, n_targets: usize) -> Result<(), RfError> {
    if n_rows != n_targets {
        return Err(RfError::TargetLengthMismatch { n_rows, n_targets });
    }
    Ok(())
}

/// Reject NaN or infinite regression targets.
pub(crate) fn check_finite_targets(targets: &[f64]) -> Result<(), RfError> {
    match targets.iter().position(|t| !t.is_finite()) {
        Some(sample_index) => Err(RfError::NonFiniteTarget { sample_index }),
        None => Ok(()),
    }
}
