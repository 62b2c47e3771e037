//! Confusion matrix and per-class classification metrics.

use std::fmt;

use crate::error::RfError;

/// A confusion matrix for multi-class classification.
///
/// Cell `(true_class, predicted_class)` counts the samples with label
/// `true_class` that were predicted as `predicted_class`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConfusionMatrix {
    cells: Vec<usize>,
    n_classes: usize,
}

/// Per-class precision, recall, and F1 score.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClassMetrics {
    /// The class label.
    pub class: usize,
    /// Precision: TP / (TP + FP). 0.0 if no predictions for this class.
    pub precision: f64,
    /// Recall: TP / (TP + FN). 0.0 if no true samples for this class.
    pub recall: f64,
    /// F1: harmonic mean of precision and recall. 0.0 if both are zero.
    pub f1: f64,
    /// Number of true samples in this class.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Build a confusion matrix from parallel slices of true and predicted labels.
    ///
    /// # Errors
    ///
    /// | Variant                            | Condition                               |
    /// |------------------------------------|-----------------------------------------|
    /// | [`RfError::EmptyDataset`]          | zero labels provided                    |
    /// | [`RfError::TargetLengthMismatch`]  | the slices differ in length             |
    /// | [`RfError::UnknownClassLabel`]     | a label is `>= n_classes`               |
    pub fn from_labels(
        true_labels: &[usize],
        predicted: &[usize],
        n_classes: usize,
    ) -> Result<Self, RfError> {
        if true_labels.len() != predicted.len() {
            return Err(RfError::TargetLengthMismatch {
                n_rows: predicted.len(),
                n_targets: true_labels.len(),
            });
        }
        Self::from_pairs(
            true_labels.iter().copied().zip(predicted.iter().copied()),
            n_classes,
        )
    }

    /// Build a confusion matrix from `(true, predicted)` label pairs.
    ///
    /// # Errors
    ///
    /// [`RfError::EmptyDataset`] when `pairs` is empty, and
    /// [`RfError::UnknownClassLabel`] when a label is `>= n_classes`.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (usize, usize)>,
        n_classes: usize,
    ) -> Result<Self, RfError> {
        let mut cells = vec![0usize; n_classes * n_classes];
        let mut total = 0usize;
        for (t, p) in pairs {
            if let Some(label) = [t, p].into_iter().find(|&l| l >= n_classes) {
                return Err(RfError::UnknownClassLabel { label, n_classes });
            }
            cells[t * n_classes + p] += 1;
            total += 1;
        }
        if total == 0 {
            return Err(RfError::EmptyDataset);
        }
        Ok(Self { cells, n_classes })
    }

    /// Count of samples with label `true_class` predicted as `predicted_class`.
    #[must_use]
    pub fn get(&self, true_class: usize, predicted_class: usize) -> usize {
        self.cells[true_class * self.n_classes + predicted_class]
    }

    /// Overall accuracy: proportion of correct predictions.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.n_classes).map(|c| self.get(c, c)).sum();
        correct as f64 / self.total() as f64
    }

    /// Total number of samples counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.cells.iter().sum()
    }

    /// Per-class precision, recall, F1, and support.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        (0..self.n_classes)
            .map(|c| {
                let tp = self.get(c, c);
                let predicted_c: usize = (0..self.n_classes).map(|t| self.get(t, c)).sum();
                let support: usize = self.row(c).iter().sum();
                let precision = ratio(tp, predicted_c);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Return the counts for true class `true_class`, indexed by predicted class.
    #[must_use]
    pub fn row(&self, true_class: usize) -> &[usize] {
        let start = true_class * self.n_classes;
        &self.cells[start..start + self.n_classes]
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for j in 0..self.n_classes {
            write!(f, " pred_{j:>3}")?;
        }
        writeln!(f)?;

        for i in 0..self.n_classes {
            write!(f, "true_{i:>3}")?;
            for val in self.row(i) {
                write!(f, " {val:>8}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
