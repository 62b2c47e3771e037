//! Dense re-indexing of arbitrary class labels.
//!
//! Trees and histograms work on class positions `0..k`, where `k` is the
//! number of distinct training labels. The sorted distinct labels are kept
//! alongside the model so predictions map back to the caller's labels.

use crate::error::RfError;

/// Sorted distinct labels plus every input label's position among them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EncodedLabels {
    pub(crate) classes: Vec<usize>,
    pub(crate) positions: Vec<usize>,
}

impl EncodedLabels {
    pub(crate) fn new(labels: &[usize]) -> Self {
        let mut classes = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let positions = labels
            .iter()
            .map(|&label| classes.partition_point(|&c| c < label))
            .collect();
        Self { classes, positions }
    }
}

/// Position of `label` among the sorted training `classes`.
///
/// # Errors
///
/// Returns [`RfError::UnknownClassLabel`] when the label was never seen.
pub(crate) fn position_of(classes: &[usize], label: usize) -> Result<usize, RfError> {
    classes
        .binary_search(&label)
        .map_err(|_| RfError::UnknownClassLabel {
            label,
            n_classes: classes.len(),
        })
}

/// `true` when `classes` is non-empty and strictly ascending.
pub(crate) fn is_class_set(classes: &[usize]) -> bool {
    !classes.is_empty() && classes.windows(2).all(|w| w[0] < w[1])
}
