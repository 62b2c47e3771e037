//! Out-of-bag (OOB) evaluation for Random Forest.

use tracing::debug;

use crate::confusion::ConfusionMatrix;
use crate::criterion::{ClassHistogram, argmax_smallest};
use crate::error::RfError;
use crate::forest::Forest;
use crate::matrix::FeatureMatrix;
use crate::metrics::{accuracy, r2_score};

/// Out-of-bag evaluation result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OobScore {
    /// R² for the regressor, accuracy for the classifier, over OOB-covered rows.
    pub score: f64,
    /// Number of training rows left out of at least one tree's bootstrap.
    pub n_oob_samples: usize,
    /// OOB confusion matrix; `None` for the regressor.
    pub confusion: Option<ConfusionMatrix>,
}

/// Fold, for every training row, the leaves of the trees that did not see it.
///
/// Rows that were in every tree's bootstrap come back as `None`.
fn accumulate<P: Sync, A: Clone>(
    forest: &Forest<P>,
    matrix: &FeatureMatrix,
    init: A,
    add: impl Fn(&mut A, &P, usize),
) -> Vec<Option<A>> {
    let mut acc: Vec<Option<A>> = vec![None; matrix.n_samples()];
    for (tree, oob_rows) in forest.trees.iter().zip(&forest.oob_indices) {
        for &row in oob_rows {
            let (leaf, n_samples) = tree.leaf_by(|feature| matrix.value(row, feature));
            add(acc[row].get_or_insert_with(|| init.clone()), leaf, n_samples);
        }
    }
    acc
}

fn no_coverage() -> RfError {
    RfError::OobEvaluationFailed {
        reason: "no sample has any OOB tree".to_string(),
    }
}

/// OOB R² from leaf-size-weighted averages of OOB tree predictions.
pub(crate) fn oob_regression(
    forest: &Forest<f64>,
    matrix: &FeatureMatrix,
    targets: &[f64],
) -> Result<OobScore, RfError> {
    let sums = accumulate(forest, matrix, (0.0f64, 0usize), |(sum, weight), &mean, n| {
        *sum += mean * n as f64;
        *weight += n;
    });

    let (y_true, y_pred): (Vec<f64>, Vec<f64>) = sums
        .iter()
        .zip(targets)
        .filter_map(|(acc, &y)| acc.map(|(sum, weight)| (y, sum / weight as f64)))
        .unzip();

    if y_true.is_empty() {
        return Err(no_coverage());
    }
    debug!(n_oob_samples = y_true.len(), "OOB regression predictions collected");

    Ok(OobScore {
        score: r2_score(&y_true, &y_pred)?,
        n_oob_samples: y_true.len(),
        confusion: None,
    })
}

/// OOB accuracy from pooled class counts of OOB tree leaves.
///
/// `labels` are class positions, so the confusion matrix is indexed by
/// position in the sorted training label set.
pub(crate) fn oob_classification(
    forest: &Forest<ClassHistogram>,
    matrix: &FeatureMatrix,
    labels: &[usize],
    n_classes: usize,
) -> Result<OobScore, RfError> {
    let votes = accumulate(forest, matrix, vec![0usize; n_classes], |totals, hist, _| {
        for (total, &c) in totals.iter_mut().zip(hist.counts()) {
            *total += c;
        }
    });

    let (y_true, y_pred): (Vec<usize>, Vec<usize>) = votes
        .iter()
        .zip(labels)
        .filter_map(|(acc, &y)| acc.as_ref().map(|counts| (y, argmax_smallest(counts))))
        .unzip();

    if y_true.is_empty() {
        return Err(no_coverage());
    }
    debug!(n_oob_samples = y_true.len(), "OOB class votes collected");

    let confusion = ConfusionMatrix::from_labels(&y_true, &y_pred, n_classes)?;
    Ok(OobScore {
        score: accuracy(&y_true, &y_pred)?,
        n_oob_samples: y_true.len(),
        confusion: Some(confusion),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RandomForestConfig;
    use crate::criterion::{ClassCriterion, Classification, Variance};
    use crate::forest::train;

    #[test]
    fn single_row_has_no_oob_coverage() {
        let matrix = FeatureMatrix::from_rows(&[vec![1.0]]).unwrap();
        let config = RandomForestConfig::new(5).unwrap();
        let forest = train(&config, &Variance, &matrix, &[3.0]).unwrap();
        let err = oob_regression(&forest, &matrix, &[3.0]).unwrap_err();
        assert!(matches!(err, RfError::OobEvaluationFailed { .. }));
    }

    #[test]
    fn coverage_counts_rows_left_out_at_least_once() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let matrix = FeatureMatrix::from_rows(&rows).unwrap();
        let config = RandomForestConfig::new(10).unwrap().with_seed(9);
        let forest = train(&config, &Variance, &matrix, &targets).unwrap();

        let mut covered = vec![false; 40];
        for oob in &forest.oob_indices {
            for &i in oob {
                covered[i] = true;
            }
        }
        let expected = covered.iter().filter(|&&c| c).count();

        let oob = oob_regression(&forest, &matrix, &targets).unwrap();
        assert_eq!(oob.n_oob_samples, expected);
        assert!(oob.confusion.is_none());
        assert!(oob.score > 0.8, "oob r2 = {}", oob.score);
    }

    #[test]
    fn classification_confusion_matches_score() {
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![(i % 30) as f64]).collect();
        let labels: Vec<usize> = (0..60).map(|i| usize::from(i % 30 >= 15)).collect();
        let matrix = FeatureMatrix::from_rows(&rows).unwrap();
        let crit = Classification {
            criterion: ClassCriterion::Gini,
            classes: &[0, 1],
        };
        let config = RandomForestConfig::new(15).unwrap().with_seed(4);
        let forest = train(&config, &crit, &matrix, &labels).unwrap();

        let oob = oob_classification(&forest, &matrix, &labels, 2).unwrap();
        let cm = oob.confusion.expect("classifier OOB carries a confusion matrix");
        assert_eq!(cm.total(), oob.n_oob_samples);
        assert!((cm.accuracy() - oob.score).abs() < 1e-12);
        assert!(oob.score > 0.9, "oob accuracy = {}", oob.score);
    }
}
