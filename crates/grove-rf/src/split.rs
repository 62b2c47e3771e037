use rand::Rng;

use crate::criterion::Criterion;
use crate::matrix::FeatureMatrix;
use crate::node::FeatureIndex;

/// A split must beat the parent by more than this share of the parent's
/// total impurity to count as an improvement.
const MIN_RELATIVE_DECREASE: f64 = 1e-12;

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value: rows with `value <= threshold` go left.
    pub(crate) threshold: f64,
    /// Weighted impurity decrease, `n·I(parent) - n_l·I(left) - n_r·I(right)`.
    pub(crate) impurity_decrease: f64,
    /// Row indices going to the left child.
    pub(crate) left_indices: Vec<usize>,
    /// Row indices going to the right child.
    pub(crate) right_indices: Vec<usize>,
}

/// Find the best split among `max_features` randomly chosen columns.
///
/// For each chosen column, sorts the `(value, row)` pairs of `sample_indices`,
/// moves rows left one at a time while updating running target statistics,
/// and evaluates the midpoint between every pair of consecutive distinct
/// values. The first candidate with the largest impurity decrease wins.
///
/// Returns `None` when fewer than two rows are present, the parent is already
/// pure, every chosen column is constant on `sample_indices`, or no candidate
/// lowers the weighted impurity.
///
/// `parent_stats` must summarise the targets of `sample_indices`.
pub(crate) fn find_best_split<C: Criterion>(
    matrix: &FeatureMatrix,
    targets: &[C::Target],
    sample_indices: &[usize],
    parent_stats: &C::Stats,
    criterion: &C,
    max_features: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_features = matrix.n_features();
    let n_samples = sample_indices.len();

    if n_samples < 2 || n_features == 0 {
        return None;
    }

    let parent_total = n_samples as f64 * criterion.impurity(parent_stats, n_samples).value();
    if parent_total <= 0.0 {
        return None;
    }

    // Partial Fisher-Yates: shuffle only the first `max_features` positions.
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = max_features.clamp(1, n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
    }

    let mut best_decrease = parent_total * MIN_RELATIVE_DECREASE;
    let mut best: Option<(FeatureIndex, f64)> = None;
    let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n_samples);

    for &feat_idx in &feature_order[..take] {
        let column = matrix.column(feat_idx);

        sorted.clear();
        sorted.extend(sample_indices.iter().map(|&si| (column[si], si)));
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        if sorted[0].0 == sorted[n_samples - 1].0 {
            continue;
        }

        let mut left = criterion.empty_like(parent_stats);
        let mut right = parent_stats.clone();

        for i in 0..(n_samples - 1) {
            let (val_i, si) = sorted[i];
            criterion.add(&mut left, targets[si]);
            criterion.remove(&mut right, targets[si]);

            let val_next = sorted[i + 1].0;
            if val_i == val_next {
                continue;
            }

            let n_left = i + 1;
            let n_right = n_samples - n_left;
            let decrease = parent_total
                - n_left as f64 * criterion.impurity(&left, n_left).value()
                - n_right as f64 * criterion.impurity(&right, n_right).value();

            if decrease > best_decrease {
                best_decrease = decrease;
                let mut threshold = val_i + (val_next - val_i) / 2.0;
                // Adjacent floats: the midpoint can round up onto `val_next`.
                if threshold >= val_next {
                    threshold = val_i;
                }
                best = Some((FeatureIndex::new(feat_idx), threshold));
            }
        }
    }

    let (feature, threshold) = best?;

    let column = matrix.column(feature.index());
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
        .iter()
        .partition(|&&si| column[si] <= threshold);

    Some(SplitResult {
        feature,
        threshold,
        impurity_decrease: best_decrease,
        left_indices,
        right_indices,
    })
}
