//! Feature importance aggregation across trees.

use crate::node::FeatureIndex;

/// A ranked feature with its forest-level importance.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FeatureImportance {
    /// Feature column.
    pub feature: FeatureIndex,
    /// Normalized importance score (sums to 1.0 across all features).
    pub importance: f64,
    /// 1-based rank (1 = most important).
    pub rank: usize,
}

/// Aggregate per-tree MDI importances into ranked features.
///
/// Sums importances across all trees, normalizes to sum to 1.0, sorts
/// descending (ties keep column order), and assigns 1-based ranks. When every
/// tree is a single leaf all importances stay 0.0.
pub(crate) fn aggregate_importances(
    per_tree: impl IntoIterator<Item = Vec<f64>>,
    n_features: usize,
) -> Vec<FeatureImportance> {
    let mut totals = vec![0.0f64; n_features];
    for tree_imp in per_tree {
        for (total, val) in totals.iter_mut().zip(tree_imp) {
            *total += val;
        }
    }

    let sum: f64 = totals.iter().sum();
    if sum > 0.0 {
        totals.iter_mut().for_each(|v| *v /= sum);
    }

    let mut ranked: Vec<FeatureImportance> = totals
        .into_iter()
        .enumerate()
        .map(|(i, importance)| FeatureImportance {
            feature: FeatureIndex::new(i),
            importance,
            rank: 0,
        })
        .collect();

    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    for (i, feat) in ranked.iter_mut().enumerate() {
        feat.rank = i + 1;
    }
    ranked
}
