//! Leaf-weighted aggregation of per-tree predictions.

use crate::criterion::{ClassHistogram, argmax_smallest};
use crate::forest::Forest;

/// Class probability distribution from a prediction.
///
/// `as_slice()[i]` is the probability of `classes()[i]`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClassDistribution {
    classes: Vec<usize>,
    probs: Vec<f64>,
}

impl ClassDistribution {
    /// Normalize pooled class counts into a distribution over `classes`.
    ///
    /// `counts` and `classes` have the same non-zero length.
    pub(crate) fn from_counts(counts: &[usize], classes: &[usize]) -> Self {
        let total = counts.iter().sum::<usize>().max(1) as f64;
        Self {
            classes: classes.to_vec(),
            probs: counts.iter().map(|&c| c as f64 / total).collect(),
        }
    }

    /// Return the predicted label (argmax, ties to the smallest label).
    #[must_use]
    pub fn predicted_class(&self) -> usize {
        let mut best = 0;
        for (pos, p) in self.probs.iter().enumerate() {
            if *p > self.probs[best] {
                best = pos;
            }
        }
        self.classes[best]
    }

    /// Return the top-k labels sorted by descending probability.
    ///
    /// Equal probabilities keep ascending label order.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = self
            .classes
            .iter()
            .copied()
            .zip(self.probs.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);
        ranked
    }

    /// Labels in the order of [`as_slice`](Self::as_slice).
    #[must_use]
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    /// Return the probability distribution as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }
}

impl Forest<f64> {
    /// Mean of every tree's leaf prediction, weighted by leaf sample count.
    ///
    /// The caller has already checked the sample width.
    pub(crate) fn weighted_mean(&self, sample: &[f64]) -> f64 {
        let (sum, weight) = self.fold_leaves(sample, (0.0f64, 0usize), |(sum, weight), &mean, n| {
            *sum += mean * n as f64;
            *weight += n;
        });
        sum / weight.max(1) as f64
    }
}

impl Forest<ClassHistogram> {
    /// Sum of every tree's leaf class counts.
    ///
    /// A leaf's counts add up to its sample count, so pooling raw counts
    /// weights each tree's vote by the size of the leaf it lands in.
    pub(crate) fn pooled_counts(&self, sample: &[f64], n_classes: usize) -> Vec<usize> {
        self.fold_leaves(sample, vec![0usize; n_classes], |totals, hist, _| {
            for (total, &c) in totals.iter_mut().zip(hist.counts()) {
                *total += c;
            }
        })
    }

    /// Position of the class with the largest pooled count, ties to the
    /// smallest label.
    pub(crate) fn vote(&self, sample: &[f64], n_classes: usize) -> usize {
        argmax_smallest(&self.pooled_counts(sample, n_classes))
    }
}
