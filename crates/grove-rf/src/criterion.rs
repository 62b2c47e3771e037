//! Impurity criteria and the running target statistics used by split scanning.

use crate::node::Impurity;

/// Impurity measure plus the incremental statistics it is computed from.
///
/// Split scanning moves rows one at a time from the right partition to the
/// left one, so each criterion keeps a running summary (`Stats`) that
/// supports `add`/`remove` in O(1) or O(n_classes).
pub(crate) trait Criterion: Copy + Send + Sync {
    /// Per-row target value.
    type Target: Copy + PartialEq + Send + Sync;
    /// Running summary of a multiset of targets.
    type Stats: Clone;
    /// Payload stored in a leaf.
    type Leaf: Clone + Send + Sync;

    /// Summarise the targets of `rows`.
    fn stats_for(&self, targets: &[Self::Target], rows: &[usize]) -> Self::Stats;

    /// Summary of the empty set, compatible with `stats` for `add`/`remove`.
    fn empty_like(&self, stats: &Self::Stats) -> Self::Stats;

    /// Add one target to `stats`.
    fn add(&self, stats: &mut Self::Stats, target: Self::Target);

    /// Remove one previously added target from `stats`.
    fn remove(&self, stats: &mut Self::Stats, target: Self::Target);

    /// Impurity of a set of `n_samples` targets summarised by `stats`.
    ///
    /// Returns zero for an empty set.
    fn impurity(&self, stats: &Self::Stats, n_samples: usize) -> Impurity;

    /// Build the leaf payload for a node summarised by `stats`.
    fn leaf(&self, stats: &Self::Stats, n_samples: usize) -> Self::Leaf;

    /// Sorted distinct class labels that leaf payloads are indexed by.
    fn classes(&self) -> &[usize] {
        &[]
    }
}

/// Sum and sum of squares of continuous targets, taken as deviations from
/// `origin`.
///
/// `origin` is one of the node's own targets, so the sums stay on the scale
/// of the node's spread and a large common offset in `y` cancels exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Moments {
    origin: f64,
    sum: f64,
    sum_sq: f64,
}

/// Population variance of continuous targets (regression).
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Variance;

impl Criterion for Variance {
    type Target = f64;
    type Stats = Moments;
    type Leaf = f64;

    fn stats_for(&self, targets: &[f64], rows: &[usize]) -> Moments {
        let mut stats = Moments {
            origin: rows.first().map_or(0.0, |&row| targets[row]),
            ..Moments::default()
        };
        for &row in rows {
            self.add(&mut stats, targets[row]);
        }
        stats
    }

    fn empty_like(&self, stats: &Moments) -> Moments {
        Moments {
            origin: stats.origin,
            ..Moments::default()
        }
    }

    fn add(&self, stats: &mut Moments, target: f64) {
        let d = target - stats.origin;
        stats.sum += d;
        stats.sum_sq += d * d;
    }

    fn remove(&self, stats: &mut Moments, target: f64) {
        let d = target - stats.origin;
        stats.sum -= d;
        stats.sum_sq -= d * d;
    }

    fn impurity(&self, stats: &Moments, n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let mean = stats.sum / n;
        // Cancellation can push the raw value a hair below zero.
        Impurity::new((stats.sum_sq / n - mean * mean).max(0.0))
    }

    fn leaf(&self, stats: &Moments, n_samples: usize) -> f64 {
        if n_samples == 0 {
            stats.origin
        } else {
            stats.origin + stats.sum / n_samples as f64
        }
    }
}

/// Criterion for measuring the quality of a classification split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ClassCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl ClassCriterion {
    /// Compute the impurity of a node from its class counts.
    ///
    /// Returns zero when `n_samples` is zero.
    #[must_use]
    pub fn impurity(&self, class_counts: &[usize], n_samples: usize) -> Impurity {
        if n_samples == 0 {
            return Impurity::new(0.0);
        }
        let n = n_samples as f64;
        let value = match self {
            ClassCriterion::Gini => {
                let sum_sq: f64 = class_counts
                    .iter()
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p
                    })
                    .sum();
                1.0 - sum_sq
            }
            ClassCriterion::Entropy => {
                -class_counts
                    .iter()
                    .filter(|&&c| c > 0)
                    .map(|&c| {
                        let p = c as f64 / n;
                        p * p.ln()
                    })
                    .sum::<f64>()
            }
        };
        Impurity::new(value)
    }
}

/// A classification criterion bound to the label set seen in training.
///
/// Targets are dense class positions into `classes`, never raw labels, so the
/// per-node count vectors stay as long as the number of distinct labels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Classification<'a> {
    pub(crate) criterion: ClassCriterion,
    pub(crate) classes: &'a [usize],
}

impl Criterion for Classification<'_> {
    type Target = usize;
    type Stats = Vec<usize>;
    type Leaf = ClassHistogram;

    fn stats_for(&self, targets: &[usize], rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.classes.len()];
        for &row in rows {
            counts[targets[row]] += 1;
        }
        counts
    }

    fn empty_like(&self, stats: &Vec<usize>) -> Vec<usize> {
        vec![0; stats.len()]
    }

    fn add(&self, stats: &mut Vec<usize>, target: usize) {
        stats[target] += 1;
    }

    fn remove(&self, stats: &mut Vec<usize>, target: usize) {
        stats[target] -= 1;
    }

    fn impurity(&self, stats: &Vec<usize>, n_samples: usize) -> Impurity {
        self.criterion.impurity(stats, n_samples)
    }

    fn leaf(&self, stats: &Vec<usize>, _n_samples: usize) -> ClassHistogram {
        ClassHistogram::new(stats.clone())
    }

    fn classes(&self) -> &[usize] {
        self.classes
    }
}

/// Class counts of the training samples that reached a classification leaf.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClassHistogram {
    counts: Vec<usize>,
}

impl ClassHistogram {
    pub(crate) fn new(counts: Vec<usize>) -> Self {
        Self { counts }
    }

    /// Return the per-class counts, indexed by class position in the
    /// sorted label set the tree was trained on.
    #[must_use]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Return the total number of samples counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Return the position of the most frequent class, breaking ties toward
    /// the smallest label.
    #[must_use]
    pub fn majority(&self) -> usize {
        argmax_smallest(&self.counts)
    }
}

/// Index of the largest count; the first (smallest) index wins ties.
pub(crate) fn argmax_smallest(counts: &[usize]) -> usize {
    let mut best = 0;
    for (class, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = class;
        }
    }
    best
}
