//! Arena node type and the index newtypes that address it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-based column of the training feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Column position.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Position of a node inside its tree's arena. The root is always `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) const ROOT: NodeIndex = NodeIndex(0);

    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Arena position.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Heterogeneity of the targets reaching a node.
///
/// Population variance for regression trees; Gini index or entropy (nats)
/// for classification trees. Always `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Raw value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// One node of a decision tree arena.
///
/// Children are referenced by [`NodeIndex`] into the owning tree's node
/// vector. `P` is the leaf payload: the target mean for regression trees,
/// a [`ClassHistogram`](crate::ClassHistogram) for classification trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node<P> {
    /// Internal node: rows with `x[feature] <= threshold` descend left.
    Split {
        /// Column tested at this node.
        feature: FeatureIndex,
        /// Split point between two adjacent distinct training values.
        threshold: f64,
        /// Child receiving `x[feature] <= threshold`.
        left: NodeIndex,
        /// Child receiving `x[feature] > threshold`.
        right: NodeIndex,
        /// Impurity of the unsplit node.
        impurity: Impurity,
        /// Training rows (with bootstrap repeats) reaching this node.
        n_samples: usize,
        /// `n_samples * (impurity - weighted child impurity)`.
        impurity_decrease: f64,
    },
    /// Terminal node.
    Leaf {
        /// Mean target or class counts of the rows reaching this leaf.
        prediction: P,
        /// Impurity of those rows.
        impurity: Impurity,
        /// Training rows (with bootstrap repeats) reaching this leaf.
        n_samples: usize,
    },
}

impl<P> Node<P> {
    /// Impurity of the rows reaching this node, before any split.
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Number of training rows that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    /// `true` for [`Node::Leaf`].
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}
