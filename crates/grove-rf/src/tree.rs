use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::{
    RfError,
    criterion::{ClassCriterion, ClassHistogram, Classification, Criterion, Variance},
    labels::{EncodedLabels, is_class_set},
    matrix::{FeatureMatrix, check_finite_targets, check_target_len},
    node::{Impurity, Node, NodeIndex},
    split::find_best_split,
};

/// A fitted regression tree; leaves hold the mean target.
pub type RegressionTree = DecisionTree<f64>;

/// A fitted classification tree; leaves hold class counts.
pub type ClassificationTree = DecisionTree<ClassHistogram>;

/// Configuration for a single CART decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter          | Default               |
/// |--------------------|-----------------------|
/// | `criterion`        | `Gini` (classifier)   |
/// | `max_depth`        | `None` (unlimited)    |
/// | `min_samples_leaf` | 1                     |
/// | `max_features`     | `None` (all features) |
/// | `seed`             | 42                    |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: ClassCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: ClassCriterion::Gini,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }

    /// Set the classification split criterion. Ignored by regression trees.
    #[must_use]
    pub fn with_criterion(mut self, criterion: ClassCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth.
    ///
    /// `None` grows until the leaf-size rule or purity stops a branch.
    /// `Some(d)` limits depth to `d` levels (root is depth 0).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the leaf-size rule: a node with at most this many rows becomes a leaf.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the number of features to sample at each split.
    ///
    /// `None` means consider all features.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the classification split criterion.
    #[must_use]
    pub fn criterion(&self) -> ClassCriterion {
        self.criterion
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the leaf-size threshold.
    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    /// Return the maximum features to consider per split, if set.
    #[must_use]
    pub fn max_features(&self) -> Option<usize> {
        self.max_features
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a regression tree on row-major `features` and continuous `targets`.
    ///
    /// # Errors
    ///
    /// | Variant                             | When                                              |
    /// |-------------------------------------|---------------------------------------------------|
    /// | [`RfError::EmptyDataset`]           | `features` is empty                               |
    /// | [`RfError::ZeroFeatures`]           | rows have zero feature columns                    |
    /// | [`RfError::FeatureCountMismatch`]   | rows have inconsistent lengths                    |
    /// | [`RfError::NonFiniteValue`]         | any feature value is NaN or infinite              |
    /// | [`RfError::TargetLengthMismatch`]   | `targets.len() != features.len()`                 |
    /// | [`RfError::NonFiniteTarget`]        | any target is NaN or infinite                     |
    /// | [`RfError::InvalidMaxFeatures`]     | `max_features` resolves outside [1, n_features]   |
    /// | [`RfError::InvalidMaxDepth`]        | `max_depth` is `Some(0)`                          |
    /// | [`RfError::InvalidMinSamplesLeaf`]  | `min_samples_leaf` < 1                            |
    #[instrument(skip_all, fields(n_samples = features.len()))]
    pub fn fit_regressor(
        &self,
        features: &[Vec<f64>],
        targets: &[f64],
    ) -> Result<RegressionTree, RfError> {
        let matrix = FeatureMatrix::from_rows(features)?;
        check_target_len(matrix.n_samples(), targets.len())?;
        check_finite_targets(targets)?;
        let max_features = self.validate(matrix.n_features())?;

        let rows: Vec<usize> = (0..matrix.n_samples()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        Ok(self.grow(&matrix, targets, &rows, &Variance, max_features, &mut rng))
    }

    /// Train a classification tree on row-major `features` and class `labels`.
    ///
    /// Labels may be any `usize` values; the tree's classes are the distinct
    /// labels in ascending order.
    ///
    /// # Errors
    ///
    /// Same as [`DecisionTreeConfig::fit_regressor`], minus the target
    /// finiteness check.
    #[instrument(skip_all, fields(n_samples = features.len()))]
    pub fn fit_classifier(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<ClassificationTree, RfError> {
        let matrix = FeatureMatrix::from_rows(features)?;
        check_target_len(matrix.n_samples(), labels.len())?;
        let max_features = self.validate(matrix.n_features())?;

        let encoded = EncodedLabels::new(labels);
        let criterion = Classification {
            criterion: self.criterion,
            classes: &encoded.classes,
        };
        let rows: Vec<usize> = (0..matrix.n_samples()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        Ok(self.grow(
            &matrix,
            &encoded.positions,
            &rows,
            &criterion,
            max_features,
            &mut rng,
        ))
    }

    /// Check the config against the data width and return the resolved
    /// per-split feature budget.
    pub(crate) fn validate(&self, n_features: usize) -> Result<usize, RfError> {
        if let Some(d) = self.max_depth
            && d == 0
        {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }

        if self.min_samples_leaf < 1 {
            return Err(RfError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }

        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }
        Ok(max_features)
    }

    /// Grow a tree over `rows` of an already validated dataset.
    pub(crate) fn grow<C: Criterion>(
        &self,
        matrix: &FeatureMatrix,
        targets: &[C::Target],
        rows: &[usize],
        criterion: &C,
        max_features: usize,
        rng: &mut ChaCha8Rng,
    ) -> DecisionTree<C::Leaf> {
        let mut builder = TreeBuilder {
            matrix,
            targets,
            criterion,
            config: self,
            max_features,
            rng,
            arena: Vec::new(),
        };
        builder.build(rows, 0);

        let tree = DecisionTree {
            nodes: builder.arena,
            n_features: matrix.n_features(),
            classes: criterion.classes().to_vec(),
        };
        debug!(
            n_samples = rows.len(),
            n_nodes = tree.n_nodes(),
            depth = tree.depth(),
            "decision tree built"
        );
        tree
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed state for one recursive induction run.
struct TreeBuilder<'a, C: Criterion> {
    matrix: &'a FeatureMatrix,
    targets: &'a [C::Target],
    criterion: &'a C,
    config: &'a DecisionTreeConfig,
    max_features: usize,
    rng: &'a mut ChaCha8Rng,
    arena: Vec<Node<C::Leaf>>,
}

impl<C: Criterion> TreeBuilder<'_, C> {
    /// Build the subtree for `rows` and return its arena index.
    ///
    /// Every node is pushed as a leaf first; a successful split then
    /// overwrites it in place once both children exist.
    fn build(&mut self, rows: &[usize], depth: usize) -> NodeIndex {
        let n_samples = rows.len();
        let stats = self.criterion.stats_for(self.targets, rows);
        let impurity: Impurity = self.criterion.impurity(&stats, n_samples);

        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf {
            prediction: self.criterion.leaf(&stats, n_samples),
            impurity,
            n_samples,
        });

        let too_few = n_samples <= self.config.min_samples_leaf.max(1);
        let depth_exceeded = self.config.max_depth.is_some_and(|max_d| depth >= max_d);
        if too_few || depth_exceeded || self.is_constant(rows) {
            return NodeIndex::new(node_idx);
        }

        let Some(split) = find_best_split(
            self.matrix,
            self.targets,
            rows,
            &stats,
            self.criterion,
            self.max_features,
            &mut *self.rng,
        ) else {
            return NodeIndex::new(node_idx);
        };

        let left = self.build(&split.left_indices, depth + 1);
        let right = self.build(&split.right_indices, depth + 1);

        self.arena[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            impurity,
            n_samples,
            impurity_decrease: split.impurity_decrease,
        };

        NodeIndex::new(node_idx)
    }

    fn is_constant(&self, rows: &[usize]) -> bool {
        match rows.split_first() {
            Some((&first, rest)) => rest
                .iter()
                .all(|&r| self.targets[r] == self.targets[first]),
            None => true,
        }
    }
}

/// A fitted CART decision tree.
///
/// Stored as an arena-based `Vec<Node<P>>` rooted at index 0. The tree is
/// immutable once built; refitting produces a new tree.
///
/// Deserialization checks the arena: it must be non-empty, every child
/// index must point past its parent and inside the arena, and every split
/// must test an in-range feature at a finite threshold.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(
    try_from = "TreeParts<P>",
    bound(deserialize = "P: serde::Deserialize<'de>")
)]
pub struct DecisionTree<P> {
    pub(crate) nodes: Vec<Node<P>>,
    pub(crate) n_features: usize,
    /// Sorted training labels for classification trees; empty for regression.
    pub(crate) classes: Vec<usize>,
}

/// Unchecked serialized form of [`DecisionTree`].
#[derive(serde::Deserialize)]
struct TreeParts<P> {
    nodes: Vec<Node<P>>,
    n_features: usize,
    #[serde(default)]
    classes: Vec<usize>,
}

impl<P> TryFrom<TreeParts<P>> for DecisionTree<P> {
    type Error = RfError;

    fn try_from(parts: TreeParts<P>) -> Result<Self, RfError> {
        let tree = DecisionTree {
            nodes: parts.nodes,
            n_features: parts.n_features,
            classes: parts.classes,
        };
        tree.check_arena()?;
        Ok(tree)
    }
}

impl<P> DecisionTree<P> {
    /// Verify the arena can be traversed from the root without leaving it.
    ///
    /// Children are always stored after their parent, so requiring
    /// `parent < child` also rules out cycles.
    fn check_arena(&self) -> Result<(), RfError> {
        let invalid = |reason: String| RfError::InvalidModel { reason };
        if self.nodes.is_empty() {
            return Err(invalid("tree has no nodes".into()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            let Node::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } = node
            else {
                continue;
            };
            for child in [left, right] {
                if child.index() <= idx || child.index() >= self.nodes.len() {
                    return Err(invalid(format!(
                        "node #{idx} points to child {child} in an arena of {} nodes",
                        self.nodes.len()
                    )));
                }
            }
            if feature.index() >= self.n_features {
                return Err(invalid(format!(
                    "node #{idx} tests {feature} but the tree has {} features",
                    self.n_features
                )));
            }
            if !threshold.is_finite() {
                return Err(invalid(format!("node #{idx} has a non-finite threshold")));
            }
        }
        Ok(())
    }

    /// Return the leaf payload and training-sample count reached by `sample`.
    ///
    /// Traverses from the root: at each `Split`, goes left when
    /// `sample[feature] <= threshold`, right otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn leaf_for(&self, sample: &[f64]) -> Result<(&P, usize), RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(self.leaf_by(|feature| sample[feature]))
    }

    /// Traverse using `value(feature)` to read the query row.
    pub(crate) fn leaf_by(&self, value: impl Fn(usize) -> f64) -> (&P, usize) {
        let mut idx = NodeIndex::ROOT.index();
        loop {
            match &self.nodes[idx] {
                Node::Leaf {
                    prediction,
                    n_samples,
                    ..
                } => return (prediction, *n_samples),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if value(feature.index()) <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }

    /// Compute Mean Decrease in Impurity (MDI) feature importances.
    ///
    /// For each `Split` node, the `impurity_decrease` is accumulated by
    /// feature index, then the totals are normalized so they sum to 1.0.
    /// Returns a `Vec` of length `n_features`; all zeros when the tree is
    /// a single leaf.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                impurity_decrease,
                ..
            } = node
            {
                totals[feature.index()] += impurity_decrease;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Borrow the node arena; index 0 is the root.
    #[must_use]
    pub fn nodes(&self) -> &[Node<P>] {
        &self.nodes
    }

    /// Return the number of features this tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }

        let mut max_depth = 0usize;
        let mut stack = vec![(NodeIndex::ROOT.index(), 0usize)];
        while let Some((node_idx, d)) = stack.pop() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
            }
        }
        max_depth
    }
}

impl RegressionTree {
    /// Predict the target for a single sample (mean of its leaf).
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<f64, RfError> {
        self.leaf_for(sample).map(|(mean, _)| *mean)
    }
}

impl ClassificationTree {
    /// Distinct training labels in ascending order.
    ///
    /// Position `i` here is position `i` of every leaf histogram and of
    /// [`ClassificationTree::predict_proba`].
    #[must_use]
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    /// Predict the class label for a single sample (majority of its leaf).
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`,
    /// or [`RfError::InvalidModel`] when the leaf's majority has no label.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        let (hist, _) = self.leaf_for(sample)?;
        let majority = hist.majority();
        self.classes
            .get(majority)
            .copied()
            .ok_or_else(|| RfError::InvalidModel {
                reason: format!(
                    "leaf majority {majority} outside {} classes",
                    self.classes.len()
                ),
            })
    }

    /// Check that the tree carries a class set matching every leaf histogram.
    pub(crate) fn check_classes(&self) -> Result<(), RfError> {
        if !is_class_set(&self.classes) {
            return Err(RfError::InvalidModel {
                reason: "classes must be non-empty and strictly ascending".into(),
            });
        }
        let mismatched = self.nodes.iter().any(|node| {
            matches!(node, Node::Leaf { prediction, .. } if prediction.counts().len() != self.classes.len())
        });
        if mismatched {
            return Err(RfError::InvalidModel {
                reason: format!(
                    "a leaf histogram does not cover the {} classes",
                    self.classes.len()
                ),
            });
        }
        Ok(())
    }

    /// Return the leaf class distribution for a single sample, ordered by
    /// [`ClassificationTree::classes`].
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<Vec<f64>, RfError> {
        let (hist, n_samples) = self.leaf_for(sample)?;
        let total = n_samples.max(1) as f64;
        Ok(hist.counts().iter().map(|&c| c as f64 / total).collect())
    }
}
