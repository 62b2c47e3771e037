//! Configuration builder for Random Forest training.

use crate::classifier::RandomForestClassifier;
use crate::criterion::ClassCriterion;
use crate::error::RfError;
use crate::regressor::RandomForestRegressor;

/// Strategy for determining the number of features to consider at each split.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MaxFeatures {
    /// Square root of total features, rounded up.
    Sqrt,
    /// Log base 2 of total features, rounded up (at least 1).
    Log2,
    /// A fraction of total features in (0.0, 1.0], rounded to nearest (at least 1).
    Fraction(f64),
    /// A fixed count in [1, n_features].
    Fixed(usize),
    /// All features (no subsampling).
    All,
}

impl MaxFeatures {
    /// Resolve to a concrete per-split column budget for `n_features` columns.
    ///
    /// # Errors
    ///
    /// | Variant                         | When                                    |
    /// |---------------------------------|-----------------------------------------|
    /// | [`RfError::InvalidMaxFraction`] | `Fraction(f)` with `f` outside (0, 1]   |
    /// | [`RfError::InvalidMaxFeatures`] | the count resolves outside [1, n]       |
    pub fn resolve(self, n_features: usize) -> Result<usize, RfError> {
        let n = n_features as f64;
        let resolved = match self {
            MaxFeatures::Sqrt => n.sqrt().ceil() as usize,
            MaxFeatures::Log2 => n.log2().ceil().max(1.0) as usize,
            MaxFeatures::Fraction(f) => {
                if !(f > 0.0 && f <= 1.0) {
                    return Err(RfError::InvalidMaxFraction { fraction: f });
                }
                (n * f).round().max(1.0) as usize
            }
            MaxFeatures::Fixed(k) => k,
            MaxFeatures::All => n_features,
        };
        if resolved == 0 || resolved > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features: resolved,
                n_features,
            });
        }
        Ok(resolved)
    }
}

/// Whether to compute out-of-bag evaluation during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OobMode {
    /// Compute the OOB score from rows left out of each tree's bootstrap.
    Enabled,
    /// Skip OOB evaluation.
    Disabled,
}

/// Configuration for Random Forest training, shared by the regressor and
/// the classifier.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter            | Default     |
/// |----------------------|-------------|
/// | `max_features`       | `Sqrt`      |
/// | `max_depth`          | `None`      |
/// | `min_samples_leaf`   | 1           |
/// | `criterion`          | `Gini`      |
/// | `seed`               | 42          |
/// | `oob_mode`           | `Disabled`  |
/// | `bootstrap_fraction` | 1.0         |
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_leaf: usize,
    pub(crate) criterion: ClassCriterion,
    pub(crate) seed: u64,
    pub(crate) oob_mode: OobMode,
    pub(crate) bootstrap_fraction: f64,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_leaf: 1,
            criterion: ClassCriterion::Gini,
            seed: 42,
            oob_mode: OobMode::Disabled,
            bootstrap_fraction: 1.0,
        })
    }

    // --- Setters ---

    /// Set the max features strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the leaf-size rule: nodes with at most this many rows are not split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the classification split criterion. Ignored by the regressor.
    #[must_use]
    pub fn with_criterion(mut self, criterion: ClassCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the OOB evaluation mode.
    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    /// Set the bootstrap fraction (draws per tree as a share of the row count).
    #[must_use]
    pub fn with_bootstrap_fraction(mut self, bootstrap_fraction: f64) -> Self {
        self.bootstrap_fraction = bootstrap_fraction;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the max features strategy.
    #[must_use]
    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
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

    /// Return the classification split criterion.
    #[must_use]
    pub fn criterion(&self) -> ClassCriterion {
        self.criterion
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the OOB evaluation mode.
    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    /// Return the bootstrap fraction.
    #[must_use]
    pub fn bootstrap_fraction(&self) -> f64 {
        self.bootstrap_fraction
    }

    /// Check every parameter that does not depend on the data.
    ///
    /// A `Fixed` feature count is checked against the data width when
    /// training starts, so `Fixed(0)` is reported there with the real width.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                                   |
    /// |---------------------------------------|----------------------------------------|
    /// | [`RfError::InvalidMinSamplesLeaf`]    | `min_samples_leaf` is zero             |
    /// | [`RfError::InvalidMaxDepth`]          | `max_depth` is `Some(0)`               |
    /// | [`RfError::InvalidMaxFraction`]       | `Fraction(f)` with `f` outside (0, 1]  |
    /// | [`RfError::InvalidBootstrapFraction`] | bootstrap_fraction is not in (0, 1]    |
    pub fn validate(&self) -> Result<(), RfError> {
        if self.min_samples_leaf < 1 {
            return Err(RfError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }
        if self.max_depth == Some(0) {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }
        if let MaxFeatures::Fraction(f) = self.max_features
            && !(f > 0.0 && f <= 1.0)
        {
            return Err(RfError::InvalidMaxFraction { fraction: f });
        }
        if !(self.bootstrap_fraction > 0.0 && self.bootstrap_fraction <= 1.0) {
            return Err(RfError::InvalidBootstrapFraction {
                fraction: self.bootstrap_fraction,
            });
        }
        Ok(())
    }

    /// Train a Random Forest regressor.
    ///
    /// `features[sample_idx][feature_idx]` is row-major; `targets[sample_idx]`
    /// is the continuous target.
    ///
    /// # Errors
    ///
    /// See [`RandomForestRegressor::fit`].
    pub fn fit_regressor(
        &self,
        features: &[Vec<f64>],
        targets: &[f64],
    ) -> Result<RandomForestRegressor, RfError> {
        let mut model = RandomForestRegressor::new(self.clone());
        model.fit(features, targets)?;
        Ok(model)
    }

    /// Train a Random Forest classifier.
    ///
    /// `labels[sample_idx]` are zero-based class labels.
    ///
    /// # Errors
    ///
    /// See [`RandomForestClassifier::fit`].
    pub fn fit_classifier(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<RandomForestClassifier, RfError> {
        let mut model = RandomForestClassifier::new(self.clone());
        model.fit(features, labels)?;
        Ok(model)
    }
}
