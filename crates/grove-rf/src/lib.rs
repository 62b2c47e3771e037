//! Random Forest regression and classification: train, evaluate, predict.
//!
//! Provides CART decision trees grown on bootstrap samples with random
//! per-split feature subsets, parallel training via rayon, leaf-weighted
//! aggregation, out-of-bag evaluation, and impurity-based feature importance.
//!
//! ```no_run
//! use grove_rf::{MaxFeatures, OobMode, RandomForestConfig};
//!
//! # fn main() -> Result<(), grove_rf::RfError> {
//! let features = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![2.0, 1.0]];
//! let targets = [0.5, 1.5, 2.5];
//!
//! let model = RandomForestConfig::new(100)?
//!     .with_max_features(MaxFeatures::All)
//!     .with_oob_mode(OobMode::Enabled)
//!     .fit_regressor(&features, &targets)?;
//! let r2 = model.score(&features, &targets)?;
//! # let _ = r2;
//! # Ok(())
//! # }
//! ```

mod classifier;
mod config;
mod confusion;
mod criterion;
mod error;
mod forest;
mod importance;
mod labels;
mod matrix;
mod metrics;
mod node;
mod oob;
mod predict;
mod regressor;
mod sampler;
mod split;
mod tree;

pub use classifier::RandomForestClassifier;
pub use config::{MaxFeatures, OobMode, RandomForestConfig};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use criterion::{ClassCriterion, ClassHistogram};
pub use error::{ErrorKind, RfError};
pub use forest::TrainingMetadata;
pub use importance::FeatureImportance;
pub use metrics::{accuracy, r2_score};
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use oob::OobScore;
pub use predict::ClassDistribution;
pub use regressor::RandomForestRegressor;
pub use tree::{ClassificationTree, DecisionTree, DecisionTreeConfig, RegressionTree};
