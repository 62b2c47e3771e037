//! Random Forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::RandomForestConfig;
use crate::criterion::Criterion;
use crate::error::RfError;
use crate::matrix::FeatureMatrix;
use crate::sampler::bootstrap_sample;
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// Metadata about the training run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrainingMetadata {
    /// Number of trees trained.
    pub n_trees: usize,
    /// Number of features in the dataset.
    pub n_features: usize,
    /// Number of training samples.
    pub n_samples: usize,
    /// Resolved max_features value used.
    pub max_features_resolved: usize,
    /// Rows drawn (with replacement) for each tree.
    pub draw_count: usize,
}

/// An ensemble of independently grown trees, each paired with the rows it
/// never saw during training.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(
    try_from = "ForestParts<P>",
    bound(deserialize = "P: serde::Deserialize<'de>")
)]
pub(crate) struct Forest<P> {
    pub(crate) trees: Vec<DecisionTree<P>>,
    pub(crate) oob_indices: Vec<Vec<usize>>,
    pub(crate) metadata: TrainingMetadata,
}

#[derive(serde::Deserialize)]
struct ForestParts<P> {
    trees: Vec<DecisionTree<P>>,
    oob_indices: Vec<Vec<usize>>,
    metadata: TrainingMetadata,
}

impl<P> TryFrom<ForestParts<P>> for Forest<P> {
    type Error = RfError;

    /// Each tree has already checked its own arena; this checks that the
    /// trees agree with each other and with the metadata.
    fn try_from(parts: ForestParts<P>) -> Result<Self, RfError> {
        let invalid = |reason: String| RfError::InvalidModel { reason };
        let ForestParts {
            trees,
            oob_indices,
            metadata,
        } = parts;
        if trees.is_empty() || trees.len() != metadata.n_trees {
            return Err(invalid(format!(
                "forest holds {} trees, metadata says {}",
                trees.len(),
                metadata.n_trees
            )));
        }
        if oob_indices.len() != trees.len() {
            return Err(invalid(format!(
                "{} out-of-bag sets for {} trees",
                oob_indices.len(),
                trees.len()
            )));
        }
        if let Some(tree) = trees
            .iter()
            .find(|tree| tree.n_features() != metadata.n_features)
        {
            return Err(invalid(format!(
                "tree expects {} features, forest expects {}",
                tree.n_features(),
                metadata.n_features
            )));
        }
        Ok(Forest {
            trees,
            oob_indices,
            metadata,
        })
    }
}

impl<P: Sync> Forest<P> {
    /// Check a query row's width against the training data.
    pub(crate) fn check_sample(&self, sample: &[f64]) -> Result<(), RfError> {
        if sample.len() != self.metadata.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.metadata.n_features,
                got: sample.len(),
            });
        }
        Ok(())
    }

    /// Fold every tree's leaf for `sample` into an accumulator.
    ///
    /// The caller has already checked the sample width.
    pub(crate) fn fold_leaves<A>(
        &self,
        sample: &[f64],
        init: A,
        mut add: impl FnMut(&mut A, &P, usize),
    ) -> A {
        let mut acc = init;
        for tree in &self.trees {
            let (leaf, n_samples) = tree.leaf_by(|feature| sample[feature]);
            add(&mut acc, leaf, n_samples);
        }
        acc
    }

    /// Apply `f` to every row of `features` in parallel, keeping row order.
    pub(crate) fn map_rows<T: Send>(
        &self,
        features: &[Vec<f64>],
        f: impl Fn(&[f64]) -> T + Sync + Send,
    ) -> Result<Vec<T>, RfError> {
        features
            .into_par_iter()
            .map(|sample| {
                self.check_sample(sample)?;
                Ok(f(sample))
            })
            .collect()
    }
}

/// Grow `config.n_trees` trees on bootstrap samples of `matrix`.
///
/// A master generator seeded from `config.seed` draws one seed per tree up
/// front; each tree then uses its own generator for the bootstrap draw and
/// for split feature sampling. Trees are built in parallel and collected in
/// seed order, so the result does not depend on the thread count.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = matrix.n_samples()))]
pub(crate) fn train<C: Criterion>(
    config: &RandomForestConfig,
    criterion: &C,
    matrix: &FeatureMatrix,
    targets: &[C::Target],
) -> Result<Forest<C::Leaf>, RfError> {
    config.validate()?;

    let n_samples = matrix.n_samples();
    let n_features = matrix.n_features();
    let max_features = config.max_features.resolve(n_features)?;
    let draw_count = ((n_samples as f64) * config.bootstrap_fraction)
        .ceil()
        .max(1.0) as usize;

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        max_features,
        draw_count,
        "training random forest"
    );

    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let tree_config = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_max_depth(config.max_depth)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(Some(max_features));

    let tree_results: Vec<(DecisionTree<C::Leaf>, Vec<usize>)> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let boot = bootstrap_sample(n_samples, draw_count, &mut rng);
            let tree = tree_config.grow(
                matrix,
                targets,
                &boot.in_bag,
                criterion,
                max_features,
                &mut rng,
            );
            (tree, boot.out_of_bag)
        })
        .collect();

    let (trees, oob_indices): (Vec<_>, Vec<_>) = tree_results.into_iter().unzip();

    debug!(
        n_trees_trained = trees.len(),
        total_nodes = trees.iter().map(DecisionTree::n_nodes).sum::<usize>(),
        "tree training complete"
    );

    Ok(Forest {
        trees,
        oob_indices,
        metadata: TrainingMetadata {
            n_trees: config.n_trees,
            n_features,
            n_samples,
            max_features_resolved: max_features,
            draw_count,
        },
    })
}
