//! Random Forest regressor: leaf-weighted averaging of regression trees.

use tracing::{info, instrument, warn};

use crate::config::{OobMode, RandomForestConfig};
use crate::criterion::Variance;
use crate::error::RfError;
use crate::forest::{Forest, TrainingMetadata, train};
use crate::importance::{FeatureImportance, aggregate_importances};
use crate::matrix::{FeatureMatrix, check_finite_targets, check_target_len};
use crate::metrics::r2_score;
use crate::oob::{OobScore, oob_regression};
use crate::tree::RegressionTree;

/// A Random Forest for continuous targets.
///
/// Created unfitted from a [`RandomForestConfig`]; [`fit`](Self::fit) grows
/// the trees and replaces any previous model. Prediction is the average of
/// each tree's leaf mean, weighted by the leaf's training-sample count.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RandomForestRegressor {
    config: RandomForestConfig,
    forest: Option<Forest<f64>>,
    oob: Option<OobScore>,
}

impl RandomForestRegressor {
    /// Create an unfitted regressor.
    #[must_use]
    pub fn new(config: RandomForestConfig) -> Self {
        Self {
            config,
            forest: None,
            oob: None,
        }
    }

    /// Return the training configuration.
    #[must_use]
    pub fn config(&self) -> &RandomForestConfig {
        &self.config
    }

    /// Fit the forest on row-major `features` and continuous `targets`.
    ///
    /// Any previously fitted trees are discarded first, so a failed refit
    /// leaves the regressor unfitted. When OOB evaluation is enabled but no
    /// row was ever left out of a bootstrap, the fit still succeeds and
    /// [`oob_score`](Self::oob_score) stays `None`.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                                             |
    /// |---------------------------------------|--------------------------------------------------|
    /// | [`RfError::EmptyDataset`]             | `features` is empty                              |
    /// | [`RfError::ZeroFeatures`]             | rows have zero feature columns                   |
    /// | [`RfError::FeatureCountMismatch`]     | rows have inconsistent lengths                   |
    /// | [`RfError::NonFiniteValue`]           | any feature value is NaN or infinite             |
    /// | [`RfError::TargetLengthMismatch`]     | `targets.len() != features.len()`                |
    /// | [`RfError::NonFiniteTarget`]          | any target is NaN or infinite                    |
    /// | [`RfError::InvalidMinSamplesLeaf`]    | `min_samples_leaf` is zero                       |
    /// | [`RfError::InvalidMaxDepth`]          | `max_depth` is `Some(0)`                         |
    /// | [`RfError::InvalidMaxFraction`]       | max_features fraction outside (0, 1]             |
    /// | [`RfError::InvalidMaxFeatures`]       | max_features resolves outside [1, n_features]    |
    /// | [`RfError::InvalidBootstrapFraction`] | bootstrap_fraction is not in (0, 1]              |
    #[instrument(skip_all, fields(n_trees = self.config.n_trees, n_samples = features.len()))]
    pub fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<&mut Self, RfError> {
        self.forest = None;
        self.oob = None;

        let matrix = FeatureMatrix::from_rows(features)?;
        check_target_len(matrix.n_samples(), targets.len())?;
        check_finite_targets(targets)?;

        let forest = train(&self.config, &Variance, &matrix, targets)?;

        let oob = match self.config.oob_mode {
            OobMode::Enabled => match oob_regression(&forest, &matrix, targets) {
                Ok(score) => Some(score),
                Err(err @ RfError::OobEvaluationFailed { .. }) => {
                    warn!(error = %err, "OOB score unavailable");
                    None
                }
                Err(err) => return Err(err),
            },
            OobMode::Disabled => None,
        };

        info!(
            oob_r2 = oob.as_ref().map(|s| s.score),
            "random forest regressor trained"
        );

        self.forest = Some(forest);
        self.oob = oob;
        Ok(self)
    }

    /// Return `true` once [`fit`](Self::fit) has succeeded.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.forest.is_some()
    }

    fn model(&self) -> Result<&Forest<f64>, RfError> {
        self.forest.as_ref().ok_or(RfError::NotFitted)
    }

    /// Predict the target for a single sample.
    ///
    /// # Errors
    ///
    /// [`RfError::NotFitted`] before `fit`; [`RfError::PredictionFeatureMismatch`]
    /// when `sample.len()` differs from the training width.
    pub fn predict_one(&self, sample: &[f64]) -> Result<f64, RfError> {
        let forest = self.model()?;
        forest.check_sample(sample)?;
        Ok(forest.weighted_mean(sample))
    }

    /// Predict targets for a batch of row-major samples in parallel.
    ///
    /// # Errors
    ///
    /// [`RfError::NotFitted`] before `fit`; [`RfError::PredictionFeatureMismatch`]
    /// if any sample has the wrong feature count.
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, RfError> {
        let forest = self.model()?;
        forest.map_rows(features, |sample| forest.weighted_mean(sample))
    }

    /// Coefficient of determination R² of the predictions on `features`.
    ///
    /// # Errors
    ///
    /// [`RfError::NotFitted`] before `fit`; [`RfError::TargetLengthMismatch`]
    /// when the lengths disagree; [`RfError::EmptyDataset`] for no rows;
    /// [`RfError::PredictionFeatureMismatch`] for a row of the wrong width.
    pub fn score(&self, features: &[Vec<f64>], targets: &[f64]) -> Result<f64, RfError> {
        self.model()?;
        check_target_len(features.len(), targets.len())?;
        let predictions = self.predict(features)?;
        r2_score(targets, &predictions)
    }

    /// Return the OOB R², when OOB evaluation was enabled and possible.
    #[must_use]
    pub fn oob_score(&self) -> Option<f64> {
        self.oob.as_ref().map(|s| s.score)
    }

    /// Return the full OOB evaluation result.
    #[must_use]
    pub fn oob_report(&self) -> Option<&OobScore> {
        self.oob.as_ref()
    }

    /// Return the ranked Mean Decrease in Impurity feature importances.
    ///
    /// # Errors
    ///
    /// [`RfError::NotFitted`] before `fit`.
    pub fn feature_importances(&self) -> Result<Vec<FeatureImportance>, RfError> {
        let forest = self.model()?;
        Ok(aggregate_importances(
            forest.trees.iter().map(RegressionTree::feature_importances),
            forest.metadata.n_features,
        ))
    }

    /// Borrow the fitted trees; empty before `fit`.
    #[must_use]
    pub fn trees(&self) -> &[RegressionTree] {
        self.forest.as_ref().map(|f| f.trees.as_slice()).unwrap_or_default()
    }

    /// Number of fitted trees; zero before `fit`.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees().len()
    }

    /// Feature width seen in training, if fitted.
    #[must_use]
    pub fn n_features(&self) -> Option<usize> {
        self.metadata().map(|m| m.n_features)
    }

    /// Return the per-tree OOB row indices; empty before `fit`.
    #[must_use]
    pub fn oob_indices_per_tree(&self) -> &[Vec<usize>] {
        self.forest.as_ref().map(|f| f.oob_indices.as_slice()).unwrap_or_default()
    }

    /// Return training metadata, if fitted.
    #[must_use]
    pub fn metadata(&self) -> Option<&TrainingMetadata> {
        self.forest.as_ref().map(|f| &f.metadata)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::config::MaxFeatures;

    /// y = 3·x0 - 2·x1 + small noise, plus two noise columns.
    fn make_regression(n: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut features = Vec::with_capacity(n);
        let mut targets = Vec::with_capacity(n);
        for _ in 0..n {
            let row: Vec<f64> = (0..4).map(|_| rng.r#gen::<f64>() * 10.0).collect();
            targets.push(3.0 * row[0] - 2.0 * row[1] + rng.r#gen::<f64>() * 0.5);
            features.push(row);
        }
        (features, targets)
    }

    #[test]
    fn predict_before_fit_is_not_fitted() {
        let model = RandomForestRegressor::new(RandomForestConfig::new(3).unwrap());
        assert!(!model.is_fitted());
        assert!(matches!(model.predict(&[vec![1.0]]), Err(RfError::NotFitted)));
        assert!(matches!(model.predict_one(&[1.0]), Err(RfError::NotFitted)));
        assert!(matches!(
            model.score(&[vec![1.0]], &[1.0]),
            Err(RfError::NotFitted)
        ));
        assert!(model.trees().is_empty());
    }

    #[test]
    fn fits_linear_signal() {
        let (features, targets) = make_regression(200, 1);
        let model = RandomForestConfig::new(20)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .fit_regressor(&features, &targets)
            .unwrap();
        let r2 = model.score(&features, &targets).unwrap();
        assert!(r2 > 0.9, "training r2 = {r2}");
        assert_eq!(model.trees().len(), 20);
    }

    #[test]
    fn constant_targets_predict_constant() {
        let features: Vec<Vec<f64>> = (0..25).map(|i| vec![i as f64, (i * 3 % 7) as f64]).collect();
        let targets = vec![4.25; 25];
        let model = RandomForestConfig::new(5)
            .unwrap()
            .fit_regressor(&features, &targets)
            .unwrap();
        for p in model.predict(&features).unwrap() {
            assert!((p - 4.25).abs() < 1e-12);
        }
        assert!(model.trees().iter().all(|t| t.n_nodes() == 1));
    }

    #[test]
    fn single_leaf_forest_returns_leaf_value() {
        // min_samples_leaf above the row count forces a root leaf, whose
        // value is the mean of that tree's bootstrap.
        let features = vec![vec![0.0], vec![1.0], vec![2.0]];
        let targets = [1.0, 2.0, 6.0];
        let model = RandomForestConfig::new(1)
            .unwrap()
            .with_min_samples_leaf(10)
            .fit_regressor(&features, &targets)
            .unwrap();
        let tree = &model.trees()[0];
        assert_eq!(tree.n_nodes(), 1);
        let leaf_value = tree.predict(&[0.0]).unwrap();
        for sample in [[-5.0], [1.5], [99.0]] {
            assert_eq!(model.predict_one(&sample).unwrap().to_bits(), leaf_value.to_bits());
        }
    }

    #[test]
    fn refit_replaces_previous_model() {
        let (features, targets) = make_regression(60, 2);
        let mut model = RandomForestRegressor::new(RandomForestConfig::new(4).unwrap());
        model.fit(&features, &targets).unwrap();
        assert!(model.is_fitted());

        let err = model.fit(&features, &targets[..10]).unwrap_err();
        assert!(matches!(err, RfError::TargetLengthMismatch { .. }));
        assert!(!model.is_fitted());
    }

    #[test]
    fn oob_score_only_when_enabled() {
        let (features, targets) = make_regression(150, 3);
        let base = RandomForestConfig::new(25)
            .unwrap()
            .with_max_features(MaxFeatures::Fraction(0.5));

        let without = base.fit_regressor(&features, &targets).unwrap();
        assert!(without.oob_score().is_none());

        let with = base
            .with_oob_mode(OobMode::Enabled)
            .fit_regressor(&features, &targets)
            .unwrap();
        let oob = with.oob_score().expect("OOB enabled");
        assert!(oob > 0.7, "oob r2 = {oob}");
        assert!(with.oob_report().unwrap().n_oob_samples > 140);
    }

    #[test]
    fn one_row_with_oob_still_fits() {
        let model = RandomForestConfig::new(3)
            .unwrap()
            .with_oob_mode(OobMode::Enabled)
            .fit_regressor(&[vec![1.0, 2.0]], &[5.0])
            .unwrap();
        assert!(model.oob_score().is_none());
        assert!((model.predict_one(&[0.0, 0.0]).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn importances_rank_signal_columns_first() {
        let (features, targets) = make_regression(200, 4);
        let model = RandomForestConfig::new(20)
            .unwrap()
            .with_max_features(MaxFeatures::All)
            .fit_regressor(&features, &targets)
            .unwrap();
        let ranked = model.feature_importances().unwrap();
        let top_two: Vec<usize> = ranked.iter().take(2).map(|f| f.feature.index()).collect();
        assert!(top_two.contains(&0) && top_two.contains(&1), "top two: {top_two:?}");
    }

    #[test]
    fn wrong_width_query_rejected() {
        let (features, targets) = make_regression(30, 5);
        let model = RandomForestConfig::new(2)
            .unwrap()
            .fit_regressor(&features, &targets)
            .unwrap();
        assert!(matches!(
            model.predict(&[vec![1.0, 2.0]]),
            Err(RfError::PredictionFeatureMismatch { expected: 4, got: 2 })
        ));
    }
}
