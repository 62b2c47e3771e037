//! Random Forest classifier: pooled leaf class counts across trees.

use tracing::{info, instrument, warn};

use crate::config::{OobMode, RandomForestConfig};
use crate::confusion::ConfusionMatrix;
use crate::criterion::{ClassHistogram, Classification};
use crate::error::RfError;
use crate::forest::{Forest, TrainingMetadata, train};
use crate::importance::{FeatureImportance, aggregate_importances};
use crate::labels::{EncodedLabels, is_class_set, position_of};
use crate::matrix::{FeatureMatrix, check_target_len};
use crate::metrics::accuracy;
use crate::oob::{OobScore, oob_classification};
use crate::predict::ClassDistribution;
use crate::tree::ClassificationTree;

/// A Random Forest for integer class labels.
///
/// The classes are the distinct training labels in ascending order; trees
/// count them by position, so sparse or very large labels cost nothing
/// extra. Each tree's leaf contributes its raw class counts; the forest
/// predicts the class with the largest pooled count, breaking ties toward
/// the smallest label.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "ClassifierParts")]
pub struct RandomForestClassifier {
    config: RandomForestConfig,
    forest: Option<Forest<ClassHistogram>>,
    classes: Vec<usize>,
    oob: Option<OobScore>,
}

#[derive(serde::Deserialize)]
struct ClassifierParts {
    config: RandomForestConfig,
    forest: Option<Forest<ClassHistogram>>,
    classes: Vec<usize>,
    oob: Option<OobScore>,
}

impl TryFrom<ClassifierParts> for RandomForestClassifier {
    type Error = RfError;

    fn try_from(parts: ClassifierParts) -> Result<Self, RfError> {
        if let Some(forest) = &parts.forest {
            if !is_class_set(&parts.classes) {
                return Err(RfError::InvalidModel {
                    reason: "classes must be non-empty and strictly ascending".into(),
                });
            }
            for tree in &forest.trees {
                tree.check_classes()?;
                if tree.classes() != parts.classes.as_slice() {
                    return Err(RfError::InvalidModel {
                        reason: "a tree's classes differ from the forest's".into(),
                    });
                }
            }
        }
        Ok(Self {
            config: parts.config,
            forest: parts.forest,
            classes: parts.classes,
            oob: parts.oob,
        })
    }
}

impl RandomForestClassifier {
    /// Create an unfitted classifier.
    #[must_use]
    pub fn new(config: RandomForestConfig) -> Self {
        Self {
            config,
            forest: None,
            classes: Vec::new(),
            oob: None,
        }
    }

    /// Return the training configuration.
    #[must_use]
    pub fn config(&self) -> &RandomForestConfig {
        &self.config
    }

    /// Fit the forest on row-major `features` and class `labels`.
    ///
    /// Previously fitted trees are discarded first. An OOB evaluation that
    /// finds no covered rows is logged and leaves
    /// [`oob_score`](Self::oob_score) as `None`.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                                             |
    /// |---------------------------------------|--------------------------------------------------|
    /// | [`RfError::EmptyDataset`]             | `features` is empty                              |
    /// | [`RfError::ZeroFeatures`]             | rows have zero feature columns                   |
    /// | [`RfError::FeatureCountMismatch`]     | rows have inconsistent lengths                   |
    /// | [`RfError::NonFiniteValue`]           | any feature value is NaN or infinite             |
    /// | [`RfError::TargetLengthMismatch`]     | `labels.len() != features.len()`                 |
    /// | [`RfError::InvalidMinSamplesLeaf`]    | `min_samples_leaf` is zero                       |
    /// | [`RfError::InvalidMaxDepth`]          | `max_depth` is `Some(0)`                         |
    /// | [`RfError::InvalidMaxFraction`]       | max_features fraction outside (0, 1]             |
    /// | [`RfError::InvalidMaxFeatures`]       | max_features resolves outside [1, n_features]    |
    /// | [`RfError::InvalidBootstrapFraction`] | bootstrap_fraction is not in (0, 1]              |
    #[instrument(skip_all, fields(n_trees = self.config.n_trees, n_samples = features.len()))]
    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[usize]) -> Result<&mut Self, RfError> {
        self.forest = None;
        self.classes.clear();
        self.oob = None;

        let matrix = FeatureMatrix::from_rows(features)?;
        check_target_len(matrix.n_samples(), labels.len())?;

        let encoded = EncodedLabels::new(labels);
        let n_classes = encoded.classes.len();
        let criterion = Classification {
            criterion: self.config.criterion,
            classes: &encoded.classes,
        };
        let forest = train(&self.config, &criterion, &matrix, &encoded.positions)?;

        let oob = match self.config.oob_mode {
            OobMode::Enabled => match oob_classification(
                &forest,
                &matrix,
                &encoded.positions,
                n_classes,
            ) {
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
            n_classes,
            oob_accuracy = oob.as_ref().map(|s| s.score),
            "random forest classifier trained"
        );

        self.forest = Some(forest);
        self.classes = encoded.classes;
        self.oob = oob;
        Ok(self)
    }

    /// Return `true` once [`fit`](Self::fit) has succeeded.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.forest.is_some()
    }

    fn model(&self) -> Result<&Forest<ClassHistogram>, RfError> {
        self.forest.as_ref().ok_or(RfError::NotFitted)
    }

    /// Number of distinct labels seen in training, if fitted.
    #[must_use]
    pub fn n_classes(&self) -> Option<usize> {
        self.forest.as_ref().map(|_| self.classes.len())
    }

    /// Distinct training labels in ascending order; empty before `fit`.
    ///
    /// This is the order of [`ClassDistribution::as_slice`] and of the rows
    /// and columns of every confusion matrix the classifier returns.
    #[must_use]
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    /// Label with the largest pooled count for an already checked sample.
    fn vote_label(&self, forest: &Forest<ClassHistogram>, sample: &[f64]) -> usize {
        self.classes[forest.vote(sample, self.classes.len())]
    }

    fn distribution(&self, forest: &Forest<ClassHistogram>, sample: &[f64]) -> ClassDistribution {
        ClassDistribution::from_counts(
            &forest.pooled_counts(sample, self.classes.len()),
            &self.classes,
        )
    }

    /// Predict the class label for a single sample.
    ///
    /// # Errors
    ///
    /// [`RfError::NotFitted`] before `fit`; [`RfError::PredictionFeatureMismatch`]
    /// when `sample.len()` differs from the training width.
    pub fn predict_one(&self, sample: &[f64]) -> Result<usize, RfError> {
        let forest = self.model()?;
        forest.check_sample(sample)?;
        Ok(self.vote_label(forest, sample))
    }

    /// Predict class labels for a batch of row-major samples in parallel.
    ///
    /// # Errors
    ///
    /// [`RfError::NotFitted`] before `fit`; [`RfError::PredictionFeatureMismatch`]
    /// if any sample has the wrong feature count.
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, RfError> {
        let forest = self.model()?;
        forest.map_rows(features, |sample| self.vote_label(forest, sample))
    }

    /// Pooled class distribution for a single sample.
    ///
    /// # Errors
    ///
    /// Same as [`predict_one`](Self::predict_one).
    pub fn predict_proba_one(&self, sample: &[f64]) -> Result<ClassDistribution, RfError> {
        let forest = self.model()?;
        forest.check_sample(sample)?;
        Ok(self.distribution(forest, sample))
    }

    /// Pooled class distributions for a batch of samples.
    ///
    /// # Errors
    ///
    /// Same as [`predict`](Self::predict).
    pub fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<ClassDistribution>, RfError> {
        let forest = self.model()?;
        forest.map_rows(features, |sample| self.distribution(forest, sample))
    }

    /// Fraction of `features` whose predicted label equals `labels`.
    ///
    /// Labels the forest never saw in training simply count as misses.
    ///
    /// # Errors
    ///
    /// [`RfError::NotFitted`] before `fit`; [`RfError::TargetLengthMismatch`]
    /// when the lengths disagree; [`RfError::EmptyDataset`] for no rows;
    /// [`RfError::PredictionFeatureMismatch`] for a row of the wrong width.
    pub fn score(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<f64, RfError> {
        self.model()?;
        check_target_len(features.len(), labels.len())?;
        let predictions = self.predict(features)?;
        accuracy(labels, &predictions)
    }

    /// Confusion matrix of the predictions on `features` against `labels`.
    ///
    /// Row and column `i` stand for [`classes()[i]`](Self::classes).
    ///
    /// # Errors
    ///
    /// As for [`score`](Self::score), plus [`RfError::UnknownClassLabel`] when a
    /// label is outside the training label set.
    pub fn confusion_matrix(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<ConfusionMatrix, RfError> {
        let forest = self.model()?;
        check_target_len(features.len(), labels.len())?;
        let truth = labels
            .iter()
            .map(|&label| position_of(&self.classes, label))
            .collect::<Result<Vec<_>, _>>()?;
        let n_classes = self.classes.len();
        let predictions = forest.map_rows(features, |sample| forest.vote(sample, n_classes))?;
        ConfusionMatrix::from_labels(&truth, &predictions, n_classes)
    }

    /// Return the OOB accuracy, when OOB evaluation was enabled and possible.
    #[must_use]
    pub fn oob_score(&self) -> Option<f64> {
        self.oob.as_ref().map(|s| s.score)
    }

    /// Return the full OOB evaluation result, including its confusion matrix
    /// (indexed like [`classes`](Self::classes)).
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
            forest.trees.iter().map(ClassificationTree::feature_importances),
            forest.metadata.n_features,
        ))
    }

    /// Borrow the fitted trees; empty before `fit`.
    #[must_use]
    pub fn trees(&self) -> &[ClassificationTree] {
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
