/// Broad category of an [`RfError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The feature matrix or target vector has an unusable shape or value.
    InputShape,
    /// A configuration parameter is out of range.
    InvalidConfig,
    /// `predict`/`score` was called on an estimator that has not been fitted.
    NotFitted,
    /// Out-of-bag evaluation could not be carried out.
    Evaluation,
    /// A deserialized model is internally inconsistent.
    InvalidModel,
}

/// Errors from Random Forest operations.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when min_samples_leaf is zero.
    #[error("min_samples_leaf must be at least 1, got {min_samples_leaf}")]
    InvalidMinSamplesLeaf {
        /// The invalid min_samples_leaf value provided.
        min_samples_leaf: usize,
    },

    /// Returned when a max_features fraction is not in (0.0, 1.0].
    #[error("max_features fraction must be in (0.0, 1.0], got {fraction}")]
    InvalidMaxFraction {
        /// The invalid fraction provided.
        fraction: f64,
    },

    /// Returned when max_features resolves to 0 or exceeds n_features.
    #[error("max_features resolved to {max_features}, but must be in [1, {n_features}]")]
    InvalidMaxFeatures {
        /// The resolved max_features value.
        max_features: usize,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when bootstrap_fraction is not in (0.0, 1.0].
    #[error("bootstrap_fraction must be in (0.0, 1.0], got {fraction}")]
    InvalidBootstrapFraction {
        /// The invalid bootstrap_fraction value provided.
        fraction: f64,
    },

    /// Returned when the training dataset has zero samples.
    #[error("dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a sample has a different number of features than expected.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when the target vector length differs from the row count.
    #[error("feature matrix has {n_rows} rows but target vector has {n_targets} values")]
    TargetLengthMismatch {
        /// Number of rows in the feature matrix.
        n_rows: usize,
        /// Number of target values.
        n_targets: usize,
    },

    /// Returned when a feature value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when a regression target is NaN or infinite.
    #[error("non-finite target at sample {sample_index}")]
    NonFiniteTarget {
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a sample has a different number of features at prediction time.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when a label is not one of the classes seen in training.
    #[error("class label {label} is not one of the {n_classes} known classes")]
    UnknownClassLabel {
        /// The offending label.
        label: usize,
        /// Number of classes known to the model.
        n_classes: usize,
    },

    /// Returned when predicting or scoring before `fit`.
    #[error("estimator has not been fitted; call fit first")]
    NotFitted,

    /// Returned when OOB evaluation fails (no sample has any OOB tree).
    #[error("OOB evaluation failed: {reason}")]
    OobEvaluationFailed {
        /// Human-readable description of why OOB evaluation failed.
        reason: String,
    },

    /// Returned when a deserialized tree or forest fails its structural checks.
    #[error("invalid model: {reason}")]
    InvalidModel {
        /// Which check failed.
        reason: String,
    },
}

impl RfError {
    /// Return the category this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RfError::InvalidTreeCount { .. }
            | RfError::InvalidMaxDepth { .. }
            | RfError::InvalidMinSamplesLeaf { .. }
            | RfError::InvalidMaxFraction { .. }
            | RfError::InvalidMaxFeatures { .. }
            | RfError::InvalidBootstrapFraction { .. } => ErrorKind::InvalidConfig,
            RfError::EmptyDataset
            | RfError::ZeroFeatures
            | RfError::FeatureCountMismatch { .. }
            | RfError::TargetLengthMismatch { .. }
            | RfError::NonFiniteValue { .. }
            | RfError::NonFiniteTarget { .. }
            | RfError::PredictionFeatureMismatch { .. }
            | RfError::UnknownClassLabel { .. } => ErrorKind::InputShape,
            RfError::NotFitted => ErrorKind::NotFitted,
            RfError::OobEvaluationFailed { .. } => ErrorKind::Evaluation,
            RfError::InvalidModel { .. } => ErrorKind::InvalidModel,
        }
    }
}
