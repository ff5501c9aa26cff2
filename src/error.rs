//! Error taxonomy for model loading and inference

/// Errors produced while building a model bundle or running a prediction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    /// Malformed or dimensionally inconsistent model document
    #[error("schema error: {detail}")]
    Schema { detail: String },

    /// Caller supplied a feature vector of the wrong length
    #[error("dimension mismatch: expected {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A scaler entry would divide by zero (or is not a finite number)
    #[error("invalid scaler: scale[{index}] = {value}")]
    InvalidScaler { index: usize, value: f64 },

    /// Cyclic or out-of-range tree structure
    #[error("malformed tree {tree}: {detail}")]
    MalformedTree { tree: usize, detail: String },

    /// A tree ensemble without trees, or an aggregation over nothing
    #[error("ensemble contains no members")]
    EmptyEnsemble,

    #[error("model not found: {model_id}")]
    ModelNotFound { model_id: String },

    /// Probability vectors of differing length were combined
    #[error("inconsistent class count: expected {expected}, got {got}")]
    InconsistentClassCount { expected: usize, got: usize },
}

impl InferenceError {
    pub(crate) fn schema(detail: impl Into<String>) -> Self {
        Self::Schema {
            detail: detail.into(),
        }
    }

    pub(crate) fn malformed_tree(tree: usize, detail: impl Into<String>) -> Self {
        Self::MalformedTree {
            tree,
            detail: detail.into(),
        }
    }

    /// Stable label for log fields and metric buckets.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "schema",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::InvalidScaler { .. } => "invalid_scaler",
            Self::MalformedTree { .. } => "malformed_tree",
            Self::EmptyEnsemble => "empty_ensemble",
            Self::ModelNotFound { .. } => "model_not_found",
            Self::InconsistentClassCount { .. } => "inconsistent_class_count",
        }
    }

    /// Whether the caller can succeed by changing its request.
    ///
    /// Load-time errors describe a corrupt model document and are fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. }
                | Self::ModelNotFound { .. }
                | Self::InconsistentClassCount { .. }
        )
    }
}

pub type Result<T, E = InferenceError> = std::result::Result<T, E>;
