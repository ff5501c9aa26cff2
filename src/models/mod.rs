//! Model families, the bundle that holds them, and ensemble inference

pub mod aggregator;
pub mod bundle;
pub mod forest;
pub mod inference;
pub mod linear;
pub mod loader;
pub mod math;
pub mod mlp;

pub use aggregator::ProbabilityAggregator;
pub use bundle::{Model, ModelBundle, ModelKind};
pub use inference::InferenceEngine;
pub use loader::ModelLoader;

use crate::error::Result;
use crate::types::prediction::ProbabilityVector;

/// Capability shared by every model family.
pub trait Classifier {
    /// Length of the (scaled) feature vector the model consumes
    fn n_features(&self) -> usize;

    /// Length of the probability vector the model produces
    fn n_classes(&self) -> usize;

    /// Class probabilities for one scaled feature vector.
    fn predict_proba(&self, xs: &[f64]) -> Result<ProbabilityVector>;
}
