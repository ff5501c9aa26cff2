//! Type definitions for documents and predictions

pub mod document;
pub mod prediction;

pub use document::{ModelDocument, ModelSpec, NodeSpec};
pub use prediction::{EnsembleResult, Prediction, PredictionMode, PredictionReport, ProbabilityVector};
