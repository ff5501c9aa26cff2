//! Classifier Engine Library
//!
//! Evaluates exported classification models (linear, random forest,
//! multi-layer perceptron) against a feature vector and returns class
//! probabilities, for a single model or an averaged ensemble.

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod scaler;
pub mod types;

pub use config::AppConfig;
pub use error::InferenceError;
pub use models::{Classifier, InferenceEngine, ModelBundle, ModelLoader, ProbabilityAggregator};
pub use scaler::Scaler;
pub use types::{EnsembleResult, ModelDocument, Prediction, PredictionReport, ProbabilityVector};
