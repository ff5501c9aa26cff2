//! Prediction output data structures

use crate::models::math;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;

/// Class probabilities produced by a single model or an ensemble.
///
/// Entries are non-negative and sum to one within floating-point tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbabilityVector(Vec<f64>);

impl ProbabilityVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Index of the most probable class (first maximum wins).
    pub fn argmax(&self) -> usize {
        math::argmax(&self.0)
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl Deref for ProbabilityVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for ProbabilityVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Averaged probabilities plus the models that produced them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleResult {
    pub probabilities: ProbabilityVector,
    pub contributors: Vec<String>,
}

/// Strategy label recorded on a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMode {
    Single,
    Ensemble,
}

/// Outcome of a prediction, resolved against the bundle's class names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Final probability vector (single model or ensemble mean)
    pub probabilities: ProbabilityVector,
    /// Winning class index
    pub class_index: usize,
    /// Winning class name
    pub class_name: String,
    /// Models that contributed to `probabilities`
    pub contributors: Vec<String>,
    /// Per-model probabilities, keyed by model id
    pub model_probabilities: BTreeMap<String, ProbabilityVector>,
    pub mode: PredictionMode,
}

/// JSON record written for every scored feature row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionReport {
    /// Unique report identifier
    pub prediction_id: String,

    /// Row number within the input stream
    pub row: u64,

    pub mode: PredictionMode,

    /// Winning class
    pub class_name: String,
    pub class_index: usize,

    /// Class name -> probability
    pub probabilities: BTreeMap<String, f64>,

    /// Model id -> (class name -> probability)
    pub model_probabilities: BTreeMap<String, BTreeMap<String, f64>>,

    pub contributors: Vec<String>,

    /// Report generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl PredictionReport {
    /// Build a report from a prediction, labelling probabilities by class name.
    pub fn new(row: u64, prediction: &Prediction, class_names: &[String]) -> Self {
        let label = |probs: &ProbabilityVector| -> BTreeMap<String, f64> {
            class_names
                .iter()
                .cloned()
                .zip(probs.iter().copied())
                .collect()
        };

        Self {
            prediction_id: uuid::Uuid::new_v4().to_string(),
            row,
            mode: prediction.mode,
            class_name: prediction.class_name.clone(),
            class_index: prediction.class_index,
            probabilities: label(&prediction.probabilities),
            model_probabilities: prediction
                .model_probabilities
                .iter()
                .map(|(id, probs)| (id.clone(), label(probs)))
                .collect(),
            contributors: prediction.contributors.clone(),
            timestamp: Utc::now(),
        }
    }
}
