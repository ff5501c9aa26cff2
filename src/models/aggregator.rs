//! Probability aggregation for multi-model ensembles

use crate::error::{InferenceError, Result};
use crate::models::math;
use crate::types::prediction::ProbabilityVector;
use std::collections::HashMap;

/// Combines probability vectors from several models into one.
#[derive(Debug, Clone)]
pub struct ProbabilityAggregator {
    /// Model weights for weighted averaging
    weights: HashMap<String, f64>,
    /// Weight for models not in the weights map
    default_weight: f64,
}

impl ProbabilityAggregator {
    /// Create an aggregator with per-model weights.
    ///
    /// Every weight must be finite and non-negative.
    pub fn new(weights: HashMap<String, f64>) -> Result<Self> {
        for (model_id, weight) in &weights {
            check_weight(model_id, *weight)?;
        }
        Ok(Self {
            weights,
            default_weight: 1.0,
        })
    }

    /// Create an aggregator where every model counts the same.
    pub fn equal_weights() -> Self {
        Self {
            weights: HashMap::new(),
            default_weight: 1.0,
        }
    }

    /// Elementwise arithmetic mean.
    pub fn aggregate(vectors: &[ProbabilityVector]) -> Result<ProbabilityVector> {
        let n_classes = check_class_counts(vectors.iter())?;

        let mut mean = vec![0.0; n_classes];
        for v in vectors {
            for (m, p) in mean.iter_mut().zip(v.iter()) {
                *m += p;
            }
        }

        let n = vectors.len() as f64;
        for m in mean.iter_mut() {
            *m /= n;
        }

        Ok(ProbabilityVector::new(mean))
    }

    /// Weighted mean; weights are normalised to sum to one.
    ///
    /// With no weights configured this equals [`ProbabilityAggregator::aggregate`].
    pub fn aggregate_weighted(
        &self,
        model_probs: &[(&str, &ProbabilityVector)],
    ) -> Result<ProbabilityVector> {
        let n_classes = check_class_counts(model_probs.iter().map(|(_, v)| *v))?;

        let mut weighted = vec![0.0; n_classes];
        let mut total_weight = 0.0;

        for (model_id, probs) in model_probs {
            let weight = self.weight(model_id);
            for (w, p) in weighted.iter_mut().zip(probs.iter()) {
                *w += weight * p;
            }
            total_weight += weight;
        }

        if total_weight <= 0.0 {
            return Err(InferenceError::EmptyEnsemble);
        }

        for w in weighted.iter_mut() {
            *w /= total_weight;
        }

        Ok(ProbabilityVector::new(weighted))
    }

    /// Fraction of models whose winning class matches the mean's.
    pub fn agreement(vectors: &[ProbabilityVector]) -> Result<f64> {
        let mean = Self::aggregate(vectors)?;
        let winner = mean.argmax();
        let agreeing = vectors.iter().filter(|v| v.argmax() == winner).count();
        Ok(agreeing as f64 / vectors.len() as f64)
    }

    /// Lowest index attaining the maximum.
    pub fn argmax(vector: &ProbabilityVector) -> usize {
        math::argmax(vector)
    }

    /// Weight used for a model.
    pub fn weight(&self, model_id: &str) -> f64 {
        self.weights
            .get(model_id)
            .copied()
            .unwrap_or(self.default_weight)
    }

    /// Set weight for a specific model.
    pub fn set_weight(&mut self, model_id: &str, weight: f64) -> Result<()> {
        check_weight(model_id, weight)?;
        self.weights.insert(model_id.to_string(), weight);
        Ok(())
    }

    /// Sum of the weights `members` would receive.
    pub fn total_weight<S: AsRef<str>>(&self, members: &[S]) -> f64 {
        members.iter().map(|id| self.weight(id.as_ref())).sum()
    }

    pub fn weights(&self) -> &HashMap<String, f64> {
        &self.weights
    }
}

impl Default for ProbabilityAggregator {
    fn default() -> Self {
        Self::equal_weights()
    }
}

fn check_weight(model_id: &str, weight: f64) -> Result<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(InferenceError::schema(format!(
            "weight for model '{}' must be finite and non-negative, got {}",
            model_id, weight
        )));
    }
    Ok(())
}

/// Length shared by every vector, or the first mismatch.
fn check_class_counts<'a>(mut vectors: impl Iterator<Item = &'a ProbabilityVector>) -> Result<usize> {
    let expected = vectors.next().ok_or(InferenceError::EmptyEnsemble)?.len();

    for v in vectors {
        if v.len() != expected {
            return Err(InferenceError::InconsistentClassCount {
                expected,
                got: v.len(),
            });
        }
    }

    Ok(expected)
}
