//! Multi-model inference engine

use crate::config::{AppConfig, InferenceStrategy};
use crate::error::{InferenceError, Result};
use crate::models::aggregator::ProbabilityAggregator;
use crate::models::bundle::ModelBundle;
use crate::types::prediction::{Prediction, PredictionMode, ProbabilityVector};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Inference engine over a shared, read-only model bundle
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    /// Validated models, scaler and class names
    bundle: Arc<ModelBundle>,
    /// Combines member probabilities for the ensemble strategy
    aggregator: ProbabilityAggregator,
    /// Inference strategy: primary model or ensemble
    strategy: InferenceStrategy,
    /// Model used by the primary strategy
    primary_model: String,
    /// Models averaged by the ensemble strategy
    ensemble_members: Vec<String>,
}

impl InferenceEngine {
    /// Create an inference engine from configuration
    pub fn new(bundle: Arc<ModelBundle>, config: &AppConfig) -> Result<Self> {
        let engine = Self::with_strategy(
            bundle,
            config.models.strategy,
            &config.models.primary_model,
            config.models.ensemble_members.clone(),
            ProbabilityAggregator::new(config.models.weights.clone())?,
        )?;

        info!(
            strategy = ?engine.strategy,
            primary_model = %engine.primary_model,
            members = ?engine.ensemble_members,
            "Inference engine initialized"
        );

        Ok(engine)
    }

    /// Create an engine; an empty member list means every model in the bundle.
    ///
    /// The primary model, every member and every weighted model must exist
    /// in the bundle, and an ensemble needs a positive total weight.
    pub fn with_strategy(
        bundle: Arc<ModelBundle>,
        strategy: InferenceStrategy,
        primary_model: &str,
        ensemble_members: Vec<String>,
        aggregator: ProbabilityAggregator,
    ) -> Result<Self> {
        let ensemble_members = if ensemble_members.is_empty() {
            bundle.model_ids()
        } else {
            ensemble_members
        };

        if ensemble_members.is_empty() {
            return Err(InferenceError::EmptyEnsemble);
        }

        match strategy {
            InferenceStrategy::Primary => {
                bundle.model(primary_model)?;
            }
            InferenceStrategy::Ensemble => {
                for member in &ensemble_members {
                    bundle.model(member)?;
                }
                if aggregator.total_weight(ensemble_members.as_slice()) <= 0.0 {
                    return Err(InferenceError::schema(format!(
                        "ensemble members {:?} all have zero weight",
                        ensemble_members
                    )));
                }
            }
        }

        for model_id in aggregator.weights().keys() {
            bundle.model(model_id)?;
        }

        Ok(Self {
            bundle,
            aggregator,
            strategy,
            primary_model: primary_model.to_string(),
            ensemble_members,
        })
    }

    /// Engine running only `model_id`
    pub fn primary(bundle: Arc<ModelBundle>, model_id: &str) -> Result<Self> {
        Self::with_strategy(
            bundle,
            InferenceStrategy::Primary,
            model_id,
            Vec::new(),
            ProbabilityAggregator::equal_weights(),
        )
    }

    /// Engine averaging `members` (all models when empty) with equal weights
    pub fn ensemble(bundle: Arc<ModelBundle>, members: Vec<String>) -> Result<Self> {
        let primary = members
            .first()
            .cloned()
            .or_else(|| bundle.model_ids().into_iter().next())
            .unwrap_or_default();

        Self::with_strategy(
            bundle,
            InferenceStrategy::Ensemble,
            &primary,
            members,
            ProbabilityAggregator::equal_weights(),
        )
    }

    pub fn strategy(&self) -> InferenceStrategy {
        self.strategy
    }

    pub fn bundle(&self) -> &Arc<ModelBundle> {
        &self.bundle
    }

    pub fn ensemble_members(&self) -> &[String] {
        &self.ensemble_members
    }

    /// Get the number of loaded models
    pub fn model_count(&self) -> usize {
        self.bundle.len()
    }

    /// Get loaded model names
    pub fn model_names(&self) -> Vec<String> {
        self.bundle.model_ids()
    }

    /// Run inference on a raw feature vector using the configured strategy
    pub fn predict(&self, raw: &[f64]) -> Result<Prediction> {
        let scaled = self.bundle.scaler().normalize(raw)?;

        match self.strategy {
            InferenceStrategy::Primary => self.predict_scaled(&self.primary_model, &scaled),
            InferenceStrategy::Ensemble => self.ensemble_scaled(&scaled),
        }
    }

    /// Run a single named model on a raw feature vector
    pub fn predict_model(&self, model_id: &str, raw: &[f64]) -> Result<Prediction> {
        let scaled = self.bundle.scaler().normalize(raw)?;
        self.predict_scaled(model_id, &scaled)
    }

    /// Run every ensemble member on a raw feature vector and combine them
    pub fn predict_ensemble(&self, raw: &[f64]) -> Result<Prediction> {
        let scaled = self.bundle.scaler().normalize(raw)?;
        self.ensemble_scaled(&scaled)
    }

    /// Run inference on a batch of feature vectors in parallel.
    ///
    /// Results are returned in input order.
    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Vec<Result<Prediction>> {
        rows.par_iter().map(|row| self.predict(row)).collect()
    }

    fn predict_scaled(&self, model_id: &str, scaled: &[f64]) -> Result<Prediction> {
        let probabilities = self.bundle.predict_with_model(model_id, scaled)?;

        let mut model_probabilities = BTreeMap::new();
        model_probabilities.insert(model_id.to_string(), probabilities.clone());

        debug!(model = %model_id, probabilities = ?probabilities, "Single model inference complete");

        Ok(self.resolve(
            probabilities,
            vec![model_id.to_string()],
            model_probabilities,
            PredictionMode::Single,
        ))
    }

    fn ensemble_scaled(&self, scaled: &[f64]) -> Result<Prediction> {
        let mut model_probabilities = BTreeMap::new();
        for member in &self.ensemble_members {
            let probs = self.bundle.predict_with_model(member, scaled)?;
            model_probabilities.insert(member.clone(), probs);
        }

        let weighted: Vec<(&str, &ProbabilityVector)> = self
            .ensemble_members
            .iter()
            .filter_map(|id| model_probabilities.get(id).map(|p| (id.as_str(), p)))
            .collect();
        let probabilities = self.aggregator.aggregate_weighted(&weighted)?;

        debug!(
            strategy = "ensemble",
            probabilities = ?probabilities,
            members = self.ensemble_members.len(),
            "Ensemble inference complete"
        );

        Ok(self.resolve(
            probabilities,
            self.ensemble_members.clone(),
            model_probabilities,
            PredictionMode::Ensemble,
        ))
    }

    fn resolve(
        &self,
        probabilities: ProbabilityVector,
        contributors: Vec<String>,
        model_probabilities: BTreeMap<String, ProbabilityVector>,
        mode: PredictionMode,
    ) -> Prediction {
        let class_index = probabilities.argmax();
        let class_name = self
            .bundle
            .class_name(class_index)
            .unwrap_or_default()
            .to_string();

        Prediction {
            probabilities,
            class_index,
            class_name,
            contributors,
            model_probabilities,
            mode,
        }
    }

    /// Per-model weights used by the ensemble
    pub fn weights(&self) -> HashMap<String, f64> {
        self.ensemble_members
            .iter()
            .map(|id| (id.clone(), self.aggregator.weight(id)))
            .collect()
    }
}
