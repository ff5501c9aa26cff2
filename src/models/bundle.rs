//! Validated, immutable collection of models sharing one scaler

use crate::error::{InferenceError, Result};
use crate::models::aggregator::ProbabilityAggregator;
use crate::models::forest::{Tree, TreeEnsemble};
use crate::models::linear::LinearModel;
use crate::models::mlp::FeedForward;
use crate::models::Classifier;
use crate::scaler::Scaler;
use crate::types::document::{ModelDocument, ModelSpec};
use crate::types::prediction::{EnsembleResult, ProbabilityVector};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Variant tag, matching the document's `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Linear,
    Rf,
    Mlp,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linear => "linear",
            Self::Rf => "rf",
            Self::Mlp => "mlp",
        };
        f.write_str(name)
    }
}

/// One of the supported model families
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
    FeedForward(FeedForward),
}

impl Model {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Linear(_) => ModelKind::Linear,
            Self::TreeEnsemble(_) => ModelKind::Rf,
            Self::FeedForward(_) => ModelKind::Mlp,
        }
    }

    /// Build a model from its document record.
    fn from_spec(spec: ModelSpec, n_features: usize, n_classes: usize) -> Result<Self> {
        match spec {
            ModelSpec::Linear { coef, intercept } => {
                LinearModel::try_new(coef, intercept).map(Self::Linear)
            }
            ModelSpec::Rf {
                n_classes: declared,
                trees,
            } => {
                if let Some(declared) = declared {
                    if declared != n_classes {
                        return Err(InferenceError::schema(format!(
                            "n_classes is {} but the document lists {} classes",
                            declared, n_classes
                        )));
                    }
                }
                let trees = trees
                    .iter()
                    .enumerate()
                    .map(|(i, nodes)| Tree::from_specs(i, nodes, n_features, n_classes))
                    .collect::<Result<Vec<_>>>()?;
                TreeEnsemble::try_new(trees, n_features, n_classes).map(Self::TreeEnsemble)
            }
            ModelSpec::Mlp {
                coefs,
                intercepts,
                activation,
            } => FeedForward::from_parts(coefs, intercepts, activation.as_deref())
                .map(Self::FeedForward),
        }
    }

    fn as_classifier(&self) -> &dyn Classifier {
        match self {
            Self::Linear(m) => m,
            Self::TreeEnsemble(m) => m,
            Self::FeedForward(m) => m,
        }
    }
}

impl Classifier for Model {
    fn n_features(&self) -> usize {
        self.as_classifier().n_features()
    }

    fn n_classes(&self) -> usize {
        self.as_classifier().n_classes()
    }

    fn predict_proba(&self, xs: &[f64]) -> Result<ProbabilityVector> {
        self.as_classifier().predict_proba(xs)
    }
}

/// Scaler, class metadata and models, validated once and then read-only.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    scaler: Scaler,
    class_names: Vec<String>,
    feature_names: Option<Vec<String>>,
    models: BTreeMap<String, Model>,
}

impl ModelBundle {
    /// Validate a document and construct the bundle.
    ///
    /// Every model must consume `F = len(scaler_mean)` features and produce
    /// `C = len(class_names)` probabilities.
    pub fn build(document: ModelDocument) -> Result<Self> {
        let ModelDocument {
            feature_names,
            class_names,
            scaler_mean,
            scaler_scale,
            models: specs,
        } = document;

        let scaler = Scaler::new(scaler_mean, scaler_scale)?;
        let n_features = scaler.feature_count();
        let n_classes = class_names.len();

        if n_features == 0 {
            return Err(InferenceError::schema("document declares no features"));
        }
        if n_classes < 2 {
            return Err(InferenceError::schema(format!(
                "at least two classes are required, got {}",
                n_classes
            )));
        }
        if let Some(names) = &feature_names {
            if names.len() != n_features {
                return Err(InferenceError::schema(format!(
                    "{} feature names for {} scaler entries",
                    names.len(),
                    n_features
                )));
            }
        }

        let mut models = BTreeMap::new();
        for (model_id, spec) in specs {
            let model = Model::from_spec(spec, n_features, n_classes).map_err(|e| match e {
                InferenceError::Schema { detail } => {
                    InferenceError::schema(format!("model '{}': {}", model_id, detail))
                }
                other => other,
            })?;

            if model.n_features() != n_features {
                return Err(InferenceError::schema(format!(
                    "model '{}' expects {} features, scaler has {}",
                    model_id,
                    model.n_features(),
                    n_features
                )));
            }
            if model.n_classes() != n_classes {
                return Err(InferenceError::schema(format!(
                    "model '{}' outputs {} classes, document has {}",
                    model_id,
                    model.n_classes(),
                    n_classes
                )));
            }

            debug!(model = %model_id, kind = %model.kind(), "Model validated");
            models.insert(model_id, model);
        }

        Ok(Self {
            scaler,
            class_names,
            feature_names,
            models,
        })
    }

    /// Route already-scaled features to the named model.
    pub fn predict_with_model(&self, model_id: &str, scaled: &[f64]) -> Result<ProbabilityVector> {
        let model = self.model(model_id)?;

        match model {
            Model::Linear(m) => m.predict_proba(scaled),
            Model::TreeEnsemble(m) => m.predict_proba(scaled),
            Model::FeedForward(m) => m.predict_proba(scaled),
        }
    }

    /// Scale raw features then predict with the named model.
    pub fn predict_raw(&self, model_id: &str, raw: &[f64]) -> Result<ProbabilityVector> {
        let scaled = self.scaler.normalize(raw)?;
        self.predict_with_model(model_id, &scaled)
    }

    /// Average the probabilities of several models over scaled features.
    pub fn predict_ensemble<S: AsRef<str>>(
        &self,
        model_ids: &[S],
        scaled: &[f64],
    ) -> Result<EnsembleResult> {
        let vectors = model_ids
            .iter()
            .map(|id| self.predict_with_model(id.as_ref(), scaled))
            .collect::<Result<Vec<_>>>()?;

        Ok(EnsembleResult {
            probabilities: ProbabilityAggregator::aggregate(&vectors)?,
            contributors: model_ids.iter().map(|id| id.as_ref().to_string()).collect(),
        })
    }

    pub fn model(&self, model_id: &str) -> Result<&Model> {
        self.models
            .get(model_id)
            .ok_or_else(|| InferenceError::ModelNotFound {
                model_id: model_id.to_string(),
            })
    }

    /// Model ids in sorted order.
    pub fn model_ids(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn models(&self) -> impl Iterator<Item = (&str, &Model)> {
        self.models.iter().map(|(id, m)| (id.as_str(), m))
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn class_name(&self, index: usize) -> Option<&str> {
        self.class_names.get(index).map(String::as_str)
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    pub fn n_features(&self) -> usize {
        self.scaler.feature_count()
    }

    pub fn n_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    fn document(models: serde_json::Value) -> ModelDocument {
        serde_json::from_value(json!({
            "feature_names": ["f0", "f1"],
            "class_names": ["neg", "pos"],
            "scaler_mean": [1.0, 0.0],
            "scaler_scale": [2.0, 1.0],
            "models": models,
        }))
        .unwrap()
    }

    fn sample_bundle() -> ModelBundle {
        ModelBundle::build(document(json!({
            "logistic": {"type": "linear", "coef": [[1.0, 0.0]], "intercept": [0.0]},
            "forest": {"type": "rf", "trees": [[
                {"left": 1, "right": 2, "feature": 0, "threshold": 0.0, "value": [2.0, 2.0]},
                {"left": -1, "right": -1, "feature": -2, "threshold": -2.0, "value": [4.0, 0.0]},
                {"left": -1, "right": -1, "feature": -2, "threshold": -2.0, "value": [0.0, 4.0]}
            ]]},
            "mlp": {"type": "mlp", "coefs": [[[1.0, 0.0], [0.0, 1.0]]], "intercepts": [[0.0, 0.0]], "activation": "relu"}
        })))
        .unwrap()
    }

    #[test]
    fn test_build_and_dispatch() {
        let bundle = sample_bundle();

        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.model_ids(), vec!["forest", "logistic", "mlp"]);
        assert_eq!(bundle.model("forest").unwrap().kind(), ModelKind::Rf);
        assert_eq!(bundle.class_name(1), Some("pos"));

        let probs = bundle.predict_with_model("forest", &[-0.5, 0.0]).unwrap();
        assert_eq!(probs.as_slice(), &[1.0, 0.0]);

        let probs = bundle.predict_with_model("logistic", &[1.0, 0.0]).unwrap();
        assert_abs_diff_eq!(probs[0], 0.8808, epsilon = 1e-4);
    }

    #[test]
    fn test_predict_raw_scales_first() {
        let bundle = sample_bundle();

        // raw 3.0 scales to (3 - 1) / 2 = 1.0
        let from_raw = bundle.predict_raw("logistic", &[3.0, 5.0]).unwrap();
        let from_scaled = bundle.predict_with_model("logistic", &[1.0, 5.0]).unwrap();
        assert_eq!(from_raw, from_scaled);
    }

    #[test]
    fn test_model_not_found() {
        let bundle = sample_bundle();
        let err = bundle.predict_with_model("knn", &[0.0, 0.0]).unwrap_err();

        assert_eq!(
            err,
            InferenceError::ModelNotFound {
                model_id: "knn".to_string()
            }
        );
    }

    #[test]
    fn test_predict_ensemble() {
        let bundle = sample_bundle();
        let result = bundle
            .predict_ensemble(&["forest", "logistic"], &[1.0, 0.0])
            .unwrap();

        let forest = bundle.predict_with_model("forest", &[1.0, 0.0]).unwrap();
        let logistic = bundle.predict_with_model("logistic", &[1.0, 0.0]).unwrap();

        assert_eq!(result.contributors, vec!["forest", "logistic"]);
        assert_abs_diff_eq!(
            result.probabilities[1],
            (forest[1] + logistic[1]) / 2.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_class_count_mismatch_rejected() {
        let err = ModelBundle::build(document(json!({
            "logistic": {"type": "linear", "coef": [[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]], "intercept": [0.0, 0.0, 0.0]}
        })))
        .unwrap_err();

        assert_eq!(err.kind(), "schema");
        assert!(err.to_string().contains("logistic"));
    }

    #[test]
    fn test_feature_count_mismatch_rejected() {
        let err = ModelBundle::build(document(json!({
            "mlp": {"type": "mlp", "coefs": [[[1.0, 0.0]]], "intercepts": [[0.0, 0.0]]}
        })))
        .unwrap_err();

        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn test_declared_n_classes_checked() {
        let err = ModelBundle::build(document(json!({
            "forest": {"type": "rf", "n_classes": 3, "trees": [[
                {"left": -1, "right": -1, "feature": -2, "threshold": -2.0, "value": [1.0, 1.0]}
            ]]}
        })))
        .unwrap_err();

        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn test_empty_forest_rejected() {
        let err = ModelBundle::build(document(json!({
            "forest": {"type": "rf", "trees": []}
        })))
        .unwrap_err();

        assert_eq!(err, InferenceError::EmptyEnsemble);
    }

    #[test]
    fn test_out_of_range_node_rejected() {
        let err = ModelBundle::build(document(json!({
            "forest": {"type": "rf", "trees": [[
                {"left": 1, "right": 5, "feature": 0, "threshold": 0.0, "value": [1.0, 1.0]},
                {"left": -1, "right": -1, "feature": -2, "threshold": -2.0, "value": [1.0, 1.0]}
            ]]}
        })))
        .unwrap_err();

        assert!(matches!(err, InferenceError::MalformedTree { tree: 0, .. }));
    }

    #[test]
    fn test_zero_scale_rejected() {
        let mut doc = document(json!({}));
        doc.scaler_scale = vec![1.0, 0.0];

        assert_eq!(
            ModelBundle::build(doc).unwrap_err(),
            InferenceError::InvalidScaler {
                index: 1,
                value: 0.0
            }
        );
    }

    #[test]
    fn test_bundle_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModelBundle>();
    }
}
