//! Model document loader

use crate::models::bundle::ModelBundle;
use crate::types::document::ModelDocument;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Loader turning an exported model document into a validated bundle
#[derive(Debug, Default)]
pub struct ModelLoader;

impl ModelLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load and validate a bundle from a JSON file
    pub fn load_from_path<P: AsRef<Path>>(&self, path: P) -> Result<ModelBundle> {
        let path = path.as_ref();

        info!(path = %path.display(), "Loading model document");

        let file = File::open(path)
            .with_context(|| format!("Failed to open model document {}", path.display()))?;
        let document = ModelDocument::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse model document {}", path.display()))?;

        self.build(document)
            .with_context(|| format!("Invalid model document {}", path.display()))
    }

    /// Load and validate a bundle from a JSON string
    pub fn load_from_str(&self, json: &str) -> Result<ModelBundle> {
        let document = ModelDocument::from_json_str(json).context("Failed to parse model document")?;
        self.build(document).context("Invalid model document")
    }

    /// Validate an already-parsed document
    pub fn build(&self, document: ModelDocument) -> Result<ModelBundle> {
        let bundle = ModelBundle::build(document)?;

        info!(
            models = bundle.len(),
            features = bundle.n_features(),
            classes = bundle.n_classes(),
            "Loaded {} models: {:?}",
            bundle.len(),
            bundle.model_ids()
        );

        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use std::io::Write;

    const DOC: &str = r#"{
        "class_names": ["a", "b"],
        "scaler_mean": [0.0],
        "scaler_scale": [1.0],
        "models": {"svm": {"type": "linear", "coef": [[2.0]], "intercept": [0.5]}}
    }"#;

    #[test]
    fn test_load_from_str() {
        let bundle = ModelLoader::new().load_from_str(DOC).unwrap();
        assert_eq!(bundle.model_ids(), vec!["svm"]);
    }

    #[test]
    fn test_load_from_path() {
        let path = std::env::temp_dir().join(format!("models-{}.json", uuid::Uuid::new_v4()));
        File::create(&path)
            .unwrap()
            .write_all(DOC.as_bytes())
            .unwrap();

        let bundle = ModelLoader::new().load_from_path(&path).unwrap();
        assert_eq!(bundle.n_features(), 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file() {
        let err = ModelLoader::new()
            .load_from_path("/nonexistent/models.json")
            .unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }

    #[test]
    fn test_invalid_document_keeps_typed_error() {
        let json = DOC.replace("[1.0]", "[0.0]");
        let err = ModelLoader::new().load_from_str(&json).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<InferenceError>(),
            Some(InferenceError::InvalidScaler { .. })
        ));
    }
}
