//! Configuration management for the classifier engine

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Inference strategy
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceStrategy {
    /// Use the primary model only
    #[default]
    Primary,
    /// Average every ensemble member
    Ensemble,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub models: ModelsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model document and strategy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Path to the exported model document (JSON)
    pub document_path: String,
    /// Inference strategy: "primary" (single model) or "ensemble"
    #[serde(default)]
    pub strategy: InferenceStrategy,
    /// Model used by the primary strategy
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    /// Models averaged by the ensemble strategy (empty = all models)
    #[serde(default)]
    pub ensemble_members: Vec<String>,
    /// Optional per-model weights for the ensemble (default 1.0 each)
    #[serde(default)]
    pub weights: HashMap<String, f64>,
}

fn default_primary_model() -> String {
    "logistic".to_string()
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Rows predicted per parallel batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    64
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let app: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.validate()?;
        Ok(app)
    }

    /// Reject settings that cannot produce a prediction
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            anyhow::bail!("pipeline.batch_size must be at least 1");
        }
        if let Some((model, weight)) = self
            .models
            .weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            anyhow::bail!("weight for model '{}' must be non-negative, got {}", model, weight);
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: ModelsConfig {
                document_path: "docs/models.json".to_string(),
                strategy: InferenceStrategy::Primary,
                primary_model: default_primary_model(),
                ensemble_members: Vec::new(),
                weights: HashMap::new(),
            },
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.models.strategy, InferenceStrategy::Primary);
        assert_eq!(config.models.primary_model, "logistic");
        assert!(config.models.ensemble_members.is_empty());
        assert_eq!(config.pipeline.batch_size, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_path() {
        let path = std::env::temp_dir().join(format!("engine-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[models]
document_path = "models.json"
strategy = "ensemble"
ensemble_members = ["logistic", "mlp"]

[models.weights]
mlp = 2.0

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.models.strategy, InferenceStrategy::Ensemble);
        assert_eq!(config.models.ensemble_members, vec!["logistic", "mlp"]);
        assert_eq!(config.models.weights.get("mlp"), Some(&2.0));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.pipeline.batch_size, 64);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = AppConfig::default();
        config.models.weights.insert("svm".to_string(), -1.0);
        assert!(config.validate().is_err());
    }
}
