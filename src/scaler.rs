//! Feature standardization for model inference.
//!
//! Applies the mean/scale parameters persisted by the training export so raw
//! measurements land in the same space the models were fitted on.

use crate::error::{InferenceError, Result};

/// Standard scaler: `(raw[i] - mean[i]) / scale[i]`.
///
/// Construction rejects zero scales, so `normalize` never divides by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Scaler {
    /// Create a scaler, validating lengths and scale entries.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.len() != scale.len() {
            return Err(InferenceError::schema(format!(
                "scaler_mean has {} entries but scaler_scale has {}",
                mean.len(),
                scale.len()
            )));
        }

        if let Some(index) = mean.iter().position(|m| !m.is_finite()) {
            return Err(InferenceError::schema(format!(
                "scaler_mean[{}] is not finite",
                index
            )));
        }

        if let Some((index, &value)) = scale
            .iter()
            .enumerate()
            .find(|(_, s)| **s == 0.0 || !s.is_finite())
        {
            return Err(InferenceError::InvalidScaler { index, value });
        }

        Ok(Self { mean, scale })
    }

    /// Normalize a raw feature vector.
    pub fn normalize(&self, raw: &[f64]) -> Result<Vec<f64>> {
        if raw.len() != self.feature_count() {
            return Err(InferenceError::DimensionMismatch {
                expected: self.feature_count(),
                got: raw.len(),
            });
        }

        Ok(raw
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    /// Number of features the scaler expects.
    pub fn feature_count(&self) -> usize {
        self.mean.len()
    }
}
