//! Linear scorer for logistic regression and linear SVM exports

use crate::error::{InferenceError, Result};
use crate::models::math::{dot, softmax};
use crate::models::Classifier;
use crate::types::prediction::ProbabilityVector;

/// Affine scorer followed by softmax.
///
/// A single weight row is the one-vs-rest binary export; the negative class
/// is synthesized as its negation.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    /// Weight rows, shape [R][F]
    coef: Vec<Vec<f64>>,
    /// Per-row intercepts, length R
    intercept: Vec<f64>,
    n_features: usize,
}

impl LinearModel {
    /// Create a linear model, checking that every row has the same width
    /// and that there is one intercept per row.
    pub fn try_new(coef: Vec<Vec<f64>>, intercept: Vec<f64>) -> Result<Self> {
        let n_features = match coef.first() {
            Some(row) => row.len(),
            None => return Err(InferenceError::schema("linear model has no coefficient rows")),
        };

        if let Some(r) = coef.iter().position(|row| row.len() != n_features) {
            return Err(InferenceError::schema(format!(
                "coef row {} has {} entries, expected {}",
                r,
                coef[r].len(),
                n_features
            )));
        }

        if intercept.len() != coef.len() {
            return Err(InferenceError::schema(format!(
                "{} intercepts for {} coefficient rows",
                intercept.len(),
                coef.len()
            )));
        }

        Ok(Self {
            coef,
            intercept,
            n_features,
        })
    }

    /// True when only the positive-class row is stored.
    pub fn is_binary(&self) -> bool {
        self.coef.len() == 1
    }

    /// Raw scores before softmax (two entries for the binary encoding).
    pub fn decision_function(&self, xs: &[f64]) -> Result<Vec<f64>> {
        if xs.len() != self.n_features {
            return Err(InferenceError::DimensionMismatch {
                expected: self.n_features,
                got: xs.len(),
            });
        }

        let mut scores: Vec<f64> = self
            .coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, b)| b + dot(row, xs))
            .collect();

        if self.is_binary() {
            scores.push(-scores[0]);
        }

        Ok(scores)
    }
}

impl Classifier for LinearModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        if self.is_binary() {
            2
        } else {
            self.coef.len()
        }
    }

    fn predict_proba(&self, xs: &[f64]) -> Result<ProbabilityVector> {
        let scores = self.decision_function(xs)?;
        Ok(softmax(&scores))
    }
}
