//! Model-definition document as written by the training export

use crate::error::{InferenceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// Child index sklearn uses to mark "no child"
pub const TREE_LEAF: i64 = -1;

/// Top-level exported document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDocument {
    /// Feature names, in input order (optional)
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,

    /// Class names, in output order
    pub class_names: Vec<String>,

    /// StandardScaler mean per feature
    pub scaler_mean: Vec<f64>,

    /// StandardScaler scale per feature
    pub scaler_scale: Vec<f64>,

    /// Model id -> model record
    pub models: BTreeMap<String, ModelSpec>,
}

/// A single model record, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSpec {
    /// Logistic regression or linear SVM
    Linear {
        coef: Vec<Vec<f64>>,
        intercept: Vec<f64>,
    },

    /// Random forest
    Rf {
        #[serde(default)]
        n_classes: Option<usize>,
        trees: Vec<Vec<NodeSpec>>,
    },

    /// Multi-layer perceptron
    Mlp {
        /// Per-layer weight matrices, shape [in][out]
        #[serde(alias = "weights")]
        coefs: Vec<Vec<Vec<f64>>>,
        /// Per-layer biases, length out
        #[serde(alias = "biases")]
        intercepts: Vec<Vec<f64>>,
        /// Hidden-layer activation name (relu when absent)
        #[serde(default)]
        activation: Option<String>,
    },
}

/// Flat tree node as exported from `sklearn.tree._tree`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub left: i64,
    pub right: i64,
    pub feature: i64,
    pub threshold: f64,
    /// Per-class sample counts (only meaningful at leaves)
    #[serde(default)]
    pub value: Vec<f64>,
}

impl NodeSpec {
    pub fn is_leaf(&self) -> bool {
        self.left == TREE_LEAF && self.right == TREE_LEAF
    }
}

impl ModelDocument {
    /// Parse a document from a JSON string.
    ///
    /// Syntax errors and unknown model `type` tags both surface as schema errors.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| InferenceError::schema(e.to_string()))
    }

    /// Parse a document from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).map_err(|e| InferenceError::schema(e.to_string()))
    }

    pub fn feature_count(&self) -> usize {
        self.scaler_mean.len()
    }

    pub fn class_count(&self) -> usize {
        self.class_names.len()
    }
}
