//! Feed-forward network (dense layers) forward pass

use crate::error::{InferenceError, Result};
use crate::models::math::{relu, sigmoid, softmax};
use crate::models::Classifier;
use crate::types::prediction::ProbabilityVector;
use std::str::FromStr;

/// Hidden-layer activation, matching sklearn's `MLPClassifier.activation`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
    Logistic,
    Identity,
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Relu => relu(x),
            Self::Tanh => x.tanh(),
            Self::Logistic => sigmoid(x),
            Self::Identity => x,
        }
    }
}

impl FromStr for Activation {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "relu" => Ok(Self::Relu),
            "tanh" => Ok(Self::Tanh),
            "logistic" => Ok(Self::Logistic),
            "identity" => Ok(Self::Identity),
            other => Err(InferenceError::schema(format!(
                "unknown activation '{}'",
                other
            ))),
        }
    }
}

/// Dense layer: `out[j] = bias[j] + sum_i a[i] * weights[i][j]`
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Shape [in][out]
    weights: Vec<Vec<f64>>,
    /// Length out
    bias: Vec<f64>,
}

impl Layer {
    pub fn try_new(weights: Vec<Vec<f64>>, bias: Vec<f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(InferenceError::schema("layer has no input rows"));
        }
        if let Some(i) = weights.iter().position(|row| row.len() != bias.len()) {
            return Err(InferenceError::schema(format!(
                "weight row {} has {} outputs but bias has {}",
                i,
                weights[i].len(),
                bias.len()
            )));
        }
        if bias.is_empty() {
            return Err(InferenceError::schema("layer has no outputs"));
        }
        Ok(Self { weights, bias })
    }

    pub fn in_dim(&self) -> usize {
        self.weights.len()
    }

    pub fn out_dim(&self) -> usize {
        self.bias.len()
    }

    fn forward(&self, a: &[f64]) -> Vec<f64> {
        let mut out = self.bias.clone();
        for (a_i, row) in a.iter().zip(&self.weights) {
            for (o, w) in out.iter_mut().zip(row) {
                *o += a_i * w;
            }
        }
        out
    }
}

/// Multi-layer perceptron with a softmax output
#[derive(Debug, Clone, PartialEq)]
pub struct FeedForward {
    layers: Vec<Layer>,
    activation: Activation,
}

impl FeedForward {
    /// Chain layers, checking that each layer's output feeds the next.
    pub fn try_new(layers: Vec<Layer>, activation: Activation) -> Result<Self> {
        if layers.is_empty() {
            return Err(InferenceError::schema("network has no layers"));
        }

        for (i, pair) in layers.windows(2).enumerate() {
            if pair[0].out_dim() != pair[1].in_dim() {
                return Err(InferenceError::schema(format!(
                    "layer {} outputs {} values but layer {} expects {}",
                    i,
                    pair[0].out_dim(),
                    i + 1,
                    pair[1].in_dim()
                )));
            }
        }

        Ok(Self { layers, activation })
    }

    /// Build from exported `coefs`/`intercepts` arrays.
    pub fn from_parts(
        coefs: Vec<Vec<Vec<f64>>>,
        intercepts: Vec<Vec<f64>>,
        activation: Option<&str>,
    ) -> Result<Self> {
        if coefs.len() != intercepts.len() {
            return Err(InferenceError::schema(format!(
                "{} weight matrices but {} bias vectors",
                coefs.len(),
                intercepts.len()
            )));
        }

        let activation = activation
            .map(Activation::from_str)
            .transpose()?
            .unwrap_or_default();

        let layers = coefs
            .into_iter()
            .zip(intercepts)
            .map(|(w, b)| Layer::try_new(w, b))
            .collect::<Result<Vec<_>>>()?;

        Self::try_new(layers, activation)
    }

    /// Raw output-layer values before softmax.
    pub fn forward(&self, xs: &[f64]) -> Result<Vec<f64>> {
        if xs.len() != self.n_features() {
            return Err(InferenceError::DimensionMismatch {
                expected: self.n_features(),
                got: xs.len(),
            });
        }

        let last = self.layers.len() - 1;
        let mut a = xs.to_vec();

        for (i, layer) in self.layers.iter().enumerate() {
            let mut out = layer.forward(&a);
            if i != last {
                for v in out.iter_mut() {
                    *v = self.activation.apply(*v);
                }
            }
            a = out;
        }

        Ok(a)
    }
}

impl Classifier for FeedForward {
    fn n_features(&self) -> usize {
        self.layers[0].in_dim()
    }

    fn n_classes(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim()
    }

    fn predict_proba(&self, xs: &[f64]) -> Result<ProbabilityVector> {
        let logits = self.forward(xs)?;
        Ok(softmax(&logits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::linear::LinearModel;
    use approx::assert_abs_diff_eq;

    fn identity_layer() -> Layer {
        Layer::try_new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![0.0, 0.0]).unwrap()
    }

    #[test]
    fn test_single_layer_has_no_activation() {
        let net = FeedForward::try_new(vec![identity_layer()], Activation::Relu).unwrap();

        assert_eq!(net.forward(&[2.0, -3.0]).unwrap(), vec![2.0, -3.0]);

        let probs = net.predict_proba(&[2.0, -3.0]).unwrap();
        assert_abs_diff_eq!(probs[0], 0.9933, epsilon = 1e-4);
        assert_abs_diff_eq!(probs[1], 0.0067, epsilon = 1e-4);
    }

    #[test]
    fn test_hidden_layer_relu() {
        // hidden identity then output identity: negative input clipped by ReLU
        let net = FeedForward::try_new(vec![identity_layer(), identity_layer()], Activation::Relu)
            .unwrap();

        assert_eq!(net.forward(&[2.0, -3.0]).unwrap(), vec![2.0, 0.0]);
    }

    #[test]
    fn test_hidden_layer_tanh() {
        let net = FeedForward::from_parts(
            vec![vec![vec![1.0]], vec![vec![1.0]]],
            vec![vec![0.0], vec![0.5]],
            Some("tanh"),
        )
        .unwrap();

        let out = net.forward(&[1.0]).unwrap();
        assert_abs_diff_eq!(out[0], 1.0f64.tanh() + 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_single_layer_matches_linear_scorer() {
        // weights [in][out] are the transpose of linear coef [out][in]
        let coef = vec![vec![0.5, -1.0, 2.0], vec![1.5, 0.0, -0.5], vec![0.0, 1.0, 1.0]];
        let intercept = vec![0.1, -0.2, 0.3];
        let weights: Vec<Vec<f64>> = (0..3).map(|i| coef.iter().map(|row| row[i]).collect()).collect();

        let linear = LinearModel::try_new(coef, intercept.clone()).unwrap();
        let net = FeedForward::try_new(
            vec![Layer::try_new(weights, intercept).unwrap()],
            Activation::Relu,
        )
        .unwrap();

        let xs = [0.3, -1.2, 2.2];
        let a = linear.predict_proba(&xs).unwrap();
        let b = net.predict_proba(&xs).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_layer_chain_mismatch() {
        let wide = Layer::try_new(vec![vec![1.0, 1.0, 1.0]], vec![0.0, 0.0, 0.0]).unwrap();
        let err = FeedForward::try_new(vec![wide, identity_layer()], Activation::Relu).unwrap_err();
        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn test_unknown_activation() {
        let err = FeedForward::from_parts(vec![vec![vec![1.0]]], vec![vec![0.0]], Some("swish"))
            .unwrap_err();
        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn test_wrong_input_length() {
        let net = FeedForward::try_new(vec![identity_layer()], Activation::Relu).unwrap();
        assert!(matches!(
            net.predict_proba(&[1.0, 2.0, 3.0]),
            Err(InferenceError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }
}
