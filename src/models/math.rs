//! Numeric helpers shared by every predictor

use crate::types::prediction::ProbabilityVector;

/// Dot product of two equally sized slices.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// ReLU activation: max(0, x)
#[inline]
pub fn relu(x: f64) -> f64 {
    x.max(0.0)
}

/// Logistic sigmoid: 1 / (1 + exp(-x))
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Softmax over raw scores.
///
/// The maximum is subtracted before exponentiation so large-magnitude
/// scores cannot overflow.
pub fn softmax(scores: &[f64]) -> ProbabilityVector {
    if scores.is_empty() {
        return ProbabilityVector::new(Vec::new());
    }

    let max_val = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut exps: Vec<f64> = scores.iter().map(|&s| (s - max_val).exp()).collect();
    let sum: f64 = exps.iter().sum();

    if sum > 0.0 {
        for e in exps.iter_mut() {
            *e /= sum;
        }
    }

    ProbabilityVector::new(exps)
}

/// Index of the maximum value. The first maximum wins on ties.
///
/// NaN never wins; an empty slice yields 0.
pub fn argmax(values: &[f64]) -> usize {
    let mut best_idx = 0;
    let mut best_val = f64::NEG_INFINITY;

    for (idx, &v) in values.iter().enumerate() {
        // strict comparison keeps the earliest index on ties
        if v > best_val {
            best_val = v;
            best_idx = idx;
        }
    }

    best_idx
}
