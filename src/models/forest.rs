//! Random forest prediction via leaf class-count aggregation

use crate::error::{InferenceError, Result};
use crate::models::Classifier;
use crate::types::document::{NodeSpec, TREE_LEAF};
use crate::types::prediction::ProbabilityVector;

/// A node in a decision tree arena.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Internal split node. Goes left when `x[feature_index] <= threshold`.
    Split {
        feature_index: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Leaf with per-class training-sample counts
    Leaf { class_counts: Vec<f64> },
}

/// Decision tree stored as an arena; index 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Build a tree from validated nodes.
    ///
    /// `tree` is the position inside the forest, used in error messages.
    pub fn try_new(tree: usize, nodes: Vec<Node>, n_features: usize, n_classes: usize) -> Result<Self> {
        if nodes.is_empty() {
            return Err(InferenceError::malformed_tree(tree, "tree has no nodes"));
        }

        for (idx, node) in nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    if *left >= nodes.len() || *right >= nodes.len() {
                        return Err(InferenceError::malformed_tree(
                            tree,
                            format!(
                                "node {} has child ({}, {}) outside 0..{}",
                                idx,
                                left,
                                right,
                                nodes.len()
                            ),
                        ));
                    }
                    if *feature_index >= n_features {
                        return Err(InferenceError::schema(format!(
                            "tree {} node {} splits on feature {} but only {} features exist",
                            tree, idx, feature_index, n_features
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(InferenceError::schema(format!(
                            "tree {} node {} has a NaN threshold",
                            tree, idx
                        )));
                    }
                }
                Node::Leaf { class_counts } => validate_counts(tree, idx, class_counts, n_classes)?,
            }
        }

        let tree_value = Self { nodes };
        tree_value.check_acyclic(tree)?;
        Ok(tree_value)
    }

    /// Convert exported sklearn nodes into a tree.
    pub fn from_specs(tree: usize, specs: &[NodeSpec], n_features: usize, n_classes: usize) -> Result<Self> {
        let mut nodes = Vec::with_capacity(specs.len());

        for (idx, spec) in specs.iter().enumerate() {
            if spec.is_leaf() {
                nodes.push(Node::Leaf {
                    class_counts: spec.value.clone(),
                });
                continue;
            }

            if spec.left == TREE_LEAF || spec.right == TREE_LEAF {
                return Err(InferenceError::malformed_tree(
                    tree,
                    format!("node {} has only one child", idx),
                ));
            }

            let to_index = |v: i64, what: &str| -> Result<usize> {
                usize::try_from(v).map_err(|_| {
                    InferenceError::malformed_tree(tree, format!("node {} has negative {} {}", idx, what, v))
                })
            };

            nodes.push(Node::Split {
                feature_index: usize::try_from(spec.feature).map_err(|_| {
                    InferenceError::schema(format!(
                        "tree {} node {} has negative feature index {}",
                        tree, idx, spec.feature
                    ))
                })?,
                threshold: spec.threshold,
                left: to_index(spec.left, "left child")?,
                right: to_index(spec.right, "right child")?,
            });
        }

        Self::try_new(tree, nodes, n_features, n_classes)
    }

    /// Three-colour DFS from the root; a back edge means a cycle.
    fn check_acyclic(&self, tree: usize) -> Result<()> {
        const WHITE: u8 = 0;
        const GREY: u8 = 1;
        const BLACK: u8 = 2;

        let mut colour = vec![WHITE; self.nodes.len()];
        // (node, children already pushed)
        let mut stack = vec![(0usize, false)];

        while let Some((idx, expanded)) = stack.pop() {
            if expanded {
                colour[idx] = BLACK;
                continue;
            }
            match colour[idx] {
                BLACK => continue,
                GREY => {
                    return Err(InferenceError::malformed_tree(
                        tree,
                        format!("cycle through node {}", idx),
                    ))
                }
                _ => {}
            }

            colour[idx] = GREY;
            stack.push((idx, true));

            if let Node::Split { left, right, .. } = &self.nodes[idx] {
                for &child in [*left, *right].iter() {
                    match colour[child] {
                        GREY => {
                            return Err(InferenceError::malformed_tree(
                                tree,
                                format!("cycle through node {}", child),
                            ))
                        }
                        WHITE => stack.push((child, false)),
                        _ => {}
                    }
                }
            }
        }

        Ok(())
    }

    /// Walk from the root to a leaf and return its class counts.
    ///
    /// The walk is bounded by the node count; exceeding it means an index
    /// was revisited.
    pub fn traverse(&self, tree: usize, xs: &[f64]) -> Result<&[f64]> {
        let mut idx = 0usize;

        for _ in 0..self.nodes.len() {
            let node = self.nodes.get(idx).ok_or_else(|| {
                InferenceError::malformed_tree(tree, format!("node index {} out of range", idx))
            })?;

            match node {
                Node::Leaf { class_counts } => return Ok(class_counts),
                Node::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    let value = xs.get(*feature_index).copied().ok_or_else(|| {
                        InferenceError::malformed_tree(
                            tree,
                            format!("feature index {} out of range", feature_index),
                        )
                    })?;
                    // ties go left
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
        }

        Err(InferenceError::malformed_tree(
            tree,
            format!("traversal revisited a node (cycle at index {})", idx),
        ))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn validate_counts(tree: usize, idx: usize, counts: &[f64], n_classes: usize) -> Result<()> {
    if counts.len() != n_classes {
        return Err(InferenceError::schema(format!(
            "tree {} leaf {} has {} class counts, expected {}",
            tree,
            idx,
            counts.len(),
            n_classes
        )));
    }
    if counts.iter().any(|c| !c.is_finite() || *c < 0.0) {
        return Err(InferenceError::schema(format!(
            "tree {} leaf {} has negative or non-finite counts",
            tree, idx
        )));
    }
    if counts.iter().sum::<f64>() <= 0.0 {
        return Err(InferenceError::schema(format!(
            "tree {} leaf {} has counts summing to zero",
            tree, idx
        )));
    }
    Ok(())
}

/// Forest of decision trees whose leaf counts are summed then normalised.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    trees: Vec<Tree>,
    n_features: usize,
    n_classes: usize,
}

impl TreeEnsemble {
    /// Every tree must have been built for the same feature and class counts.
    pub fn try_new(trees: Vec<Tree>, n_features: usize, n_classes: usize) -> Result<Self> {
        if trees.is_empty() {
            return Err(InferenceError::EmptyEnsemble);
        }

        for (tree_idx, tree) in trees.iter().enumerate() {
            for (idx, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Split { feature_index, .. } if *feature_index >= n_features => {
                        return Err(InferenceError::schema(format!(
                            "tree {} node {} splits on feature {} but only {} features exist",
                            tree_idx, idx, feature_index, n_features
                        )));
                    }
                    Node::Split { .. } => {}
                    Node::Leaf { class_counts } => {
                        validate_counts(tree_idx, idx, class_counts, n_classes)?
                    }
                }
            }
        }

        Ok(Self {
            trees,
            n_features,
            n_classes,
        })
    }

    /// Elementwise sum of leaf counts over every tree.
    pub fn accumulate_counts(&self, xs: &[f64]) -> Result<Vec<f64>> {
        let mut totals = vec![0.0; self.n_classes];

        for (tree_idx, tree) in self.trees.iter().enumerate() {
            let counts = tree.traverse(tree_idx, xs)?;
            for (total, c) in totals.iter_mut().zip(counts) {
                *total += c;
            }
        }

        Ok(totals)
    }
}

impl Classifier for TreeEnsemble {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, xs: &[f64]) -> Result<ProbabilityVector> {
        if self.trees.is_empty() {
            return Err(InferenceError::EmptyEnsemble);
        }
        if xs.len() != self.n_features {
            return Err(InferenceError::DimensionMismatch {
                expected: self.n_features,
                got: xs.len(),
            });
        }

        let mut totals = self.accumulate_counts(xs)?;
        let grand_total: f64 = totals.iter().sum();

        // every leaf is positive and finite, so only overflow lands here
        if !grand_total.is_finite() || grand_total <= 0.0 {
            return Err(InferenceError::schema(format!(
                "leaf counts summed over the forest are {}",
                grand_total
            )));
        }

        for v in totals.iter_mut() {
            *v /= grand_total;
        }

        Ok(ProbabilityVector::new(totals))
    }
}
