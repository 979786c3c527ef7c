//! Gradient-boosted regression trees loaded from JSON.
//!
//! ```json
//! {
//!   "learning_rate": 0.1,
//!   "base_score": 0.0,
//!   "trees": [
//!     { "feature_idx": 2, "threshold": 1.5, "value": 0.0,
//!       "left":  { "feature_idx": -1, "threshold": 0.0, "value": 0.3 },
//!       "right": { "feature_idx": -1, "threshold": 0.0, "value": -0.1 } }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QueryLensError, Result};

/// An additive ensemble of regression trees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    /// Shrinkage applied to every tree output.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Prediction before any tree is added.
    #[serde(default)]
    pub base_score: f64,
    /// Trees in the ensemble.
    #[serde(default)]
    pub trees: Vec<DecisionTree>,
}

fn default_learning_rate() -> f64 {
    1.0
}

impl TreeEnsemble {
    pub fn new(learning_rate: f64, base_score: f64) -> Self {
        TreeEnsemble {
            learning_rate,
            base_score,
            trees: Vec::new(),
        }
    }

    pub fn with_tree(mut self, tree: DecisionTree) -> Self {
        self.trees.push(tree);
        self
    }

    /// Parse and validate a model.
    pub fn from_json(content: &str) -> Result<Self> {
        let model: TreeEnsemble = serde_json::from_str(content)
            .map_err(|e| QueryLensError::model(format!("invalid model: {e}")))?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryLensError::model(format!("cannot read model {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || !self.base_score.is_finite() {
            return Err(QueryLensError::model("learning_rate and base_score must be finite"));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.root
                .validate()
                .map_err(|e| QueryLensError::model(format!("tree {i}: {e}")))?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Score a feature vector.
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|tree| self.learning_rate * tree.predict(features))
                .sum::<f64>()
    }
}

/// A single regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionTree {
    root: TreeNode,
}

impl DecisionTree {
    pub fn new(root: TreeNode) -> Self {
        DecisionTree { root }
    }

    /// Walk from the root to a leaf and return its value.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            if node.is_leaf() {
                return node.value;
            }
            // Missing features read as zero.
            let feature_value = usize::try_from(node.feature_idx)
                .ok()
                .and_then(|i| features.get(i).copied())
                .unwrap_or(0.0);
            let next = if feature_value <= node.threshold {
                node.left.as_deref()
            } else {
                node.right.as_deref()
            };
            match next {
                Some(child) => node = child,
                None => return node.value,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Feature index for split (-1 for leaf).
    pub feature_idx: i32,
    /// Threshold value for split.
    #[serde(default)]
    pub threshold: f64,
    /// Prediction value (for leaf nodes).
    #[serde(default)]
    pub value: f64,
    /// Left child, taken when the feature is at most the threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<TreeNode>>,
    /// Right child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<TreeNode>>,
}

impl TreeNode {
    pub fn leaf(value: f64) -> Self {
        TreeNode {
            feature_idx: -1,
            threshold: 0.0,
            value,
            left: None,
            right: None,
        }
    }

    pub fn split(feature_idx: usize, threshold: f64, left: TreeNode, right: TreeNode) -> Self {
        TreeNode {
            feature_idx: feature_idx as i32,
            threshold,
            value: 0.0,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.feature_idx < -1 {
            return Err(format!("invalid feature index {}", self.feature_idx));
        }
        if !self.threshold.is_finite() || !self.value.is_finite() {
            return Err("non-finite threshold or value".to_string());
        }
        if !self.is_leaf() && self.left.is_none() && self.right.is_none() {
            return Err(format!("split on feature {} has no children", self.feature_idx));
        }
        for child in [&self.left, &self.right].into_iter().flatten() {
            child.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MODEL: &str = r#"{
        "learning_rate": 0.5,
        "base_score": 1.0,
        "trees": [
            { "feature_idx": 0, "threshold": 2.0,
              "left":  { "feature_idx": -1, "value": 1.0 },
              "right": { "feature_idx": -1, "value": -1.0 } },
            { "feature_idx": -1, "value": 0.2 }
        ]
    }"#;

    #[test]
    fn test_predict() {
        let model = TreeEnsemble::from_json(MODEL).unwrap();
        assert_eq!(model.len(), 2);
        assert!((model.predict(&[1.0]) - (1.0 + 0.5 * 1.0 + 0.5 * 0.2)).abs() < 1e-9);
        assert!((model.predict(&[3.0]) - (1.0 - 0.5 + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_missing_feature_reads_zero() {
        let model = TreeEnsemble::from_json(MODEL).unwrap();
        assert_eq!(model.predict(&[]), model.predict(&[0.0]));
    }

    #[test]
    fn test_empty_model_predicts_base_score() {
        let model = TreeEnsemble::new(0.1, 0.25);
        assert!(model.is_empty());
        assert_eq!(model.predict(&[1.0, 2.0]), 0.25);
    }

    #[test]
    fn test_rejects_invalid_models() {
        assert!(matches!(
            TreeEnsemble::from_json("not json"),
            Err(QueryLensError::Model(_))
        ));
        assert!(TreeEnsemble::from_json(r#"{"trees": [{"feature_idx": -3}]}"#).is_err());
        assert!(TreeEnsemble::from_json(r#"{"trees": [{"feature_idx": 1}]}"#).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let model = TreeEnsemble::new(0.1, 0.0).with_tree(DecisionTree::new(TreeNode::split(
            3,
            0.5,
            TreeNode::leaf(1.0),
            TreeNode::leaf(2.0),
        )));
        model.save(&path).unwrap();
        assert_eq!(TreeEnsemble::load(&path).unwrap(), model);
    }
}
