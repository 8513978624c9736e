//! Pre-trained engagement regressors.
//!
//! The model is produced elsewhere and shipped as a JSON artifact. Every
//! artifact declares the ordered feature names it was trained on; callers
//! align their input row to that order before predicting.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, WhatIfError};

/// A black-box numeric regressor evaluated on one row at a time.
pub trait Regressor {
    /// Input columns in the order `predict` expects them.
    fn feature_names(&self) -> &[String];

    fn predict(&self, row: &[f64]) -> Result<f64>;
}

/// A decision tree node. Internal nodes send `value <= threshold` left.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Feature index to split on (absent for leaves)
    #[serde(default)]
    pub feature: Option<usize>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub left: usize,
    #[serde(default)]
    pub right: usize,
    /// Leaf prediction (absent for internal nodes)
    #[serde(default)]
    pub value: Option<f64>,
}

/// Node 0 is the root; children always sit after their parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            if node.value.is_some() {
                continue;
            }
            let feature = node
                .feature
                .ok_or_else(|| format!("node {idx} has neither a split feature nor a value"))?;
            if feature >= n_features {
                return Err(format!(
                    "node {idx} splits on feature {feature}, model has {n_features}"
                ));
            }
            for child in [node.left, node.right] {
                if child <= idx || child >= self.nodes.len() {
                    return Err(format!("node {idx} has invalid child {child}"));
                }
            }
        }

        Ok(())
    }

    /// Walks from the root; malformed nodes are reported instead of followed.
    fn evaluate(&self, row: &[f64]) -> std::result::Result<f64, String> {
        let mut idx = 0usize;
        loop {
            let node = self
                .nodes
                .get(idx)
                .ok_or_else(|| format!("node {idx} does not exist"))?;
            if let Some(value) = node.value {
                return Ok(value);
            }
            let feature = node
                .feature
                .ok_or_else(|| format!("node {idx} has neither a split feature nor a value"))?;
            let input = row
                .get(feature)
                .ok_or_else(|| format!("node {idx} splits on missing feature {feature}"))?;
            let child = if *input <= node.threshold {
                node.left
            } else {
                node.right
            };
            if child <= idx {
                return Err(format!("node {idx} has invalid child {child}"));
            }
            idx = child;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Random forest: average of tree outputs.
    #[default]
    Mean,
    /// Boosted ensemble: sum of tree outputs.
    Sum,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForestModel {
    pub feature_names: Vec<String>,
    pub trees: Vec<Tree>,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelArtifact {
    Forest(ForestModel),
    Linear(LinearModel),
}

impl ModelArtifact {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let model = Self::from_json(&raw)?;
        info!(
            "Loaded {} model with {} features from {}",
            model.kind(),
            model.feature_names().len(),
            path.display()
        );
        Ok(model)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let model: ModelArtifact = serde_json::from_str(raw)?;
        model.validate()?;
        Ok(model)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::Forest(_) => "forest",
            ModelArtifact::Linear(_) => "linear",
        }
    }

    pub fn validate(&self) -> Result<()> {
        let names = self.feature_names();
        if names.is_empty() {
            return Err(WhatIfError::InvalidModel("no feature names declared".to_string()));
        }
        for (idx, name) in names.iter().enumerate() {
            if names[..idx].contains(name) {
                return Err(WhatIfError::InvalidModel(format!(
                    "feature '{name}' is declared twice"
                )));
            }
        }

        match self {
            ModelArtifact::Forest(forest) => {
                if forest.trees.is_empty() {
                    return Err(WhatIfError::InvalidModel("forest has no trees".to_string()));
                }
                for (i, tree) in forest.trees.iter().enumerate() {
                    tree.validate(names.len()).map_err(|e| {
                        WhatIfError::InvalidModel(format!("tree {i} validation failed: {e}"))
                    })?;
                }
            }
            ModelArtifact::Linear(linear) => {
                if linear.coefficients.len() != names.len() {
                    return Err(WhatIfError::InvalidModel(format!(
                        "{} coefficients for {} features",
                        linear.coefficients.len(),
                        names.len()
                    )));
                }
            }
        }

        Ok(())
    }
}

fn check_row_width(expected: usize, row: &[f64]) -> Result<()> {
    if row.len() != expected {
        return Err(WhatIfError::SchemaMismatch(format!(
            "model expects {} features, row has {}",
            expected,
            row.len()
        )));
    }
    Ok(())
}

impl Regressor for ForestModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, row: &[f64]) -> Result<f64> {
        check_row_width(self.feature_names.len(), row)?;
        if self.trees.is_empty() {
            return Err(WhatIfError::InvalidModel("forest has no trees".to_string()));
        }
        let mut total = 0.0;
        for (i, tree) in self.trees.iter().enumerate() {
            total += tree
                .evaluate(row)
                .map_err(|e| WhatIfError::InvalidModel(format!("tree {i} evaluation failed: {e}")))?;
        }
        let combined = match self.aggregation {
            Aggregation::Mean => total / self.trees.len() as f64,
            Aggregation::Sum => total,
        };
        Ok(self.base_score + combined)
    }
}

impl Regressor for LinearModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, row: &[f64]) -> Result<f64> {
        check_row_width(self.feature_names.len(), row)?;
        if self.coefficients.len() != row.len() {
            return Err(WhatIfError::InvalidModel(format!(
                "{} coefficients for {} features",
                self.coefficients.len(),
                row.len()
            )));
        }
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(row)
            .map(|(coef, value)| coef * value)
            .sum();
        Ok(self.intercept + dot)
    }
}

impl Regressor for ModelArtifact {
    fn feature_names(&self) -> &[String] {
        match self {
            ModelArtifact::Forest(forest) => forest.feature_names(),
            ModelArtifact::Linear(linear) => linear.feature_names(),
        }
    }

    fn predict(&self, row: &[f64]) -> Result<f64> {
        match self {
            ModelArtifact::Forest(forest) => forest.predict(row),
            ModelArtifact::Linear(linear) => linear.predict(row),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(value: f64) -> Node {
        Node {
            feature: None,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: Some(value),
        }
    }

    fn stump(threshold: f64, low: f64, high: f64) -> Tree {
        let root = Node {
            feature: Some(0),
            threshold,
            left: 1,
            right: 2,
            value: None,
        };
        Tree {
            nodes: vec![root, leaf(low), leaf(high)],
        }
    }

    fn forest(aggregation: Aggregation) -> ForestModel {
        ForestModel {
            feature_names: vec!["Content Pages".to_string(), "Certificates".to_string()],
            trees: vec![stump(50.0, 60.0, 80.0), stump(20.0, 50.0, 70.0)],
            aggregation,
            base_score: 0.0,
        }
    }

    #[test]
    fn forest_averages_trees() {
        let model = forest(Aggregation::Mean);
        assert_eq!(model.predict(&[40.0, 1.0]).unwrap(), 65.0);
        assert_eq!(model.predict(&[50.0, 1.0]).unwrap(), 65.0);
        assert_eq!(model.predict(&[90.0, 1.0]).unwrap(), 75.0);
    }

    #[test]
    fn boosted_forest_sums_trees_onto_base_score() {
        let mut model = forest(Aggregation::Sum);
        model.base_score = 5.0;
        assert_eq!(model.predict(&[10.0, 0.0]).unwrap(), 115.0);
    }

    #[test]
    fn row_width_must_match_schema() {
        let model = forest(Aggregation::Mean);
        assert!(matches!(
            model.predict(&[40.0]),
            Err(WhatIfError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn parses_tagged_artifacts() {
        let raw = r#"{
            "kind": "linear",
            "feature_names": ["Content Pages", "Certificates"],
            "intercept": 10.0,
            "coefficients": [0.5, 2.0]
        }"#;
        let model = ModelArtifact::from_json(raw).unwrap();
        assert_eq!(model.kind(), "linear");
        assert_eq!(model.predict(&[40.0, 3.0]).unwrap(), 36.0);

        let raw = r#"{
            "kind": "forest",
            "feature_names": ["Content Pages"],
            "trees": [{"nodes": [
                {"feature": 0, "threshold": 10.0, "left": 1, "right": 2},
                {"value": 1.0},
                {"value": 2.0}
            ]}]
        }"#;
        let model = ModelArtifact::from_json(raw).unwrap();
        assert_eq!(model.predict(&[11.0]).unwrap(), 2.0);
    }

    #[test]
    fn rejects_malformed_artifacts() {
        let mut bad = forest(Aggregation::Mean);
        bad.trees[0].nodes[0].left = 0;
        assert!(matches!(
            ModelArtifact::Forest(bad).validate(),
            Err(WhatIfError::InvalidModel(_))
        ));

        let mut bad = forest(Aggregation::Mean);
        bad.trees[1].nodes[0].feature = Some(5);
        assert!(ModelArtifact::Forest(bad).validate().is_err());

        let linear = LinearModel {
            feature_names: vec!["a".to_string(), "a".to_string()],
            intercept: 0.0,
            coefficients: vec![1.0, 1.0],
        };
        assert!(ModelArtifact::Linear(linear).validate().is_err());

        let linear = LinearModel {
            feature_names: vec!["a".to_string()],
            intercept: 0.0,
            coefficients: vec![1.0, 1.0],
        };
        assert!(ModelArtifact::Linear(linear).validate().is_err());
    }

    #[test]
    fn unvalidated_models_fail_instead_of_panicking() {
        let mut bad = forest(Aggregation::Mean);
        bad.trees[1].nodes[0].feature = Some(5);
        assert!(matches!(
            bad.predict(&[40.0, 1.0]),
            Err(WhatIfError::InvalidModel(_))
        ));

        let mut looping = forest(Aggregation::Mean);
        looping.trees[0].nodes[0].right = 0;
        assert!(looping.predict(&[90.0, 1.0]).is_err());

        let mut dangling = forest(Aggregation::Mean);
        dangling.trees[0].nodes[0].left = 9;
        assert!(dangling.predict(&[10.0, 1.0]).is_err());

        let mut empty = forest(Aggregation::Mean);
        empty.trees.clear();
        assert!(empty.predict(&[10.0, 1.0]).is_err());

        let short = LinearModel {
            feature_names: vec!["a".to_string(), "b".to_string()],
            intercept: 0.0,
            coefficients: vec![1.0],
        };
        assert!(matches!(
            short.predict(&[1.0, 2.0]),
            Err(WhatIfError::InvalidModel(_))
        ));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let artifact = ModelArtifact::Forest(forest(Aggregation::Mean));
        std::fs::write(&path, serde_json::to_string(&artifact).unwrap()).unwrap();
        assert_eq!(ModelArtifact::load(&path).unwrap(), artifact);
    }
}
