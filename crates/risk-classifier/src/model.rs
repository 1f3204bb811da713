//! Model artifact format
//!
//! The artifact is a JSON document describing either a logistic regression
//! or a gradient-boosted tree ensemble over the four classifier features.
//! Both produce a raw margin that is squashed through the logistic function.

use risk_core::FeatureVector;
use serde::{Deserialize, Serialize};

const N_FEATURES: usize = 4;

/// Top-level artifact document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(default)]
    pub name: Option<String>,
    /// Must equal `FeatureVector::CLASSIFIER_FEATURES`
    pub feature_names: Vec<String>,
    #[serde(flatten)]
    pub model: ModelKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    Logistic {
        coefficients: Vec<f64>,
        intercept: f64,
        #[serde(default)]
        scaler: Option<StandardScaler>,
    },
    GradientBoosting {
        init_score: f64,
        learning_rate: f64,
        trees: Vec<RegressionTree>,
    },
}

/// Per-feature standardization applied before the linear model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Regression tree stored as a flat node array; node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

impl ModelArtifact {
    /// Structural checks. Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let expected = FeatureVector::CLASSIFIER_FEATURES;
        if self.feature_names.len() != expected.len()
            || self.feature_names.iter().zip(expected).any(|(a, b)| a != b)
        {
            return Err(format!(
                "feature_names {:?} do not match expected order {:?}",
                self.feature_names, expected
            ));
        }

        match &self.model {
            ModelKind::Logistic {
                coefficients,
                intercept,
                scaler,
            } => {
                if coefficients.len() != N_FEATURES {
                    return Err(format!(
                        "expected {} coefficients, found {}",
                        N_FEATURES,
                        coefficients.len()
                    ));
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("non-finite logistic parameter".into());
                }
                if let Some(scaler) = scaler {
                    if scaler.mean.len() != N_FEATURES || scaler.scale.len() != N_FEATURES {
                        return Err("scaler dimensions do not match feature count".into());
                    }
                    if scaler
                        .mean
                        .iter()
                        .chain(&scaler.scale)
                        .any(|v| !v.is_finite())
                        || scaler.scale.iter().any(|s| *s == 0.0)
                    {
                        return Err("scaler has zero or non-finite entries".into());
                    }
                }
            }
            ModelKind::GradientBoosting {
                init_score,
                learning_rate,
                trees,
            } => {
                if !init_score.is_finite() || !learning_rate.is_finite() {
                    return Err("non-finite boosting parameter".into());
                }
                if trees.is_empty() {
                    return Err("gradient boosting model has no trees".into());
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate().map_err(|e| format!("tree {}: {}", i, e))?;
                }
            }
        }
        Ok(())
    }

    /// Raw margin (log-odds) for one feature row
    pub fn margin(&self, x: &[f64; 4]) -> f64 {
        match &self.model {
            ModelKind::Logistic {
                coefficients,
                intercept,
                scaler,
            } => {
                let row: Vec<f64> = match scaler {
                    Some(s) => x
                        .iter()
                        .zip(s.mean.iter().zip(&s.scale))
                        .map(|(v, (m, sc))| (v - m) / sc)
                        .collect(),
                    None => x.to_vec(),
                };
                intercept
                    + coefficients
                        .iter()
                        .zip(&row)
                        .map(|(w, v)| w * v)
                        .sum::<f64>()
            }
            ModelKind::GradientBoosting {
                init_score,
                learning_rate,
                trees,
            } => {
                init_score
                    + learning_rate * trees.iter().map(|t| t.predict(x)).sum::<f64>()
            }
        }
    }

    /// Probability of distress for one feature row
    pub fn predict_proba(&self, x: &[f64; 4]) -> f64 {
        sigmoid(self.margin(x))
    }
}

impl RegressionTree {
    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".into());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= N_FEATURES {
                        return Err(format!("node {} splits on unknown feature {}", idx, feature));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has non-finite threshold", idx));
                    }
                    // Children must point forward so traversal always terminates.
                    for child in [left, right] {
                        if *child <= idx || *child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", idx, child));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {} has non-finite value", idx));
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk from the root to a leaf. Assumes the tree passed validation.
    pub fn predict(&self, x: &[f64; 4]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
