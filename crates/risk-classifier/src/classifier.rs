use risk_core::{FeatureVector, RiskError, RiskLevel, RiskResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::model::ModelArtifact;

/// Absorbs float noise such as 0.35 * 100 = 34.99999999999999
const SCORE_EPSILON: f64 = 1e-9;

/// Classifier output mapped to the integer score and tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub probability: f64,
    pub score: u8,
    pub level: RiskLevel,
}

impl RiskScore {
    /// Score is the truncated percentage: 0.649999 scores 64, 0.65 scores 65.
    pub fn from_probability(probability: f64) -> Self {
        let p = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let score = (p * 100.0 + SCORE_EPSILON).floor().min(100.0) as u8;
        Self {
            probability: p,
            score,
            level: RiskLevel::from_score(score),
        }
    }
}

/// Immutable handle around the loaded model. Build once, share via `Arc`.
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    artifact: ModelArtifact,
    source: String,
    sha256: String,
}

impl RiskClassifier {
    /// Load and validate the artifact at `path`.
    ///
    /// Any problem (missing file, empty file, malformed JSON, structural
    /// error, digest mismatch) is a `ModelLoad` error and should abort startup.
    pub fn load(path: impl AsRef<Path>, expected_sha256: Option<&str>) -> RiskResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();

        if !path.exists() {
            return Err(RiskError::model_load(&display, "file not found"));
        }
        let bytes = std::fs::read(path).map_err(|e| RiskError::model_load(&display, e.to_string()))?;
        Self::from_bytes(&bytes, &display, expected_sha256)
    }

    pub fn from_bytes(bytes: &[u8], source: &str, expected_sha256: Option<&str>) -> RiskResult<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(RiskError::model_load(source, "file is empty"));
        }

        let sha256 = hex::encode(Sha256::digest(bytes));
        if let Some(expected) = expected_sha256 {
            if !expected.trim().eq_ignore_ascii_case(&sha256) {
                return Err(RiskError::model_load(
                    source,
                    format!("sha256 mismatch: expected {}, found {}", expected.trim(), sha256),
                ));
            }
        }

        let artifact: ModelArtifact = serde_json::from_slice(bytes)
            .map_err(|e| RiskError::model_load(source, format!("invalid artifact: {}", e)))?;

        let classifier = Self::from_artifact(artifact, source)?;
        Ok(Self { sha256, ..classifier })
    }

    pub fn from_artifact(artifact: ModelArtifact, source: &str) -> RiskResult<Self> {
        artifact
            .validate()
            .map_err(|reason| RiskError::model_load(source, reason))?;

        tracing::debug!(
            source,
            name = artifact.name.as_deref().unwrap_or("unnamed"),
            "Risk model artifact validated"
        );

        Ok(Self {
            artifact,
            source: source.to_string(),
            sha256: String::new(),
        })
    }

    /// Probability of financial distress, in [0, 1]
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let p = self.artifact.predict_proba(&features.classifier_inputs());
        if p.is_finite() {
            p.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn score(&self, features: &FeatureVector) -> RiskScore {
        RiskScore::from_probability(self.predict(features))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Hex digest of the loaded bytes (empty when built from a value)
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelKind, RegressionTree, TreeNode};
    use approx::assert_relative_eq;
    use std::io::Write;

    const LOGISTIC: &str = r#"{
        "name": "test-logreg",
        "kind": "logistic",
        "feature_names": ["profit_margin", "receivables_ratio", "emi_ratio", "cash_buffer_months"],
        "coefficients": [-4.0, 3.5, 5.0, -1.6],
        "intercept": 0.4
    }"#;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn features(pm: f64, rr: f64, emi: f64, cb: f64) -> FeatureVector {
        FeatureVector {
            profit_margin: pm,
            receivables_ratio: rr,
            emi_ratio: emi,
            cash_buffer_months: cb,
            ..Default::default()
        }
    }

    #[test]
    fn test_score_boundaries() {
        let cases = [
            (0.349999, 34, RiskLevel::Low),
            (0.35, 35, RiskLevel::Medium),
            (0.649999, 64, RiskLevel::Medium),
            (0.65, 65, RiskLevel::High),
            (0.0, 0, RiskLevel::Low),
            (1.0, 100, RiskLevel::High),
        ];
        for (p, score, level) in cases {
            let s = RiskScore::from_probability(p);
            assert_eq!(s.score, score, "p={}", p);
            assert_eq!(s.level, level, "p={}", p);
        }
    }

    #[test]
    fn test_score_handles_degenerate_probabilities() {
        assert_eq!(RiskScore::from_probability(f64::NAN).score, 0);
        assert_eq!(RiskScore::from_probability(1.7).score, 100);
        assert_eq!(RiskScore::from_probability(-0.2).score, 0);
    }

    #[test]
    fn test_load_logistic_and_predict() {
        let file = write_temp(LOGISTIC);
        let clf = RiskClassifier::load(file.path(), None).unwrap();
        assert_eq!(clf.sha256().len(), 64);

        // z = 0.4 - 0.8 + 0.525 + 0.5 - 3.2 = -2.575
        let healthy = clf.predict(&features(0.2, 0.15, 0.1, 2.0));
        assert_relative_eq!(healthy, 1.0 / (1.0 + 2.575_f64.exp()), epsilon = 1e-12);
        assert_eq!(clf.score(&features(0.2, 0.15, 0.1, 2.0)).level, RiskLevel::Low);

        let distressed = clf.score(&features(-0.6, 0.1, 0.2, 0.75));
        assert_eq!(distressed.level, RiskLevel::High);
    }

    #[test]
    fn test_missing_file_is_model_load_error() {
        let err = RiskClassifier::load("/nonexistent/model.json", None).unwrap_err();
        assert!(matches!(err, RiskError::ModelLoad { .. }));
    }

    #[test]
    fn test_empty_file_is_model_load_error() {
        let file = write_temp("  \n");
        let err = RiskClassifier::load(file.path(), None).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_malformed_artifacts_are_rejected() {
        let wrong_order = LOGISTIC.replace(
            r#"["profit_margin", "receivables_ratio""#,
            r#"["receivables_ratio", "profit_margin""#,
        );
        let short = LOGISTIC.replace("[-4.0, 3.5, 5.0, -1.6]", "[-4.0, 3.5]");
        for bad in ["{not json", r#"{"kind": "svm"}"#, wrong_order.as_str(), short.as_str()] {
            let file = write_temp(bad);
            let err = RiskClassifier::load(file.path(), None).unwrap_err();
            assert!(matches!(err, RiskError::ModelLoad { .. }), "accepted {}", bad);
        }
    }

    #[test]
    fn test_sha256_is_enforced() {
        let file = write_temp(LOGISTIC);
        let digest = RiskClassifier::load(file.path(), None)
            .unwrap()
            .sha256()
            .to_string();

        assert!(RiskClassifier::load(file.path(), Some(&digest.to_uppercase())).is_ok());
        let err = RiskClassifier::load(file.path(), Some("deadbeef")).unwrap_err();
        assert!(err.to_string().contains("sha256 mismatch"));
    }

    fn stump(feature: usize, threshold: f64, low: f64, high: f64) -> RegressionTree {
        RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: low },
                TreeNode::Leaf { value: high },
            ],
        }
    }

    #[test]
    fn test_gradient_boosting_prediction() {
        let artifact = ModelArtifact {
            name: None,
            feature_names: FeatureVector::CLASSIFIER_FEATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            model: ModelKind::GradientBoosting {
                init_score: -1.0,
                learning_rate: 0.5,
                // cash buffer under one month and receivables above 30% push risk up
                trees: vec![stump(3, 1.0, 2.0, -1.0), stump(1, 0.3, -0.5, 3.0)],
            },
        };
        let clf = RiskClassifier::from_artifact(artifact, "inline").unwrap();

        // margin = -1 + 0.5 * (2.0 + 3.0) = 1.5
        let p = clf.predict(&features(0.0, 0.5, 0.0, 0.5));
        assert_relative_eq!(p, 1.0 / (1.0 + (-1.5_f64).exp()), epsilon = 1e-12);

        // margin = -1 + 0.5 * (-1.0 - 0.5) = -1.75
        let p = clf.predict(&features(0.0, 0.1, 0.0, 3.0));
        assert_relative_eq!(p, 1.0 / (1.0 + 1.75_f64.exp()), epsilon = 1e-12);
    }

    #[test]
    fn test_cyclic_tree_is_rejected() {
        let artifact = ModelArtifact {
            name: None,
            feature_names: FeatureVector::CLASSIFIER_FEATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            model: ModelKind::GradientBoosting {
                init_score: 0.0,
                learning_rate: 0.1,
                trees: vec![RegressionTree {
                    nodes: vec![
                        TreeNode::Split {
                            feature: 0,
                            threshold: 0.0,
                            left: 0,
                            right: 1,
                        },
                        TreeNode::Leaf { value: 1.0 },
                    ],
                }],
            },
        };
        assert!(RiskClassifier::from_artifact(artifact, "inline").is_err());
    }

    #[test]
    fn test_bundled_artifact_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../models/distress_model.json");
        let clf = RiskClassifier::load(path, None).unwrap();
        let p = clf.predict(&FeatureVector::default());
        assert!((0.0..=1.0).contains(&p));
    }
}
