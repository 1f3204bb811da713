//! Risk Classifier
//!
//! Loads the pre-trained distress model once at startup and maps feature
//! vectors to a probability, an integer score and a risk tier.

pub mod classifier;
pub mod model;

pub use classifier::{RiskClassifier, RiskScore};
pub use model::{ModelArtifact, ModelKind, RegressionTree, StandardScaler, TreeNode};
