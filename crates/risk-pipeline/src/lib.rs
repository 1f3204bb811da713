//! Risk Pipeline
//!
//! Runs one prediction end to end: feature engineering, rules, the distress
//! classifier, the survival estimate and the explanation. Storage is not
//! touched here; callers resolve the figures first.

pub mod explanation;
pub mod pipeline;
pub mod prompt;
pub mod survival;
#[cfg(test)]
mod tests;

pub use explanation::{Explanation, ExplanationComposer, ExplanationSource};
pub use pipeline::{PredictionMode, RiskAssessment, RiskPipeline};
pub use prompt::{build_prompt, PromptContext};
pub use survival::{estimate, PriorityAction, PriorityActionKind, SurvivalEstimate};
