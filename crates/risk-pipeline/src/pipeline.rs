use risk_classifier::RiskClassifier;
use risk_core::{compute_features, FeatureVector, FinancialInput, RiskError, RiskLevel};
use rule_engine::{recommend_actions, RuleEngine, RuleOutcome};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use text_generation::ProviderChain;

use crate::explanation::{Explanation, ExplanationComposer};
use crate::prompt::{build_prompt, PromptContext};
use crate::survival::{estimate, SurvivalEstimate};

/// Fewer supplied figures than this and `check_input` stays silent
pub const MIN_CHECK_FIELDS: usize = 2;
pub const INSUFFICIENT_DATA_ACTION: &str = "Please fill all fields to analyze financial risk";

/// Where prediction figures come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMode {
    /// Supplied figures when any are present, else the rolling window
    #[default]
    Auto,
    /// Supplied figures only
    Manual,
    /// Rolling window, topped up from supplied figures and the snapshot
    Rolling,
}

impl FromStr for PredictionMode {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(PredictionMode::Auto),
            "manual" => Ok(PredictionMode::Manual),
            "rolling" => Ok(PredictionMode::Rolling),
            other => Err(RiskError::Validation(format!("unknown prediction mode: {}", other))),
        }
    }
}

/// Full answer to one prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    /// Absent when the classifier was not run
    pub probability: Option<f64>,
    pub reasons: Vec<String>,
    pub actions: Vec<String>,
    pub features: Option<FeatureVector>,
    pub survival: SurvivalEstimate,
    pub optimization_actions: Vec<String>,
    pub explanation: Option<Explanation>,
    /// Figures the assessment was computed from
    pub inputs: FinancialInput,
}

/// Feature engineer, rules, classifier, survival estimate and explanation
/// wired together. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RiskPipeline {
    classifier: Arc<RiskClassifier>,
    rules: RuleEngine,
    composer: ExplanationComposer,
    generator: Option<ProviderChain>,
}

impl RiskPipeline {
    pub fn new(classifier: Arc<RiskClassifier>) -> Self {
        Self {
            classifier,
            rules: RuleEngine::new(),
            composer: ExplanationComposer::new(),
            generator: None,
        }
    }

    pub fn with_rules(mut self, rules: RuleEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_generator(mut self, generator: Option<ProviderChain>) -> Self {
        self.generator = generator;
        self
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Rule warnings for partially filled forms
    pub fn check_input(&self, input: &FinancialInput) -> RuleOutcome {
        if input.present_count() < MIN_CHECK_FIELDS {
            return RuleOutcome::default();
        }
        self.rules.evaluate(input)
    }

    pub async fn assess(&self, input: &FinancialInput, explain: bool) -> RiskAssessment {
        let figures = input.resolve();
        let survival = estimate(&figures);

        let missing = input.missing_required();
        if !missing.is_empty() {
            tracing::debug!(missing = ?missing, "Insufficient data for classification");
            let reasons = vec![format!("Missing required inputs: {}", missing.join(", "))];
            let actions = vec![INSUFFICIENT_DATA_ACTION.to_string()];
            let explanation = explain.then(|| {
                self.composer
                    .template(0, RiskLevel::InsufficientData, &reasons, &actions)
            });
            return RiskAssessment {
                risk_score: 0,
                risk_level: RiskLevel::InsufficientData,
                probability: None,
                reasons,
                actions,
                features: None,
                survival,
                optimization_actions: Vec::new(),
                explanation,
                inputs: input.clone(),
            };
        }

        let features = compute_features(input);
        let score = self.classifier.score(&features);
        let RuleOutcome {
            warnings: reasons,
            suggestions: actions,
        } = self.rules.evaluate(input);
        let optimization_actions = recommend_actions(&reasons);

        tracing::debug!(
            score = score.score,
            level = %score.level,
            rules_fired = reasons.len(),
            "Risk assessed"
        );

        let explanation = if explain {
            let generated = match &self.generator {
                Some(chain) => {
                    let prompt = build_prompt(&PromptContext {
                        score: score.score,
                        level: score.level,
                        figures: &figures,
                        features: &features,
                        survival: &survival,
                        reasons: &reasons,
                        actions: &actions,
                    });
                    chain.generate(&prompt).await
                }
                None => None,
            };
            Some(self.composer.compose(
                generated.as_deref(),
                score.score,
                score.level,
                &reasons,
                &actions,
            ))
        } else {
            None
        };

        RiskAssessment {
            risk_score: score.score,
            risk_level: score.level,
            probability: Some(score.probability),
            reasons,
            actions,
            features: Some(features),
            survival,
            optimization_actions,
            explanation,
            inputs: input.clone(),
        }
    }
}
