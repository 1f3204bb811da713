use risk_core::features::features_from_figures;
use risk_core::{FeatureVector, FinancialInput, ResolvedFigures, RuleResult};
use serde::{Deserialize, Serialize};

use crate::rules::DEFAULT_RULES;

/// Everything a rule may look at: raw figures merged with derived features.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    pub figures: ResolvedFigures,
    pub features: FeatureVector,
}

impl RuleContext {
    pub fn new(input: &FinancialInput) -> Self {
        let figures = input.resolve();
        Self {
            figures,
            features: features_from_figures(&figures),
        }
    }
}

/// A registered predicate plus its metadata
#[derive(Debug, Clone, Copy)]
pub struct RuleEntry {
    pub name: &'static str,
    /// Input or feature the rule watches
    pub feature: &'static str,
    pub evaluate: fn(&RuleContext) -> Option<RuleResult>,
}

/// Ordered warnings and suggestions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl RuleOutcome {
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.suggestions.is_empty()
    }
}

/// Open registry of independent rules.
///
/// Rules never see each other's output, so evaluation order only affects
/// the order of the returned lists.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<RuleEntry>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    /// Engine with the default rule set
    pub fn new() -> Self {
        Self::with_rules(DEFAULT_RULES.to_vec())
    }

    pub fn with_rules(rules: Vec<RuleEntry>) -> Self {
        Self { rules }
    }

    /// Append a rule; it runs after every rule registered before it.
    pub fn register(&mut self, entry: RuleEntry) -> &mut Self {
        self.rules.push(entry);
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// All fired rules, in registration order
    pub fn evaluate_detailed(&self, input: &FinancialInput) -> Vec<RuleResult> {
        self.evaluate_context(&RuleContext::new(input))
    }

    pub fn evaluate_context(&self, ctx: &RuleContext) -> Vec<RuleResult> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let result = (rule.evaluate)(ctx);
                if let Some(ref r) = result {
                    tracing::debug!(rule = rule.name, severity = %r.severity, "rule fired");
                }
                result
            })
            .collect()
    }

    /// Warnings and suggestions of every fired rule
    pub fn evaluate(&self, input: &FinancialInput) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        for result in self.evaluate_detailed(input) {
            if !result.warning.is_empty() {
                outcome.warnings.push(result.warning);
            }
            if !result.suggestion.is_empty() {
                outcome.suggestions.push(result.suggestion);
            }
        }
        outcome
    }
}
