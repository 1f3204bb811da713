//! Rule Engine
//!
//! Independent, threshold-based predicates over raw figures and derived
//! features. Each rule decides on its own whether to fire; results come back
//! in registration order.

pub mod engine;
pub mod recommend;
pub mod rules;

pub use engine::{RuleContext, RuleEngine, RuleEntry, RuleOutcome};
pub use recommend::recommend_actions;
pub use rules::DEFAULT_RULES;
