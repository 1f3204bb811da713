use risk_core::{RuleResult, Severity};

use crate::engine::{RuleContext, RuleEntry};

/// Receivables above 35% of monthly sales
pub const MAX_RECEIVABLES_RATIO: f64 = 0.35;
/// Loan EMI above 30% of monthly sales
pub const MAX_EMI_RATIO: f64 = 0.30;
/// Cash should cover at least one month of expenses
pub const MIN_CASH_BUFFER_MONTHS: f64 = 1.0;
/// Sales decline worse than -20%
pub const MIN_SALES_GROWTH_RATE: f64 = -0.20;
/// Expense growth above 15%
pub const MAX_EXPENSE_GROWTH_RATE: f64 = 0.15;

/// Default registry, evaluated in this order.
pub static DEFAULT_RULES: &[RuleEntry] = &[
    RuleEntry {
        name: "high_receivables",
        feature: "receivables",
        evaluate: high_receivables,
    },
    RuleEntry {
        name: "high_emi",
        feature: "loan_emi",
        evaluate: high_emi,
    },
    RuleEntry {
        name: "low_cash_buffer",
        feature: "cash_balance",
        evaluate: low_cash_buffer,
    },
    RuleEntry {
        name: "declining_sales_momentum",
        feature: "sales_growth_rate",
        evaluate: declining_sales_momentum,
    },
    RuleEntry {
        name: "rising_expense_momentum",
        feature: "expense_growth_rate",
        evaluate: rising_expense_momentum,
    },
];

fn fired(severity: Severity, warning: &str, suggestion: &str, feature: &str) -> Option<RuleResult> {
    Some(RuleResult {
        severity,
        warning: warning.to_string(),
        suggestion: suggestion.to_string(),
        triggering_feature: feature.to_string(),
    })
}

pub fn high_receivables(ctx: &RuleContext) -> Option<RuleResult> {
    let sales = ctx.figures.sales;
    if sales <= 0.0 {
        return None;
    }
    if ctx.figures.receivables > MAX_RECEIVABLES_RATIO * sales {
        return fired(
            Severity::High,
            "High outstanding customer payments",
            "Improve collection cycle or follow up on dues",
            "receivables",
        );
    }
    None
}

pub fn high_emi(ctx: &RuleContext) -> Option<RuleResult> {
    let sales = ctx.figures.sales;
    if sales <= 0.0 {
        return None;
    }
    if ctx.figures.loan_emi > MAX_EMI_RATIO * sales {
        return fired(
            Severity::High,
            "High EMI burden compared to revenue",
            "Refinance debt or reduce monthly repayment pressure",
            "loan_emi",
        );
    }
    None
}

pub fn low_cash_buffer(ctx: &RuleContext) -> Option<RuleResult> {
    let expenses = ctx.figures.expenses;
    if expenses <= 0.0 {
        return None;
    }
    if ctx.figures.cash_balance / expenses < MIN_CASH_BUFFER_MONTHS {
        return fired(
            Severity::Medium,
            "Low cash buffer to absorb expense shocks",
            "Build emergency liquidity to cover at least one month of expenses",
            "cash_balance",
        );
    }
    None
}

pub fn declining_sales_momentum(ctx: &RuleContext) -> Option<RuleResult> {
    if ctx.features.sales_growth_rate < MIN_SALES_GROWTH_RATE {
        return fired(
            Severity::Medium,
            "Revenue has declined significantly in recent months",
            "Review pricing strategy, improve customer retention, or explore new revenue channels",
            "sales_growth_rate",
        );
    }
    None
}

pub fn rising_expense_momentum(ctx: &RuleContext) -> Option<RuleResult> {
    if ctx.features.expense_growth_rate > MAX_EXPENSE_GROWTH_RATE {
        return fired(
            Severity::Medium,
            "Operating expenses are increasing rapidly",
            "Audit operational costs and reduce non-essential spending",
            "expense_growth_rate",
        );
    }
    None
}
