//! Survival Estimator
//!
//! Cash runway from current-period figures plus the single most urgent fix.
//! Runs on whatever figures are present, so it still answers when the
//! classifier cannot.

use risk_core::ResolvedFigures;
use serde::{Deserialize, Serialize};

/// Runway reported when the business is not losing money. A display cap,
/// not a measured value.
pub const RUNWAY_CAP_MONTHS: f64 = 12.0;
pub const DAYS_PER_MONTH: f64 = 30.0;
/// Receivables above this share of sales make collection the top fix
pub const RECEIVABLES_PRIORITY_SHARE: f64 = 0.20;
/// Share of receivables targeted for collection
pub const COLLECTION_TARGET_SHARE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityActionKind {
    CollectReceivables,
    ReduceExpenses,
    NoActionNeeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityAction {
    pub kind: PriorityActionKind,
    pub top_fix: String,
    pub target_amount: f64,
    pub expected_impact: String,
}

impl PriorityAction {
    fn new(kind: PriorityActionKind, target_amount: f64) -> Self {
        let (top_fix, expected_impact) = match kind {
            PriorityActionKind::CollectReceivables => (
                "Collect pending customer payments faster",
                "Recovering this amount can immediately improve cash availability and extend runway.",
            ),
            PriorityActionKind::ReduceExpenses => (
                "Reduce monthly expenses",
                "Reducing this monthly amount can move your business closer to break-even.",
            ),
            PriorityActionKind::NoActionNeeded => (
                "No immediate fix needed",
                "Sales currently cover expenses. Keep tracking daily check-ins.",
            ),
        };
        Self {
            kind,
            top_fix: top_fix.to_string(),
            target_amount,
            expected_impact: expected_impact.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalEstimate {
    pub runway_months: f64,
    pub estimated_days_left: f64,
    pub monthly_loss: f64,
    /// Monthly sales needed to stop losing money
    pub break_even_sales_required: f64,
    /// True when `runway_months` is the no-loss sentinel
    pub runway_is_capped: bool,
    pub priority_action: PriorityAction,
}

pub fn estimate(figures: &ResolvedFigures) -> SurvivalEstimate {
    let sales = figures.sales;
    let expenses = figures.expenses;
    let monthly_loss = (expenses - sales).max(0.0);

    let (runway_months, runway_is_capped) = if monthly_loss > 0.0 {
        // An overdrawn account has no runway left.
        (figures.cash_balance.max(0.0) / monthly_loss, false)
    } else {
        (RUNWAY_CAP_MONTHS, true)
    };

    let priority_action = if figures.receivables > RECEIVABLES_PRIORITY_SHARE * sales {
        PriorityAction::new(
            PriorityActionKind::CollectReceivables,
            figures.receivables * COLLECTION_TARGET_SHARE,
        )
    } else if monthly_loss > 0.0 {
        PriorityAction::new(PriorityActionKind::ReduceExpenses, monthly_loss)
    } else {
        PriorityAction::new(PriorityActionKind::NoActionNeeded, 0.0)
    };

    SurvivalEstimate {
        runway_months,
        estimated_days_left: runway_months * DAYS_PER_MONTH,
        monthly_loss,
        break_even_sales_required: expenses,
        runway_is_capped,
        priority_action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn figures(sales: f64, expenses: f64, cash: f64, receivables: f64) -> ResolvedFigures {
        ResolvedFigures {
            sales,
            expenses,
            cash_balance: cash,
            receivables,
            ..Default::default()
        }
    }

    #[test]
    fn test_loss_making_business() {
        let est = estimate(&figures(50_000.0, 80_000.0, 60_000.0, 5_000.0));
        assert_relative_eq!(est.monthly_loss, 30_000.0);
        assert_relative_eq!(est.runway_months, 2.0);
        assert_relative_eq!(est.estimated_days_left, 60.0);
        assert_relative_eq!(est.break_even_sales_required, 80_000.0);
        assert!(!est.runway_is_capped);
        assert_eq!(est.priority_action.kind, PriorityActionKind::ReduceExpenses);
        assert_eq!(est.priority_action.top_fix, "Reduce monthly expenses");
        assert_relative_eq!(est.priority_action.target_amount, 30_000.0);
    }

    #[test]
    fn test_receivables_take_priority() {
        let est = estimate(&figures(50_000.0, 80_000.0, 60_000.0, 10_001.0));
        assert_eq!(est.priority_action.kind, PriorityActionKind::CollectReceivables);
        assert_relative_eq!(est.priority_action.target_amount, 2_500.25);

        // Exactly 20% does not trigger
        let est = estimate(&figures(50_000.0, 80_000.0, 60_000.0, 10_000.0));
        assert_eq!(est.priority_action.kind, PriorityActionKind::ReduceExpenses);
    }

    #[test]
    fn test_profitable_business_is_capped() {
        let est = estimate(&figures(100_000.0, 60_000.0, 5_000.0, 1_000.0));
        assert_relative_eq!(est.monthly_loss, 0.0);
        assert_relative_eq!(est.runway_months, RUNWAY_CAP_MONTHS);
        assert_relative_eq!(est.estimated_days_left, 360.0);
        assert!(est.runway_is_capped);
        assert_eq!(est.priority_action.kind, PriorityActionKind::NoActionNeeded);
        assert_relative_eq!(est.priority_action.target_amount, 0.0);
    }

    #[test]
    fn test_overdrawn_cash_has_no_runway() {
        let est = estimate(&figures(10_000.0, 20_000.0, -5_000.0, 0.0));
        assert_relative_eq!(est.runway_months, 0.0);
        assert_relative_eq!(est.estimated_days_left, 0.0);
    }

    #[test]
    fn test_empty_figures() {
        let est = estimate(&ResolvedFigures::default());
        assert!(est.runway_is_capped);
        assert_eq!(est.priority_action.kind, PriorityActionKind::NoActionNeeded);
        assert!(est.runway_months.is_finite());
    }
}
