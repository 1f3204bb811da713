//! Feature Engineering
//!
//! Converts raw monthly figures into the normalized ratios consumed by the
//! classifier and the rule engine. Every function here is total: absent
//! inputs count as zero and degenerate denominators yield 0.0.

use crate::types::{FeatureVector, FinancialInput, ResolvedFigures};

/// Ratio that is 0.0 whenever the denominator is not strictly positive.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if !numerator.is_finite() || !denominator.is_finite() || denominator <= 0.0 {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Compute the feature vector for a raw input
pub fn compute_features(input: &FinancialInput) -> FeatureVector {
    features_from_figures(&input.resolve())
}

pub fn features_from_figures(f: &ResolvedFigures) -> FeatureVector {
    FeatureVector {
        profit_margin: safe_ratio(f.sales - f.expenses, f.sales),
        receivables_ratio: safe_ratio(f.receivables, f.sales),
        emi_ratio: safe_ratio(f.loan_emi, f.sales),
        cash_buffer_months: safe_ratio(f.cash_balance, f.expenses),
        sales_growth_rate: safe_ratio(f.sales - f.sales_3_months_ago, f.sales_3_months_ago),
        expense_growth_rate: safe_ratio(
            f.expenses - f.expenses_3_months_ago,
            f.expenses_3_months_ago,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn full_input() -> FinancialInput {
        FinancialInput {
            monthly_sales: Some(100_000.0),
            monthly_expenses: Some(80_000.0),
            receivables: Some(25_000.0),
            loan_emi: Some(10_000.0),
            cash_balance: Some(40_000.0),
            sales_3_months_ago: Some(125_000.0),
            expenses_3_months_ago: Some(64_000.0),
        }
    }

    #[test]
    fn test_formulas() {
        let f = compute_features(&full_input());
        assert_relative_eq!(f.profit_margin, 0.2, epsilon = 1e-12);
        assert_relative_eq!(f.receivables_ratio, 0.25, epsilon = 1e-12);
        assert_relative_eq!(f.emi_ratio, 0.1, epsilon = 1e-12);
        assert_relative_eq!(f.cash_buffer_months, 0.5, epsilon = 1e-12);
        assert_relative_eq!(f.sales_growth_rate, -0.2, epsilon = 1e-12);
        assert_relative_eq!(f.expense_growth_rate, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_all_missing_yields_zero_vector() {
        let f = compute_features(&FinancialInput::default());
        assert_eq!(f, FeatureVector::default());
    }

    #[test]
    fn test_non_positive_denominators_yield_zero() {
        let input = FinancialInput {
            monthly_sales: Some(-500.0),
            monthly_expenses: Some(0.0),
            receivables: Some(1_000.0),
            loan_emi: Some(1_000.0),
            cash_balance: Some(1_000.0),
            sales_3_months_ago: Some(0.0),
            expenses_3_months_ago: Some(-3.0),
        };
        let f = compute_features(&input);
        assert_eq!(f, FeatureVector::default());
    }

    #[test]
    fn test_non_finite_inputs_are_coerced() {
        let input = FinancialInput {
            monthly_sales: Some(f64::NAN),
            monthly_expenses: Some(f64::INFINITY),
            cash_balance: Some(10.0),
            ..Default::default()
        };
        let f = compute_features(&input);
        for v in [
            f.profit_margin,
            f.receivables_ratio,
            f.emi_ratio,
            f.cash_buffer_months,
            f.sales_growth_rate,
            f.expense_growth_rate,
        ] {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_classifier_inputs_order() {
        let f = compute_features(&full_input());
        let x = f.classifier_inputs();
        assert_eq!(x[0], f.profit_margin);
        assert_eq!(x[1], f.receivables_ratio);
        assert_eq!(x[2], f.emi_ratio);
        assert_eq!(x[3], f.cash_buffer_months);
    }
}
