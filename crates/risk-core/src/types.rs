use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RiskError, RiskResult};

pub type BusinessId = i64;

/// Fields that must be present before the classifier may run.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "monthly_sales",
    "monthly_expenses",
    "receivables",
    "loan_emi",
    "cash_balance",
];

/// Registered business (the "user" of the system)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: BusinessId,
    pub name: String,
    pub email: String,
}

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBusiness {
    pub name: String,
    pub email: String,
}

impl NewBusiness {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Trim whitespace and reject obviously malformed payloads.
    pub fn normalized(&self) -> RiskResult<NewBusiness> {
        let name = self.name.trim();
        let email = self.email.trim();
        if name.is_empty() {
            return Err(RiskError::Validation("name must not be empty".into()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(RiskError::Validation(format!("invalid email: {:?}", email)));
        }
        Ok(NewBusiness::new(name, email))
    }
}

/// One business's self-reported daily financial snapshot.
///
/// Values are the latest known figures for that date, not deltas: a second
/// submission for the same date replaces the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCheckin {
    pub business_id: BusinessId,
    pub checkin_date: NaiveDate,
    pub daily_sales: f64,
    pub daily_expenses: f64,
    pub receivables: f64,
    pub loan_emi: f64,
    pub cash_balance: f64,
}

impl DailyCheckin {
    pub fn validate(&self) -> RiskResult<()> {
        let amounts = [
            ("daily_sales", self.daily_sales),
            ("daily_expenses", self.daily_expenses),
            ("receivables", self.receivables),
            ("loan_emi", self.loan_emi),
            ("cash_balance", self.cash_balance),
        ];
        for (name, value) in amounts {
            if !value.is_finite() {
                return Err(RiskError::Validation(format!("{} must be a finite number", name)));
            }
        }
        // Cash may legitimately be overdrawn; flows and balances owed may not.
        for (name, value) in &amounts[..4] {
            if *value < 0.0 {
                return Err(RiskError::Validation(format!("{} must not be negative", name)));
            }
        }
        Ok(())
    }
}

/// Cached 30-day aggregate, recomputed on every check-in write.
///
/// Monthly figures are the per-field average over observed days times 30.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingMetricsSnapshot {
    pub business_id: BusinessId,
    pub last_checkin_date: NaiveDate,
    pub monthly_sales: f64,
    pub monthly_expenses: f64,
    pub monthly_receivables: f64,
    pub monthly_loan_emi: f64,
    pub monthly_cash_balance: f64,
    /// Number of check-ins actually observed in the window
    pub window_days: u32,
}

/// Result of a check-in upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinReceipt {
    #[serde(flatten)]
    pub snapshot: RollingMetricsSnapshot,
    /// True when a record for the same date was replaced
    pub updated: bool,
}

/// Summed current vs prior 30-day windows, used for growth comparisons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingWindow {
    pub as_of_date: NaiveDate,
    pub monthly_sales: f64,
    pub monthly_expenses: f64,
    pub sales_3_months_ago: f64,
    pub expenses_3_months_ago: f64,
    pub current_days: u32,
    pub prior_days: u32,
}

/// Trimmed check-in row for trend charts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinHistoryEntry {
    pub checkin_date: NaiveDate,
    pub daily_sales: f64,
    pub daily_expenses: f64,
}

/// Raw monthly figures as supplied by a caller. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialInput {
    #[serde(default)]
    pub monthly_sales: Option<f64>,
    #[serde(default)]
    pub monthly_expenses: Option<f64>,
    #[serde(default)]
    pub receivables: Option<f64>,
    #[serde(default)]
    pub loan_emi: Option<f64>,
    #[serde(default)]
    pub cash_balance: Option<f64>,
    #[serde(default)]
    pub sales_3_months_ago: Option<f64>,
    #[serde(default)]
    pub expenses_3_months_ago: Option<f64>,
}

impl FinancialInput {
    /// Lenient extraction from an arbitrary JSON object.
    ///
    /// Numbers and numeric strings are accepted; anything else (including
    /// non-finite values) is treated as absent.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let field = |key: &str| value.get(key).and_then(lenient_f64);
        Self {
            monthly_sales: field("monthly_sales"),
            monthly_expenses: field("monthly_expenses"),
            receivables: field("receivables"),
            loan_emi: field("loan_emi"),
            cash_balance: field("cash_balance"),
            sales_3_months_ago: field("sales_3_months_ago"),
            expenses_3_months_ago: field("expenses_3_months_ago"),
        }
    }

    fn required(&self) -> [(&'static str, Option<f64>); 5] {
        [
            (REQUIRED_FIELDS[0], self.monthly_sales),
            (REQUIRED_FIELDS[1], self.monthly_expenses),
            (REQUIRED_FIELDS[2], self.receivables),
            (REQUIRED_FIELDS[3], self.loan_emi),
            (REQUIRED_FIELDS[4], self.cash_balance),
        ]
    }

    /// Names of required fields that are absent or not finite
    pub fn missing_required(&self) -> Vec<&'static str> {
        self.required()
            .into_iter()
            .filter(|(_, v)| !v.is_some_and(f64::is_finite))
            .map(|(name, _)| name)
            .collect()
    }

    /// Number of supplied figures, comparisons included
    pub fn present_count(&self) -> usize {
        let extra = [self.sales_3_months_ago, self.expenses_3_months_ago];
        self.required()
            .iter()
            .map(|(_, v)| *v)
            .chain(extra)
            .filter(|v| v.is_some_and(f64::is_finite))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }

    /// Fill every absent field from `other`, keeping supplied values.
    pub fn or(self, other: &FinancialInput) -> FinancialInput {
        FinancialInput {
            monthly_sales: self.monthly_sales.or(other.monthly_sales),
            monthly_expenses: self.monthly_expenses.or(other.monthly_expenses),
            receivables: self.receivables.or(other.receivables),
            loan_emi: self.loan_emi.or(other.loan_emi),
            cash_balance: self.cash_balance.or(other.cash_balance),
            sales_3_months_ago: self.sales_3_months_ago.or(other.sales_3_months_ago),
            expenses_3_months_ago: self.expenses_3_months_ago.or(other.expenses_3_months_ago),
        }
    }

    /// Coerce to concrete numbers, absent or non-finite becoming 0.0.
    pub fn resolve(&self) -> ResolvedFigures {
        let num = |v: Option<f64>| v.filter(|x| x.is_finite()).unwrap_or(0.0);
        ResolvedFigures {
            sales: num(self.monthly_sales),
            expenses: num(self.monthly_expenses),
            receivables: num(self.receivables),
            loan_emi: num(self.loan_emi),
            cash_balance: num(self.cash_balance),
            sales_3_months_ago: num(self.sales_3_months_ago),
            expenses_3_months_ago: num(self.expenses_3_months_ago),
        }
    }
}

impl From<&RollingWindow> for FinancialInput {
    fn from(window: &RollingWindow) -> Self {
        FinancialInput {
            monthly_sales: Some(window.monthly_sales),
            monthly_expenses: Some(window.monthly_expenses),
            sales_3_months_ago: Some(window.sales_3_months_ago),
            expenses_3_months_ago: Some(window.expenses_3_months_ago),
            ..Default::default()
        }
    }
}

impl From<&RollingMetricsSnapshot> for FinancialInput {
    fn from(snapshot: &RollingMetricsSnapshot) -> Self {
        FinancialInput {
            monthly_sales: Some(snapshot.monthly_sales),
            monthly_expenses: Some(snapshot.monthly_expenses),
            receivables: Some(snapshot.monthly_receivables),
            loan_emi: Some(snapshot.monthly_loan_emi),
            cash_balance: Some(snapshot.monthly_cash_balance),
            ..Default::default()
        }
    }
}

fn lenient_f64(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Raw figures after defensive coercion
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFigures {
    pub sales: f64,
    pub expenses: f64,
    pub receivables: f64,
    pub loan_emi: f64,
    pub cash_balance: f64,
    pub sales_3_months_ago: f64,
    pub expenses_3_months_ago: f64,
}

/// Derived ratios. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub profit_margin: f64,
    pub receivables_ratio: f64,
    pub emi_ratio: f64,
    pub cash_buffer_months: f64,
    pub sales_growth_rate: f64,
    pub expense_growth_rate: f64,
}

impl FeatureVector {
    /// Classifier feature order. Growth rates are deliberately excluded.
    pub const CLASSIFIER_FEATURES: [&'static str; 4] = [
        "profit_margin",
        "receivables_ratio",
        "emi_ratio",
        "cash_buffer_months",
    ];

    pub fn classifier_inputs(&self) -> [f64; 4] {
        [
            self.profit_margin,
            self.receivables_ratio,
            self.emi_ratio,
            self.cash_buffer_months,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

/// Output of a single fired rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub severity: Severity,
    pub warning: String,
    pub suggestion: String,
    pub triggering_feature: String,
}

/// Risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "INSUFFICIENT DATA")]
    InsufficientData,
}

impl RiskLevel {
    /// Map an integer score (0-100) to a tier
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s < 35 => RiskLevel::Low,
            s if s < 65 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::InsufficientData => "INSUFFICIENT DATA",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_required_lists_absent_fields_in_order() {
        let input = FinancialInput {
            monthly_sales: Some(50_000.0),
            loan_emi: Some(f64::NAN),
            ..Default::default()
        };
        assert_eq!(
            input.missing_required(),
            vec!["monthly_expenses", "receivables", "loan_emi", "cash_balance"]
        );
    }

    #[test]
    fn test_from_json_is_lenient() {
        let input = FinancialInput::from_json(&json!({
            "monthly_sales": "45000",
            "monthly_expenses": 30000,
            "receivables": "n/a",
            "loan_emi": null,
            "cash_balance": true,
        }));
        assert_eq!(input.monthly_sales, Some(45_000.0));
        assert_eq!(input.monthly_expenses, Some(30_000.0));
        assert_eq!(input.receivables, None);
        assert_eq!(input.loan_emi, None);
        assert_eq!(input.cash_balance, None);
        assert_eq!(input.present_count(), 2);
    }

    #[test]
    fn test_or_keeps_supplied_values() {
        let supplied = FinancialInput {
            cash_balance: Some(1_000.0),
            ..Default::default()
        };
        let fallback = FinancialInput {
            monthly_sales: Some(9_000.0),
            cash_balance: Some(5_000.0),
            ..Default::default()
        };
        let merged = supplied.or(&fallback);
        assert_eq!(merged.cash_balance, Some(1_000.0));
        assert_eq!(merged.monthly_sales, Some(9_000.0));
    }

    #[test]
    fn test_risk_level_serializes_with_display_names() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::InsufficientData).unwrap(),
            "\"INSUFFICIENT DATA\""
        );
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"HIGH\"");
        assert_eq!(RiskLevel::from_score(34), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(35), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(64), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(65), RiskLevel::High);
    }

    #[test]
    fn test_checkin_validation() {
        let mut checkin = DailyCheckin {
            business_id: 1,
            checkin_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            daily_sales: 1_000.0,
            daily_expenses: 800.0,
            receivables: 0.0,
            loan_emi: 0.0,
            cash_balance: -250.0,
        };
        assert!(checkin.validate().is_ok());

        checkin.daily_expenses = -1.0;
        assert!(matches!(checkin.validate(), Err(RiskError::Validation(_))));

        checkin.daily_expenses = f64::INFINITY;
        assert!(matches!(checkin.validate(), Err(RiskError::Validation(_))));
    }

    #[test]
    fn test_new_business_normalization() {
        let ok = NewBusiness::new("  Asha Traders ", " asha@example.com ")
            .normalized()
            .unwrap();
        assert_eq!(ok.name, "Asha Traders");
        assert_eq!(ok.email, "asha@example.com");

        assert!(NewBusiness::new("", "a@b.c").normalized().is_err());
        assert!(NewBusiness::new("Shop", "not-an-email").normalized().is_err());
    }
}
