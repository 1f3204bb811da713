//! Window Aggregation
//!
//! Two deliberately different aggregations live here:
//!
//! - the cached snapshot extrapolates: per-field average over the observed
//!   days in `[as_of - 29, as_of]`, times 30;
//! - the rolling window sums: total sales/expenses over
//!   `[as_of - 29, as_of]` and over the prior `[as_of - 59, as_of - 30]`.
//!
//! For a complete 30-day history they agree; for sparse histories they do
//! not, and callers rely on each one's own semantics.

use chrono::{Duration, NaiveDate};
use risk_core::{BusinessId, DailyCheckin, RollingMetricsSnapshot, RollingWindow};
use rust_decimal::prelude::*;

/// Length of one window in days
pub const WINDOW_DAYS: i64 = 30;
/// Monthly extrapolation factor for the snapshot
pub const DAYS_PER_MONTH: f64 = 30.0;

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// `[as_of - 29, as_of]`
pub fn current_range(as_of: NaiveDate) -> DateRange {
    DateRange {
        start: as_of - Duration::days(WINDOW_DAYS - 1),
        end: as_of,
    }
}

/// `[as_of - 59, as_of - 30]`
pub fn prior_range(as_of: NaiveDate) -> DateRange {
    DateRange {
        start: as_of - Duration::days(2 * WINDOW_DAYS - 1),
        end: as_of - Duration::days(WINDOW_DAYS),
    }
}

/// Round a monetary amount to 2 decimal places
pub fn money(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Snapshot from the records of the current window (average × 30).
///
/// `records` must already be restricted to `current_range(as_of)`; missing
/// days are not padded.
pub fn snapshot_from_records(
    business_id: BusinessId,
    as_of: NaiveDate,
    records: &[DailyCheckin],
) -> RollingMetricsSnapshot {
    let monthly = |f: fn(&DailyCheckin) -> f64| money(mean(records.iter().map(f)) * DAYS_PER_MONTH);

    RollingMetricsSnapshot {
        business_id,
        last_checkin_date: as_of,
        monthly_sales: monthly(|c| c.daily_sales),
        monthly_expenses: monthly(|c| c.daily_expenses),
        monthly_receivables: monthly(|c| c.receivables),
        monthly_loan_emi: monthly(|c| c.loan_emi),
        monthly_cash_balance: monthly(|c| c.cash_balance),
        window_days: records.len() as u32,
    }
}

/// Summed sales and expenses plus the number of records
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowTotals {
    pub sales: f64,
    pub expenses: f64,
    pub days: u32,
}

pub fn window_totals<'a>(records: impl IntoIterator<Item = &'a DailyCheckin>) -> WindowTotals {
    records
        .into_iter()
        .fold(WindowTotals::default(), |acc, c| WindowTotals {
            sales: acc.sales + c.daily_sales,
            expenses: acc.expenses + c.daily_expenses,
            days: acc.days + 1,
        })
}

/// Rolling window from any superset of the two windows' records
pub fn rolling_window_from(as_of: NaiveDate, records: &[DailyCheckin]) -> RollingWindow {
    let current = current_range(as_of);
    let prior = prior_range(as_of);

    let cur = window_totals(records.iter().filter(|c| current.contains(c.checkin_date)));
    let prev = window_totals(records.iter().filter(|c| prior.contains(c.checkin_date)));

    RollingWindow {
        as_of_date: as_of,
        monthly_sales: money(cur.sales),
        monthly_expenses: money(cur.expenses),
        sales_3_months_ago: money(prev.sales),
        expenses_3_months_ago: money(prev.expenses),
        current_days: cur.days,
        prior_days: prev.days,
    }
}

/// `[as_of - 59, as_of]`, covering both windows
pub fn comparison_range(as_of: NaiveDate) -> DateRange {
    DateRange {
        start: prior_range(as_of).start,
        end: as_of,
    }
}
