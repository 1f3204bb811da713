use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use risk_core::{
    Business, BusinessId, CheckinHistoryEntry, CheckinReceipt, DailyCheckin, NewBusiness,
    RiskError, RiskResult, RollingMetricsSnapshot, RollingWindow,
};
use sqlx::any::AnyPoolOptions;
use sqlx::FromRow;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::locks::BusinessLocks;
use crate::store::MetricsStore;
use crate::window::{comparison_range, current_range, rolling_window_from, snapshot_from_records};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Relational backend over `sqlx::AnyPool`.
///
/// The check-in upsert and the snapshot recompute run in one transaction
/// while the business lock is held. SQLite allows one writer per database
/// file, so every write also holds the store-wide `writer` gate.
pub struct SqlMetricsStore {
    pool: sqlx::AnyPool,
    locks: BusinessLocks,
    writer: Arc<Mutex<()>>,
}

#[derive(Debug, FromRow)]
struct BusinessRow {
    id: i64,
    name: String,
    email: String,
}

impl From<BusinessRow> for Business {
    fn from(row: BusinessRow) -> Self {
        Business {
            id: row.id,
            name: row.name,
            email: row.email,
        }
    }
}

/// Internal DB row type with String dates (compatible with sqlx Any backend)
#[derive(Debug, FromRow)]
struct CheckinRow {
    business_id: i64,
    checkin_date: String,
    daily_sales: f64,
    daily_expenses: f64,
    receivables: f64,
    loan_emi: f64,
    cash_balance: f64,
}

impl CheckinRow {
    fn into_checkin(self) -> RiskResult<DailyCheckin> {
        Ok(DailyCheckin {
            business_id: self.business_id,
            checkin_date: parse_date(&self.checkin_date)?,
            daily_sales: self.daily_sales,
            daily_expenses: self.daily_expenses,
            receivables: self.receivables,
            loan_emi: self.loan_emi,
            cash_balance: self.cash_balance,
        })
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    checkin_date: String,
    daily_sales: f64,
    daily_expenses: f64,
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    business_id: i64,
    last_checkin_date: String,
    monthly_sales: f64,
    monthly_expenses: f64,
    monthly_receivables: f64,
    monthly_loan_emi: f64,
    monthly_cash_balance: f64,
    window_days: i64,
}

impl SnapshotRow {
    fn into_snapshot(self) -> RiskResult<RollingMetricsSnapshot> {
        Ok(RollingMetricsSnapshot {
            business_id: self.business_id,
            last_checkin_date: parse_date(&self.last_checkin_date)?,
            monthly_sales: self.monthly_sales,
            monthly_expenses: self.monthly_expenses,
            monthly_receivables: self.monthly_receivables,
            monthly_loan_emi: self.monthly_loan_emi,
            monthly_cash_balance: self.monthly_cash_balance,
            window_days: u32::try_from(self.window_days).unwrap_or(0),
        })
    }
}

fn parse_date(raw: &str) -> RiskResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| RiskError::Storage(format!("bad stored date {:?}: {}", raw, e)))
}

fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

impl SqlMetricsStore {
    /// Connect and make sure the schema exists
    pub async fn connect(database_url: &str) -> RiskResult<Self> {
        sqlx::any::install_default_drivers();

        // Every in-memory SQLite connection is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    pub fn new(pool: sqlx::AnyPool) -> Self {
        Self {
            pool,
            locks: BusinessLocks::new(),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Get a reference to the underlying database pool
    pub fn pool(&self) -> &sqlx::AnyPool {
        &self.pool
    }

    /// Initialize database schema
    pub async fn init_schema(&self) -> RiskResult<()> {
        let schema = include_str!("../schema.sql");

        // sqlx does not run multiple statements in one query
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    async fn require_business(&self, id: BusinessId) -> RiskResult<()> {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM businesses WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(()),
            None => Err(RiskError::NotFound(id)),
        }
    }

    async fn checkins_between(
        &self,
        id: BusinessId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RiskResult<Vec<DailyCheckin>> {
        let rows: Vec<CheckinRow> = sqlx::query_as(
            r#"
            SELECT business_id, checkin_date, daily_sales, daily_expenses,
                   receivables, loan_emi, cash_balance
            FROM daily_checkins
            WHERE business_id = ? AND checkin_date >= ? AND checkin_date <= ?
            ORDER BY checkin_date ASC
            "#,
        )
        .bind(id)
        .bind(fmt_date(start))
        .bind(fmt_date(end))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CheckinRow::into_checkin).collect()
    }
}

#[async_trait]
impl MetricsStore for SqlMetricsStore {
    async fn create_business(&self, new: &NewBusiness) -> RiskResult<Business> {
        let new = new.normalized()?;

        if self.find_business_by_email(&new.email).await?.is_some() {
            return Err(RiskError::Conflict(format!(
                "email {} is already registered",
                new.email
            )));
        }

        // A racing registration still trips the UNIQUE constraint -> Conflict.
        let _writer = self.writer.lock().await;
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO businesses (name, email, created_at)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(business_id = id, "Business row inserted");
        Ok(Business {
            id,
            name: new.name,
            email: new.email,
        })
    }

    async fn find_business_by_email(&self, email: &str) -> RiskResult<Option<Business>> {
        let row: Option<BusinessRow> =
            sqlx::query_as("SELECT id, name, email FROM businesses WHERE email = ?")
                .bind(email.trim())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Business::from))
    }

    async fn get_business(&self, id: BusinessId) -> RiskResult<Option<Business>> {
        let row: Option<BusinessRow> =
            sqlx::query_as("SELECT id, name, email FROM businesses WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Business::from))
    }

    async fn upsert_checkin(&self, checkin: &DailyCheckin) -> RiskResult<CheckinReceipt> {
        checkin.validate()?;
        let id = checkin.business_id;
        let _guard = self.locks.lock(id).await;
        self.require_business(id).await?;

        let date = fmt_date(checkin.checkin_date);
        let now = Utc::now().to_rfc3339();
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM daily_checkins WHERE business_id = ? AND checkin_date = ?",
        )
        .bind(id)
        .bind(&date)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO daily_checkins (
                business_id, checkin_date, daily_sales, daily_expenses,
                receivables, loan_emi, cash_balance, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (business_id, checkin_date) DO UPDATE SET
                daily_sales = excluded.daily_sales,
                daily_expenses = excluded.daily_expenses,
                receivables = excluded.receivables,
                loan_emi = excluded.loan_emi,
                cash_balance = excluded.cash_balance,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(&date)
        .bind(checkin.daily_sales)
        .bind(checkin.daily_expenses)
        .bind(checkin.receivables)
        .bind(checkin.loan_emi)
        .bind(checkin.cash_balance)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let range = current_range(checkin.checkin_date);
        let rows: Vec<CheckinRow> = sqlx::query_as(
            r#"
            SELECT business_id, checkin_date, daily_sales, daily_expenses,
                   receivables, loan_emi, cash_balance
            FROM daily_checkins
            WHERE business_id = ? AND checkin_date >= ? AND checkin_date <= ?
            "#,
        )
        .bind(id)
        .bind(fmt_date(range.start))
        .bind(fmt_date(range.end))
        .fetch_all(&mut *tx)
        .await?;
        let records = rows
            .into_iter()
            .map(CheckinRow::into_checkin)
            .collect::<RiskResult<Vec<_>>>()?;

        let snapshot = snapshot_from_records(id, checkin.checkin_date, &records);

        sqlx::query(
            r#"
            INSERT INTO rolling_metrics (
                business_id, last_checkin_date, monthly_sales, monthly_expenses,
                monthly_receivables, monthly_loan_emi, monthly_cash_balance,
                window_days, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (business_id) DO UPDATE SET
                last_checkin_date = excluded.last_checkin_date,
                monthly_sales = excluded.monthly_sales,
                monthly_expenses = excluded.monthly_expenses,
                monthly_receivables = excluded.monthly_receivables,
                monthly_loan_emi = excluded.monthly_loan_emi,
                monthly_cash_balance = excluded.monthly_cash_balance,
                window_days = excluded.window_days,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(&date)
        .bind(snapshot.monthly_sales)
        .bind(snapshot.monthly_expenses)
        .bind(snapshot.monthly_receivables)
        .bind(snapshot.monthly_loan_emi)
        .bind(snapshot.monthly_cash_balance)
        .bind(snapshot.window_days as i64)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let updated = existing.is_some();
        tracing::debug!(
            business_id = id,
            date = %date,
            updated,
            window_days = snapshot.window_days,
            "Check-in stored"
        );
        Ok(CheckinReceipt { snapshot, updated })
    }

    async fn snapshot(&self, id: BusinessId) -> RiskResult<Option<RollingMetricsSnapshot>> {
        let _guard = self.locks.lock(id).await;
        self.require_business(id).await?;

        let row: Option<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT business_id, last_checkin_date, monthly_sales, monthly_expenses,
                   monthly_receivables, monthly_loan_emi, monthly_cash_balance, window_days
            FROM rolling_metrics
            WHERE business_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SnapshotRow::into_snapshot).transpose()
    }

    async fn history(&self, id: BusinessId, limit: usize) -> RiskResult<Vec<CheckinHistoryEntry>> {
        self.require_business(id).await?;

        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT checkin_date, daily_sales, daily_expenses FROM (
                SELECT checkin_date, daily_sales, daily_expenses
                FROM daily_checkins
                WHERE business_id = ?
                ORDER BY checkin_date DESC
                LIMIT ?
            ) AS recent
            ORDER BY checkin_date ASC
            "#,
        )
        .bind(id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(CheckinHistoryEntry {
                    checkin_date: parse_date(&r.checkin_date)?,
                    daily_sales: r.daily_sales,
                    daily_expenses: r.daily_expenses,
                })
            })
            .collect()
    }

    async fn rolling_window(&self, id: BusinessId, as_of: NaiveDate) -> RiskResult<RollingWindow> {
        let _guard = self.locks.lock(id).await;
        self.require_business(id).await?;

        let range = comparison_range(as_of);
        let records = self.checkins_between(id, range.start, range.end).await?;
        Ok(rolling_window_from(as_of, &records))
    }

    fn backend_name(&self) -> &'static str {
        "sql"
    }
}
