use async_trait::async_trait;
use chrono::NaiveDate;
use risk_core::{
    Business, BusinessId, CheckinHistoryEntry, CheckinReceipt, DailyCheckin, NewBusiness,
    RiskResult, RollingMetricsSnapshot, RollingWindow,
};
use std::sync::Arc;

use crate::memory::MemoryMetricsStore;
use crate::sql::SqlMetricsStore;

/// Default number of check-ins returned by `history`
pub const DEFAULT_HISTORY_LIMIT: usize = 120;

/// Storage capability set shared by every backend.
///
/// Implementations must serialize `upsert_checkin`, `snapshot` and
/// `rolling_window` per business: a reader observes the state either fully
/// before or fully after a concurrent upsert.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Register a business. Fails with `Conflict` when the email is taken.
    async fn create_business(&self, new: &NewBusiness) -> RiskResult<Business>;

    async fn find_business_by_email(&self, email: &str) -> RiskResult<Option<Business>>;

    async fn get_business(&self, id: BusinessId) -> RiskResult<Option<Business>>;

    /// Insert or replace the check-in for its date and recompute the snapshot
    /// for the window ending at that date.
    async fn upsert_checkin(&self, checkin: &DailyCheckin) -> RiskResult<CheckinReceipt>;

    /// Cached snapshot, `None` before the first check-in
    async fn snapshot(&self, id: BusinessId) -> RiskResult<Option<RollingMetricsSnapshot>>;

    /// Most recent `limit` check-ins, oldest first
    async fn history(&self, id: BusinessId, limit: usize) -> RiskResult<Vec<CheckinHistoryEntry>>;

    /// Summed current and prior 30-day windows ending at `as_of`
    async fn rolling_window(&self, id: BusinessId, as_of: NaiveDate) -> RiskResult<RollingWindow>;

    fn backend_name(&self) -> &'static str;
}

/// Backend selection, decided once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Sql { database_url: String },
    Memory,
}

impl StorageConfig {
    /// Parse a backend name (`sql`/`sqlite` or `memory`/`document`)
    pub fn from_parts(backend: &str, database_url: &str) -> Option<Self> {
        match backend.trim().to_ascii_lowercase().as_str() {
            "sql" | "sqlite" | "relational" => Some(StorageConfig::Sql {
                database_url: database_url.to_string(),
            }),
            "memory" | "document" | "in-memory" => Some(StorageConfig::Memory),
            _ => None,
        }
    }
}

pub async fn open_store(config: &StorageConfig) -> RiskResult<Arc<dyn MetricsStore>> {
    let store: Arc<dyn MetricsStore> = match config {
        StorageConfig::Sql { database_url } => {
            Arc::new(SqlMetricsStore::connect(database_url).await?)
        }
        StorageConfig::Memory => Arc::new(MemoryMetricsStore::new()),
    };
    tracing::info!(backend = store.backend_name(), "Metrics store ready");
    Ok(store)
}
