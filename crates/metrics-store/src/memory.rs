use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use risk_core::{
    Business, BusinessId, CheckinHistoryEntry, CheckinReceipt, DailyCheckin, NewBusiness,
    RiskError, RiskResult, RollingMetricsSnapshot, RollingWindow,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::store::MetricsStore;
use crate::window::{comparison_range, current_range, rolling_window_from, snapshot_from_records};

/// All state owned by one business. Check-ins are keyed by date, so an
/// upsert for an existing date replaces it.
#[derive(Debug, Default)]
struct Partition {
    checkins: BTreeMap<NaiveDate, DailyCheckin>,
    snapshot: Option<RollingMetricsSnapshot>,
}

/// Document-style backend kept entirely in memory.
///
/// Each business owns a partition behind its own async mutex, so upserts
/// and window reads for one business are serialized while different
/// businesses proceed in parallel.
#[derive(Debug)]
pub struct MemoryMetricsStore {
    businesses: DashMap<BusinessId, Business>,
    emails: DashMap<String, BusinessId>,
    partitions: DashMap<BusinessId, Arc<Mutex<Partition>>>,
    next_id: AtomicI64,
}

impl Default for MemoryMetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMetricsStore {
    pub fn new() -> Self {
        Self {
            businesses: DashMap::new(),
            emails: DashMap::new(),
            partitions: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    fn partition(&self, id: BusinessId) -> RiskResult<Arc<Mutex<Partition>>> {
        self.partitions
            .get(&id)
            .map(|p| Arc::clone(p.value()))
            .ok_or(RiskError::NotFound(id))
    }
}

#[async_trait]
impl MetricsStore for MemoryMetricsStore {
    async fn create_business(&self, new: &NewBusiness) -> RiskResult<Business> {
        let new = new.normalized()?;

        let id = match self.emails.entry(new.email.clone()) {
            Entry::Occupied(_) => {
                return Err(RiskError::Conflict(format!(
                    "email {} is already registered",
                    new.email
                )))
            }
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                slot.insert(id);
                id
            }
        };

        let business = Business {
            id,
            name: new.name,
            email: new.email,
        };
        self.partitions.insert(id, Arc::default());
        self.businesses.insert(id, business.clone());

        tracing::debug!(business_id = id, "Business partition created");
        Ok(business)
    }

    async fn find_business_by_email(&self, email: &str) -> RiskResult<Option<Business>> {
        let id = match self.emails.get(email.trim()) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.get_business(id).await
    }

    async fn get_business(&self, id: BusinessId) -> RiskResult<Option<Business>> {
        Ok(self.businesses.get(&id).map(|b| b.value().clone()))
    }

    async fn upsert_checkin(&self, checkin: &DailyCheckin) -> RiskResult<CheckinReceipt> {
        checkin.validate()?;
        let id = checkin.business_id;
        let partition = self.partition(id)?;
        let mut state = partition.lock().await;

        let updated = state
            .checkins
            .insert(checkin.checkin_date, checkin.clone())
            .is_some();

        let range = current_range(checkin.checkin_date);
        let records: Vec<DailyCheckin> = state
            .checkins
            .range(range.start..=range.end)
            .map(|(_, c)| c.clone())
            .collect();
        let snapshot = snapshot_from_records(id, checkin.checkin_date, &records);
        state.snapshot = Some(snapshot.clone());

        tracing::debug!(
            business_id = id,
            date = %checkin.checkin_date,
            updated,
            window_days = snapshot.window_days,
            "Check-in stored"
        );
        Ok(CheckinReceipt { snapshot, updated })
    }

    async fn snapshot(&self, id: BusinessId) -> RiskResult<Option<RollingMetricsSnapshot>> {
        let partition = self.partition(id)?;
        let state = partition.lock().await;
        Ok(state.snapshot.clone())
    }

    async fn history(&self, id: BusinessId, limit: usize) -> RiskResult<Vec<CheckinHistoryEntry>> {
        let partition = self.partition(id)?;
        let state = partition.lock().await;

        let mut recent: Vec<CheckinHistoryEntry> = state
            .checkins
            .values()
            .rev()
            .take(limit)
            .map(|c| CheckinHistoryEntry {
                checkin_date: c.checkin_date,
                daily_sales: c.daily_sales,
                daily_expenses: c.daily_expenses,
            })
            .collect();
        recent.reverse();
        Ok(recent)
    }

    async fn rolling_window(&self, id: BusinessId, as_of: NaiveDate) -> RiskResult<RollingWindow> {
        let partition = self.partition(id)?;
        let state = partition.lock().await;

        let range = comparison_range(as_of);
        let records: Vec<DailyCheckin> = state
            .checkins
            .range(range.start..=range.end)
            .map(|(_, c)| c.clone())
            .collect();
        Ok(rolling_window_from(as_of, &records))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
