use dashmap::DashMap;
use risk_core::BusinessId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-business async mutex registry.
///
/// Holding the guard serializes writes and window reads for one business;
/// different businesses never contend.
#[derive(Debug, Clone, Default)]
pub struct BusinessLocks {
    inner: Arc<DashMap<BusinessId, Arc<Mutex<()>>>>,
}

impl BusinessLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, business_id: BusinessId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is not held across the await.
        let mutex = self.inner.entry(business_id).or_default().clone();
        mutex.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
