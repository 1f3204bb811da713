//! Rolling Metrics Store
//!
//! Daily check-in persistence and the 30-day window aggregation built on
//! top of it. Two interchangeable backends implement [`MetricsStore`]: a
//! relational one over `sqlx::AnyPool` and an in-memory document store.

pub mod locks;
pub mod memory;
pub mod sql;
pub mod store;
pub mod window;

pub use locks::BusinessLocks;
pub use memory::MemoryMetricsStore;
pub use sql::SqlMetricsStore;
pub use store::{open_store, MetricsStore, StorageConfig, DEFAULT_HISTORY_LIMIT};
