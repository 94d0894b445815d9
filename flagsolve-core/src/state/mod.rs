//! Session state: persistence and usage metrics

pub mod metrics;
pub mod store;

pub use metrics::{Metrics, MetricsTracker};
pub use store::{HistoryStore, MemoryStore, SqliteStore};
