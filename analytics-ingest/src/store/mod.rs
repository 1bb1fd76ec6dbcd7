mod clickhouse;

pub use clickhouse::ClickHouseStore;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::StoreError;
use crate::event::EventRow;

pub const EVENTS_TABLE: &str = "analytics_events";

/// The destination table, as seen by the ingestion driver.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// The largest `serverTimestamp` stored, or `None` for an empty table.
    async fn latest_server_timestamp(&self) -> Result<Option<NaiveDateTime>, StoreError>;

    /// Insert all rows in one request.
    async fn insert_batch(&self, rows: &[EventRow]) -> Result<(), StoreError>;
}
