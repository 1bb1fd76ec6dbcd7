use async_trait::async_trait;
use chrono::NaiveDateTime;
use clickhouse::{Client, Row};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::backoff::retry;
use crate::config::Config;
use crate::error::StoreError;
use crate::event::{from_datetime64_millis, EventRow};
use crate::schema::{preview_statement, split_statements, SchemaInitSummary};
use crate::stats::{
    BidPerformance, EventTypeCount, StatsReport, WinRate, BID_PERFORMANCE_QUERY,
    EVENTS_BY_TYPE_QUERY, WIN_RATE_QUERY,
};

use super::{EventStore, EVENTS_TABLE};

#[derive(Debug, Row, Deserialize)]
struct WatermarkRow {
    row_count: u64,
    latest_millis: i64,
}

/// ClickHouse over HTTP. One client is shared by every step of a run.
#[derive(Clone)]
pub struct ClickHouseStore {
    client: Client,
    table: String,
}

impl ClickHouseStore {
    pub fn new(config: &Config) -> Self {
        let client = Client::default()
            .with_url(config.clickhouse_url())
            .with_database(config.clickhouse_database.clone())
            .with_user(config.clickhouse_user.clone())
            .with_password(config.clickhouse_password.clone());

        Self {
            client,
            table: EVENTS_TABLE.to_string(),
        }
    }

    /// Build a client and check it with `SELECT 1`, retrying per the
    /// configured policy. Running out of attempts is fatal.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let store = Self::new(config);
        let policy = config.connect_retry_policy();

        retry(&policy, "ClickHouse connection", || store.ping())
            .await
            .map_err(|source| StoreError::Connect {
                attempts: policy.max_attempts,
                source,
            })?;

        info!("Connected to ClickHouse at {}", config.clickhouse_url());
        Ok(store)
    }

    pub async fn ping(&self) -> Result<(), clickhouse::error::Error> {
        self.client.query("SELECT 1").execute().await
    }

    /// Run each statement of an init script in order. A failing statement is
    /// logged and skipped, so "already exists" style errors don't stop the rest.
    pub async fn init_schema(&self, script: &str) -> SchemaInitSummary {
        let mut summary = SchemaInitSummary::default();

        for statement in split_statements(script) {
            match self.client.query(statement).execute().await {
                Ok(()) => {
                    info!("Executed: {}...", preview_statement(statement));
                    summary.executed += 1;
                }
                Err(e) => {
                    warn!(
                        statement = %preview_statement(statement),
                        error = %e,
                        "Schema statement failed, skipping"
                    );
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    pub async fn query_stats(&self) -> Result<StatsReport, StoreError> {
        let events_by_type = self
            .client
            .query(EVENTS_BY_TYPE_QUERY)
            .fetch_all::<EventTypeCount>()
            .await?;

        let bid_performance = self
            .client
            .query(BID_PERFORMANCE_QUERY)
            .fetch_all::<BidPerformance>()
            .await?;

        let win_rates = self
            .client
            .query(WIN_RATE_QUERY)
            .fetch_all::<WinRate>()
            .await?;

        Ok(StatsReport {
            events_by_type,
            bid_performance,
            win_rates,
        })
    }
}

#[async_trait]
impl EventStore for ClickHouseStore {
    async fn latest_server_timestamp(&self) -> Result<Option<NaiveDateTime>, StoreError> {
        // max() over an empty table yields the epoch rather than NULL, hence the count
        let query = format!(
            "SELECT count() AS row_count, \
             toUnixTimestamp64Milli(toDateTime64(max(serverTimestamp), 3)) AS latest_millis \
             FROM {}",
            self.table
        );

        let row = self.client.query(&query).fetch_one::<WatermarkRow>().await?;

        if row.row_count == 0 {
            return Ok(None);
        }

        from_datetime64_millis(row.latest_millis)
            .map(Some)
            .ok_or_else(|| {
                StoreError::Rejected(format!(
                    "max(serverTimestamp) out of range: {}",
                    row.latest_millis
                ))
            })
    }

    async fn insert_batch(&self, rows: &[EventRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            debug!("No events to insert, skipping");
            return Ok(());
        }

        debug!(
            row_count = rows.len(),
            table = %self.table,
            "Inserting event batch"
        );

        let mut insert = self.client.insert::<EventRow>(&self.table).map_err(|e| {
            error!("Failed to create ClickHouse insert: {}", e);
            StoreError::from(e)
        })?;

        for row in rows {
            insert.write(row).await.map_err(|e| {
                error!("Failed to write row to ClickHouse: {}", e);
                StoreError::from(e)
            })?;
        }

        insert.end().await.map_err(|e| {
            error!("Error inserting batch: {}", e);
            StoreError::from(e)
        })?;

        Ok(())
    }
}
