use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::error::IngestError;
use crate::store::EventStore;

/// What to do when the watermark query itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkPolicy {
    /// Treat the failure like an empty table and ingest the whole file.
    #[default]
    FailOpen,
    /// Abort the run.
    Strict,
}

/// Read the dedup cutoff for this run: the latest `serverTimestamp` already
/// stored, or `None` when there is nothing to compare against.
pub async fn read_watermark<S>(
    store: &S,
    policy: WatermarkPolicy,
) -> Result<Option<NaiveDateTime>, IngestError>
where
    S: EventStore + ?Sized,
{
    match store.latest_server_timestamp().await {
        Ok(Some(watermark)) => {
            info!("Latest timestamp in database: {}", watermark);
            info!("Only ingesting events newer than this timestamp...");
            Ok(Some(watermark))
        }
        Ok(None) => {
            info!("No existing data found - ingesting all events");
            Ok(None)
        }
        Err(e) => match policy {
            WatermarkPolicy::Strict => Err(IngestError::Watermark(e)),
            WatermarkPolicy::FailOpen => {
                warn!(error = %e, "Could not get latest timestamp, ingesting all events");
                Ok(None)
            }
        },
    }
}
