use std::fmt;
use std::path::Path;

use chrono::NaiveDateTime;
use metrics::counter;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::batch::{Batch, DEFAULT_BATCH_SIZE};
use crate::error::IngestError;
use crate::event::{EventRecord, EventRow};
use crate::metrics_consts::{
    BATCHES_WRITTEN, BATCH_WRITE_FAILURES, EVENTS_INSERTED, EVENTS_SKIPPED, LINES_MALFORMED,
    TIMESTAMP_FALLBACKS,
};
use crate::store::EventStore;
use crate::timestamp::{normalize, TimestampMode};
use crate::watermark::read_watermark;

pub use crate::watermark::WatermarkPolicy;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub timestamp_mode: TimestampMode,
    pub watermark_policy: WatermarkPolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            timestamp_mode: TimestampMode::default(),
            watermark_policy: WatermarkPolicy::default(),
        }
    }
}

/// Counts for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    /// Rows written to the store.
    pub inserted: usize,
    /// Records at or before the watermark.
    pub skipped: usize,
    /// Lines that were not a valid event record.
    pub parse_errors: usize,
    /// Timestamp fields that were present but unparseable.
    pub timestamp_fallbacks: usize,
    pub batches: usize,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Successfully ingested {} new events", self.inserted)?;
        if self.skipped > 0 {
            write!(
                f,
                ", skipped {} existing events (already in database)",
                self.skipped
            )?;
        }
        if self.parse_errors > 0 {
            write!(f, ", {} malformed lines", self.parse_errors)?;
        }
        Ok(())
    }
}

/// Streams a JSONL file into an [`EventStore`], skipping everything at or
/// before the store's watermark.
///
/// Each batch is one insert. A failed insert aborts the run, batches written
/// before it stay in the store.
pub struct Ingestor<'a, S: EventStore + ?Sized> {
    store: &'a S,
    options: IngestOptions,
}

impl<'a, S: EventStore + ?Sized> Ingestor<'a, S> {
    pub fn new(store: &'a S, options: IngestOptions) -> Self {
        Self { store, options }
    }

    pub async fn ingest_file(&self, path: &Path) -> Result<IngestSummary, IngestError> {
        info!("Reading from {}...", path.display());

        let watermark = read_watermark(self.store, self.options.watermark_policy).await?;

        let file = File::open(path).await.map_err(|source| {
            error!("Could not open {}: {}", path.display(), source);
            IngestError::Open {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let mut lines = BufReader::new(file).lines();
        let mut batch = Batch::new(self.options.batch_size);
        let mut summary = IngestSummary::default();
        let mut line_num = 0;

        loop {
            let line = lines.next_line().await.map_err(|source| {
                error!("Error reading file: {}", source);
                IngestError::Read {
                    path: path.to_path_buf(),
                    line: line_num + 1,
                    source,
                }
            })?;
            let Some(line) = line else {
                break;
            };
            line_num += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record: EventRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Error parsing line {}: {}", line_num, e);
                    summary.parse_errors += 1;
                    counter!(LINES_MALFORMED).increment(1);
                    continue;
                }
            };

            let Some(row) = self.prepare(record, watermark, &mut summary) else {
                continue;
            };

            batch.append(row);
            if batch.is_full() {
                self.flush(&mut batch, &mut summary).await?;
            }
        }

        self.flush(&mut batch, &mut summary).await?;

        info!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            parse_errors = summary.parse_errors,
            timestamp_fallbacks = summary.timestamp_fallbacks,
            batches = summary.batches,
            "Successfully ingested {} new events from {}",
            summary.inserted,
            path.display()
        );
        if summary.skipped > 0 {
            info!(
                "Skipped {} existing events (already in database)",
                summary.skipped
            );
        }

        Ok(summary)
    }

    /// Normalize timestamps and apply the dedup filter. Returns `None` for a
    /// record at or before the watermark.
    fn prepare(
        &self,
        record: EventRecord,
        watermark: Option<NaiveDateTime>,
        summary: &mut IngestSummary,
    ) -> Option<EventRow> {
        let mode = self.options.timestamp_mode;
        let now = mode.now();

        let server_timestamp = normalize(
            "serverTimestamp",
            record.server_timestamp.as_ref(),
            mode,
            now,
        );
        let timestamp = normalize("timestamp", record.timestamp.as_ref(), mode, now);

        for field in [server_timestamp, timestamp] {
            if field.is_invalid() {
                summary.timestamp_fallbacks += 1;
                counter!(TIMESTAMP_FALLBACKS).increment(1);
            }
        }

        // Equal timestamps count as already ingested
        if watermark.is_some_and(|watermark| server_timestamp.value() <= watermark) {
            summary.skipped += 1;
            counter!(EVENTS_SKIPPED).increment(1);
            return None;
        }

        Some(record.into_row(server_timestamp.value(), timestamp.value()))
    }

    async fn flush(
        &self,
        batch: &mut Batch<EventRow>,
        summary: &mut IngestSummary,
    ) -> Result<(), IngestError> {
        if batch.is_empty() {
            return Ok(());
        }

        let rows = batch.drain();
        if let Err(source) = self.store.insert_batch(&rows).await {
            error!(
                rows = rows.len(),
                inserted = summary.inserted,
                retryable = source.is_retryable(),
                "Error inserting batch: {}",
                source
            );
            counter!(BATCH_WRITE_FAILURES).increment(1);
            return Err(IngestError::BatchWrite {
                rows: rows.len(),
                inserted: summary.inserted,
                source,
            });
        }

        summary.inserted += rows.len();
        summary.batches += 1;
        counter!(EVENTS_INSERTED).increment(rows.len() as u64);
        counter!(BATCHES_WRITTEN).increment(1);
        info!("Inserted {} events...", summary.inserted);

        Ok(())
    }
}
