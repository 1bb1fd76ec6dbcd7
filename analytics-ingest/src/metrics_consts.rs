pub const EVENTS_INSERTED: &str = "analytics_ingest_events_inserted_total";
pub const EVENTS_SKIPPED: &str = "analytics_ingest_events_skipped_total";
pub const LINES_MALFORMED: &str = "analytics_ingest_malformed_lines_total";
pub const TIMESTAMP_FALLBACKS: &str = "analytics_ingest_timestamp_fallbacks_total";
pub const BATCHES_WRITTEN: &str = "analytics_ingest_batches_written_total";
pub const BATCH_WRITE_FAILURES: &str = "analytics_ingest_batch_write_failures_total";
