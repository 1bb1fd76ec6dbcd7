use std::time::Duration;

use envconfig::Envconfig;
use thiserror::Error;

use crate::backoff::RetryPolicy;
use crate::ingest::{IngestOptions, WatermarkPolicy};
use crate::timestamp::TimestampMode;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Batch size must be greater than zero")]
    ZeroBatchSize,
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "INGEST_FILE", default = "analytics-events.jsonl")]
    pub file: String,

    #[envconfig(from = "CLICKHOUSE_HOST", default = "localhost")]
    pub clickhouse_host: String,

    #[envconfig(from = "CLICKHOUSE_HTTP_PORT", default = "8123")]
    pub clickhouse_port: u16,

    #[envconfig(from = "CLICKHOUSE_USER", default = "prebid")]
    pub clickhouse_user: String,

    #[envconfig(from = "CLICKHOUSE_PASSWORD", default = "prebid123")]
    pub clickhouse_password: String,

    #[envconfig(from = "CLICKHOUSE_DATABASE", default = "prebid_analytics")]
    pub clickhouse_database: String,

    #[envconfig(from = "INIT_SQL_PATH", default = "clickhouse-init.sql")]
    pub init_sql_path: String,

    #[envconfig(from = "BATCH_SIZE", default = "1000")]
    pub batch_size: usize,

    #[envconfig(from = "PREVIEW_LINES", default = "5")]
    pub preview_lines: usize,

    // strip_zone keeps compatibility with rows written so far, utc normalizes offsets
    #[envconfig(from = "TIMESTAMP_MODE", default = "strip_zone")]
    pub timestamp_mode: TimestampMode,

    // Abort instead of re-ingesting everything when the watermark query fails
    #[envconfig(from = "STRICT_WATERMARK", default = "false")]
    pub strict_watermark: bool,

    // Unset means counters are not recorded
    #[envconfig(from = "METRICS_FILE")]
    pub metrics_file: Option<String>,

    #[envconfig(from = "CONNECT_MAX_ATTEMPTS", default = "10")]
    pub connect_max_attempts: u32,

    #[envconfig(from = "CONNECT_RETRY_DELAY_SECONDS", default = "2")]
    pub connect_retry_delay_seconds: u64,

    // 1.0 keeps the delay fixed
    #[envconfig(from = "CONNECT_RETRY_MULTIPLIER", default = "1.0")]
    pub connect_retry_multiplier: f64,

    #[envconfig(from = "CONNECT_RETRY_MAX_DELAY_SECONDS", default = "30")]
    pub connect_retry_max_delay_seconds: u64,
}

impl Config {
    pub fn clickhouse_url(&self) -> String {
        format!("http://{}:{}", self.clickhouse_host, self.clickhouse_port)
    }

    pub fn connect_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.connect_max_attempts,
            Duration::from_secs(self.connect_retry_delay_seconds),
            self.connect_retry_multiplier,
            Duration::from_secs(self.connect_retry_max_delay_seconds),
        )
    }

    pub fn watermark_policy(&self) -> WatermarkPolicy {
        if self.strict_watermark {
            WatermarkPolicy::Strict
        } else {
            WatermarkPolicy::FailOpen
        }
    }

    pub fn ingest_options(&self) -> Result<IngestOptions, ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }

        Ok(IngestOptions {
            batch_size: self.batch_size,
            timestamp_mode: self.timestamp_mode,
            watermark_policy: self.watermark_policy(),
        })
    }
}
