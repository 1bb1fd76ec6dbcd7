use clap::Parser;

use crate::config::{Config, ConfigError};
use crate::ingest::IngestOptions;
use crate::timestamp::TimestampMode;

/// Load Prebid analytics events from a JSONL file into ClickHouse.
///
/// Every connection setting falls back to its environment variable, then to
/// the built-in default.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSONL file to ingest
    #[arg(long)]
    pub file: Option<String>,

    #[arg(long)]
    pub host: Option<String>,

    /// ClickHouse HTTP port
    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub user: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    #[arg(long)]
    pub database: Option<String>,

    /// Path to the schema script run before ingesting
    #[arg(long)]
    pub init_sql: Option<String>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// How zoned timestamps are stored: strip_zone or utc
    #[arg(long)]
    pub timestamp_mode: Option<TimestampMode>,

    /// Abort if the latest stored timestamp cannot be read
    #[arg(long, default_value = "false")]
    pub strict_watermark: bool,

    /// Write Prometheus-format counters to this file when the run ends
    #[arg(long)]
    pub metrics_file: Option<String>,

    /// Only initialize the database schema
    #[arg(long, default_value = "false")]
    pub init_only: bool,

    /// Only print statistics
    #[arg(long, default_value = "false")]
    pub stats_only: bool,

    /// Preview the first lines of the file without ingesting
    #[arg(long, default_value = "false")]
    pub preview: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Ingest,
    InitOnly,
    StatsOnly,
    Preview,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.preview {
            Mode::Preview
        } else if self.init_only {
            Mode::InitOnly
        } else if self.stats_only {
            Mode::StatsOnly
        } else {
            Mode::Ingest
        }
    }

    /// Overlay the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(file) = &self.file {
            config.file = file.clone();
        }
        if let Some(host) = &self.host {
            config.clickhouse_host = host.clone();
        }
        if let Some(port) = self.port {
            config.clickhouse_port = port;
        }
        if let Some(user) = &self.user {
            config.clickhouse_user = user.clone();
        }
        if let Some(password) = &self.password {
            config.clickhouse_password = password.clone();
        }
        if let Some(database) = &self.database {
            config.clickhouse_database = database.clone();
        }
        if let Some(init_sql) = &self.init_sql {
            config.init_sql_path = init_sql.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(mode) = self.timestamp_mode {
            config.timestamp_mode = mode;
        }
        if self.strict_watermark {
            config.strict_watermark = true;
        }
        if let Some(metrics_file) = &self.metrics_file {
            config.metrics_file = Some(metrics_file.clone());
        }
    }

    /// Apply the flags and validate the result before anything touches the
    /// store.
    pub fn configure(&self, mut config: Config) -> Result<(Config, IngestOptions), ConfigError> {
        self.apply(&mut config);
        let options = config.ingest_options()?;
        Ok((config, options))
    }
}
