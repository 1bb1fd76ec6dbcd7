use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("ClickHouse error: {0}")]
    ClickHouse(#[from] clickhouse::error::Error),

    #[error("Failed to connect to ClickHouse after {attempts} attempts: {source}")]
    Connect {
        attempts: u32,
        #[source]
        source: clickhouse::error::Error,
    },

    #[error("Store rejected request: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Whether repeating the same request could succeed. Transport failures are
    /// retryable, anything the server answered with is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::ClickHouse(e) => matches!(
                e,
                clickhouse::error::Error::Network(_) | clickhouse::error::Error::TimedOut
            ),
            StoreError::Connect { .. } | StoreError::Rejected(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed reading {path} at line {line}: {source}")]
    Read {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not get latest timestamp: {0}")]
    Watermark(#[source] StoreError),

    #[error("Failed to insert batch of {rows} events after {inserted} were ingested: {source}")]
    BatchWrite {
        rows: usize,
        inserted: usize,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    /// The run is aborted either way; this only tells the caller whether
    /// starting it again is worth trying.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Watermark(source) | IngestError::BatchWrite { source, .. } => {
                source.is_retryable()
            }
            IngestError::Open { .. } | IngestError::Read { .. } => false,
        }
    }
}
