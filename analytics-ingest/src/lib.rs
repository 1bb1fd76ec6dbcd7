pub mod backoff;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod ingest;
pub mod metrics_consts;
pub mod preview;
pub mod prometheus;
pub mod schema;
pub mod stats;
pub mod store;
pub mod timestamp;
pub mod watermark;
