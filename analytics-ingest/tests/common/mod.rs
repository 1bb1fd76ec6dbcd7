#![allow(dead_code)]

use std::io::Write;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, SubsecRound};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tempfile::NamedTempFile;

use analytics_ingest::error::StoreError;
use analytics_ingest::event::EventRow;
use analytics_ingest::store::EventStore;

/// In-memory stand-in for the events table. Records every insert call so
/// tests can assert on batch boundaries. Timestamps are kept at millisecond
/// precision, like the `DateTime64(3)` columns.
#[derive(Default)]
pub struct MockEventStore {
    rows: Mutex<Vec<EventRow>>,
    batches: Mutex<Vec<usize>>,
    fail_watermark: bool,
    fail_on_batch: Option<usize>,
}

impl MockEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<EventRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn failing_watermark(mut self) -> Self {
        self.fail_watermark = true;
        self
    }

    /// Fail the nth insert call, counting from 1.
    pub fn failing_on_batch(mut self, n: usize) -> Self {
        self.fail_on_batch = Some(n);
        self
    }

    pub fn rows(&self) -> Vec<EventRow> {
        self.rows.lock().clone()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl EventStore for MockEventStore {
    async fn latest_server_timestamp(&self) -> Result<Option<NaiveDateTime>, StoreError> {
        if self.fail_watermark {
            return Err(StoreError::Rejected("connection reset".to_string()));
        }
        Ok(self.rows.lock().iter().map(|r| r.server_timestamp).max())
    }

    async fn insert_batch(&self, rows: &[EventRow]) -> Result<(), StoreError> {
        let call = self.batches.lock().len() + 1;
        if self.fail_on_batch == Some(call) {
            return Err(StoreError::Rejected("too many parts".to_string()));
        }

        self.batches.lock().push(rows.len());
        self.rows.lock().extend(rows.iter().cloned().map(|mut row| {
            row.server_timestamp = row.server_timestamp.trunc_subsecs(3);
            row.timestamp = row.timestamp.trunc_subsecs(3);
            row
        }));
        Ok(())
    }
}

pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

/// `base_time()` plus `offset` seconds, formatted the way the Prebid module
/// writes `serverTimestamp`.
pub fn server_ts(offset: i64) -> String {
    (base_time() + Duration::seconds(offset))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

pub struct EventLineBuilder {
    event_type: String,
    server_timestamp: Option<Value>,
    timestamp: Option<Value>,
    client_ip: String,
    data: Value,
}

impl Default for EventLineBuilder {
    fn default() -> Self {
        Self {
            event_type: "bidResponse".to_string(),
            server_timestamp: Some(Value::String(server_ts(0))),
            timestamp: Some(json!(1705312800000_i64)),
            client_ip: "192.168.1.10".to_string(),
            data: json!({"bidderCode": "appnexus", "adUnitCode": "div-gpt-ad-1", "cpm": 1.25}),
        }
    }
}

impl EventLineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_type(mut self, event_type: &str) -> Self {
        self.event_type = event_type.to_string();
        self
    }

    pub fn server_timestamp(mut self, value: Value) -> Self {
        self.server_timestamp = Some(value);
        self
    }

    pub fn at(self, offset: i64) -> Self {
        self.server_timestamp(Value::String(server_ts(offset)))
    }

    pub fn without_server_timestamp(mut self) -> Self {
        self.server_timestamp = None;
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn build(self) -> String {
        let mut obj = Map::new();
        obj.insert("eventType".to_string(), Value::String(self.event_type));
        if let Some(ts) = self.server_timestamp {
            obj.insert("serverTimestamp".to_string(), ts);
        }
        if let Some(ts) = self.timestamp {
            obj.insert("timestamp".to_string(), ts);
        }
        obj.insert("clientIP".to_string(), Value::String(self.client_ip));
        obj.insert("data".to_string(), self.data);
        Value::Object(obj).to_string()
    }
}

pub fn test_line() -> EventLineBuilder {
    EventLineBuilder::new()
}

/// `count` events one second apart, starting at `base_time()`.
pub fn sequential_lines(count: usize) -> Vec<String> {
    (0..count as i64).map(|i| test_line().at(i).build()).collect()
}

pub fn write_jsonl(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Lines followed by raw bytes, for input that is not valid UTF-8.
pub fn write_jsonl_with_tail(lines: &[String], tail: &[u8]) -> NamedTempFile {
    let mut file = write_jsonl(lines);
    file.write_all(tail).unwrap();
    file.flush().unwrap();
    file
}

pub fn stored_row(server_timestamp: NaiveDateTime) -> EventRow {
    EventRow {
        server_timestamp,
        client_ip: "10.0.0.1".to_string(),
        event_type: "auctionInit".to_string(),
        timestamp: server_timestamp,
        data: "{}".to_string(),
    }
}
