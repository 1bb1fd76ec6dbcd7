use chrono::{DateTime, NaiveDateTime};
use clickhouse::Row;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One line of the input file.
///
/// Timestamps are kept as raw JSON so the normalizer can tell an absent field
/// apart from an explicit `null`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "eventType", default)]
    pub event_type: String,
    #[serde(rename = "serverTimestamp", default, deserialize_with = "present")]
    pub server_timestamp: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub timestamp: Option<Value>,
    #[serde(rename = "clientIP", default)]
    pub client_ip: String,
    #[serde(default = "empty_object")]
    pub data: Value,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl EventRecord {
    pub fn into_row(self, server_timestamp: NaiveDateTime, timestamp: NaiveDateTime) -> EventRow {
        EventRow {
            server_timestamp,
            client_ip: self.client_ip,
            event_type: self.event_type,
            timestamp,
            data: self.data.to_string(),
        }
    }
}

/// A row of `analytics_events`.
#[derive(Debug, Clone, PartialEq, Eq, Row, Serialize)]
pub struct EventRow {
    #[serde(rename = "serverTimestamp", serialize_with = "datetime64_millis")]
    pub server_timestamp: NaiveDateTime,
    #[serde(rename = "clientIP")]
    pub client_ip: String,
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(serialize_with = "datetime64_millis")]
    pub timestamp: NaiveDateTime,
    pub data: String,
}

// DateTime64(3) travels as milliseconds since the epoch. The naive value is
// read as UTC on both sides so the two agree.
fn datetime64_millis<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_i64(ts.and_utc().timestamp_millis())
}

/// Inverse of the row encoding, used when reading `serverTimestamp` back.
pub fn from_datetime64_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}
