use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use serde_json::Value;
use tracing::warn;

// Numeric epochs below this are seconds, anything larger is milliseconds
const EPOCH_SECONDS_CUTOFF: i64 = 10_000_000_000;

// Fractional digits kept by the DateTime64(3) columns
const STORED_SUBSEC_DIGITS: u16 = 3;

const OFFSET_FORMATS: [&str; 7] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M%z",
    // Hour-only offsets such as +02
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f %#z",
];

const NAIVE_FORMATS: [&str; 7] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// How zoned timestamps become naive ones.
///
/// `StripZone` keeps the wall-clock reading and drops the offset, which is what
/// rows already stored in `analytics_events` were written with. `Utc` converts
/// to UTC first, so sources reporting mixed offsets stay comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampMode {
    #[default]
    StripZone,
    Utc,
}

impl FromStr for TimestampMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strip_zone" | "strip-zone" | "naive" => Ok(TimestampMode::StripZone),
            "utc" => Ok(TimestampMode::Utc),
            _ => Err(format!("Invalid timestamp mode: {s}")),
        }
    }
}

impl TimestampMode {
    /// Wall-clock time used when a field is missing or unparseable.
    pub fn now(&self) -> NaiveDateTime {
        let now = match self {
            TimestampMode::StripZone => Local::now().naive_local(),
            TimestampMode::Utc => Utc::now().naive_utc(),
        };
        now.trunc_subsecs(STORED_SUBSEC_DIGITS)
    }

    fn resolve(&self, dt: DateTime<FixedOffset>) -> NaiveDateTime {
        match self {
            TimestampMode::StripZone => dt.naive_local(),
            TimestampMode::Utc => dt.naive_utc(),
        }
    }
}

/// Result of normalizing a single timestamp field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized {
    Parsed(NaiveDateTime),
    /// The field was absent, the fallback instant was used.
    Missing(NaiveDateTime),
    /// The field was present but could not be parsed, the fallback instant was used.
    Invalid(NaiveDateTime),
}

impl Normalized {
    pub fn value(&self) -> NaiveDateTime {
        match self {
            Normalized::Parsed(ts) | Normalized::Missing(ts) | Normalized::Invalid(ts) => *ts,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Normalized::Invalid(_))
    }
}

/// Normalize a raw field value, falling back to `now` when it is absent or
/// unparseable. A parse failure is logged but never rejects the record.
pub fn normalize(
    field: &str,
    raw: Option<&Value>,
    mode: TimestampMode,
    now: NaiveDateTime,
) -> Normalized {
    let Some(value) = raw else {
        return Normalized::Missing(now);
    };

    match parse_value(value, mode) {
        Some(ts) => Normalized::Parsed(ts),
        None => {
            warn!(field, value = %value, "Could not parse {field}, using current time");
            Normalized::Invalid(now)
        }
    }
}

/// Parse a JSON value holding a timestamp. Strings go through [`parse_str`],
/// integers are treated as epoch seconds or milliseconds.
///
/// The result is truncated to milliseconds, the precision the store keeps, so
/// a value compares equal to itself once read back as the watermark.
pub fn parse_value(value: &Value, mode: TimestampMode) -> Option<NaiveDateTime> {
    let parsed = match value {
        Value::String(s) => parse_str(s, mode),
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        _ => None,
    };
    parsed.map(|ts| ts.trunc_subsecs(STORED_SUBSEC_DIGITS))
}

/// Parse a timestamp string into a naive instant.
///
/// Tries, in order: RFC 3339, ISO-like strings with a trailing offset, naive
/// ISO-like strings, RFC 2822, a bare date, an integer epoch, and finally
/// `dateparser` for anything more exotic.
pub fn parse_str(input: &str, mode: TimestampMode) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(mode.resolve(dt));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(input, fmt) {
            return Some(mode.resolve(dt));
        }
    }

    if let Some(naive) = parse_naive(input) {
        return Some(naive);
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(mode.resolve(dt));
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    if let Ok(epoch) = input.parse::<i64>() {
        return from_epoch(epoch);
    }

    // dateparser converts zoned input to UTC, so strip mode drops a trailing
    // zone name first and keeps the wall-clock reading
    let input = match mode {
        TimestampMode::StripZone => strip_zone_name(input),
        TimestampMode::Utc => input,
    };
    if let Some(naive) = parse_naive(input) {
        return Some(naive);
    }

    // Naive inputs are read as UTC so the wall-clock reading survives
    dateparser::parse_with_timezone(input, &Utc)
        .ok()
        .map(|dt| dt.naive_utc())
}

fn parse_naive(input: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
}

/// `input` without a trailing zone abbreviation such as ` PST` or ` UTC`.
fn strip_zone_name(input: &str) -> &str {
    match input.rsplit_once(' ') {
        Some((rest, zone))
            if (2..=5).contains(&zone.len())
                && zone.chars().all(|c| c.is_ascii_uppercase())
                && !matches!(zone, "AM" | "PM") =>
        {
            rest.trim_end()
        }
        _ => input,
    }
}

fn from_epoch(epoch: i64) -> Option<NaiveDateTime> {
    let dt = if epoch.abs() < EPOCH_SECONDS_CUTOFF {
        DateTime::from_timestamp(epoch, 0)
    } else {
        DateTime::from_timestamp_millis(epoch)
    };
    dt.map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
            .unwrap()
    }

    #[test]
    fn test_strip_zone_keeps_wall_clock() {
        let parsed = parse_str("2024-03-01T10:15:30.250+02:00", TimestampMode::StripZone);
        assert_eq!(parsed, Some(ts("2024-03-01 10:15:30.250")));

        let parsed = parse_str("2024-03-01T10:15:30Z", TimestampMode::StripZone);
        assert_eq!(parsed, Some(ts("2024-03-01 10:15:30")));
    }

    #[test]
    fn test_utc_mode_converts_offsets() {
        let parsed = parse_str("2024-03-01T10:15:30.250+02:00", TimestampMode::Utc);
        assert_eq!(parsed, Some(ts("2024-03-01 08:15:30.250")));

        // Naive values are taken as already being UTC
        let parsed = parse_str("2024-03-01 10:15:30", TimestampMode::Utc);
        assert_eq!(parsed, Some(ts("2024-03-01 10:15:30")));
    }

    #[test]
    fn test_naive_formats() {
        let mode = TimestampMode::StripZone;
        assert_eq!(
            parse_str("2024-03-01 10:15:30.123456", mode),
            Some(ts("2024-03-01 10:15:30.123456"))
        );
        assert_eq!(
            parse_str("2024-03-01T10:15:30", mode),
            Some(ts("2024-03-01 10:15:30"))
        );
        assert_eq!(
            parse_str("2024-03-01T10:15", mode),
            Some(ts("2024-03-01 10:15:00"))
        );
        assert_eq!(
            parse_str("2024/03/01 10:15:30", mode),
            Some(ts("2024-03-01 10:15:30"))
        );
        assert_eq!(parse_str("2024-03-01", mode), Some(ts("2024-03-01 00:00:00")));
    }

    #[test]
    fn test_hour_only_offset() {
        assert_eq!(
            parse_str("2024-03-01T10:15:30+02", TimestampMode::StripZone),
            Some(ts("2024-03-01 10:15:30"))
        );
        assert_eq!(
            parse_str("2024-03-01T10:15:30+02", TimestampMode::Utc),
            Some(ts("2024-03-01 08:15:30"))
        );
        assert_eq!(
            parse_str("2024-03-01 10:15:30.5 -05", TimestampMode::Utc),
            Some(ts("2024-03-01 15:15:30.5"))
        );
    }

    #[test]
    fn test_zone_names() {
        assert_eq!(
            parse_str("2017-11-25 13:31:15 PST", TimestampMode::StripZone),
            Some(ts("2017-11-25 13:31:15"))
        );
        assert_eq!(
            parse_str("2017-11-25 13:31:15 PST", TimestampMode::Utc),
            Some(ts("2017-11-25 21:31:15"))
        );
        assert_eq!(strip_zone_name("2017-11-25 13:31:15 UTC"), "2017-11-25 13:31:15");
        assert_eq!(strip_zone_name("Nov 25 2017 1:31 PM"), "Nov 25 2017 1:31 PM");
        assert_eq!(strip_zone_name("2017-11-25"), "2017-11-25");
    }

    #[test]
    fn test_values_are_truncated_to_millis() {
        let mode = TimestampMode::StripZone;
        assert_eq!(
            parse_value(&json!("2024-03-01T10:15:30.123456789Z"), mode),
            Some(ts("2024-03-01 10:15:30.123"))
        );
        assert_eq!(
            parse_value(&json!("2024-03-01 10:15:30.999999"), mode),
            Some(ts("2024-03-01 10:15:30.999"))
        );
        assert_eq!(mode.now().and_utc().timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_rfc2822() {
        assert_eq!(
            parse_str("Tue, 1 Jul 2003 10:52:37 +0200", TimestampMode::StripZone),
            Some(ts("2003-07-01 10:52:37"))
        );
        assert_eq!(
            parse_str("Tue, 1 Jul 2003 10:52:37 +0200", TimestampMode::Utc),
            Some(ts("2003-07-01 08:52:37"))
        );
    }

    #[test]
    fn test_epoch_values() {
        let mode = TimestampMode::StripZone;
        // 2024-01-01 12:00:00 UTC
        assert_eq!(
            parse_value(&json!(1704110400), mode),
            Some(ts("2024-01-01 12:00:00"))
        );
        assert_eq!(
            parse_value(&json!(1704110400123i64), mode),
            Some(ts("2024-01-01 12:00:00.123"))
        );
        assert_eq!(
            parse_value(&json!("1704110400"), mode),
            Some(ts("2024-01-01 12:00:00"))
        );
    }

    #[test]
    fn test_unparseable_values() {
        let mode = TimestampMode::StripZone;
        assert_eq!(parse_str("", mode), None);
        assert_eq!(parse_str("not a timestamp", mode), None);
        assert_eq!(parse_value(&json!(null), mode), None);
        assert_eq!(parse_value(&json!(true), mode), None);
        assert_eq!(parse_value(&json!({"at": "2024-01-01"}), mode), None);
    }

    #[test]
    fn test_normalize_fallbacks() {
        let now = ts("2030-01-01 00:00:00");
        let mode = TimestampMode::StripZone;

        assert_eq!(
            normalize("serverTimestamp", None, mode, now),
            Normalized::Missing(now)
        );

        let garbage = json!("yesterday-ish");
        let result = normalize("serverTimestamp", Some(&garbage), mode, now);
        assert!(result.is_invalid());
        assert_eq!(result.value(), now);

        let null = json!(null);
        assert!(normalize("timestamp", Some(&null), mode, now).is_invalid());

        let good = json!("2024-03-01T10:15:30Z");
        assert_eq!(
            normalize("timestamp", Some(&good), mode, now),
            Normalized::Parsed(ts("2024-03-01 10:15:30"))
        );
    }

    #[test]
    fn test_timestamp_mode_from_str() {
        assert_eq!("strip_zone".parse::<TimestampMode>(), Ok(TimestampMode::StripZone));
        assert_eq!("UTC".parse::<TimestampMode>(), Ok(TimestampMode::Utc));
        assert!("local".parse::<TimestampMode>().is_err());
    }
}
