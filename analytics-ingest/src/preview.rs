use std::fmt::Write;
use std::path::Path;

use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

fn json_type(value: Option<&Value>) -> &'static str {
    match value {
        None => "missing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "bool",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

fn display_field(value: Option<&Value>) -> String {
    match value {
        None => "None".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn describe_line(out: &mut String, line_num: usize, event: &Value) -> std::fmt::Result {
    writeln!(out, "Line {line_num}:")?;
    writeln!(out, "  eventType: {}", display_field(event.get("eventType")))?;
    for field in ["serverTimestamp", "timestamp"] {
        let value = event.get(field);
        writeln!(
            out,
            "  {field}: {} (type: {})",
            display_field(value),
            json_type(value)
        )?;
    }
    writeln!(out, "  clientIP: {}", display_field(event.get("clientIP")))?;

    let keys: Vec<&str> = match event.get("data") {
        Some(Value::Object(data)) => data.keys().map(String::as_str).collect(),
        _ => Vec::new(),
    };
    writeln!(out, "  data keys: [{}]", keys.join(", "))?;
    writeln!(out)
}

/// Describe the first `num_lines` lines of a JSONL file. Blank lines count
/// towards the limit but are not shown.
pub async fn preview_file(path: &Path, num_lines: usize) -> std::io::Result<String> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut out = String::new();
    let rule = "-".repeat(50);
    // Writing to a String cannot fail
    writeln!(out, "Previewing first {num_lines} lines of {}:", path.display()).ok();
    writeln!(out, "{rule}").ok();

    let mut line_num = 0;
    while line_num < num_lines {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        line_num += 1;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(event) => describe_line(&mut out, line_num, &event).ok(),
            Err(e) => writeln!(out, "Line {line_num}: Invalid JSON - {e}").ok(),
        };
    }

    writeln!(out, "{rule}").ok();
    Ok(out)
}
