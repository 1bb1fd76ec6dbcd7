use std::path::Path;

/// Outcome of running an init script. Failed statements are logged and
/// skipped, so both counts can be non-zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchemaInitSummary {
    pub executed: usize,
    pub failed: usize,
}

pub async fn read_script(path: &Path) -> std::io::Result<String> {
    tokio::fs::read_to_string(path).await
}

/// Split a script on `;`, dropping blank statements.
pub fn split_statements(script: &str) -> Vec<&str> {
    script
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// First 50 characters of a statement, for log lines.
pub fn preview_statement(statement: &str) -> String {
    statement.chars().take(50).collect()
}
