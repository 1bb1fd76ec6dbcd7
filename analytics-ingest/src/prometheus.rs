use std::path::Path;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Dump the current counters in the Prometheus text format, e.g. for a
/// node_exporter textfile collector.
pub async fn write_metrics_file(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    tokio::fs::write(path, handle.render()).await
}
