// Metrics for the worker process
// Lock outcome counters are recorded by leaderlock-core; this module
// describes them and serves them over a Prometheus endpoint

use std::net::SocketAddr;

use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// Describe the counters the worker publishes
pub fn init_metrics() {
    describe_counter!(
        "leaderlock_acquire_total",
        "Leader lock acquire attempts by outcome (leader, follower, error)"
    );
    describe_counter!(
        "leaderlock_release_total",
        "Leader lock release attempts by outcome (released, noop, error)"
    );
}

/// Install the global Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn install_exporter(listen: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()?;

    init_metrics();
    info!(listen = %listen, "Prometheus exporter listening");
    Ok(())
}
