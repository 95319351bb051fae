use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Every metric this crate records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricName {
    LiveFetch,
    LiveFetchDuration,
    ProviderFailures,
    PersistedRecords,
    PersistQueueDropped,
    RenormalizedRecords,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::LiveFetch => "recalls_live_fetch_total",
            MetricName::LiveFetchDuration => "recalls_live_fetch_duration_seconds",
            MetricName::ProviderFailures => "recalls_provider_failures_total",
            MetricName::PersistedRecords => "recalls_persisted_total",
            MetricName::PersistQueueDropped => "recalls_persist_queue_dropped_total",
            MetricName::RenormalizedRecords => "recalls_renormalized_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus exporter. Port from `FOOD_RECALLS_METRICS_PORT`, default 9898.
pub fn init_metrics() {
    let port: u16 = std::env::var("FOOD_RECALLS_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9898);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => warn!(error = %e, "Prometheus exporter install failed (possibly already installed)"),
    }
}

pub mod live {
    use super::MetricName;

    /// `outcome` is one of `success`, `empty`, `timeout`
    pub fn fetch(outcome: &'static str) {
        ::metrics::counter!(MetricName::LiveFetch.as_str(), "outcome" => outcome).increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::LiveFetchDuration.as_str()).record(secs);
    }
}

pub mod providers {
    use super::MetricName;

    pub fn failure(provider: &'static str) {
        ::metrics::counter!(MetricName::ProviderFailures.as_str(), "provider" => provider).increment(1);
    }
}

pub mod persist {
    use super::MetricName;

    pub fn created(count: u64) {
        ::metrics::counter!(MetricName::PersistedRecords.as_str(), "result" => "created").increment(count);
    }

    pub fn updated(count: u64) {
        ::metrics::counter!(MetricName::PersistedRecords.as_str(), "result" => "updated").increment(count);
    }

    pub fn failed(count: u64) {
        ::metrics::counter!(MetricName::PersistedRecords.as_str(), "result" => "failed").increment(count);
    }

    pub fn queue_dropped() {
        ::metrics::counter!(MetricName::PersistQueueDropped.as_str()).increment(1);
    }

    pub fn renormalized(count: u64) {
        ::metrics::counter!(MetricName::RenormalizedRecords.as_str()).increment(count);
    }
}
