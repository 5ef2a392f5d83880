//! Prometheus metrics implementation.
//!
//! Uses the global registry pattern of the `metrics` crate: counters and
//! histograms register themselves on first use, and a single global
//! `PrometheusHandle` renders everything in Prometheus text format.

use crate::domain::{Metrics, MetricsPtr};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder once per process.
fn init_recorder() -> anyhow::Result<()> {
    // ---
    if HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    HANDLE.set(handle).ok();
    Ok(())
}

pub struct PrometheusMetrics {
    // Empty - uses global metrics registry pattern
}

impl Metrics for PrometheusMetrics {
    // ---
    fn render(&self) -> String {
        HANDLE.get().map(PrometheusHandle::render).unwrap_or_default()
    }

    fn record_attendance_marked(&self) {
        counter!("attendance_marked_total").increment(1);
    }

    fn record_duplicate_rejected(&self) {
        counter!("attendance_duplicates_total").increment(1);
    }

    fn record_http_request(&self, start: Instant, _path: &str, _method: &str, _status: u16) {
        histogram!("http_request_duration_seconds").record(start.elapsed());
    }
}

/// Creates a new Prometheus metrics implementation.
///
/// This implementation collects metrics in Prometheus format and exposes
/// them for scraping via the `/metrics` endpoint.
pub fn create() -> anyhow::Result<MetricsPtr> {
    // ---
    tracing::info!("Initializing Prometheus metrics");
    init_recorder()?;

    Ok(Arc::new(PrometheusMetrics {}))
}
