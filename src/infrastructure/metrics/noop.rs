use crate::domain::{Metrics, MetricsPtr};
use std::sync::Arc;
use std::time::Instant;

/// No-op metrics implementation for testing.
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    // ---
    fn render(&self) -> String {
        String::new()
    }
    fn record_attendance_marked(&self) {}
    fn record_duplicate_rejected(&self) {}
    fn record_http_request(&self, _: Instant, _: &str, _: &str, _: u16) {}
}

/// Creates a new no-op metrics implementation.
///
/// This implementation does nothing - all metrics calls are ignored.
/// Useful for development, testing, or when metrics are disabled.
pub fn create() -> anyhow::Result<MetricsPtr> {
    // ---
    Ok(Arc::new(NoopMetrics))
}
