//! Metrics instrumentation for bridge traffic.

use std::time::Instant;

/// Record a dispatched invoke.
pub fn record_invoke() {
    metrics::counter!("bridge_invoke_total", 1);
}

/// Record an invoke the host rejected.
pub fn record_rejection() {
    metrics::counter!("bridge_invoke_rejected_total", 1);
}

/// Record one message delivered on a channel.
pub fn record_channel_delivery() {
    metrics::counter!("bridge_channel_delivery_total", 1);
}

/// Record invoke round-trip latency.
pub fn record_invoke_latency(duration_ms: f64) {
    metrics::histogram!("bridge_invoke_latency", duration_ms);
}

/// RAII timer recording invoke latency when dropped.
pub struct InvokeTimer {
    start: Instant,
}

impl InvokeTimer {
    /// Start timing now.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Drop for InvokeTimer {
    fn drop(&mut self) {
        record_invoke_latency(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}
