//! Prometheus metrics for endpoints
//!
//! Counters and gauges for batch cycles, call outcomes, queue depth and
//! connection state, labelled by endpoint address.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Counter: batches sent, by outcome
    pub static ref BATCHES: CounterVec = register_counter_vec!(
        "batchline_batches_total",
        "Batches sent by outcome",
        &["endpoint", "outcome"]
    )
    .expect("Failed to create batches metric");

    /// Counter: calls resolved, by outcome
    pub static ref CALLS: CounterVec = register_counter_vec!(
        "batchline_calls_total",
        "Calls resolved by outcome",
        &["endpoint", "outcome"]
    )
    .expect("Failed to create calls metric");

    /// Histogram: batch round-trip duration (seconds)
    pub static ref BATCH_DURATION: HistogramVec = register_histogram_vec!(
        "batchline_batch_duration_seconds",
        "Duration of batch round-trips",
        &["endpoint"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to create batch_duration metric");

    /// Gauge: calls waiting for the next flush
    pub static ref QUEUE_DEPTH: GaugeVec = register_gauge_vec!(
        "batchline_queue_depth",
        "Calls waiting for the next flush",
        &["endpoint"]
    )
    .expect("Failed to create queue_depth metric");

    /// Gauge: connection state (1 = alive, 0 = dead or unknown)
    pub static ref CONNECTION_ALIVE: GaugeVec = register_gauge_vec!(
        "batchline_connection_alive",
        "Connection state (1 = alive, 0 = dead or unknown)",
        &["endpoint"]
    )
    .expect("Failed to create connection_alive metric");
}

/// Record a completed batch
pub fn record_batch(endpoint: &str, outcome: &str, duration_secs: f64) {
    BATCHES.with_label_values(&[endpoint, outcome]).inc();
    BATCH_DURATION
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

/// Record `count` calls resolved with `outcome`
pub fn record_calls(endpoint: &str, outcome: &str, count: usize) {
    if count > 0 {
        CALLS
            .with_label_values(&[endpoint, outcome])
            .inc_by(count as f64);
    }
}

/// Set the queue depth of an endpoint
pub fn set_queue_depth(endpoint: &str, depth: usize) {
    QUEUE_DEPTH.with_label_values(&[endpoint]).set(depth as f64);
}

/// Set the connection state of an endpoint
pub fn set_connection_alive(endpoint: &str, alive: bool) {
    CONNECTION_ALIVE
        .with_label_values(&[endpoint])
        .set(if alive { 1.0 } else { 0.0 });
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> crate::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::BatchlineError::Other(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::BatchlineError::Other(format!("Metrics are not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        record_batch("http://test/metrics", "delivered", 0.02);
        record_calls("http://test/metrics", "success", 3);
        record_calls("http://test/metrics", "rejected", 0);
        set_queue_depth("http://test/metrics", 4);
        set_connection_alive("http://test/metrics", true);
    }

    #[test]
    fn test_encode_metrics() {
        record_batch("http://test/encode", "transport_failure", 0.5);
        let output = encode_metrics().unwrap();

        assert!(output.contains("batchline_batches_total"));
        assert!(output.contains("transport_failure"));
    }
}
