//! Prometheus collectors for the notification hub.
//!
//! The authoritative counters live in `hub::HubMetrics`; these collectors are
//! fed alongside them and exported through `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Encoder, Histogram, IntCounter,
    IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "hub";

lazy_static! {
    /// Currently open subscriber connections
    pub static ref CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_active", METRIC_PREFIX),
        "Currently open subscriber connections"
    ).unwrap();

    /// Total connections opened since start
    pub static ref CONNECTIONS_OPENED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_connections_opened_total", METRIC_PREFIX),
        "Total subscriber connections opened"
    ).unwrap();

    /// Frames successfully pushed onto connection queues
    pub static ref MESSAGES_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_delivered_total", METRIC_PREFIX),
        "Total frames delivered to connection outbound queues"
    ).unwrap();

    /// Envelopes dropped because the submission queue was full
    pub static ref MESSAGES_DROPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_dropped_total", METRIC_PREFIX),
        "Total envelopes dropped on submission-queue overflow"
    ).unwrap();

    /// Missed notifications replayed on reconnect
    pub static ref MESSAGES_REPLAYED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_replayed_total", METRIC_PREFIX),
        "Total missed notifications replayed to reconnecting subscribers"
    ).unwrap();

    /// Fan-out resolution latency per envelope
    pub static ref FANOUT_LATENCY_SECONDS: Histogram = register_histogram!(
        format!("{}_fanout_latency_seconds", METRIC_PREFIX),
        "Broadcast fan-out resolution latency in seconds",
        vec![0.00001, 0.0001, 0.001, 0.01, 0.1, 1.0]
    ).unwrap();
}

/// Encode all registered metrics to Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
