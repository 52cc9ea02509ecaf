//! Hub metrics sink: counters, the active-connection gauge and a smoothed
//! fan-out latency estimate. Safe for concurrent read; every recording method
//! also feeds the matching Prometheus collector.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::metrics as prom;

#[derive(Default)]
pub struct HubMetrics {
    total_connections: AtomicU64,
    active_connections: AtomicI64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    replayed: AtomicU64,
    /// Smoothed fan-out latency in milliseconds, stored as f64 bits.
    /// Written only by the hub control loop.
    latency_ms: AtomicU64,
}

/// Point-in-time view of the hub metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_connections: u64,
    pub active_connections: i64,
    pub delivered: u64,
    pub dropped: u64,
    pub replayed: u64,
    pub average_latency_ms: f64,
}

impl HubMetrics {
    pub fn record_connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        prom::CONNECTIONS_OPENED_TOTAL.inc();
        prom::CONNECTIONS_ACTIVE.inc();
    }

    pub fn record_connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        prom::CONNECTIONS_ACTIVE.dec();
    }

    pub fn record_delivered(&self, count: u64) {
        if count > 0 {
            self.delivered.fetch_add(count, Ordering::Relaxed);
            prom::MESSAGES_DELIVERED_TOTAL.inc_by(count);
        }
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        prom::MESSAGES_DROPPED_TOTAL.inc();
    }

    pub fn record_replayed(&self) {
        self.replayed.fetch_add(1, Ordering::Relaxed);
        prom::MESSAGES_REPLAYED_TOTAL.inc();
    }

    /// Fold one fan-out duration into the latency estimate.
    ///
    /// The estimate is the midpoint of the previous value and the new sample:
    /// each older sample's weight halves with every new observation. Not a
    /// windowed average.
    pub fn observe_fanout_latency(&self, elapsed: Duration) {
        let sample_ms = elapsed.as_secs_f64() * 1000.0;
        let previous = f64::from_bits(self.latency_ms.load(Ordering::Relaxed));
        let next = (previous + sample_ms) / 2.0;
        self.latency_ms.store(next.to_bits(), Ordering::Relaxed);
        prom::FANOUT_LATENCY_SECONDS.observe(elapsed.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            average_latency_ms: f64::from_bits(self.latency_ms.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let metrics = HubMetrics::default();
        metrics.record_connection_opened();
        metrics.record_connection_opened();
        metrics.record_connection_closed();
        metrics.record_delivered(3);
        metrics.record_delivered(0);
        metrics.record_dropped();
        metrics.record_replayed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_connections, 2);
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.delivered, 3);
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(snapshot.replayed, 1);
    }

    #[test]
    fn test_latency_midpoint_smoothing() {
        let metrics = HubMetrics::default();
        assert_eq!(metrics.snapshot().average_latency_ms, 0.0);

        metrics.observe_fanout_latency(Duration::from_millis(10));
        assert!((metrics.snapshot().average_latency_ms - 5.0).abs() < f64::EPSILON);

        metrics.observe_fanout_latency(Duration::from_millis(3));
        assert!((metrics.snapshot().average_latency_ms - 4.0).abs() < f64::EPSILON);
    }
}
