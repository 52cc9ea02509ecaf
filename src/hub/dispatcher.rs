//! The hub control loop: a single task that owns all presence mutations and
//! resolves broadcast envelopes against the registry.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::notification::Notification;
use crate::websocket::{MessageKind, NotificationPayload, WireMessage};

use super::connection::Connection;
use super::metrics::{HubMetrics, MetricsSnapshot};
use super::registry::PresenceRegistry;

/// Capacity of the broadcast submission queue. Producers submitting past this
/// backlog lose envelopes instead of blocking on subscriber fan-out speed.
pub const SUBMISSION_QUEUE_SIZE: usize = 1024;

/// Capacity of the register and deregister queues.
pub const CONTROL_QUEUE_SIZE: usize = 256;

/// A unit of broadcast work. Immutable once submitted.
#[derive(Debug, Clone)]
pub struct BroadcastEnvelope {
    /// Target subscriber; `None` means tenant-wide fan-out.
    pub subscriber_id: Option<Uuid>,
    pub tenant_id: Uuid,
    pub notification: Notification,
    pub kind: MessageKind,
    pub sent_at: DateTime<Utc>,
}

impl BroadcastEnvelope {
    pub fn to_subscriber(notification: Notification) -> Self {
        Self {
            subscriber_id: Some(notification.subscriber_id),
            tenant_id: notification.tenant_id,
            notification,
            kind: MessageKind::Notification,
            sent_at: Utc::now(),
        }
    }

    pub fn to_tenant(tenant_id: Uuid, notification: Notification) -> Self {
        Self {
            subscriber_id: None,
            tenant_id,
            notification,
            kind: MessageKind::Notification,
            sent_at: Utc::now(),
        }
    }
}

/// Point-in-time hub statistics.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct HubStats {
    pub registered_subscribers: usize,
    pub registered_tenants: usize,
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
}

struct HubReceivers {
    register_rx: mpsc::Receiver<Arc<Connection>>,
    deregister_rx: mpsc::Receiver<Arc<Connection>>,
    submit_rx: mpsc::Receiver<BroadcastEnvelope>,
}

/// Fans out notification envelopes to live subscriber connections.
///
/// All registry mutation funnels through bounded queues into the control loop
/// started by [`Hub::run`]; producer-facing entry points never block.
pub struct Hub {
    registry: RwLock<PresenceRegistry>,
    register_tx: mpsc::Sender<Arc<Connection>>,
    deregister_tx: mpsc::Sender<Arc<Connection>>,
    submit_tx: mpsc::Sender<BroadcastEnvelope>,
    receivers: Mutex<Option<HubReceivers>>,
    metrics: Arc<HubMetrics>,
}

impl Hub {
    pub fn new(metrics: Arc<HubMetrics>) -> Self {
        let (register_tx, register_rx) = mpsc::channel(CONTROL_QUEUE_SIZE);
        let (deregister_tx, deregister_rx) = mpsc::channel(CONTROL_QUEUE_SIZE);
        let (submit_tx, submit_rx) = mpsc::channel(SUBMISSION_QUEUE_SIZE);

        Self {
            registry: RwLock::new(PresenceRegistry::default()),
            register_tx,
            deregister_tx,
            submit_tx,
            receivers: Mutex::new(Some(HubReceivers {
                register_rx,
                deregister_rx,
                submit_rx,
            })),
            metrics,
        }
    }

    /// Submit an envelope for fan-out. Never blocks: a full submission queue
    /// drops the envelope and bumps the dropped counter.
    pub fn submit(&self, envelope: BroadcastEnvelope) {
        if self.submit_tx.try_send(envelope).is_err() {
            self.metrics.record_dropped();
        }
    }

    /// Fan a notification out to all of its subscriber's connections.
    pub fn broadcast_to_subscriber(&self, notification: &Notification) {
        self.submit(BroadcastEnvelope::to_subscriber(notification.clone()));
    }

    /// Fan a notification out to every connection in a tenant.
    pub fn broadcast_to_tenant(&self, tenant_id: Uuid, notification: &Notification) {
        self.submit(BroadcastEnvelope::to_tenant(tenant_id, notification.clone()));
    }

    /// Queue a connection for registration. Never blocks.
    pub fn register(&self, conn: Arc<Connection>) {
        if let Err(e) = self.register_tx.try_send(conn) {
            let (reason, conn) = match e {
                TrySendError::Full(conn) => ("register queue full", conn),
                TrySendError::Closed(conn) => ("hub stopped", conn),
            };
            tracing::warn!(
                connection_id = %conn.id,
                subscriber_id = %conn.subscriber_id,
                "{reason}, connection not registered"
            );
            // The connection was never tracked; close it so its write pump
            // does not outlive an invisible connection.
            conn.close();
        }
    }

    /// Queue a connection for deregistration. Never blocks; if the control
    /// queue is saturated the connection is closed directly so its write pump
    /// still terminates.
    pub fn deregister(&self, conn: Arc<Connection>) {
        match self.deregister_tx.try_send(conn) {
            Ok(()) => {}
            Err(TrySendError::Full(conn)) | Err(TrySendError::Closed(conn)) => {
                tracing::warn!(
                    connection_id = %conn.id,
                    "deregister queue unavailable, closing connection directly"
                );
                conn.close();
            }
        }
    }

    /// Last recorded disconnect time for a subscriber, if any. A present value
    /// marks the next registration as a reconnect eligible for catch-up.
    pub async fn last_disconnect(&self, subscriber_id: Uuid) -> Option<DateTime<Utc>> {
        self.registry.read().await.last_disconnect(subscriber_id)
    }

    /// Snapshot hub statistics. Read-only; repeated calls with no intervening
    /// activity return identical values.
    pub async fn stats(&self) -> HubStats {
        let registry = self.registry.read().await;
        HubStats {
            registered_subscribers: registry.subscriber_count(),
            registered_tenants: registry.tenant_count(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// Run the control loop until the shutdown signal fires, then close every
    /// live connection's outbound queue and return.
    ///
    /// This task is the only writer to the presence registry.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let Some(mut rx) = self.receivers.lock().await.take() else {
            tracing::error!("hub control loop started twice");
            return;
        };

        tracing::info!("notification hub started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("notification hub shutting down");
                    self.close_all().await;
                    return;
                }
                Some(conn) = rx.register_rx.recv() => {
                    self.handle_register(conn).await;
                }
                Some(conn) = rx.deregister_rx.recv() => {
                    self.handle_deregister(conn).await;
                }
                Some(envelope) = rx.submit_rx.recv() => {
                    self.fan_out(envelope).await;
                }
            }
        }
    }

    async fn handle_register(&self, conn: Arc<Connection>) {
        let connection_id = conn.id;
        let subscriber_id = conn.subscriber_id;
        let tenant_id = conn.tenant_id;

        self.registry.write().await.insert(conn);
        self.metrics.record_connection_opened();

        tracing::info!(
            connection_id = %connection_id,
            subscriber_id = %subscriber_id,
            tenant_id = %tenant_id,
            "connection registered"
        );
    }

    async fn handle_deregister(&self, conn: Arc<Connection>) {
        let removed = self.registry.write().await.remove(&conn, Utc::now());

        // Close the outbound queue regardless: the write pump must terminate
        // even if the connection never made it into the registry.
        conn.close();

        if removed {
            self.metrics.record_connection_closed();
            tracing::info!(
                connection_id = %conn.id,
                subscriber_id = %conn.subscriber_id,
                "connection deregistered"
            );
        }
    }

    /// Resolve an envelope against the registry and push the serialized frame
    /// onto each target connection's outbound queue.
    ///
    /// Delivery is best-effort: a full per-connection queue skips that
    /// connection without retry. Note the skip is not counted as dropped;
    /// only submission-queue overflow increments the dropped counter.
    async fn fan_out(&self, envelope: BroadcastEnvelope) {
        let started = Instant::now();

        let message = WireMessage {
            kind: envelope.kind,
            timestamp: envelope.sent_at,
            data: Some(NotificationPayload::from(&envelope.notification)),
            error: None,
        };
        let frame = match serde_json::to_string(&message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, notification_id = %envelope.notification.id, "failed to serialize wire frame");
                return;
            }
        };

        let registry = self.registry.read().await;
        let mut delivered = 0u64;

        match envelope.subscriber_id {
            Some(subscriber_id) => {
                for conn in registry.subscriber_connections(subscriber_id) {
                    // Tenant match guards against a stale cross-tenant mapping.
                    if conn.tenant_id == envelope.tenant_id && conn.try_push(frame.clone()) {
                        delivered += 1;
                    }
                }
            }
            None => {
                for conn in registry.tenant_connections(envelope.tenant_id) {
                    if conn.try_push(frame.clone()) {
                        delivered += 1;
                    }
                }
            }
        }
        drop(registry);

        self.metrics.record_delivered(delivered);
        self.metrics.observe_fanout_latency(started.elapsed());

        tracing::debug!(
            notification_id = %envelope.notification.id,
            tenant_id = %envelope.tenant_id,
            targeted = envelope.subscriber_id.is_some(),
            delivered = delivered,
            "envelope fanned out"
        );
    }

    async fn close_all(&self) {
        let registry = self.registry.read().await;
        let mut closed = 0usize;
        for conn in registry.all_connections() {
            conn.close();
            closed += 1;
        }
        tracing::info!(connections = closed, "closed all outbound queues");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Category, Priority};

    fn notification() -> Notification {
        Notification::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Category::Info,
            Priority::Medium,
            "title",
            "summary",
        )
    }

    #[tokio::test]
    async fn test_submission_overflow_drops_excess() {
        // The control loop is not running, so nothing drains the queue.
        let metrics = Arc::new(HubMetrics::default());
        let hub = Hub::new(metrics.clone());

        let excess = 7;
        for _ in 0..(SUBMISSION_QUEUE_SIZE + excess) {
            hub.broadcast_to_subscriber(&notification());
        }

        assert_eq!(metrics.snapshot().dropped, excess as u64);
    }

    #[tokio::test]
    async fn test_register_after_shutdown_closes_connection() {
        let metrics = Arc::new(HubMetrics::default());
        let hub = Arc::new(Hub::new(metrics));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let loop_hub = hub.clone();
        let handle = tokio::spawn(async move {
            loop_hub.run(shutdown_rx).await;
        });
        shutdown_tx.send(()).expect("hub should be listening");
        handle.await.expect("control loop should exit cleanly");

        // The control loop is gone, so the register queue is closed.
        let (tx, _rx) = mpsc::channel(1);
        let conn = Arc::new(Connection::new(Uuid::new_v4(), Uuid::new_v4(), tx));
        hub.register(conn.clone());

        tokio::time::timeout(std::time::Duration::from_millis(100), conn.closed())
            .await
            .expect("late registration should close the connection");
    }

    #[tokio::test]
    async fn test_envelope_targets() {
        let n = notification();
        let env = BroadcastEnvelope::to_subscriber(n.clone());
        assert_eq!(env.subscriber_id, Some(n.subscriber_id));
        assert_eq!(env.tenant_id, n.tenant_id);

        let tenant = Uuid::new_v4();
        let env = BroadcastEnvelope::to_tenant(tenant, n);
        assert_eq!(env.subscriber_id, None);
        assert_eq!(env.tenant_id, tenant);
    }
}
