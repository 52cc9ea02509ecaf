//! Catch-up replay: streams notifications a subscriber missed while offline
//! onto a freshly registered connection.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::CatchUpConfig;
use crate::notification::NotificationStore;
use crate::websocket::WireMessage;

use super::connection::Connection;
use super::metrics::HubMetrics;

/// Replays missed notifications on reconnect.
///
/// Runs on its own spawned task per reconnect so neither registration nor the
/// hub control loop waits on the store.
pub struct CatchUpReplayer {
    store: Arc<dyn NotificationStore>,
    metrics: Arc<HubMetrics>,
    config: CatchUpConfig,
}

impl CatchUpReplayer {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        metrics: Arc<HubMetrics>,
        config: CatchUpConfig,
    ) -> Self {
        Self {
            store,
            metrics,
            config,
        }
    }

    /// Fetch and push notifications created since the subscriber was last
    /// seen. Returns the number of frames replayed.
    ///
    /// A store failure abandons catch-up for this connection only; the
    /// connection stays live for regular broadcasts. A full outbound queue
    /// stops the replay and discards the rest of the backlog.
    pub async fn replay(&self, conn: &Connection, last_disconnect: DateTime<Utc>) -> usize {
        // Back the cutoff up slightly to tolerate clock drift and writes that
        // raced the disconnect.
        let since = last_disconnect - Duration::seconds(self.config.skew_seconds);

        let notifications = match self
            .store
            .list_since(
                conn.subscriber_id,
                conn.tenant_id,
                since,
                self.config.max_notifications,
            )
            .await
        {
            Ok(notifications) => notifications,
            Err(e) => {
                tracing::warn!(
                    connection_id = %conn.id,
                    subscriber_id = %conn.subscriber_id,
                    error = %e,
                    "failed to fetch missed notifications, abandoning catch-up"
                );
                return 0;
            }
        };

        let mut replayed = 0usize;
        // Strictly-after filter in case the store query is inclusive.
        for notification in notifications.iter().filter(|n| n.created_at > since) {
            let message = WireMessage::missed(notification);
            let frame = match serde_json::to_string(&message) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(notification_id = %notification.id, error = %e, "failed to serialize missed notification");
                    continue;
                }
            };

            if !conn.try_push(frame) {
                // Outbound queue full: the client is already saturated, drop
                // the remainder of the backlog for this reconnect.
                break;
            }
            self.metrics.record_replayed();
            replayed += 1;
        }

        if replayed > 0 {
            tracing::info!(
                connection_id = %conn.id,
                subscriber_id = %conn.subscriber_id,
                replayed = replayed,
                "replayed missed notifications"
            );
        }

        replayed
    }
}
