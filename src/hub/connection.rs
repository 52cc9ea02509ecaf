//! Connection handle shared between the hub and the socket pumps.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

/// Capacity of each connection's outbound queue. A subscriber that stalls for
/// longer than this backlog starts losing messages instead of buffering
/// unboundedly or blocking the dispatcher.
pub const OUTBOUND_QUEUE_SIZE: usize = 256;

/// Handle for a single subscriber connection.
///
/// The hub owns the lifecycle (it is the only caller of [`Connection::close`]);
/// the WebSocket handler owns the transport and the receiving end of the
/// outbound queue.
pub struct Connection {
    pub id: Uuid,
    pub subscriber_id: Uuid,
    pub tenant_id: Uuid,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<String>,
    closed: Notify,
}

impl Connection {
    pub fn new(subscriber_id: Uuid, tenant_id: Uuid, sender: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscriber_id,
            tenant_id,
            connected_at: Utc::now(),
            sender,
            closed: Notify::new(),
        }
    }

    /// Non-blocking push onto the outbound queue.
    ///
    /// Returns false when the queue is full or already closed; callers skip the
    /// connection in that case, delivery is at-most-once per frame.
    pub fn try_push(&self, frame: String) -> bool {
        self.sender.try_send(frame).is_ok()
    }

    /// Signal the write pump to terminate. Idempotent.
    pub fn close(&self) {
        self.closed.notify_one();
    }

    /// Resolves once the hub has closed this connection.
    pub async fn closed(&self) {
        self.closed.notified().await;
    }
}
