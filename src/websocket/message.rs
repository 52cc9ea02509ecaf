use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notification::{Category, Notification, Priority, Status};

/// Kind discriminator of subscriber-bound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Notification,
    MissedNotification,
    Pong,
    Error,
}

/// Envelope for every frame sent to a subscriber:
/// `{type, timestamp, data?, error?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NotificationPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WireMessage {
    /// Replay frame for a notification missed while offline, timestamped with
    /// the notification's creation time.
    pub fn missed(notification: &Notification) -> Self {
        Self {
            kind: MessageKind::MissedNotification,
            timestamp: notification.created_at,
            data: Some(NotificationPayload::from(notification)),
            error: None,
        }
    }

    pub fn pong() -> Self {
        Self {
            kind: MessageKind::Pong,
            timestamp: Utc::now(),
            data: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            timestamp: Utc::now(),
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Flattened notification projection sent over the socket. Heavier fields
/// (full analysis) are deliberately omitted; they stay on the REST read path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub subscriber_id: Uuid,
    pub category: Category,
    pub priority: Priority,
    pub title: String,
    pub summary: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationPayload {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            tenant_id: n.tenant_id,
            subscriber_id: n.subscriber_id,
            category: n.category,
            priority: n.priority,
            title: n.title.clone(),
            summary: n.summary.clone(),
            status: n.status,
            created_at: n.created_at,
        }
    }
}

/// Messages received from a subscriber.
///
/// `subscribe` is accepted for wire compatibility; every connection already
/// receives its subscriber's notifications, so it carries no effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    Subscribe,
    Ack { notification_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Notification {
        Notification::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Category::Warning,
            Priority::High,
            "Reorder point reached",
            "SKU-7 dropped below its reorder point",
        )
    }

    #[test]
    fn test_missed_frame_shape() {
        let n = notification();
        let json = serde_json::to_string(&WireMessage::missed(&n)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "missed_notification");
        assert_eq!(value["data"]["title"], "Reorder point reached");
        assert_eq!(value["data"]["category"], "warning");
        // Omitted optionals must not appear on the wire.
        assert!(value.get("error").is_none());
        assert!(value["data"].get("full_analysis").is_none());
    }

    #[test]
    fn test_error_frame_has_no_data() {
        let json = serde_json::to_string(&WireMessage::error("invalid message format")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "error");
        assert_eq!(value["error"], "invalid message format");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_client_message_parsing() {
        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, ClientMessage::Ping));

        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"ack","payload":{{"notification_id":"{}"}}}}"#, id);
        let ack: ClientMessage = serde_json::from_str(&raw).unwrap();
        assert!(matches!(ack, ClientMessage::Ack { notification_id } if notification_id == id));

        let subscribe: ClientMessage = serde_json::from_str(r#"{"type":"subscribe"}"#).unwrap();
        assert!(matches!(subscribe, ClientMessage::Subscribe));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"unsubscribe"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }
}
