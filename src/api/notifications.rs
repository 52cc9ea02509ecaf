//! Producer-facing HTTP endpoints: upstream collaborators hand notifications
//! to the hub here. Submission is fire-and-forget; a saturated hub is not an
//! HTTP error, it surfaces as a dropped-message counter increment.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::notification::{Category, Notification, Priority};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub tenant_id: Uuid,
    pub subscriber_id: Uuid,
    pub category: Category,
    #[serde(default)]
    pub priority: Priority,
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
    pub notification_id: Uuid,
}

/// POST /api/v1/notifications/send - fan out to one subscriber.
pub async fn send_notification(
    State(state): State<AppState>,
    Json(req): Json<SendNotificationRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    let notification = build_notification(req)?;

    state.hub.broadcast_to_subscriber(&notification);

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            accepted: true,
            notification_id: notification.id,
        }),
    ))
}

/// POST /api/v1/notifications/broadcast - fan out to every connection in the
/// notification's tenant.
pub async fn broadcast_notification(
    State(state): State<AppState>,
    Json(req): Json<SendNotificationRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    let notification = build_notification(req)?;

    state
        .hub
        .broadcast_to_tenant(notification.tenant_id, &notification);

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            accepted: true,
            notification_id: notification.id,
        }),
    ))
}

fn build_notification(req: SendNotificationRequest) -> Result<Notification> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }
    if req.summary.trim().is_empty() {
        return Err(AppError::Validation("summary must not be empty".to_string()));
    }

    Ok(Notification::new(
        req.tenant_id,
        req.subscriber_id,
        req.category,
        req.priority,
        req.title,
        req.summary,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_notification_validates_fields() {
        let req = SendNotificationRequest {
            tenant_id: Uuid::new_v4(),
            subscriber_id: Uuid::new_v4(),
            category: Category::Alert,
            priority: Priority::High,
            title: "  ".to_string(),
            summary: "summary".to_string(),
        };
        assert!(matches!(build_notification(req), Err(AppError::Validation(_))));

        let req = SendNotificationRequest {
            tenant_id: Uuid::new_v4(),
            subscriber_id: Uuid::new_v4(),
            category: Category::Alert,
            priority: Priority::High,
            title: "title".to_string(),
            summary: "summary".to_string(),
        };
        let notification = build_notification(req).unwrap();
        assert_eq!(notification.title, "title");
    }
}
