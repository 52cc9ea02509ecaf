use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::handlers::{health, stats};
use super::metrics::prometheus_metrics;
use super::notifications::{broadcast_notification, send_notification};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & observability
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Producer endpoints
        .nest(
            "/api/v1",
            Router::new()
                .route("/notifications/send", post(send_notification))
                .route("/notifications/broadcast", post(broadcast_notification)),
        )
}
