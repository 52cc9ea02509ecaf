//! Router assembly and shared application state.

mod state;

pub use state::AppState;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::api_routes;
use crate::websocket::ws_handler;

/// Assemble the service router: the subscriber WebSocket endpoint at `/ws`
/// plus the producer and observability REST surface, wrapped in request
/// tracing and a permissive CORS policy. Identity checks live in the
/// handlers, not in middleware.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .merge(api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{DateTime, Utc};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::config::Settings;
    use crate::notification::{Notification, NotificationStore, StoreError};

    struct EmptyStore;

    #[async_trait]
    impl NotificationStore for EmptyStore {
        async fn list_since(
            &self,
            _subscriber_id: Uuid,
            _tenant_id: Uuid,
            _since: DateTime<Utc>,
            _limit: i64,
        ) -> Result<Vec<Notification>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn test_state() -> AppState {
        let settings = Settings {
            server: Default::default(),
            database: Default::default(),
            websocket: Default::default(),
            catchup: Default::default(),
        };
        AppState::new(settings, Arc::new(EmptyStore))
    }

    #[tokio::test]
    async fn test_observability_routes_are_wired() {
        let app = create_app(test_state());

        for path in ["/health", "/stats", "/metrics"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "route {path}");
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = create_app(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
