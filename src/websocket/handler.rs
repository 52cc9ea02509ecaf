use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::WebSocketConfig;
use crate::error::AppError;
use crate::hub::{Connection, OUTBOUND_QUEUE_SIZE};
use crate::server::AppState;

use super::message::{ClientMessage, WireMessage};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub subscriber_id: Option<String>,
    pub tenant_id: Option<String>,
}

/// WebSocket upgrade handler.
///
/// Subscriber and tenant identity must be resolvable from the request; the
/// upgrade is rejected with 401 before any connection state is created
/// otherwise. Credential verification itself is delegated upstream.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Response {
    let (subscriber_id, tenant_id) = match resolve_identity(&query, &headers) {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    ws.max_message_size(state.settings.websocket.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state, subscriber_id, tenant_id))
}

/// Resolve (subscriber, tenant) identity from headers or query parameters.
fn resolve_identity(query: &WsQuery, headers: &HeaderMap) -> Result<(Uuid, Uuid), AppError> {
    let subscriber = identity_value(headers, "x-subscriber-id", query.subscriber_id.as_deref())
        .ok_or_else(|| AppError::Auth("missing subscriber identity".to_string()))?;
    let tenant = identity_value(headers, "x-tenant-id", query.tenant_id.as_deref())
        .ok_or_else(|| AppError::Auth("missing tenant identity".to_string()))?;

    let subscriber_id = Uuid::parse_str(subscriber)
        .map_err(|_| AppError::Auth("malformed subscriber identity".to_string()))?;
    let tenant_id = Uuid::parse_str(tenant)
        .map_err(|_| AppError::Auth("malformed tenant identity".to_string()))?;

    Ok((subscriber_id, tenant_id))
}

fn identity_value<'a>(
    headers: &'a HeaderMap,
    header: &str,
    query: Option<&'a str>,
) -> Option<&'a str> {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .or(query)
}

async fn handle_socket(socket: WebSocket, state: AppState, subscriber_id: Uuid, tenant_id: Uuid) {
    let (tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
    let conn = Arc::new(Connection::new(subscriber_id, tenant_id, tx));

    // Read the last-disconnect time before this registration is processed:
    // a recorded value marks this connection as a reconnect.
    let last_disconnect = state.hub.last_disconnect(subscriber_id).await;

    state.hub.register(conn.clone());

    tracing::info!(
        connection_id = %conn.id,
        subscriber_id = %subscriber_id,
        tenant_id = %tenant_id,
        "websocket connection established"
    );

    if let Some(since) = last_disconnect {
        let replayer = state.replayer.clone();
        let replay_conn = conn.clone();
        tokio::spawn(async move {
            replayer.replay(&replay_conn, since).await;
        });
    }

    let (ws_sender, ws_receiver) = socket.split();
    let config = state.settings.websocket.clone();
    let write_task = tokio::spawn(write_pump(
        ws_sender,
        outbound_rx,
        conn.clone(),
        config.clone(),
    ));

    read_pump(ws_receiver, &conn, &config).await;

    // Read side is gone: hand the connection back to the hub, which closes the
    // outbound queue and thereby terminates the write pump.
    state.hub.deregister(conn.clone());
    let _ = write_task.await;

    tracing::info!(
        connection_id = %conn.id,
        subscriber_id = %subscriber_id,
        "websocket connection closed"
    );
}

/// Drains the outbound queue onto the wire and emits periodic keepalive pings.
///
/// Terminates when the hub closes the connection, the queue is closed, or a
/// write fails or misses its deadline.
async fn write_pump(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
    conn: Arc<Connection>,
    config: WebSocketConfig,
) {
    let write_wait = config.write_wait();
    let mut keepalive = tokio::time::interval(config.ping_period());
    // Skip the immediate first tick.
    keepalive.tick().await;

    loop {
        tokio::select! {
            biased;

            maybe = outbound.recv() => match maybe {
                Some(frame) => {
                    if !write(&mut sender, Message::Text(frame.into()), write_wait).await {
                        return;
                    }
                }
                None => {
                    let _ = timeout(write_wait, sender.send(Message::Close(None))).await;
                    return;
                }
            },
            _ = conn.closed() => {
                // Flush anything already queued before signalling close.
                while let Ok(frame) = outbound.try_recv() {
                    if !write(&mut sender, Message::Text(frame.into()), write_wait).await {
                        return;
                    }
                }
                let _ = timeout(write_wait, sender.send(Message::Close(None))).await;
                return;
            }
            _ = keepalive.tick() => {
                if !write(&mut sender, Message::Ping(Vec::new().into()), write_wait).await {
                    return;
                }
            }
        }
    }
}

async fn write(sender: &mut SplitSink<WebSocket, Message>, msg: Message, wait: std::time::Duration) -> bool {
    matches!(timeout(wait, sender.send(msg)).await, Ok(Ok(())))
}

/// Consumes inbound frames until the transport dies, the peer closes, or the
/// liveness deadline passes without any traffic.
async fn read_pump(mut receiver: SplitStream<WebSocket>, conn: &Connection, config: &WebSocketConfig) {
    let pong_wait = config.pong_wait();

    loop {
        let frame = match timeout(pong_wait, receiver.next()).await {
            Err(_) => {
                tracing::debug!(connection_id = %conn.id, "liveness deadline missed");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(connection_id = %conn.id, error = %e, "websocket read error");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => handle_inbound(text.as_str(), conn),
            Message::Binary(_) => push_frame(conn, &WireMessage::error("binary messages are not supported")),
            // Any inbound traffic, keepalive responses included, refreshes the
            // liveness deadline via the receive timeout above.
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                tracing::debug!(connection_id = %conn.id, "received close frame");
                break;
            }
        }
    }
}

fn handle_inbound(text: &str, conn: &Connection) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => push_frame(conn, &WireMessage::pong()),
        Ok(ClientMessage::Subscribe) => {
            // No-op: the connection is already scoped to its subscriber.
            tracing::debug!(
                connection_id = %conn.id,
                subscriber_id = %conn.subscriber_id,
                "subscribe request acknowledged"
            );
        }
        Ok(ClientMessage::Ack { notification_id }) => {
            tracing::debug!(
                connection_id = %conn.id,
                subscriber_id = %conn.subscriber_id,
                notification_id = %notification_id,
                "notification acknowledged"
            );
        }
        Err(_) => push_frame(conn, &WireMessage::error("invalid message format")),
    }
}

/// Best-effort push of a control frame; a full queue drops it silently.
fn push_frame(conn: &Connection, message: &WireMessage) {
    if let Ok(frame) = serde_json::to_string(message) {
        let _ = conn.try_push(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn query(subscriber: Option<&str>, tenant: Option<&str>) -> WsQuery {
        WsQuery {
            subscriber_id: subscriber.map(str::to_string),
            tenant_id: tenant.map(str::to_string),
        }
    }

    #[test]
    fn test_identity_from_headers() {
        let subscriber = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert("x-subscriber-id", HeaderValue::from_str(&subscriber.to_string()).unwrap());
        headers.insert("x-tenant-id", HeaderValue::from_str(&tenant.to_string()).unwrap());

        let resolved = resolve_identity(&query(None, None), &headers).unwrap();
        assert_eq!(resolved, (subscriber, tenant));
    }

    #[test]
    fn test_identity_from_query_parameters() {
        let subscriber = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let q = query(Some(&subscriber.to_string()), Some(&tenant.to_string()));

        let resolved = resolve_identity(&q, &HeaderMap::new()).unwrap();
        assert_eq!(resolved, (subscriber, tenant));
    }

    #[test]
    fn test_header_takes_precedence_over_query() {
        let header_subscriber = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-subscriber-id",
            HeaderValue::from_str(&header_subscriber.to_string()).unwrap(),
        );

        let q = query(Some(&Uuid::new_v4().to_string()), Some(&tenant.to_string()));
        let (resolved_subscriber, _) = resolve_identity(&q, &headers).unwrap();
        assert_eq!(resolved_subscriber, header_subscriber);
    }

    #[test]
    fn test_subscribe_produces_no_reply_frame() {
        let (tx, mut rx) = mpsc::channel(1);
        let conn = Connection::new(Uuid::new_v4(), Uuid::new_v4(), tx);

        handle_inbound(r#"{"type":"subscribe"}"#, &conn);
        assert!(rx.try_recv().is_err());

        // Malformed input still gets the error frame.
        handle_inbound("not json", &conn);
        let frame = rx.try_recv().expect("error frame should be queued");
        assert!(frame.contains("\"error\""));
    }

    #[test]
    fn test_missing_or_malformed_identity_is_rejected() {
        let tenant = Uuid::new_v4().to_string();

        assert!(matches!(
            resolve_identity(&query(None, Some(&tenant)), &HeaderMap::new()),
            Err(AppError::Auth(_))
        ));
        assert!(matches!(
            resolve_identity(&query(Some("not-a-uuid"), Some(&tenant)), &HeaderMap::new()),
            Err(AppError::Auth(_))
        ));
    }
}
