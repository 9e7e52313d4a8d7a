use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use maple_core::CoreError;
use serde::Deserialize;

use crate::broker::{Broker, Submission};
use crate::config::BrokerConfig;
use crate::error::AppResult;
use crate::state::AppState;

/// Header alternative to the `api_key` query parameter.
const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    api_key: Option<String>,
}

/// HTTP handler that authenticates and upgrades the connection.
///
/// Rejected handshakes get a 401 and never register a session.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    authorize(&state.config, params.api_key.as_deref(), &headers)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state.broker)))
}

/// Check the presented access key against `MAPLE_CHAT_SOCKET_KEY`.
///
/// The query parameter wins over the header when both are present.
pub fn authorize(
    config: &BrokerConfig,
    query_key: Option<&str>,
    headers: &HeaderMap,
) -> Result<(), CoreError> {
    let Some(expected) = config.socket_key.as_deref() else {
        return Ok(());
    };

    let presented = query_key.or_else(|| {
        headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
    });

    match presented {
        Some(key) if key == expected => Ok(()),
        Some(_) => {
            tracing::warn!("Rejected connection with invalid access key");
            Err(CoreError::Unauthorized("Invalid access key".into()))
        }
        None => {
            tracing::warn!("Rejected connection without access key");
            Err(CoreError::Unauthorized("Missing access key".into()))
        }
    }
}

/// Manage one session after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the session with the broker.
///   2. Spawns a sender task that forwards frames from the session channel.
///   3. Feeds inbound text frames to the broker on the current task.
///   4. Disconnects the session (dropping its cancelable jobs) on exit.
async fn handle_socket(socket: WebSocket, broker: Arc<Broker>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let mut rx = broker.connect(session_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    let sender_session_id = session_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                tracing::debug!(session_id = %sender_session_id, "Session sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => match broker.handle_frame(&session_id, text.as_str()) {
                Ok(Submission::Queued) => {}
                Ok(Submission::Duplicate) => {
                    tracing::debug!(session_id = %session_id, "Ignored duplicate submission");
                }
                Err(e) => {
                    tracing::warn!(session_id = %session_id, error = %e, "Rejected submission");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(session_id = %session_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "Session receive error");
                break;
            }
        }
    }

    broker.disconnect(&session_id).await;
    send_task.abort();
}
