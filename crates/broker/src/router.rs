//! Routes finished job results back to their sessions.

use std::sync::Arc;

use axum::extract::ws::Message;
use maple_core::types::SessionId;
use maple_core::ServerMessage;

use crate::sessions::SessionRegistry;

/// A finished job's result, addressed to the session that asked for it.
#[derive(Debug, Clone)]
pub struct ResultEnvelope {
    /// `None` for background jobs.
    pub session_id: Option<SessionId>,
    pub message: ServerMessage,
}

/// Outcome of [`ResultRouter::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued on the session's outbound channel.
    Sent,
    /// Background job; nobody expects a reply.
    NoSession,
    /// The session disconnected before the result was ready.
    SessionGone,
}

#[derive(Clone)]
pub struct ResultRouter {
    sessions: Arc<SessionRegistry>,
}

impl ResultRouter {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }

    pub async fn deliver(&self, envelope: ResultEnvelope) -> Delivery {
        let identity = envelope.message.identity();
        let Some(session_id) = envelope.session_id else {
            tracing::debug!(job = %identity, "Background job finished, no session to notify");
            return Delivery::NoSession;
        };

        let frame = Message::Text(envelope.message.to_text().into());
        if self.sessions.send_to(&session_id, frame).await {
            tracing::info!(job = %identity, session_id = %session_id, "Sent job result");
            Delivery::Sent
        } else {
            tracing::warn!(
                job = %identity,
                session_id = %session_id,
                "Session gone, dropping job result",
            );
            Delivery::SessionGone
        }
    }
}
