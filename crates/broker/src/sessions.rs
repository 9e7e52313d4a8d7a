use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use maple_core::types::{SessionId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing frames to a session's socket.
pub type SessionSender = mpsc::UnboundedSender<Message>;

/// One connected requester.
pub struct Session {
    /// Channel sender for outbound frames to this session.
    pub sender: SessionSender,
    /// When this session connected.
    pub connected_at: Timestamp,
}

/// Registry of connected sessions.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between the socket handlers and the result router.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session.
    ///
    /// Returns the receiver half of the outbound channel so the caller can
    /// forward frames to the WebSocket sink.
    pub async fn add(&self, session_id: SessionId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session {
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.sessions.write().await.insert(session_id, session);
        rx
    }

    /// Remove a session. Returns `false` if it was not registered.
    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Queue a frame for one session.
    ///
    /// Returns `false` if the session is not registered or its socket
    /// task has already gone away.
    pub async fn send_to(&self, session_id: &str, message: Message) -> bool {
        match self.sessions.read().await.get(session_id) {
            Some(session) => session.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Return the current number of sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Send a Close frame to every session, then clear the map.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for session in sessions.values() {
            let _ = session.sender.send(Message::Close(None));
        }
        sessions.clear();
        tracing::info!(count, "Closed all sessions");
    }

    /// Send a Ping frame to every session.
    pub async fn ping_all(&self) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            let _ = session.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
