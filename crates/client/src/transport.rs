//! Connection abstraction used by the reliable-delivery client.
//!
//! [`Transport`] is the seam: the client only ever asks it to send one
//! frame. [`WsTransport`] is the production implementation: a
//! long-lived task connects to the broker, forwards every inbound
//! result frame on a channel, and reconnects with exponential backoff
//! whenever the connection drops.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use maple_core::messages::parse_server_message;
use maple_core::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::reconnect::{reconnect_loop, BackoffPolicy};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Sends client frames to the broker.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame. Fails fast when there is no live connection.
    async fn send(&self, message: &ClientMessage) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// WsConnector
// ---------------------------------------------------------------------------

/// Connection settings for the broker's `/ws` endpoint.
pub struct WsConnector {
    url: String,
    access_key: Option<String>,
}

impl WsConnector {
    /// * `url`        - full endpoint, e.g. `ws://broker:5002/ws`.
    /// * `access_key` - sent as the `api_key` query parameter.
    pub fn new(url: String, access_key: Option<String>) -> Self {
        Self { url, access_key }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn handshake_url(&self) -> String {
        match &self.access_key {
            Some(key) => {
                let separator = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{separator}api_key={key}", self.url)
            }
            None => self.url.clone(),
        }
    }

    pub async fn connect(&self) -> Result<WsStream, TransportError> {
        let (ws_stream, _response) = connect_async(self.handshake_url())
            .await
            .map_err(|e| {
                TransportError::Connection(format!("Failed to connect to broker at {}: {e}", self.url))
            })?;

        tracing::info!(url = %self.url, "Connected to broker");
        Ok(ws_stream)
    }
}

// ---------------------------------------------------------------------------
// WsTransport
// ---------------------------------------------------------------------------

/// WebSocket transport with automatic reconnection.
pub struct WsTransport {
    /// Write half of the live connection; `None` while disconnected.
    sink: Arc<Mutex<Option<WsSink>>>,
    connected: watch::Receiver<bool>,
}

impl WsTransport {
    /// Spawn the connection task.
    ///
    /// Returns the transport and the channel of result frames received
    /// from the broker. The task runs until `cancel` fires.
    pub fn start(
        connector: WsConnector,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let sink = Arc::new(Mutex::new(None));
        let (connected_tx, connected) = watch::channel(false);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let task_sink = Arc::clone(&sink);
        tokio::spawn(async move {
            run_connection_loop(&connector, &task_sink, &connected_tx, &inbound_tx, &cancel).await;
            connected_tx.send_replace(false);
            tracing::info!(url = %connector.url(), "Connection task exited");
        });

        (Self { sink, connected }, inbound_rx)
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Wait until a connection is up. Returns `false` if the connection
    /// task stopped first.
    pub async fn wait_connected(&self) -> bool {
        let mut connected = self.connected.clone();
        let up = connected.wait_for(|up| *up).await.is_ok();
        up
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
        let mut slot = self.sink.lock().await;
        let Some(sink) = slot.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        if let Err(e) = sink.send(Message::Text(message.to_text())).await {
            *slot = None;
            return Err(TransportError::Send(e.to_string()));
        }
        Ok(())
    }
}

/// Core connection loop: connect -> read frames -> reconnect.
///
/// Runs until the cancellation token is triggered or nobody is left to
/// receive inbound frames.
async fn run_connection_loop(
    connector: &WsConnector,
    sink_slot: &Mutex<Option<WsSink>>,
    connected: &watch::Sender<bool>,
    inbound: &mpsc::UnboundedSender<ServerMessage>,
    cancel: &CancellationToken,
) {
    let backoff = BackoffPolicy::default();

    let mut ws_stream = match connector.connect().await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            tracing::warn!(error = %e, "Connection failed, entering reconnect loop");
            match reconnect_loop(connector, &backoff, cancel).await {
                Some(ws_stream) => ws_stream,
                None => return,
            }
        }
    };

    loop {
        let (sink, mut stream) = ws_stream.split();
        *sink_slot.lock().await = Some(sink);
        connected.send_replace(true);

        read_frames(&mut stream, inbound, cancel).await;

        // Empty the slot first: once `connected` reads false, sends must
        // fail with `NotConnected`.
        let sink = sink_slot.lock().await.take();
        connected.send_replace(false);
        if let Some(mut sink) = sink {
            let _ = sink.close().await;
        }

        if cancel.is_cancelled() || inbound.is_closed() {
            return;
        }

        tracing::info!(url = %connector.url(), "Connection lost, entering reconnect loop");
        ws_stream = match reconnect_loop(connector, &backoff, cancel).await {
            Some(ws_stream) => ws_stream,
            None => return,
        };
    }
}

/// Forward result frames until the connection closes or `cancel` fires.
async fn read_frames(
    stream: &mut futures::stream::SplitStream<WsStream>,
    inbound: &mpsc::UnboundedSender<ServerMessage>,
    cancel: &CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => match parse_server_message(&text) {
                Ok(message) => {
                    if inbound.send(message).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unrecognised frame from broker");
                }
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Handled automatically by tungstenite.
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "Broker closed connection");
                return;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Receive error");
                return;
            }
            None => return,
        }
    }
}
