use maple_core::CoreError;

/// Failures of the underlying connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No live connection to send on (the connection task is
    /// reconnecting or has stopped).
    #[error("Not connected to broker")]
    NotConnected,

    /// The frame could not be written to an established connection.
    #[error("Send failed: {0}")]
    Send(String),
}

/// Errors surfaced by [`ReliableClient`](crate::client::ReliableClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The submission would be rejected by the broker.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// A non-blocking submit could not be sent. The pending record is
    /// kept and will go out with the next resubmission sweep.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Invalid client configuration.
#[derive(Debug, thiserror::Error)]
#[error("Invalid configuration for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}
