//! Reliable-delivery client for the Maple LLM job broker.
//!
//! Tracks every submission until its result arrives, replays anything
//! un-acknowledged on a cadence, and reconnects to the broker with
//! exponential backoff.

pub mod client;
pub mod config;
pub mod error;
pub mod pending;
pub mod reconnect;
pub mod results;
pub mod resubmit;
pub mod transport;

pub use client::{DrainOutcome, ReliableClient};
pub use error::{ClientError, TransportError};
pub use transport::{Transport, WsConnector, WsTransport};
