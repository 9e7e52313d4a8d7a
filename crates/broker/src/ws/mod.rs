//! WebSocket surface of the broker.
//!
//! Provides the authenticated upgrade handler and the heartbeat task.

mod handler;
mod heartbeat;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
