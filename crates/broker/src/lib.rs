//! Maple LLM job broker.
//!
//! Accepts summarize / topic-naming / bullet-summary jobs over a
//! WebSocket, runs at most one job per LLM credential at a time, and
//! routes each result back to the session that asked for it.
//!
//! Exposed as a library so integration tests and the binary entrypoint
//! share the same building blocks.

pub mod broker;
pub mod config;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod queue;
pub mod router;
pub mod routes;
pub mod scheduler;
pub mod sessions;
pub mod state;
pub mod sweep;
pub mod ws;
