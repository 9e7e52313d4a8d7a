//! Shared domain types for the Maple LLM job broker.
//!
//! Both the broker and the reliable-delivery client depend on this
//! crate so that job identity and the wire format are defined once.

pub mod error;
pub mod job;
pub mod messages;
pub mod types;

pub use error::CoreError;
pub use job::{Credential, JobIdentity, JobKind, JobPayload, RequestId};
pub use messages::{ClientMessage, ServerMessage};
