//! External collaborators of the broker.
//!
//! The broker only ever talks to the LLM provider and to the Maple
//! backend through the [`LlmBackend`] and [`ArticleStore`] traits, so
//! tests can substitute in-memory fakes. The HTTP implementations here
//! are thin [`reqwest`] wrappers.

pub mod error;
pub mod llm;
pub mod store;

pub use error::BackendError;
pub use llm::{HttpLlmBackend, LlmBackend};
pub use store::{Article, ArticleStore, MapleApi};
