use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use maple_backend::BackendError;
use maple_core::{CoreError, RequestId};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `maple_core`.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(CoreError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Core(CoreError::Unauthorized(msg)) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Why an execution task produced no result.
///
/// Never leaves the execution task: it is logged and the job dropped.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The LLM provider or the article store failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A summarize job named an article the backend does not have.
    #[error("Article {0} not found on backend")]
    ArticleNotFound(RequestId),

    /// The article exists but has nothing to summarize.
    #[error("Article {0} has no content")]
    EmptyArticle(RequestId),
}

/// Invalid startup configuration.
#[derive(Debug, thiserror::Error)]
#[error("Invalid configuration for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}
