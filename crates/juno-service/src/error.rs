//! Error types for the rule service.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use juno_datalog::DatalogError;

/// Errors that can occur in the rule service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Compilation or evaluation failed.
    #[error(transparent)]
    Datalog(#[from] DatalogError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking evaluation task panicked or was aborted.
    #[error("evaluation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Datalog(err) => match err {
                DatalogError::Parse(_) | DatalogError::InvalidRule(_) => StatusCode::BAD_REQUEST,
                DatalogError::UnsafeRule { .. }
                | DatalogError::TypeMismatch { .. }
                | DatalogError::ResourceExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DatalogError::Cancelled => StatusCode::REQUEST_TIMEOUT,
                DatalogError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServiceError::Io(_) | ServiceError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let body = json!({
            "ok": false,
            "error": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
