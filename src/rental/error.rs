//! Error types for the rental chain.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors from the dependent `/check` call made while serving `/rent`.
///
/// These never leave the request that produced them: each one maps to the status returned
/// to that caller and nothing else.
#[derive(Debug, Error)]
pub enum DependentCallError {
    /// The request never produced a response (connection refused, timeout, ...).
    #[error("verify call to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The dependency answered with a non-success status.
    #[error("verify call to {url} returned {status}")]
    Status { url: String, status: StatusCode },
}

impl DependentCallError {
    /// Status returned to the caller of `/rent`.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DependentCallError::Status { status, .. } => *status,
            DependentCallError::Transport { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DependentCallError {
    fn into_response(self) -> Response {
        self.status_code().into_response()
    }
}
