//! Adapter-side error types.
//!
//! Driver errors (`sqlx::Error`, `reqwest::Error`) are passed straight into
//! [`tsbench_core::Error`] as boxed sources. This type covers failures that
//! have no driver error behind them.

use reqwest::StatusCode;
use thiserror::Error;

/// Failures reported by a backend without a driver error.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP endpoint answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Request never produced a usable response.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Response could not be interpreted.
    #[error("unexpected response: {0}")]
    Response(String),
}

impl BackendError {
    /// Build a status error from a response, consuming its body.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
        BackendError::Status {
            status,
            body: body.trim().to_string(),
        }
    }
}
