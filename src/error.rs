//! # error
//!
//! Centralised application error type.
//!
//! Every handler returns `Result<_, AppError>`.  Axum's `IntoResponse` impl
//! converts these into structured JSON error bodies so the scan platform /
//! dashboard always gets a machine-readable response even on failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or wrong `x-webhook-secret` header.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The payload was syntactically JSON but carried no usable symbols.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The vendor returned nothing for a symbol.  Per-symbol failures are
    /// swallowed inside the handler; this surfaces only from `/check`.
    #[error("No market data for {0}")]
    EnrichUnavailable(String),

    /// The chat platform refused the message even after the plain-text retry.
    #[error("Chat sink error: {0}")]
    SinkFailure(String),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::EnrichUnavailable(symbol) => (
                StatusCode::NOT_FOUND,
                format!("No market data available for {symbol}"),
            ),
            AppError::SinkFailure(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
