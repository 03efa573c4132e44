//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Store Error Enum ==
/// Failure talking to the shared key-value store.
///
/// Never retried inside this crate; callers decide on retry policy.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Network failure before a response arrived
    #[error("Store transport error: {0}")]
    Transport(String),

    /// Command did not complete within the configured timeout
    #[error("Store command timed out after {0}ms")]
    Timeout(u64),

    /// Non-2xx response from the store
    #[error("Store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Store answered with a body we could not interpret
    #[error("Malformed store response: {0}")]
    Protocol(String),

    /// Store rejected the command (e.g. WRONGTYPE)
    #[error("Store command failed: {0}")]
    Command(String),
}

// == Cache Error Enum ==
/// Unified error type for cache, rate limiter and service operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid limiter parameters or cache key parameters
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Shared store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Caller-supplied loader failed; nothing was cached
    #[error("Loader failed: {0}")]
    Loader(#[source] anyhow::Error),

    /// Value could not be encoded for caching or decoded into the requested type
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No data upstream configured for loader-backed fetches
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Validation(_) => StatusCode::BAD_REQUEST,
            CacheError::Store(_) => StatusCode::BAD_GATEWAY,
            CacheError::Loader(_) => StatusCode::BAD_GATEWAY,
            CacheError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
