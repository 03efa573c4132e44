//! Request and Response models for the service API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::{MetricsQuery, RateLimitRequest, MAX_KEY_LENGTH};
pub use responses::{DataResponse, ErrorResponse, HealthResponse, InvalidateResponse, StoreReply};
