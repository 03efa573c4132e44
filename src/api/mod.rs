//! API Module
//!
//! HTTP handlers and routing for the caching service.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `POST /ratelimit/check` - Rate limit admission
//! - `POST /data/:kind`, `DELETE /data/:kind` - Cached upstream data
//! - `GET /metrics`, `GET /metrics/*name` - Request performance
//! - `GET /cache/stats` - Local cache statistics
//! - `POST /store` - Embedded store wire protocol

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod upstream;

pub use handlers::*;
pub use routes::create_router;
pub use upstream::DataUpstream;
