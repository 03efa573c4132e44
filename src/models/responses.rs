//! Response DTOs for the service API
//!
//! Defines the structure of outgoing HTTP response bodies. Decisions, metrics
//! snapshots and cache statistics serialize directly from their library types.

use serde::Serialize;
use serde_json::Value;

use crate::cache::DataKind;

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Crate version
    pub version: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for POST /data/:kind
#[derive(Debug, Clone, Serialize)]
pub struct DataResponse {
    pub kind: DataKind,
    pub data: Value,
}

/// Response body for DELETE /data/:kind
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub message: String,
    pub kind: DataKind,
}

impl InvalidateResponse {
    pub fn new(kind: DataKind) -> Self {
        Self {
            message: format!("Cached '{}' entry invalidated", kind),
            kind,
        }
    }
}

/// Reply for POST /store, mirroring the store wire protocol
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StoreReply {
    Result { result: Value },
    Error { error: String },
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("version"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_data_response_uses_wire_kind_name() {
        let resp = DataResponse {
            kind: DataKind::AreaBenchmarks,
            data: json!({"median": 10}),
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["kind"], "areaBenchmarks");
        assert_eq!(value["data"]["median"], 10);
    }

    #[test]
    fn test_invalidate_response_message() {
        let resp = InvalidateResponse::new(DataKind::MarketStats);
        assert!(resp.message.contains("marketStats"));
    }

    #[test]
    fn test_store_reply_shapes() {
        let ok = serde_json::to_value(StoreReply::Result { result: json!("OK") }).unwrap();
        assert_eq!(ok, json!({"result": "OK"}));

        let err = serde_json::to_value(StoreReply::Error {
            error: "WRONGTYPE".into(),
        })
        .unwrap();
        assert_eq!(err, json!({"error": "WRONGTYPE"}));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
