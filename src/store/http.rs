//! HTTP Store Client
//!
//! Sends each command as a JSON array POSTed to the store's REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Command, RemoteStore};
use crate::error::StoreError;

/// Connection settings for [`HttpRemoteStore`].
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL; commands are POSTed to it directly
    pub url: String,
    /// Bearer token, if the store requires one
    pub token: Option<String>,
    /// Per-command timeout in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

// == HTTP Remote Store ==
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    config: HttpStoreConfig,
}

impl HttpRemoteStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn transport_error(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout(self.config.timeout_ms)
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn execute(&self, command: Command) -> Result<Value, StoreError> {
        debug!(command = command.name(), key = command.key(), "store command");

        let mut request = self.client.post(&self.config.url).json(&command.to_args());
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: CommandReply = serde_json::from_str(&body)
            .map_err(|e| StoreError::Protocol(format!("{}: {}", e, body)))?;

        match reply.error {
            Some(message) => Err(StoreError::Command(message)),
            None => Ok(reply.result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_decoding() {
        let reply: CommandReply = serde_json::from_str(r#"{"result":"OK"}"#).unwrap();
        assert_eq!(reply.result, Value::String("OK".into()));
        assert!(reply.error.is_none());

        let reply: CommandReply = serde_json::from_str(r#"{"result":null}"#).unwrap();
        assert!(reply.result.is_null());

        let reply: CommandReply = serde_json::from_str(r#"{"error":"WRONGTYPE"}"#).unwrap();
        assert_eq!(reply.error.as_deref(), Some("WRONGTYPE"));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_transport_error() {
        let store = HttpRemoteStore::new(HttpStoreConfig {
            // Port 9 (discard) is closed on test machines
            url: "http://127.0.0.1:9".to_string(),
            token: None,
            timeout_ms: 500,
        })
        .unwrap();

        let result = store.get("k").await;
        assert!(matches!(
            result,
            Err(StoreError::Transport(_)) | Err(StoreError::Timeout(_))
        ));
    }
}
