//! Data Upstream
//!
//! HTTP loader behind `POST /data/:kind`: posts the query parameters to
//! `{base_url}/{kind}` and returns the JSON body unchanged.

use std::time::Duration;

use anyhow::{bail, Context};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheParams, DataKind};

#[derive(Debug, Clone)]
pub struct DataUpstream {
    client: Client,
    base_url: String,
}

impl DataUpstream {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Endpoint serving `kind`.
    pub fn url_for(&self, kind: DataKind) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), kind)
    }

    /// Runs one upstream query. Any non-2xx answer is an error.
    pub async fn load(&self, kind: DataKind, params: &CacheParams) -> anyhow::Result<Value> {
        let url = self.url_for(kind);
        debug!(url = %url, "loading from upstream");

        let response = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .with_context(|| format!("upstream request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("upstream {} returned HTTP {}: {}", url, status.as_u16(), body);
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("upstream {} returned invalid JSON", url))
    }
}
