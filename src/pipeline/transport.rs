//! Request/response seam to the results backend.
//!
//! The core only needs three exchanges: GET the primary results, GET the
//! static fallback artifact, POST a run trigger. [`HttpResultsClient`] is the
//! reqwest implementation used by the binary.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::models::RunRequest;

/// Where a results payload is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Primary,
    Fallback,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSource::Primary => "primary",
            ResultSource::Fallback => "fallback",
        }
    }
}

/// Raw reply of the run endpoint. The body is kept as text so the caller can
/// surface it even when it is not JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait ResultsTransport: Send + Sync {
    /// GET a results document. Any network error, non-success status or
    /// non-JSON body is an `Err`.
    async fn fetch(&self, source: ResultSource) -> Result<Value>;

    /// POST the run trigger and wait for the single terminal response.
    /// Only network-level failures are an `Err`; every HTTP status is a reply.
    async fn trigger_run(&self, episodes: u32) -> Result<RawReply>;
}

#[derive(Clone)]
pub struct HttpResultsClient {
    client: Client,
    primary_url: String,
    fallback_url: String,
    run_url: String,
}

impl HttpResultsClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60));
        // Runs can take minutes; without an explicit setting the transport default applies.
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .context("Failed to build results HTTP client")?;

        Ok(Self {
            client,
            primary_url: config.results_url(),
            fallback_url: config.fallback_url.clone(),
            run_url: config.run_url(),
        })
    }

    fn url(&self, source: ResultSource) -> &str {
        match source {
            ResultSource::Primary => &self.primary_url,
            ResultSource::Fallback => &self.fallback_url,
        }
    }
}

#[async_trait]
impl ResultsTransport for HttpResultsClient {
    async fn fetch(&self, source: ResultSource) -> Result<Value> {
        let url = self.url(source);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("GET {} {}: {}", url, status, text));
        }

        resp.json::<Value>()
            .await
            .with_context(|| format!("Failed to parse {} results body", source.as_str()))
    }

    async fn trigger_run(&self, episodes: u32) -> Result<RawReply> {
        let resp = self
            .client
            .post(&self.run_url)
            .json(&RunRequest { episodes })
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.run_url))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .context("Failed to read run response body")?;
        Ok(RawReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_urls() {
        let config = ClientConfig {
            api_base: "http://localhost:5001/".to_string(),
            fallback_url: "http://static.local/td3_results.json".to_string(),
            cache_max_age: Duration::from_secs(300),
            http_timeout: None,
            episodes: 3,
        };
        let client = HttpResultsClient::new(&config).unwrap();
        assert_eq!(
            client.url(ResultSource::Primary),
            "http://localhost:5001/api/td3-results"
        );
        assert_eq!(
            client.url(ResultSource::Fallback),
            "http://static.local/td3_results.json"
        );
        assert_eq!(client.run_url, "http://localhost:5001/api/run-td3");
    }
}
