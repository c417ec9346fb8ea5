//! HTTP completion adapter.
//!
//! Posts a prompt to a configurable endpoint and reads back the completed
//! text. Connection problems and timeouts surface as transient failures so
//! the tool runner can retry them.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AdapterError, CompletionService};

/// Completion service speaking a minimal JSON request/response contract
pub struct HttpCompletion {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

impl HttpCompletion {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CompletionService for HttpCompletion {
    fn name(&self) -> &str {
        "http"
    }

    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, AdapterError> {
        debug!(endpoint = %self.endpoint, timeout_ms = timeout.as_millis() as u64, "Completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&CompletionRequest { prompt })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AdapterError::Transient(e.to_string())
                } else {
                    AdapterError::Unavailable(e.to_string())
                }
            })?;

        if response.status().is_server_error() {
            return Err(AdapterError::Transient(format!(
                "completion endpoint returned {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(AdapterError::Malformed(format!(
                "completion endpoint returned {}",
                response.status()
            )));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Malformed(e.to_string()))?;

        if body.text.trim().is_empty() {
            return Err(AdapterError::Malformed("empty completion text".to_string()));
        }

        Ok(body.text)
    }
}
