// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible APIs.
//!
//! Provides [`OpenAiClient`] which handles bearer authentication, endpoint
//! construction from a configurable base URL, and a single retry on
//! transient errors (429, 500, 503).

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::sse::{self, EventStream};
use crate::types::{
    ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest,
    EmbeddingResponse,
};

/// Failures talking to the API, before they are mapped onto
/// [`concierge_core::ConciergeError`] by the adapter that made the call.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("failed to parse API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid API key header value: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl OpenAiClient {
    /// Creates a client for `base_url` (for example `https://api.openai.com/v1`).
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| ClientError::InvalidKey(e.to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Shortens the retry back-off (for tests against wiremock).
    #[cfg(test)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sends a streaming completion request and returns the parsed SSE frames.
    pub async fn stream_chat(&self, request: &ChatCompletionRequest) -> Result<EventStream, ClientError> {
        let response = self.post("chat/completions", request).await?;
        Ok(sse::parse_sse_stream(response))
    }

    /// Sends a non-streaming completion request.
    pub async fn complete_chat(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ClientError> {
        self.post_json("chat/completions", request).await
    }

    pub async fn embeddings(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse, ClientError> {
        self.post_json("embeddings", request).await
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// POSTs `body` to `{base_url}/{path}`, retrying transient failures.
    async fn post<B>(&self, path: &str, body: &B) -> Result<reqwest::Response, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}/{path}", self.base_url);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, path, "retrying request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self.client.post(&url).json(body).send().await?;
            let status = response.status();
            debug!(status = %status, attempt, path, "response received");

            if status.is_success() {
                return Ok(response);
            }

            let raw = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %raw, "transient error, will retry");
                continue;
            }
            return Err(ClientError::Status {
                status,
                message: error_message(&raw),
            });
        }

        Err(ClientError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "request failed after retries".into(),
        })
    }
}

fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

/// Prefers the structured `error.message` of the body over the raw text.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => parsed.error.to_string(),
        Err(_) => body.to_string(),
    }
}
