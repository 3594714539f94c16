//! Backend HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use postwatch_protocol::{
    LIST_DATA_PATH, PREDICT_PATH, PROCESS_DATA_PATH, PredictRequest, PredictResponse, Record,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// The triggering call of a live session.
///
/// Split out so the session controller can run against any implementation.
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Run a prediction for `query` and return the ordered results.
    async fn predict(&self, query: &str) -> ClientResult<Vec<String>>;
}

/// Client for the backend's HTTP endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    /// Base URL without trailing slash (e.g. "http://localhost:8000").
    base_url: String,
    /// Timeout applied to the one-shot process/list calls.
    request_timeout: Duration,
}

impl ApiClient {
    /// Create a new client.
    pub fn new(base_url: impl AsRef<str>, request_timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /process_data`: advance the backend's batch cursor and return
    /// the record it processed.
    pub async fn process_data(&self) -> ClientResult<Record> {
        let url = self.url(PROCESS_DATA_PATH);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, e))?;

        Self::decode(&url, "process_data response", response).await
    }

    /// `GET /data`: all stored records in retrieval order.
    pub async fn list_records(&self) -> ClientResult<Vec<Record>> {
        let url = self.url(LIST_DATA_PATH);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, e))?;

        Self::decode(&url, "data listing", response).await
    }

    /// Check status, then parse the body as `T`.
    async fn decode<T: DeserializeOwned>(
        url: &str,
        what: &str,
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = status.canonical_reason().unwrap_or("unknown status");
            let message = if body.trim().is_empty() {
                format!("{} {}", status.as_u16(), reason)
            } else {
                format!("{} {}: {}", status.as_u16(), reason, truncate(&body, 200))
            };
            return Err(ClientError::Request {
                endpoint: url.to_string(),
                status: Some(status.as_u16()),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::from_reqwest(url, e))?;
        serde_json::from_str(&body).map_err(|e| ClientError::decode(what, e))
    }
}

#[async_trait]
impl PredictionService for ApiClient {
    /// `POST /predict`. No per-call timeout: the session bounds it.
    async fn predict(&self, query: &str) -> ClientResult<Vec<String>> {
        let url = self.url(PREDICT_PATH);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(&PredictRequest::new(query))
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, e))?;

        let body: PredictResponse = Self::decode(&url, "predict response", response).await?;
        Ok(body.predictions)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
