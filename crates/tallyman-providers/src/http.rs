//! Layout-recognition provider over HTTP
//!
//! Posts the raw document bytes to a recognition endpoint and decodes the
//! JSON layout response into a [`RawExtraction`].
//!
//! Failure classification:
//!
//! - 401/403: permanent (authentication)
//! - 408/429/5xx, transport errors, timeouts: transient
//! - other 4xx, undecodable bodies: permanent

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tallyman_domain::traits::ExtractionProvider;
use tallyman_domain::{Page, ProviderError, RawExtraction};
use tracing::debug;

/// HTTP layout-recognition provider
pub struct HttpLayoutProvider {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

/// Response body of the recognition endpoint
#[derive(Deserialize)]
struct LayoutResponse {
    #[serde(default)]
    page_count: Option<usize>,
    #[serde(default)]
    pages: Vec<Page>,
    #[serde(default, alias = "content")]
    text: String,
}

impl HttpLayoutProvider {
    /// Create a new provider
    ///
    /// # Parameters
    ///
    /// - `name`: identity tag recorded on extractions (e.g. "layout-primary")
    /// - `endpoint`: full URL of the recognition endpoint
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: None,
            client: reqwest::Client::new(),
        }
    }

    /// Authenticate with a bearer key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Endpoint this provider posts to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn decode(&self, body: &str) -> Result<RawExtraction, ProviderError> {
        let response: LayoutResponse = serde_json::from_str(body).map_err(|e| {
            ProviderError::permanent(&self.name, format!("malformed response: {}", e))
        })?;

        Ok(RawExtraction {
            provider: self.name.clone(),
            page_count: response.page_count.unwrap_or(response.pages.len()),
            pages: response.pages,
            text: response.text,
        })
    }
}

/// Classify a non-success HTTP status
pub(crate) fn classify_status(provider: &str, status: u16, body: &str) -> ProviderError {
    let cause = format!("HTTP {}: {}", status, body.trim());
    match status {
        401 | 403 => ProviderError::permanent(provider, format!("authentication failed: {}", cause)),
        408 | 429 | 500..=599 => ProviderError::transient(provider, cause),
        _ => ProviderError::permanent(provider, cause),
    }
}

#[async_trait]
impl ExtractionProvider for HttpLayoutProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(
        &self,
        document: &[u8],
        timeout: Duration,
    ) -> Result<RawExtraction, ProviderError> {
        debug!(
            "Posting {} bytes to {} ({})",
            document.len(),
            self.endpoint,
            self.name
        );

        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(document.to_vec());

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::timeout(&self.name, timeout.as_secs())
            } else {
                ProviderError::transient(&self.name, format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::timeout(&self.name, timeout.as_secs())
            } else {
                ProviderError::transient(&self.name, format!("failed to read body: {}", e))
            }
        })?;

        if !status.is_success() {
            return Err(classify_status(&self.name, status.as_u16(), &body));
        }

        self.decode(&body)
    }
}
