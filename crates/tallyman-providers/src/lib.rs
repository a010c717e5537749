//! Tallyman Provider Layer
//!
//! Collaborator implementations behind the traits in `tallyman-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: scripted extraction provider for testing
//! - `HttpLayoutProvider`: layout-recognition service over HTTP
//! - `MockAnalysisEngine`: deterministic analysis engine for testing
//! - `OllamaEngine`: analysis through a local Ollama chat API
//! - `FsDocumentSource`: document intake from a local directory
//!
//! # Examples
//!
//! ```
//! use tallyman_providers::MockProvider;
//! use tallyman_domain::RawExtraction;
//! use tallyman_domain::traits::ExtractionProvider;
//!
//! # async fn example() {
//! let provider = MockProvider::new("primary", RawExtraction::empty("primary"));
//! let raw = provider
//!     .extract(b"%PDF", std::time::Duration::from_secs(5))
//!     .await
//!     .unwrap();
//! assert_eq!(raw.provider, "primary");
//! # }
//! ```

#![warn(missing_docs)]

pub mod http;
pub mod ollama;
pub mod source;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tallyman_domain::traits::{AnalysisEngine, EngineResponse, ExtractionProvider};
use tallyman_domain::{EngineError, ProviderError, RawExtraction};

pub use http::HttpLayoutProvider;
pub use ollama::OllamaEngine;
pub use source::FsDocumentSource;

/// Scripted extraction provider for deterministic testing
///
/// Scripted results are returned in order; once the script is exhausted the
/// default result is returned for every call. No network calls are made.
///
/// # Examples
///
/// ```
/// use tallyman_providers::MockProvider;
/// use tallyman_domain::{ProviderError, RawExtraction};
///
/// let provider = MockProvider::failing("ocr", ProviderError::permanent("ocr", "bad key"));
/// provider.push_result(Ok(RawExtraction::empty("ocr")));
/// assert_eq!(provider.call_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    default_result: Result<RawExtraction, ProviderError>,
    script: Arc<Mutex<VecDeque<Result<RawExtraction, ProviderError>>>>,
    call_count: Arc<Mutex<usize>>,
    delay: Option<Duration>,
}

impl MockProvider {
    /// Create a provider that always returns `raw`
    pub fn new(name: impl Into<String>, raw: RawExtraction) -> Self {
        let name = name.into();
        Self {
            default_result: Ok(raw.with_provider(name.clone())),
            name,
            script: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(Mutex::new(0)),
            delay: None,
        }
    }

    /// Create a provider that always fails with `error`
    pub fn failing(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            default_result: Err(error),
            script: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(Mutex::new(0)),
            delay: None,
        }
    }

    /// Queue a result ahead of the default
    pub fn push_result(&self, result: Result<RawExtraction, ProviderError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    /// Simulate provider latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of times extract was called
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        *self.call_count.lock().unwrap_or_else(PoisonError::into_inner) = 0;
    }

    fn next_result(&self) -> Result<RawExtraction, ProviderError> {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match scripted.unwrap_or_else(|| self.default_result.clone()) {
            Ok(raw) => Ok(raw.with_provider(self.name.clone())),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ExtractionProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(
        &self,
        _document: &[u8],
        timeout: Duration,
    ) -> Result<RawExtraction, ProviderError> {
        *self.call_count.lock().unwrap_or_else(PoisonError::into_inner) += 1;

        if let Some(delay) = self.delay {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(ProviderError::timeout(&self.name, timeout.as_secs()));
            }
            tokio::time::sleep(delay).await;
        }

        self.next_result()
    }
}

/// Deterministic analysis engine for testing
///
/// Records the prompts of the last call so tests can assert on what the
/// pipeline sent.
#[derive(Debug, Clone)]
pub struct MockAnalysisEngine {
    result: Result<String, String>,
    tokens_used: u64,
    call_count: Arc<Mutex<usize>>,
    last_prompts: Arc<Mutex<Option<(String, String)>>>,
}

impl MockAnalysisEngine {
    /// Create an engine with a fixed response text
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            result: Ok(response.into()),
            tokens_used: 0,
            call_count: Arc::new(Mutex::new(0)),
            last_prompts: Arc::new(Mutex::new(None)),
        }
    }

    /// Create an engine that always fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
            ..Self::new("")
        }
    }

    /// Set the token usage reported per call
    pub fn with_tokens(mut self, tokens_used: u64) -> Self {
        self.tokens_used = tokens_used;
        self
    }

    /// Get the number of times complete was called
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// System and user prompt of the most recent call
    pub fn last_prompts(&self) -> Option<(String, String)> {
        self.last_prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockAnalysisEngine {
    fn default() -> Self {
        Self::new(r#"{"opportunities": [], "risk_flags": {}}"#)
    }
}

#[async_trait]
impl AnalysisEngine for MockAnalysisEngine {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<EngineResponse, EngineError> {
        *self.call_count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        *self.last_prompts.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((system.to_string(), user.to_string()));

        match &self.result {
            Ok(text) => Ok(EngineResponse {
                text: text.clone(),
                tokens_used: self.tokens_used,
            }),
            Err(message) => Err(EngineError(message.clone())),
        }
    }
}
