//! Error types for the Extractor

use tallyman_domain::ProviderError;
use thiserror::Error;

/// Errors that can occur during extraction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// The only configured provider failed
    #[error("{0}")]
    Provider(ProviderError),

    /// Primary and fallback providers both failed
    #[error("all providers failed: primary: {primary}; fallback: {fallback}")]
    AllProvidersFailed {
        /// Primary provider failure
        primary: ProviderError,
        /// Fallback provider failure
        fallback: ProviderError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExtractorError {
    /// Whether retrying the whole extraction later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ExtractorError::Provider(e) => e.is_transient,
            ExtractorError::AllProvidersFailed { primary, fallback } => {
                primary.is_transient || fallback.is_transient
            }
            ExtractorError::Config(_) => false,
        }
    }
}
