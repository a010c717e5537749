//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline error
    #[error(transparent)]
    Pipeline(#[from] tallyman_pipeline::PipelineError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] tallyman_store::StoreError),

    /// Extractor setup error
    #[error("Extractor error: {0}")]
    Extractor(#[from] tallyman_extractor::ExtractorError),

    /// Readiness gate setup error
    #[error("Gatekeeper error: {0}")]
    Gatekeeper(#[from] tallyman_gatekeeper::GatekeeperError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
