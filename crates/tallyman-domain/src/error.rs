//! Collaborator error types
//!
//! These cross the trait seams in [`crate::traits`], so they are concrete
//! types rather than associated ones: the orchestration code has to reason
//! about them (transient vs permanent, intake classification) without knowing
//! which implementation produced them.

use thiserror::Error;

/// Failure of a single extraction-provider invocation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("provider '{provider}' failed: {cause}")]
pub struct ProviderError {
    /// Identity tag of the failing provider
    pub provider: String,

    /// Human-readable cause, preserved verbatim for diagnostics
    pub cause: String,

    /// Whether a later attempt could plausibly succeed
    pub is_transient: bool,
}

impl ProviderError {
    /// A failure that may succeed on a later attempt (timeouts, 5xx, transport)
    pub fn transient(provider: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            cause: cause.into(),
            is_transient: true,
        }
    }

    /// A failure that will not go away on retry (auth, malformed response)
    pub fn permanent(provider: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            cause: cause.into(),
            is_transient: false,
        }
    }

    /// Timeout expiry, always transient
    pub fn timeout(provider: impl Into<String>, secs: u64) -> Self {
        Self::transient(provider, format!("timed out after {}s", secs))
    }
}

/// Failure fetching document bytes from the intake collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    /// Caller is not allowed to read the document
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Credentials for the storage backend were rejected
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No document exists for the handle
    #[error("document not found: {0}")]
    NotFound(String),

    /// Temporary failure, safe to retry
    #[error("transient intake failure: {0}")]
    Transient(String),
}

/// The structural parser could not produce a record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse failed: {message}")]
pub struct ParseError {
    /// Parser-supplied explanation
    pub message: String,
}

impl ParseError {
    /// Create a parse error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Opaque failure from the analysis engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("analysis engine error: {0}")]
pub struct EngineError(pub String);

/// Structured record cannot be trusted as read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Schema version outside the supported range
    #[error("unsupported schema version {found} (supported {min}..={max})")]
    UnsupportedSchema {
        /// Version found on the record
        found: u32,
        /// Oldest version this build reads
        min: u32,
        /// Newest version this build reads
        max: u32,
    },

    /// A numeric field holds NaN or an infinity, which JSON cannot carry
    #[error("non-finite value in '{field}'")]
    NonFinite {
        /// Metric name or record path of the offending value
        field: String,
    },
}
