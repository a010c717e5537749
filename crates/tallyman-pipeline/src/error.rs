//! Error types for pipeline operations

use tallyman_domain::{DocumentId, RecordError};
use thiserror::Error;

/// Errors that can occur while driving a document through the pipeline
///
/// A `BLOCKED` refusal is not an error: it is returned as
/// [`crate::AnalysisOutcome::Refused`].
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Storage layer error
    #[error("Storage error: {0}")]
    Store(String),

    /// No document with this id
    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    /// A conditional status transition found the document in the wrong state
    #[error("Status conflict: {0}")]
    Conflict(String),

    /// Extraction attempt ended in `failed`
    #[error("Extraction failed: {}", reasons.join("; "))]
    ExtractionFailed {
        /// Diagnostics recorded on the document
        reasons: Vec<String>,
    },

    /// Analysis attempt ended in `failed`
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    /// Engine output could not be converted into opportunities
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    /// Stored record cannot be read
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Record serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_failure_lists_reasons() {
        let err = PipelineError::ExtractionFailed {
            reasons: vec!["0 pages detected".to_string(), "parse failed: empty".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Extraction failed: 0 pages detected; parse failed: empty"
        );
    }
}
