//! Tallyman Domain Layer
//!
//! Core types and collaborator contracts for the financial-statement
//! extraction pipeline. Every other crate in the workspace depends on this
//! one; it holds no I/O of its own.
//!
//! ## Key Concepts
//!
//! - **Document Unit**: one financial period for one legal entity, carrying
//!   both lifecycle states and the extracted payload
//! - **Raw Extraction**: the ephemeral output of a single provider call
//! - **Structured Record**: the versioned, persisted parser output
//! - **Pre-Analysis Gate**: readiness classification embedded in the record
//! - **Analysis Record**: filtered analysis output linked to the exact record
//!   it was computed from
//!
//! ## Architecture
//!
//! - Pure types and state machines only
//! - Infrastructure implementations live in other crates
//! - Trait definitions for all external interactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod document;
pub mod error;
pub mod extraction;
pub mod id;
pub mod record;
pub mod status;
pub mod traits;

// Re-exports for convenience
pub use analysis::{AnalysisRecord, Opportunity, OpportunityScope, RiskFlags, Severity};
pub use document::DocumentUnit;
pub use error::{EngineError, IntakeError, ParseError, ProviderError, RecordError};
pub use extraction::{Page, RawExtraction, Table, TextBlock};
pub use id::{AnalysisId, DocumentId};
pub use record::{
    EntitySize, FilingType, PreAnalysisGate, ReadinessLevel, RecordMetadata, ReportingStandard,
    StructuredRecord, TransactionLine, UnitScale, SCHEMA_VERSION,
};
pub use status::{AnalysisStatus, ExtractionStatus};

/// Seconds since the Unix epoch, saturating to zero if the clock is before it
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
