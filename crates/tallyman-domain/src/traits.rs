//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the pipeline and its
//! collaborators. Implementations live in other crates.

use crate::analysis::AnalysisRecord;
use crate::document::DocumentUnit;
use crate::error::{EngineError, IntakeError, ParseError, ProviderError};
use crate::extraction::RawExtraction;
use crate::id::DocumentId;
use crate::record::{StructuredRecord, TransactionLine};
use crate::status::{AnalysisStatus, ExtractionStatus};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;

/// An optical/layout-recognition provider
///
/// Implemented by the infrastructure layer (tallyman-providers). No retries
/// happen inside an implementation; retry and fallback policy belongs to the
/// extractor.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Identity tag recorded on every extraction this provider produces
    fn name(&self) -> &str;

    /// Recognize a document
    async fn extract(
        &self,
        document: &[u8],
        timeout: Duration,
    ) -> Result<RawExtraction, ProviderError>;
}

/// Entity context handed to the structural parser
#[derive(Debug, Clone, PartialEq)]
pub struct ParseRequest {
    /// Owning entity reference
    pub entity_id: String,
    /// Owning entity name
    pub entity_name: String,
    /// Period-end date
    pub period_end: NaiveDate,
}

/// Structural parser output
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    /// The structured record
    pub record: StructuredRecord,
    /// Non-fatal parser warnings
    pub warnings: Vec<String>,
}

/// Converts provider output into a structured record
///
/// A pure function from the pipeline's point of view.
pub trait StructuralParser: Send + Sync {
    /// Parse a raw extraction
    fn parse(&self, raw: &RawExtraction, request: &ParseRequest)
        -> Result<ParsedDocument, ParseError>;
}

/// Free-form response from the analysis engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResponse {
    /// Response text
    pub text: String,
    /// Tokens consumed
    pub tokens_used: u64,
}

/// The natural-language analysis engine
///
/// Failures are opaque and never retried by the pipeline.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Model name recorded on analysis records
    fn model_name(&self) -> &str;

    /// Complete a system + user prompt pair
    async fn complete(&self, system: &str, user: &str) -> Result<EngineResponse, EngineError>;
}

/// Resolves opaque file handles to document bytes
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the document bytes for a handle
    async fn fetch(&self, handle: &str) -> Result<Vec<u8>, IntakeError>;
}

/// Everything written when an extraction completes
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionCompletion {
    /// Gated structured record
    pub record: StructuredRecord,
    /// Fingerprint of `record`
    pub fingerprint: String,
    /// Non-fatal diagnostics collected during extraction
    pub diagnostics: Vec<String>,
    /// Analysis status derived from the gate
    pub analysis_status: AnalysisStatus,
}

/// Query criteria for listing documents
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    /// Filter by extraction status
    pub extraction_status: Option<ExtractionStatus>,
    /// Filter by owning entity
    pub entity_id: Option<String>,
    /// Maximum results to return
    pub limit: Option<usize>,
}

/// Record-oriented persistence for documents and analyses
///
/// Implemented by the infrastructure layer (tallyman-store). Every status
/// change is a conditional update: it names the states it may leave and
/// reports whether it won, so two concurrent callers cannot both move a
/// document into `processing`.
pub trait DocumentStore {
    /// Error type for store operations
    type Error;

    /// Insert a new document
    fn insert_document(&mut self, document: &DocumentUnit) -> Result<(), Self::Error>;

    /// Get a document by ID
    fn get_document(&self, id: DocumentId) -> Result<Option<DocumentUnit>, Self::Error>;

    /// List documents matching criteria, oldest first
    fn query_documents(&self, query: &DocumentQuery) -> Result<Vec<DocumentUnit>, Self::Error>;

    /// Move extraction status to `to` if it is currently one of `from`
    fn transition_extraction(
        &mut self,
        id: DocumentId,
        from: &[ExtractionStatus],
        to: ExtractionStatus,
    ) -> Result<bool, Self::Error>;

    /// Persist a completed extraction if the document is still `processing`
    fn complete_extraction(
        &mut self,
        id: DocumentId,
        completion: &ExtractionCompletion,
    ) -> Result<bool, Self::Error>;

    /// Mark a `processing` extraction failed, leaving any prior record intact
    fn fail_extraction(&mut self, id: DocumentId, diagnostics: &[String])
        -> Result<bool, Self::Error>;

    /// Replace the denormalized transaction rows for a document
    fn replace_transactions(
        &mut self,
        id: DocumentId,
        intercompany: &[TransactionLine],
        related_party: &[TransactionLine],
    ) -> Result<(), Self::Error>;

    /// Move analysis status to `to` if it is currently one of `from` and
    /// extraction has completed
    fn transition_analysis(
        &mut self,
        id: DocumentId,
        from: &[AnalysisStatus],
        to: AnalysisStatus,
    ) -> Result<bool, Self::Error>;

    /// Move analysis from `processing` to `failed`, appending `reason` to the
    /// analysis diagnostics in the same update
    fn fail_analysis(&mut self, id: DocumentId, reason: &str) -> Result<bool, Self::Error>;

    /// Persist an analysis record and mark the analysis `completed`,
    /// recording the consumed fingerprint
    fn complete_analysis(&mut self, record: &AnalysisRecord) -> Result<bool, Self::Error>;

    /// All analysis records for a document, newest first
    fn list_analyses(&self, id: DocumentId) -> Result<Vec<AnalysisRecord>, Self::Error>;
}
