//! Document Unit - one financial period for one legal entity

use crate::id::DocumentId;
use crate::record::StructuredRecord;
use crate::status::{AnalysisStatus, ExtractionStatus};
use chrono::NaiveDate;

/// A financial-period document and its pipeline state
///
/// Only the pipeline controller mutates a persisted unit; everything else
/// treats it as a read model.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUnit {
    /// Unique identifier
    pub id: DocumentId,

    /// Owning entity reference (e.g. company number)
    pub entity_id: String,

    /// Owning entity display name
    pub entity_name: String,

    /// Period-end date of the statements
    pub period_end: NaiveDate,

    /// Opaque handle the intake collaborator resolves to bytes
    pub source_handle: String,

    /// Extraction lifecycle state
    pub extraction_status: ExtractionStatus,

    /// Analysis lifecycle state
    pub analysis_status: AnalysisStatus,

    /// Structured record, present once extraction has completed
    pub record: Option<StructuredRecord>,

    /// Schema version of `record`
    pub schema_version: Option<u32>,

    /// Fingerprint of `record` taken at extraction completion
    pub expected_fingerprint: Option<String>,

    /// Fingerprint of the record the last analysis consumed
    pub last_analysis_fingerprint: Option<String>,

    /// Extraction diagnostics (warnings or failure causes)
    pub diagnostics: Vec<String>,

    /// Causes of failed analysis attempts, oldest first
    pub analysis_diagnostics: Vec<String>,

    /// Creation time (seconds since epoch)
    pub created_at: u64,

    /// Last update time (seconds since epoch)
    pub updated_at: u64,
}

impl DocumentUnit {
    /// Create a new pending document
    pub fn new(
        entity_id: impl Into<String>,
        entity_name: impl Into<String>,
        period_end: NaiveDate,
        source_handle: impl Into<String>,
    ) -> Self {
        let now = crate::now_secs();
        Self {
            id: DocumentId::new(),
            entity_id: entity_id.into(),
            entity_name: entity_name.into(),
            period_end,
            source_handle: source_handle.into(),
            extraction_status: ExtractionStatus::Pending,
            analysis_status: AnalysisStatus::None,
            record: None,
            schema_version: None,
            expected_fingerprint: None,
            last_analysis_fingerprint: None,
            diagnostics: Vec::new(),
            analysis_diagnostics: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether analysis may be attempted at all
    pub fn extraction_completed(&self) -> bool {
        self.extraction_status == ExtractionStatus::Completed
    }
}
