//! Pipeline state controller
//!
//! Owns every status change of a Document Unit. Entry into `processing` is a
//! conditional update in the store, so two controllers racing on the same
//! document cannot both proceed. The store lock is only held for one
//! statement group and never across an await.

use crate::integrity::{detect_drift, fingerprint};
use crate::prompt::PromptBuilder;
use crate::response::parse_engine_response;
use crate::{PipelineConfig, PipelineError, PipelineMetrics};
use chrono::NaiveDate;
use std::sync::{Arc, Mutex, PoisonError};
use tallyman_domain::record::MIN_SCHEMA_VERSION;
use tallyman_domain::traits::{
    AnalysisEngine, DocumentQuery, DocumentSource, DocumentStore, ExtractionCompletion,
    ParseRequest, StructuralParser,
};
use tallyman_domain::{
    now_secs, AnalysisId, AnalysisRecord, AnalysisStatus, DocumentId, DocumentUnit,
    ExtractionStatus, IntakeError, PreAnalysisGate, RecordError, StructuredRecord,
    SCHEMA_VERSION,
};
use tallyman_extractor::{ExtractionSource, Extractor};
use tallyman_gatekeeper::{deterministic_flags, risk_score, OpportunityFilter, ReadinessGate};
use tracing::{debug, error, info, warn};

/// Result of a successful extraction
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// Document that was extracted
    pub document_id: DocumentId,

    /// Provider whose output was kept
    pub provider: String,

    /// Whether that provider was the primary or the fallback
    pub source: ExtractionSource,

    /// Whether the fallback provider was invoked at all
    pub fallback_triggered: bool,

    /// Readiness gate stored on the record
    pub gate: PreAnalysisGate,

    /// Expected analysis input fingerprint
    pub fingerprint: String,

    /// Diagnostics stored on the document, plus any secondary write failure
    pub warnings: Vec<String>,
}

/// Result of an analysis request
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    /// Analysis ran and its filtered record was persisted
    Completed(AnalysisRecord),

    /// The record is `BLOCKED` and no override was given; the engine was not
    /// called
    Refused {
        /// The gate's blocking issues, verbatim
        blocking_issues: Vec<String>,
    },
}

/// Everything the extraction stage produced before it is committed
struct PreparedExtraction {
    record: StructuredRecord,
    fingerprint: String,
    provider: String,
    source: ExtractionSource,
    fallback_triggered: bool,
}

/// Drives Document Units through extraction and analysis
pub struct PipelineController<S> {
    store: Mutex<S>,
    source: Arc<dyn DocumentSource>,
    extractor: Extractor,
    parser: Arc<dyn StructuralParser>,
    gate: ReadinessGate,
    filter: OpportunityFilter,
    engine: Arc<dyn AnalysisEngine>,
    config: PipelineConfig,
    metrics: Mutex<PipelineMetrics>,
}

impl<S> PipelineController<S>
where
    S: DocumentStore + Send,
    S::Error: std::fmt::Display,
{
    /// Create a controller
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(
        store: S,
        source: Arc<dyn DocumentSource>,
        extractor: Extractor,
        parser: Arc<dyn StructuralParser>,
        gate: ReadinessGate,
        engine: Arc<dyn AnalysisEngine>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;
        Ok(Self {
            store: Mutex::new(store),
            source,
            extractor,
            parser,
            gate,
            filter: OpportunityFilter::new(),
            engine,
            config,
            metrics: Mutex::new(PipelineMetrics::new()),
        })
    }

    /// Get the pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Snapshot of the metrics collected so far
    pub fn metrics(&self) -> PipelineMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reset the metrics counters
    pub fn reset_metrics(&self) {
        self.update_metrics(PipelineMetrics::reset);
    }

    pub(crate) fn update_metrics(&self, f: impl FnOnce(&mut PipelineMetrics)) {
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *metrics);
    }

    fn with_store<T>(
        &self,
        f: impl FnOnce(&mut S) -> Result<T, S::Error>,
    ) -> Result<T, PipelineError> {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *store).map_err(|e| PipelineError::Store(e.to_string()))
    }

    /// Register a new document in `pending`
    pub fn intake(
        &self,
        entity_id: impl Into<String>,
        entity_name: impl Into<String>,
        period_end: NaiveDate,
        source_handle: impl Into<String>,
    ) -> Result<DocumentUnit, PipelineError> {
        let document = DocumentUnit::new(entity_id, entity_name, period_end, source_handle);
        self.with_store(|s| s.insert_document(&document))?;
        info!(
            "Document {} registered for {} ({})",
            document.id, document.entity_name, document.period_end
        );
        Ok(document)
    }

    /// Get a document
    pub fn document(&self, id: DocumentId) -> Result<DocumentUnit, PipelineError> {
        self.with_store(|s| s.get_document(id))?
            .ok_or(PipelineError::NotFound(id))
    }

    /// Query documents
    pub fn documents(&self, query: &DocumentQuery) -> Result<Vec<DocumentUnit>, PipelineError> {
        self.with_store(|s| s.query_documents(query))
    }

    /// Oldest `pending` documents, at most `limit`
    pub fn pending(&self, limit: usize) -> Result<Vec<DocumentUnit>, PipelineError> {
        self.documents(&DocumentQuery {
            extraction_status: Some(ExtractionStatus::Pending),
            limit: Some(limit),
            ..DocumentQuery::default()
        })
    }

    /// Analysis history for a document, most recent first
    pub fn history(&self, id: DocumentId) -> Result<Vec<AnalysisRecord>, PipelineError> {
        self.with_store(|s| s.list_analyses(id))
    }

    /// Re-queue a `completed` or `failed` document for extraction
    ///
    /// The previous record stays in place until a new extraction completes.
    pub fn reset(&self, id: DocumentId) -> Result<(), PipelineError> {
        let document = self.document(id)?;
        let from = ExtractionStatus::predecessors(ExtractionStatus::Pending);
        if !self.with_store(|s| s.transition_extraction(id, &from, ExtractionStatus::Pending))? {
            return Err(PipelineError::Conflict(format!(
                "document {} cannot be reset from '{}'",
                id, document.extraction_status
            )));
        }
        info!("Document {} reset to pending", id);
        Ok(())
    }

    /// Extract a document: fetch, provider orchestration, parse, gate,
    /// fingerprint and persist
    ///
    /// Any failure moves the document to `failed` with the diagnostics
    /// gathered so far plus the cause, and is returned as
    /// [`PipelineError::ExtractionFailed`].
    pub async fn extract(&self, id: DocumentId) -> Result<ExtractionOutcome, PipelineError> {
        let document = self.document(id)?;

        let from = ExtractionStatus::predecessors(ExtractionStatus::Processing);
        let entered = self.with_store(|s| {
            s.transition_extraction(id, &from, ExtractionStatus::Processing)
        })?;
        if !entered {
            return Err(PipelineError::Conflict(format!(
                "document {} cannot enter extraction from '{}'",
                id, document.extraction_status
            )));
        }
        info!("Extraction started for document {}", id);

        let mut diagnostics = Vec::new();
        let prepared = match self.prepare_extraction(&document, &mut diagnostics).await {
            Ok(prepared) => prepared,
            Err(cause) => {
                diagnostics.push(cause);
                return Err(self.fail_extraction(id, diagnostics));
            }
        };

        let completion = ExtractionCompletion {
            analysis_status: AnalysisStatus::from_readiness(prepared.record.gate.level),
            record: prepared.record,
            fingerprint: prepared.fingerprint,
            diagnostics,
        };

        let committed = match self.with_store(|s| s.complete_extraction(id, &completion)) {
            Ok(committed) => committed,
            Err(e) => {
                let reasons = vec![completion.diagnostics.clone(), vec![e.to_string()]].concat();
                return Err(self.fail_extraction(id, reasons));
            }
        };
        if !committed {
            return Err(PipelineError::Conflict(format!(
                "document {} left 'processing' before extraction could be recorded",
                id
            )));
        }

        let mut warnings = completion.diagnostics.clone();
        let record = &completion.record;
        if let Err(e) = self.with_store(|s| {
            s.replace_transactions(
                id,
                &record.intercompany_transactions,
                &record.related_party_transactions,
            )
        }) {
            warn!("Transaction rows for document {} not written: {}", id, e);
            warnings.push(format!("secondary write failed: {}", e));
        }

        self.update_metrics(|m| m.extractions_completed += 1);
        info!(
            "Extraction completed for document {} via {} ({})",
            id, prepared.provider, record.gate.level
        );

        Ok(ExtractionOutcome {
            document_id: id,
            provider: prepared.provider,
            source: prepared.source,
            fallback_triggered: prepared.fallback_triggered,
            gate: record.gate.clone(),
            fingerprint: completion.fingerprint.clone(),
            warnings,
        })
    }

    async fn prepare_extraction(
        &self,
        document: &DocumentUnit,
        diagnostics: &mut Vec<String>,
    ) -> Result<PreparedExtraction, String> {
        let timeout = self.extractor.config().provider_timeout();
        let bytes = match tokio::time::timeout(timeout, self.source.fetch(&document.source_handle))
            .await
        {
            Ok(fetched) => fetched.map_err(|e| e.to_string())?,
            Err(_) => {
                return Err(IntakeError::Transient(format!(
                    "document fetch timed out after {}s",
                    timeout.as_secs()
                ))
                .to_string())
            }
        };
        debug!("Fetched {} bytes for document {}", bytes.len(), document.id);

        let run = self.extractor.extract(&bytes).await.map_err(|e| e.to_string())?;
        diagnostics.extend(run.warnings.iter().cloned());
        if run.fallback_triggered {
            let accepted = run.fallback_accepted();
            self.update_metrics(|m| {
                m.fallbacks_triggered += 1;
                if accepted {
                    m.fallbacks_accepted += 1;
                }
            });
        }

        let request = ParseRequest {
            entity_id: document.entity_id.clone(),
            entity_name: document.entity_name.clone(),
            period_end: document.period_end,
        };
        let parsed = self
            .parser
            .parse(&run.raw, &request)
            .map_err(|e| e.to_string())?;
        diagnostics.extend(parsed.warnings);

        let mut record = parsed.record;
        let dropped = record.drop_non_finite();
        if !dropped.is_empty() {
            warn!("Document {}: {}", document.id, dropped.join("; "));
            diagnostics.extend(dropped);
        }
        record.gate = self.gate.evaluate(&record, false);
        let fingerprint = fingerprint(&record).map_err(|e| e.to_string())?;

        Ok(PreparedExtraction {
            record,
            fingerprint,
            provider: run.provider_name,
            source: run.source,
            fallback_triggered: run.fallback_triggered,
        })
    }

    fn fail_extraction(&self, id: DocumentId, reasons: Vec<String>) -> PipelineError {
        error!("Extraction failed for document {}: {}", id, reasons.join("; "));
        match self.with_store(|s| s.fail_extraction(id, &reasons)) {
            Ok(true) => {}
            Ok(false) => warn!("Document {} was not in 'processing' when failing", id),
            Err(e) => error!("Could not record extraction failure for {}: {}", id, e),
        }
        self.update_metrics(|m| m.extractions_failed += 1);
        PipelineError::ExtractionFailed { reasons }
    }

    /// Analyze a document's structured record
    ///
    /// A `BLOCKED` record is refused without calling the engine unless
    /// `force` is set; even then the filter suppresses every opportunity.
    /// Fingerprint drift is recorded in the limitations, never fatal.
    pub async fn analyze(
        &self,
        id: DocumentId,
        force: bool,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let document = self.document(id)?;
        if !document.extraction_completed() {
            return Err(PipelineError::Conflict(format!(
                "document {} extraction is '{}', analysis needs 'completed'",
                id, document.extraction_status
            )));
        }

        let record = match (&document.record, document.schema_version) {
            (Some(record), _) => record.clone(),
            (None, Some(found)) => {
                return Err(RecordError::UnsupportedSchema {
                    found,
                    min: MIN_SCHEMA_VERSION,
                    max: SCHEMA_VERSION,
                }
                .into())
            }
            (None, None) => {
                return Err(PipelineError::Conflict(format!(
                    "document {} has no structured record",
                    id
                )))
            }
        };
        record.check_schema()?;

        let current = fingerprint(&record)?;
        let drift = detect_drift(
            &current,
            document.expected_fingerprint.as_deref(),
            document.last_analysis_fingerprint.as_deref(),
        );
        if !drift.is_empty() {
            warn!("Document {}: {}", id, drift.join("; "));
            self.update_metrics(|m| m.drift_warnings += 1);
        }

        let gate = ReadinessGate::with_override(&record.gate, force);
        if !gate.can_proceed_to_analysis {
            let from = AnalysisStatus::predecessors(AnalysisStatus::Blocked);
            if !self.with_store(|s| s.transition_analysis(id, &from, AnalysisStatus::Blocked))? {
                debug!("Document {} analysis status left unchanged by refusal", id);
            }
            self.update_metrics(|m| m.analyses_refused += 1);
            info!(
                "Analysis refused for document {}: {}",
                id,
                gate.blocking_issues.join("; ")
            );
            return Ok(AnalysisOutcome::Refused {
                blocking_issues: gate.blocking_issues,
            });
        }

        let from = AnalysisStatus::predecessors(AnalysisStatus::Processing);
        if !self.with_store(|s| s.transition_analysis(id, &from, AnalysisStatus::Processing))? {
            return Err(PipelineError::Conflict(format!(
                "document {} cannot enter analysis from '{}'",
                id, document.analysis_status
            )));
        }
        info!("Analysis started for document {} ({})", id, gate.level);

        let prompts = PromptBuilder::new(&document.entity_name, document.period_end, &record, &gate);
        let (system, user) = (prompts.system(), prompts.user());

        let timeout = self.config.analysis_timeout();
        let response = match tokio::time::timeout(timeout, self.engine.complete(&system, &user)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.fail_analysis(id, e.to_string())),
            Err(_) => {
                return Err(self.fail_analysis(
                    id,
                    format!("analysis engine timed out after {}s", timeout.as_secs()),
                ))
            }
        };

        let parsed = match parse_engine_response(&response.text) {
            Ok(parsed) => parsed,
            Err(e) => return Err(self.fail_analysis(id, e.to_string())),
        };

        let constrained = StructuredRecord {
            gate: gate.clone(),
            ..record.clone()
        };
        let filtered = self.filter.apply(&constrained, parsed.opportunities);
        let risk_flags = parsed
            .risk_flags
            .merge(deterministic_flags(&record, self.gate.config()));

        let mut limitations = drift;
        limitations.extend(parsed.skipped);
        limitations.extend(filtered.limitations);

        let analysis = AnalysisRecord {
            id: AnalysisId::new(),
            document_id: id,
            risk_score: risk_score(&risk_flags, &filtered.opportunities),
            opportunities: filtered.opportunities,
            input_fingerprint: current,
            readiness: gate.level,
            risk_flags,
            limitations,
            tokens_used: response.tokens_used,
            model_name: self.engine.model_name().to_string(),
            created_at: now_secs(),
        };

        if !self.with_store(|s| s.complete_analysis(&analysis))? {
            return Err(PipelineError::Conflict(format!(
                "document {} left analysis 'processing' before the result could be recorded",
                id
            )));
        }

        self.update_metrics(|m| m.analyses_completed += 1);
        info!(
            "Analysis {} completed for document {}: {} opportunities, risk score {}",
            analysis.id,
            id,
            analysis.opportunities.len(),
            analysis.risk_score
        );

        Ok(AnalysisOutcome::Completed(analysis))
    }

    fn fail_analysis(&self, id: DocumentId, cause: String) -> PipelineError {
        error!("Analysis failed for document {}: {}", id, cause);
        let reason = format!("analysis failed: {}", cause);
        match self.with_store(|s| s.fail_analysis(id, &reason)) {
            Ok(true) => {}
            Ok(false) => warn!("Document {} was not in analysis 'processing' when failing", id),
            Err(e) => error!("Could not record analysis failure for {}: {}", id, e),
        }
        self.update_metrics(|m| m.analyses_failed += 1);
        PipelineError::AnalysisFailed(cause)
    }
}
