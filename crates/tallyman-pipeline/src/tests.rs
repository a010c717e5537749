//! Integration tests for the pipeline controller and worker

#[cfg(test)]
mod tests {
    use crate::integrity::fingerprint;
    use crate::{
        AnalysisOutcome, PipelineConfig, PipelineController, PipelineError, PipelineWorker,
    };
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tallyman_domain::traits::{
        AnalysisEngine, DocumentQuery, DocumentSource, DocumentStore, EngineResponse,
        ExtractionCompletion, ExtractionProvider, ParseRequest, ParsedDocument, StructuralParser,
    };
    use tallyman_domain::{
        AnalysisRecord, AnalysisStatus, DocumentId, DocumentUnit, EngineError, ExtractionStatus,
        FilingType, IntakeError, Page, ParseError, RawExtraction, ReadinessLevel, RecordMetadata,
        ReportingStandard, Severity, OpportunityScope, StructuredRecord, Table, TransactionLine,
    };
    use tallyman_extractor::{ExtractionSource, Extractor, ExtractorConfig, LineItemParser};
    use tallyman_gatekeeper::ReadinessGate;
    use tallyman_providers::{MockAnalysisEngine, MockProvider};
    use tallyman_store::{SqliteStore, StoreError};

    const HANDLE: &str = "acme-2024.pdf";

    /// Serves fixed bytes per handle
    struct MemorySource(HashMap<String, Vec<u8>>);

    impl MemorySource {
        fn with(handles: &[&str]) -> Self {
            Self(
                handles
                    .iter()
                    .map(|h| (h.to_string(), b"%PDF-1.7".to_vec()))
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl DocumentSource for MemorySource {
        async fn fetch(&self, handle: &str) -> Result<Vec<u8>, IntakeError> {
            self.0
                .get(handle)
                .cloned()
                .ok_or_else(|| IntakeError::NotFound(handle.to_string()))
        }
    }

    /// Source that never returns
    struct StalledSource;

    #[async_trait]
    impl DocumentSource for StalledSource {
        async fn fetch(&self, _handle: &str) -> Result<Vec<u8>, IntakeError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    /// SQLite store whose transaction table rejects every write
    struct BrokenTransactions(SqliteStore);

    impl DocumentStore for BrokenTransactions {
        type Error = StoreError;

        fn insert_document(&mut self, document: &DocumentUnit) -> Result<(), StoreError> {
            self.0.insert_document(document)
        }

        fn get_document(&self, id: DocumentId) -> Result<Option<DocumentUnit>, StoreError> {
            self.0.get_document(id)
        }

        fn query_documents(&self, query: &DocumentQuery) -> Result<Vec<DocumentUnit>, StoreError> {
            self.0.query_documents(query)
        }

        fn transition_extraction(
            &mut self,
            id: DocumentId,
            from: &[ExtractionStatus],
            to: ExtractionStatus,
        ) -> Result<bool, StoreError> {
            self.0.transition_extraction(id, from, to)
        }

        fn complete_extraction(
            &mut self,
            id: DocumentId,
            completion: &ExtractionCompletion,
        ) -> Result<bool, StoreError> {
            self.0.complete_extraction(id, completion)
        }

        fn fail_extraction(
            &mut self,
            id: DocumentId,
            diagnostics: &[String],
        ) -> Result<bool, StoreError> {
            self.0.fail_extraction(id, diagnostics)
        }

        fn replace_transactions(
            &mut self,
            _id: DocumentId,
            _intercompany: &[TransactionLine],
            _related_party: &[TransactionLine],
        ) -> Result<(), StoreError> {
            Err(StoreError::InvalidData("transactions table is read-only".to_string()))
        }

        fn transition_analysis(
            &mut self,
            id: DocumentId,
            from: &[AnalysisStatus],
            to: AnalysisStatus,
        ) -> Result<bool, StoreError> {
            self.0.transition_analysis(id, from, to)
        }

        fn fail_analysis(&mut self, id: DocumentId, reason: &str) -> Result<bool, StoreError> {
            self.0.fail_analysis(id, reason)
        }

        fn complete_analysis(&mut self, record: &AnalysisRecord) -> Result<bool, StoreError> {
            self.0.complete_analysis(record)
        }

        fn list_analyses(&self, id: DocumentId) -> Result<Vec<AnalysisRecord>, StoreError> {
            self.0.list_analyses(id)
        }
    }

    /// Returns queued records in order, repeating the last one
    struct ScriptedParser(Mutex<VecDeque<StructuredRecord>>);

    impl ScriptedParser {
        fn new(records: Vec<StructuredRecord>) -> Self {
            Self(Mutex::new(records.into()))
        }
    }

    impl StructuralParser for ScriptedParser {
        fn parse(
            &self,
            _raw: &RawExtraction,
            _request: &ParseRequest,
        ) -> Result<ParsedDocument, ParseError> {
            let mut queue = self.0.lock().unwrap();
            let record = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            record
                .map(|record| ParsedDocument {
                    record,
                    warnings: Vec::new(),
                })
                .ok_or_else(|| ParseError::new("no scripted record"))
        }
    }

    /// Engine that never answers in time
    struct SlowEngine;

    #[async_trait]
    impl AnalysisEngine for SlowEngine {
        fn model_name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _system: &str, _user: &str) -> Result<EngineResponse, EngineError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(EngineError("unreachable".to_string()))
        }
    }

    /// Extraction with the given page, table and character counts
    fn shaped(pages: usize, tables: usize, chars: usize) -> RawExtraction {
        let mut page_list: Vec<Page> = (1..=pages)
            .map(|number| Page {
                number,
                ..Page::default()
            })
            .collect();
        for i in 0..tables {
            if let Some(page) = page_list.get_mut(i % pages.max(1)) {
                page.tables.push(Table::from_rows([["Total assets", "100"]]));
            }
        }
        RawExtraction {
            provider: String::new(),
            page_count: pages,
            pages: page_list,
            text: "x".repeat(chars),
        }
    }

    fn ready_record() -> StructuredRecord {
        let mut record = StructuredRecord::new(RecordMetadata {
            filing_type: FilingType::Full,
            reporting_standard: ReportingStandard::Frs102,
            confidence_score: 0.9,
            unit_scale_validated: true,
            ..RecordMetadata::default()
        });
        record.set_metric("total_assets", 1_000_000.0);
        record.set_metric("total_liabilities", 400_000.0);
        record.set_metric("net_assets", 600_000.0);
        record.set_metric("turnover", 2_000_000.0);
        record.set_metric("profit_before_tax", 100_000.0);
        record.intercompany_transactions.push(TransactionLine {
            counterparty: "Parent Holdings Ltd".to_string(),
            description: "management charge".to_string(),
            amount: 20_000.0,
        });
        record
    }

    fn limited_record() -> StructuredRecord {
        let mut record = ready_record();
        record.metadata.unit_scale_validated = false;
        record
    }

    fn blocked_record() -> StructuredRecord {
        let mut record = ready_record();
        record.metadata.confidence_score = 0.2;
        record.metrics.remove("net_assets");
        record
    }

    fn period() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    }

    fn engine_response() -> String {
        r#"{
            "opportunities": [
                {
                    "type": "working_capital",
                    "severity": "high",
                    "affected_amount": 50000,
                    "description": "debtor days above sector norm",
                    "recommendation": "tighten payment terms",
                    "scope": "confirmed"
                },
                {
                    "type": "refinancing",
                    "severity": "medium",
                    "affected_amount": 10000000,
                    "description": "refinance group debt",
                    "recommendation": "approach lenders",
                    "scope": "full_accounts"
                }
            ],
            "risk_flags": {"late_filing": true}
        }"#
        .to_string()
    }

    fn build(
        primary: &MockProvider,
        fallback: Option<&MockProvider>,
        parser: Arc<dyn StructuralParser>,
        engine: Arc<dyn AnalysisEngine>,
        config: PipelineConfig,
    ) -> PipelineController<SqliteStore> {
        let extractor = Extractor::new(
            Arc::new(primary.clone()),
            fallback.map(|f| Arc::new(f.clone()) as Arc<dyn ExtractionProvider>),
            ExtractorConfig::default(),
        )
        .unwrap();
        PipelineController::new(
            SqliteStore::new(":memory:").unwrap(),
            Arc::new(MemorySource::with(&[HANDLE, "b.pdf", "c.pdf"])),
            extractor,
            parser,
            ReadinessGate::default(),
            engine,
            config,
        )
        .unwrap()
    }

    fn controller_for(
        records: Vec<StructuredRecord>,
        engine: &MockAnalysisEngine,
    ) -> PipelineController<SqliteStore> {
        let primary = MockProvider::new("layout", shaped(2, 2, 1_000));
        build(
            &primary,
            None,
            Arc::new(ScriptedParser::new(records)),
            Arc::new(engine.clone()),
            PipelineConfig::default(),
        )
    }

    fn intake(controller: &PipelineController<SqliteStore>) -> DocumentId {
        controller
            .intake("01234567", "Acme Ltd", period(), HANDLE)
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_extract_ready_document() {
        let controller = controller_for(vec![ready_record()], &MockAnalysisEngine::default());
        let id = intake(&controller);

        let outcome = controller.extract(id).await.unwrap();
        assert_eq!(outcome.gate.level, ReadinessLevel::Ready);
        assert_eq!(outcome.provider, "layout");
        assert_eq!(outcome.source, ExtractionSource::Primary);
        assert!(outcome.warnings.is_empty());

        let document = controller.document(id).unwrap();
        assert_eq!(document.extraction_status, ExtractionStatus::Completed);
        assert_eq!(document.analysis_status, AnalysisStatus::Ready);
        let record = document.record.unwrap();
        assert_eq!(document.expected_fingerprint, Some(fingerprint(&record).unwrap()));
        assert_eq!(outcome.fingerprint, fingerprint(&record).unwrap());
        assert_eq!(record.intercompany_transactions.len(), 1);
        assert_eq!(controller.metrics().extractions_completed, 1);
    }

    #[tokio::test]
    async fn test_second_extraction_is_refused() {
        let primary = MockProvider::new("layout", shaped(2, 2, 1_000));
        let controller = build(
            &primary,
            None,
            Arc::new(ScriptedParser::new(vec![ready_record()])),
            Arc::new(MockAnalysisEngine::default()),
            PipelineConfig::default(),
        );
        let id = intake(&controller);

        controller.extract(id).await.unwrap();
        let err = controller.extract(id).await.unwrap_err();

        assert!(matches!(err, PipelineError::Conflict(_)));
        assert_eq!(primary.call_count(), 1);
        assert_eq!(
            controller.document(id).unwrap().extraction_status,
            ExtractionStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_zero_page_document_fails_with_diagnostics() {
        let primary = MockProvider::new("layout", RawExtraction::empty("layout"));
        let controller = build(
            &primary,
            None,
            Arc::new(LineItemParser::new()),
            Arc::new(MockAnalysisEngine::default()),
            PipelineConfig::default(),
        );
        let id = intake(&controller);

        let err = controller.extract(id).await.unwrap_err();
        let reasons = match err {
            PipelineError::ExtractionFailed { reasons } => reasons,
            other => panic!("expected extraction failure, got {other:?}"),
        };
        assert!(reasons.iter().any(|r| r.contains("0 pages detected")));

        let document = controller.document(id).unwrap();
        assert_eq!(document.extraction_status, ExtractionStatus::Failed);
        assert!(document.record.is_none());
        assert!(document.diagnostics.iter().any(|d| d.contains("0 pages detected")));
        assert!(document.diagnostics.last().unwrap().contains("parse failed"));
        assert_eq!(controller.metrics().extractions_failed, 1);
    }

    #[tokio::test]
    async fn test_failed_document_can_retry() {
        let primary = MockProvider::new("layout", shaped(2, 2, 1_000));
        primary.push_result(Err(tallyman_domain::ProviderError::transient(
            "layout",
            "HTTP 503",
        )));
        let controller = build(
            &primary,
            None,
            Arc::new(ScriptedParser::new(vec![ready_record()])),
            Arc::new(MockAnalysisEngine::default()),
            PipelineConfig::default(),
        );
        let id = intake(&controller);

        assert!(controller.extract(id).await.is_err());
        let document = controller.document(id).unwrap();
        assert_eq!(document.extraction_status, ExtractionStatus::Failed);
        assert!(document.diagnostics[0].contains("HTTP 503"));

        controller.extract(id).await.unwrap();
        assert_eq!(
            controller.document(id).unwrap().extraction_status,
            ExtractionStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_missing_source_fails_extraction() {
        let controller = controller_for(vec![ready_record()], &MockAnalysisEngine::default());
        let id = controller
            .intake("01234567", "Acme Ltd", period(), "missing.pdf")
            .unwrap()
            .id;

        let err = controller.extract(id).await.unwrap_err();
        assert!(err.to_string().contains("document not found: missing.pdf"));
    }

    #[tokio::test]
    async fn test_stalled_source_times_out() {
        let primary = MockProvider::new("layout", shaped(2, 2, 1_000));
        let extractor = Extractor::new(
            Arc::new(primary.clone()),
            None,
            ExtractorConfig {
                provider_timeout_secs: 1,
                ..ExtractorConfig::default()
            },
        )
        .unwrap();
        let controller = PipelineController::new(
            SqliteStore::new(":memory:").unwrap(),
            Arc::new(StalledSource),
            extractor,
            Arc::new(ScriptedParser::new(vec![ready_record()])),
            ReadinessGate::default(),
            Arc::new(MockAnalysisEngine::default()),
            PipelineConfig::default(),
        )
        .unwrap();
        let id = intake(&controller);

        let err = controller.extract(id).await.unwrap_err();
        let reasons = match err {
            PipelineError::ExtractionFailed { reasons } => reasons,
            other => panic!("expected extraction failure, got {other:?}"),
        };
        assert_eq!(
            reasons,
            vec!["transient intake failure: document fetch timed out after 1s"]
        );
        assert_eq!(primary.call_count(), 0);

        // The document is released for a retry rather than stuck in processing
        let document = controller.document(id).unwrap();
        assert_eq!(document.extraction_status, ExtractionStatus::Failed);
        assert_eq!(document.diagnostics, reasons);
    }

    #[tokio::test]
    async fn test_transaction_write_failure_keeps_extraction() {
        let primary = MockProvider::new("layout", shaped(2, 2, 1_000));
        let extractor =
            Extractor::new(Arc::new(primary), None, ExtractorConfig::default()).unwrap();
        let controller = PipelineController::new(
            BrokenTransactions(SqliteStore::new(":memory:").unwrap()),
            Arc::new(MemorySource::with(&[HANDLE])),
            extractor,
            Arc::new(ScriptedParser::new(vec![ready_record()])),
            ReadinessGate::default(),
            Arc::new(MockAnalysisEngine::default()),
            PipelineConfig::default(),
        )
        .unwrap();
        let id = controller
            .intake("01234567", "Acme Ltd", period(), HANDLE)
            .unwrap()
            .id;

        let outcome = controller.extract(id).await.unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("secondary write failed"));
        assert!(outcome.warnings[0].contains("read-only"));

        let document = controller.document(id).unwrap();
        assert_eq!(document.extraction_status, ExtractionStatus::Completed);
        assert_eq!(document.analysis_status, AnalysisStatus::Ready);
        let record = document.record.unwrap();
        assert_eq!(record.intercompany_transactions.len(), 1);
        assert_eq!(document.expected_fingerprint, Some(fingerprint(&record).unwrap()));
        assert_eq!(outcome.fingerprint, fingerprint(&record).unwrap());
        // Only the primary write is recorded as a document diagnostic
        assert!(document.diagnostics.is_empty());
        assert_eq!(controller.metrics().extractions_completed, 1);
    }

    #[tokio::test]
    async fn test_non_finite_metric_dropped_before_persisting() {
        let mut record = ready_record();
        record.set_metric("gearing", f64::INFINITY);
        let controller = controller_for(vec![record], &MockAnalysisEngine::default());
        let id = intake(&controller);

        let outcome = controller.extract(id).await.unwrap();
        assert_eq!(outcome.gate.level, ReadinessLevel::Ready);
        assert!(outcome.warnings.iter().any(|w| w.contains("'gearing'")));

        // Re-reading the document must keep working
        let document = controller.document(id).unwrap();
        assert_eq!(document.extraction_status, ExtractionStatus::Completed);
        assert!(document.diagnostics.iter().any(|d| d.contains("'gearing'")));
        let stored = document.record.unwrap();
        assert!(!stored.metrics.contains_key("gearing"));
        assert_eq!(stored.metric("net_assets"), Some(600_000.0));
        assert_eq!(document.expected_fingerprint, Some(fingerprint(&stored).unwrap()));
    }

    #[tokio::test]
    async fn test_non_finite_metric_fingerprints_as_absent() {
        let mut fingerprints = Vec::new();
        for value in [None, Some(f64::NAN), Some(f64::INFINITY), Some(f64::NEG_INFINITY)] {
            let mut record = ready_record();
            if let Some(value) = value {
                record.set_metric("gearing", value);
            }
            let controller = controller_for(vec![record], &MockAnalysisEngine::default());
            let id = intake(&controller);
            fingerprints.push(controller.extract(id).await.unwrap().fingerprint);
        }
        assert!(fingerprints.iter().all(|f| f == &fingerprints[0]));

        let mut finite = ready_record();
        finite.set_metric("gearing", 1.5);
        let controller = controller_for(vec![finite], &MockAnalysisEngine::default());
        let id = intake(&controller);
        assert_ne!(controller.extract(id).await.unwrap().fingerprint, fingerprints[0]);
    }

    #[tokio::test]
    async fn test_fallback_accepted_through_pipeline() {
        let primary = MockProvider::new("layout", shaped(10, 0, 50));
        let fallback = MockProvider::new("ocr", shaped(9, 3, 40));
        let controller = build(
            &primary,
            Some(&fallback),
            Arc::new(ScriptedParser::new(vec![ready_record()])),
            Arc::new(MockAnalysisEngine::default()),
            PipelineConfig::default(),
        );
        let id = intake(&controller);

        let outcome = controller.extract(id).await.unwrap();
        assert!(outcome.fallback_triggered);
        assert_eq!(outcome.source, ExtractionSource::Fallback);
        assert_eq!(outcome.provider, "ocr");

        let metrics = controller.metrics();
        assert_eq!(metrics.fallbacks_triggered, 1);
        assert_eq!(metrics.fallbacks_accepted, 1);

        let document = controller.document(id).unwrap();
        assert!(document
            .diagnostics
            .iter()
            .any(|d| d.contains("primary output replaced by fallback")));
    }

    #[tokio::test]
    async fn test_blocked_record_refused_without_engine_call() {
        let engine = MockAnalysisEngine::new(engine_response());
        let controller = controller_for(vec![blocked_record()], &engine);
        let id = intake(&controller);

        let outcome = controller.extract(id).await.unwrap();
        assert_eq!(outcome.gate.level, ReadinessLevel::Blocked);
        assert!(!outcome.gate.can_proceed_to_analysis);

        let result = controller.analyze(id, false).await.unwrap();
        let AnalysisOutcome::Refused { blocking_issues } = result else {
            panic!("expected refusal");
        };
        assert_eq!(blocking_issues, outcome.gate.blocking_issues);
        assert!(!blocking_issues.is_empty());

        assert_eq!(engine.call_count(), 0);
        assert!(controller.history(id).unwrap().is_empty());
        assert_eq!(
            controller.document(id).unwrap().analysis_status,
            AnalysisStatus::Blocked
        );
        assert_eq!(controller.metrics().analyses_refused, 1);
    }

    #[tokio::test]
    async fn test_refusal_leaves_inflight_analysis_alone() {
        let primary = MockProvider::new("layout", shaped(2, 2, 1_000));
        let controller = build(
            &primary,
            None,
            Arc::new(ScriptedParser::new(vec![blocked_record()])),
            Arc::new(SlowEngine),
            PipelineConfig {
                analysis_timeout_secs: 1,
                ..PipelineConfig::default()
            },
        );
        let id = intake(&controller);
        controller.extract(id).await.unwrap();

        let forced = controller.analyze(id, true);
        let refused = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let outcome = controller.analyze(id, false).await.unwrap();
            (outcome, controller.document(id).unwrap().analysis_status)
        };
        let (forced, (outcome, status_after_refusal)) = tokio::join!(forced, refused);

        assert!(matches!(outcome, AnalysisOutcome::Refused { .. }));
        assert_eq!(status_after_refusal, AnalysisStatus::Processing);
        assert!(matches!(forced, Err(PipelineError::AnalysisFailed(_))));
        assert_eq!(
            controller.document(id).unwrap().analysis_status,
            AnalysisStatus::Failed
        );
        assert_eq!(controller.metrics().analyses_refused, 1);
    }

    #[tokio::test]
    async fn test_forced_blocked_analysis_keeps_no_opportunities() {
        let engine = MockAnalysisEngine::new(engine_response());
        let controller = controller_for(vec![blocked_record()], &engine);
        let id = intake(&controller);
        controller.extract(id).await.unwrap();

        let AnalysisOutcome::Completed(analysis) = controller.analyze(id, true).await.unwrap()
        else {
            panic!("expected completed analysis");
        };

        assert_eq!(engine.call_count(), 1);
        assert!(analysis.opportunities.is_empty());
        assert_eq!(analysis.readiness, ReadinessLevel::Blocked);
        assert!(analysis
            .limitations
            .iter()
            .any(|l| l.contains("override applied")));
        assert!(analysis.risk_flags.low_confidence);
        assert!(analysis.risk_flags.late_filing);

        // The stored gate is untouched by the override
        let record = controller.document(id).unwrap().record.unwrap();
        assert!(!record.gate.override_applied);
    }

    #[tokio::test]
    async fn test_ready_analysis_is_filtered_and_persisted() {
        let engine = MockAnalysisEngine::new(engine_response()).with_tokens(1_500);
        let controller = controller_for(vec![ready_record()], &engine);
        let id = intake(&controller);
        let extraction = controller.extract(id).await.unwrap();

        let AnalysisOutcome::Completed(analysis) = controller.analyze(id, false).await.unwrap()
        else {
            panic!("expected completed analysis");
        };

        assert_eq!(analysis.opportunities.len(), 1);
        assert_eq!(analysis.opportunities[0].kind, "working_capital");
        assert_eq!(analysis.opportunities[0].severity, Severity::High);
        assert!(analysis
            .limitations
            .iter()
            .any(|l| l.contains("'refinancing'") && l.contains("exceeds ceiling")));
        assert_eq!(analysis.readiness, ReadinessLevel::Ready);
        assert_eq!(analysis.input_fingerprint, extraction.fingerprint);
        assert!(analysis.risk_flags.intercompany_exposure);
        assert!(analysis.risk_flags.late_filing);
        // intercompany 10 + late filing 10 + high 8
        assert_eq!(analysis.risk_score, 28);
        assert_eq!(analysis.tokens_used, 1_500);
        assert_eq!(analysis.model_name, "mock");

        let (_, user) = engine.last_prompts().unwrap();
        assert!(user.contains("Entity: Acme Ltd"));
        assert!(user.contains("Parent Holdings Ltd"));

        let document = controller.document(id).unwrap();
        assert_eq!(document.analysis_status, AnalysisStatus::Completed);
        assert_eq!(
            document.last_analysis_fingerprint,
            Some(extraction.fingerprint.clone())
        );
        assert_eq!(controller.history(id).unwrap(), vec![analysis]);
    }

    #[tokio::test]
    async fn test_limited_analysis_downgrades_claims() {
        let engine = MockAnalysisEngine::new(engine_response());
        let controller = controller_for(vec![limited_record()], &engine);
        let id = intake(&controller);

        let outcome = controller.extract(id).await.unwrap();
        assert_eq!(outcome.gate.level, ReadinessLevel::ReadyLimited);
        assert_eq!(
            controller.document(id).unwrap().analysis_status,
            AnalysisStatus::ReadyWithWarnings
        );

        let AnalysisOutcome::Completed(analysis) = controller.analyze(id, false).await.unwrap()
        else {
            panic!("expected completed analysis");
        };
        assert_eq!(analysis.readiness, ReadinessLevel::ReadyLimited);
        assert_eq!(analysis.opportunities.len(), 1);
        assert_eq!(analysis.opportunities[0].severity, Severity::Medium);
        assert_eq!(analysis.opportunities[0].scope, OpportunityScope::Indicative);
        assert!(analysis
            .limitations
            .iter()
            .any(|l| l.starts_with("readiness limited:")));
    }

    #[tokio::test]
    async fn test_engine_failure_marks_analysis_failed() {
        let engine = MockAnalysisEngine::failing("model unavailable");
        let controller = controller_for(vec![ready_record()], &engine);
        let id = intake(&controller);
        controller.extract(id).await.unwrap();

        let err = controller.analyze(id, false).await.unwrap_err();
        assert!(matches!(err, PipelineError::AnalysisFailed(ref m) if m.contains("model unavailable")));

        let document = controller.document(id).unwrap();
        assert_eq!(document.analysis_status, AnalysisStatus::Failed);
        assert_eq!(document.extraction_status, ExtractionStatus::Completed);
        assert!(document.record.is_some());
        assert_eq!(controller.metrics().analyses_failed, 1);
    }

    #[tokio::test]
    async fn test_invalid_engine_response_marks_analysis_failed() {
        let engine = MockAnalysisEngine::new("I could not find any opportunities.");
        let controller = controller_for(vec![ready_record()], &engine);
        let id = intake(&controller);
        controller.extract(id).await.unwrap();

        let err = controller.analyze(id, false).await.unwrap_err();
        assert!(err.to_string().contains("Invalid engine response"));
        assert_eq!(
            controller.document(id).unwrap().analysis_status,
            AnalysisStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_analysis_failure_reason_is_recorded() {
        let engine = MockAnalysisEngine::new("not json at all");
        let controller = controller_for(vec![ready_record()], &engine);
        let id = intake(&controller);
        controller.extract(id).await.unwrap();

        controller.analyze(id, false).await.unwrap_err();
        let document = controller.document(id).unwrap();
        assert_eq!(document.analysis_status, AnalysisStatus::Failed);
        assert_eq!(document.analysis_diagnostics.len(), 1);
        assert!(document.analysis_diagnostics[0].starts_with("analysis failed: "));
        assert!(document.analysis_diagnostics[0].contains("Invalid engine response"));
        assert!(controller.history(id).unwrap().is_empty());

        // A retry that fails again keeps the earlier cause
        controller.analyze(id, false).await.unwrap_err();
        let document = controller.document(id).unwrap();
        assert_eq!(document.analysis_diagnostics.len(), 2);
        assert!(document.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_engine_timeout() {
        let primary = MockProvider::new("layout", shaped(2, 2, 1_000));
        let controller = build(
            &primary,
            None,
            Arc::new(ScriptedParser::new(vec![ready_record()])),
            Arc::new(SlowEngine),
            PipelineConfig {
                analysis_timeout_secs: 1,
                ..PipelineConfig::default()
            },
        );
        let id = intake(&controller);
        controller.extract(id).await.unwrap();

        let err = controller.analyze(id, false).await.unwrap_err();
        assert!(err.to_string().contains("timed out after 1s"));
    }

    #[tokio::test]
    async fn test_analysis_requires_completed_extraction() {
        let engine = MockAnalysisEngine::default();
        let controller = controller_for(vec![ready_record()], &engine);
        let id = intake(&controller);

        let err = controller.analyze(id, false).await.unwrap_err();
        assert!(matches!(err, PipelineError::Conflict(_)));
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reextraction_reports_drift_against_previous_analysis() {
        let mut changed = ready_record();
        changed.set_metric("turnover", 2_500_000.0);
        let engine = MockAnalysisEngine::default();
        let controller = controller_for(vec![ready_record(), changed], &engine);
        let id = intake(&controller);

        controller.extract(id).await.unwrap();
        let AnalysisOutcome::Completed(first) = controller.analyze(id, false).await.unwrap() else {
            panic!("expected completed analysis");
        };
        assert!(!first.limitations.iter().any(|l| l.contains("integrity drift")));

        controller.reset(id).unwrap();
        assert_eq!(
            controller.document(id).unwrap().analysis_status,
            AnalysisStatus::None
        );
        controller.extract(id).await.unwrap();

        let AnalysisOutcome::Completed(second) = controller.analyze(id, false).await.unwrap()
        else {
            panic!("expected completed analysis");
        };
        assert_ne!(first.input_fingerprint, second.input_fingerprint);
        assert!(second
            .limitations
            .iter()
            .any(|l| l.contains("previous analysis input")));
        assert_eq!(controller.metrics().drift_warnings, 1);

        let history = controller.history(id).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_requires_terminal_extraction() {
        let controller = controller_for(vec![ready_record()], &MockAnalysisEngine::default());
        let id = intake(&controller);

        assert!(matches!(controller.reset(id), Err(PipelineError::Conflict(_))));
        assert!(matches!(
            controller.reset(DocumentId::new()),
            Err(PipelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_worker_sweeps_pending_in_batches() {
        let primary = MockProvider::new("layout", shaped(2, 2, 1_000));
        let engine = MockAnalysisEngine::default();
        let controller = Arc::new(build(
            &primary,
            None,
            Arc::new(ScriptedParser::new(vec![ready_record()])),
            Arc::new(engine.clone()),
            PipelineConfig {
                batch_size: 2,
                auto_analyze: true,
                worker_interval_secs: 1,
                ..PipelineConfig::default()
            },
        ));
        for handle in [HANDLE, "b.pdf", "c.pdf"] {
            controller
                .intake("01234567", "Acme Ltd", period(), handle)
                .unwrap();
        }
        let worker = PipelineWorker::new(Arc::clone(&controller));

        let first = worker.sweep().await.unwrap();
        assert_eq!(first.picked, 2);
        assert_eq!(first.extracted, 2);
        assert_eq!(first.analyzed, 2);

        let second = worker.sweep().await.unwrap();
        assert_eq!(second.picked, 1);

        assert!(controller.pending(10).unwrap().is_empty());
        assert_eq!(engine.call_count(), 3);
        assert_eq!(worker.metrics().sweep_count, 2);
    }

    #[tokio::test]
    async fn test_worker_run_cycles_skips_analysis_of_blocked() {
        let primary = MockProvider::new("layout", shaped(2, 2, 1_000));
        let engine = MockAnalysisEngine::default();
        let controller = Arc::new(build(
            &primary,
            None,
            Arc::new(ScriptedParser::new(vec![blocked_record()])),
            Arc::new(engine.clone()),
            PipelineConfig {
                auto_analyze: true,
                worker_interval_secs: 1,
                ..PipelineConfig::default()
            },
        ));
        intake(&controller);
        let worker = PipelineWorker::new(controller);

        let total = worker.run_cycles(1).await.unwrap();
        assert_eq!(total.extracted, 1);
        assert_eq!(total.analyzed, 0);
        assert_eq!(engine.call_count(), 0);
    }
}
