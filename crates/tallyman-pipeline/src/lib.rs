//! Tallyman Pipeline
//!
//! Drives Document Units through extraction and analysis, and keeps the
//! integrity link between a structured record and every analysis computed
//! from it.
//!
//! # Overview
//!
//! The pipeline is responsible for:
//! - **State control**: every lifecycle transition, with entry into
//!   `processing` as a conditional store update
//! - **Extraction**: fetch, provider orchestration, parsing, readiness gating
//!   and persistence, with best-effort secondary writes
//! - **Integrity**: SHA-256 fingerprints over canonical JSON, re-derived and
//!   compared on every analysis
//! - **Analysis**: refusal on `BLOCKED`, engine call with its own timeout,
//!   opportunity filtering and risk scoring
//! - **Background work**: an interval worker over `pending` documents
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use tallyman_domain::traits::{AnalysisEngine, DocumentSource, ExtractionProvider};
//! use tallyman_extractor::{Extractor, ExtractorConfig, LineItemParser};
//! use tallyman_gatekeeper::ReadinessGate;
//! use tallyman_pipeline::{AnalysisOutcome, PipelineConfig, PipelineController};
//! use tallyman_providers::{FsDocumentSource, MockAnalysisEngine, MockProvider};
//! use tallyman_domain::RawExtraction;
//! use tallyman_store::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let primary: Arc<dyn ExtractionProvider> =
//!     Arc::new(MockProvider::new("layout", RawExtraction::empty("layout")));
//! let source: Arc<dyn DocumentSource> = Arc::new(FsDocumentSource::new("/srv/filings"));
//! let engine: Arc<dyn AnalysisEngine> = Arc::new(MockAnalysisEngine::default());
//!
//! let controller = PipelineController::new(
//!     SqliteStore::new("tallyman.db")?,
//!     source,
//!     Extractor::new(primary, None, ExtractorConfig::default())?,
//!     Arc::new(LineItemParser::new()),
//!     ReadinessGate::default(),
//!     engine,
//!     PipelineConfig::default(),
//! )?;
//!
//! let period = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
//! let document = controller.intake("01234567", "Acme Ltd", period, "acme-2024.pdf")?;
//! controller.extract(document.id).await?;
//!
//! match controller.analyze(document.id, false).await? {
//!     AnalysisOutcome::Completed(analysis) => println!("risk score {}", analysis.risk_score),
//!     AnalysisOutcome::Refused { blocking_issues } => println!("refused: {:?}", blocking_issues),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [pipeline]
//! analysis_timeout_secs = 180
//! worker_interval_secs = 60
//! batch_size = 10
//! auto_analyze = false
//! ```

#![warn(missing_docs)]

mod config;
mod controller;
mod error;
pub mod integrity;
mod metrics;
mod prompt;
mod response;
mod worker;

#[cfg(test)]
mod tests;

pub use config::{
    PipelineConfig, DEFAULT_ANALYSIS_TIMEOUT_SECS, DEFAULT_BATCH_SIZE,
    DEFAULT_WORKER_INTERVAL_SECS,
};
pub use controller::{AnalysisOutcome, ExtractionOutcome, PipelineController};
pub use error::PipelineError;
pub use metrics::PipelineMetrics;
pub use prompt::PromptBuilder;
pub use response::{parse_engine_response, EngineAnalysis};
pub use worker::{PipelineWorker, SweepReport};
