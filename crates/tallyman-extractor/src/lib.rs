//! Tallyman Extractor
//!
//! Runs documents through layout-recognition providers and decides, from
//! measured output quality, which provider's output to keep.
//!
//! # Architecture
//!
//! ```text
//! bytes → primary provider → QualityEvaluator → FallbackPolicy
//!                                                   │
//!                              (low quality / error)▼
//!                         secondary provider → QualityEvaluator → accept?
//! ```
//!
//! # Key Features
//!
//! - **Quality Signals**: page, table, block, paragraph and text counts plus
//!   four-digit code-token frequencies
//! - **Fallback Decisions**: threshold-driven should-fallback and
//!   should-accept checks with human-readable reasons
//! - **Explicit Fallback Configuration**: the secondary provider is a
//!   constructor argument
//! - **Baseline Parser**: [`LineItemParser`] turns raw output into a
//!   structured record
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tallyman_extractor::{Extractor, ExtractorConfig};
//! use tallyman_providers::MockProvider;
//! use tallyman_domain::RawExtraction;
//! use tallyman_domain::traits::ExtractionProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let primary = Arc::new(MockProvider::new("layout", RawExtraction::empty("layout")));
//! let fallback: Arc<dyn ExtractionProvider> =
//!     Arc::new(MockProvider::new("ocr", RawExtraction::empty("ocr")));
//!
//! let extractor = Extractor::new(primary, Some(fallback), ExtractorConfig::default())?;
//! let run = extractor.extract(b"%PDF-1.7").await?;
//!
//! println!("Kept output from {}", run.provider_name);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
pub mod fallback;
mod parser;
pub mod quality;
mod types;

#[cfg(test)]
mod tests;

pub use config::{
    ExtractorConfig, DEFAULT_PROVIDER_TIMEOUT_SECS, MIN_CHARS_PER_PAGE, PAGE_COVERAGE_RATIO,
    TEXT_COVERAGE_RATIO,
};
pub use error::ExtractorError;
pub use extractor::Extractor;
pub use fallback::{AcceptanceDecision, FallbackPolicy};
pub use parser::LineItemParser;
pub use quality::{QualityEvaluator, QualitySignal};
pub use types::{ExtractionRun, ExtractionSource};
