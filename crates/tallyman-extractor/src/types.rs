//! Types produced by an extraction run

use crate::fallback::AcceptanceDecision;
use crate::quality::QualitySignal;
use serde::{Deserialize, Serialize};
use tallyman_domain::RawExtraction;

/// Which provider produced the kept extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// Primary provider
    Primary,
    /// Secondary (fallback) provider
    Fallback,
}

/// Outcome of provider orchestration for one document
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    /// The kept raw extraction
    pub raw: RawExtraction,

    /// Quality of the kept extraction
    pub quality: QualitySignal,

    /// Identity tag of the provider that produced `raw`
    pub provider_name: String,

    /// Which provider `raw` came from
    pub source: ExtractionSource,

    /// Whether the secondary provider was invoked
    pub fallback_triggered: bool,

    /// Acceptance check, present when both providers produced output
    pub acceptance: Option<AcceptanceDecision>,

    /// Non-fatal warnings gathered along the way
    pub warnings: Vec<String>,
}

impl ExtractionRun {
    /// Whether the secondary output replaced the primary
    pub fn fallback_accepted(&self) -> bool {
        self.source == ExtractionSource::Fallback
    }
}
