//! Lifecycle state machines for a Document Unit
//!
//! Extraction: `pending -> processing -> {completed, failed}`, with
//! `pending`/`failed` the only ways back into `processing`.
//!
//! Analysis: `none -> {blocked, ready, ready_with_warnings} -> processing ->
//! {completed, failed}`, and it may only leave `none` once extraction has
//! completed.

use crate::record::ReadinessLevel;

/// Extraction lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionStatus {
    /// Waiting to be extracted
    Pending,
    /// Extraction in flight
    Processing,
    /// Structured record persisted
    Completed,
    /// Extraction failed; diagnostics attached
    Failed,
}

impl ExtractionStatus {
    /// Storage name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Pending => "pending",
            ExtractionStatus::Processing => "processing",
            ExtractionStatus::Completed => "completed",
            ExtractionStatus::Failed => "failed",
        }
    }

    /// Parse a status from its storage name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ExtractionStatus::Pending),
            "processing" => Some(ExtractionStatus::Processing),
            "completed" => Some(ExtractionStatus::Completed),
            "failed" => Some(ExtractionStatus::Failed),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: ExtractionStatus) -> bool {
        use ExtractionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Failed, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Pending)
                | (Failed, Pending)
        )
    }

    /// States from which `next` may be entered
    pub fn predecessors(next: ExtractionStatus) -> Vec<ExtractionStatus> {
        ALL_EXTRACTION
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }
}

const ALL_EXTRACTION: [ExtractionStatus; 4] = [
    ExtractionStatus::Pending,
    ExtractionStatus::Processing,
    ExtractionStatus::Completed,
    ExtractionStatus::Failed,
];

impl std::str::FromStr for ExtractionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid extraction status: {}", s))
    }
}

impl std::fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisStatus {
    /// Initial state, before extraction completes
    None,
    /// Gate blocked analysis
    Blocked,
    /// Gate allows unrestricted analysis
    Ready,
    /// Gate allows filtered analysis
    ReadyWithWarnings,
    /// Analysis in flight
    Processing,
    /// Analysis record persisted
    Completed,
    /// Analysis failed
    Failed,
}

impl AnalysisStatus {
    /// Storage name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::None => "none",
            AnalysisStatus::Blocked => "blocked",
            AnalysisStatus::Ready => "ready",
            AnalysisStatus::ReadyWithWarnings => "ready_with_warnings",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// Parse a status from its storage name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(AnalysisStatus::None),
            "blocked" => Some(AnalysisStatus::Blocked),
            "ready" => Some(AnalysisStatus::Ready),
            "ready_with_warnings" => Some(AnalysisStatus::ReadyWithWarnings),
            "processing" => Some(AnalysisStatus::Processing),
            "completed" => Some(AnalysisStatus::Completed),
            "failed" => Some(AnalysisStatus::Failed),
            _ => None,
        }
    }

    /// Status a freshly gated record puts the analysis lifecycle in
    pub fn from_readiness(level: ReadinessLevel) -> Self {
        match level {
            ReadinessLevel::Ready => AnalysisStatus::Ready,
            ReadinessLevel::ReadyLimited => AnalysisStatus::ReadyWithWarnings,
            ReadinessLevel::Blocked => AnalysisStatus::Blocked,
        }
    }

    /// Whether moving from `self` to `next` is legal given the extraction state
    pub fn can_transition_to(&self, next: AnalysisStatus, extraction: ExtractionStatus) -> bool {
        use AnalysisStatus::*;

        // Nothing leaves the initial state until extraction has completed
        if next != None && extraction != ExtractionStatus::Completed {
            return false;
        }

        match (self, next) {
            (Processing, Processing) => false,
            (None, Processing) => false,
            (_, Processing) => true,
            (Processing, Completed) | (Processing, Failed) => true,
            (_, Completed) | (_, Failed) => false,
            (Processing, _) => false,
            (_, None) | (_, Blocked) | (_, Ready) | (_, ReadyWithWarnings) => true,
        }
    }

    /// States from which `next` may be entered once extraction has completed
    pub fn predecessors(next: AnalysisStatus) -> Vec<AnalysisStatus> {
        ALL_ANALYSIS
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(next, ExtractionStatus::Completed))
            .collect()
    }
}

const ALL_ANALYSIS: [AnalysisStatus; 7] = [
    AnalysisStatus::None,
    AnalysisStatus::Blocked,
    AnalysisStatus::Ready,
    AnalysisStatus::ReadyWithWarnings,
    AnalysisStatus::Processing,
    AnalysisStatus::Completed,
    AnalysisStatus::Failed,
];

impl std::str::FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid analysis status: {}", s))
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
