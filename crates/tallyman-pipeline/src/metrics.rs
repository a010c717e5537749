//! Metrics collection for pipeline operations

/// Counters collected while driving documents through the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineMetrics {
    /// Extractions that reached `completed`
    pub extractions_completed: usize,

    /// Extractions that ended in `failed`
    pub extractions_failed: usize,

    /// Extractions where the secondary provider was invoked
    pub fallbacks_triggered: usize,

    /// Extractions that kept the secondary provider's output
    pub fallbacks_accepted: usize,

    /// Analyses persisted
    pub analyses_completed: usize,

    /// Analyses that ended in `failed`
    pub analyses_failed: usize,

    /// Analyses refused on a `BLOCKED` record
    pub analyses_refused: usize,

    /// Analyses that ran with integrity drift warnings
    pub drift_warnings: usize,

    /// Worker sweep iterations completed
    pub sweep_count: usize,
}

impl PipelineMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Total extraction attempts that reached a terminal state
    pub fn total_extractions(&self) -> usize {
        self.extractions_completed + self.extractions_failed
    }

    /// Total analysis attempts, refusals included
    pub fn total_analyses(&self) -> usize {
        self.analyses_completed + self.analyses_failed + self.analyses_refused
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        [
            "Pipeline Metrics Summary".to_string(),
            "========================".to_string(),
            format!("Sweep cycles: {}", self.sweep_count),
            String::new(),
            format!(
                "Extractions: {} completed, {} failed",
                self.extractions_completed, self.extractions_failed
            ),
            format!(
                "Fallbacks: {} triggered, {} accepted",
                self.fallbacks_triggered, self.fallbacks_accepted
            ),
            format!(
                "Analyses: {} completed, {} failed, {} refused",
                self.analyses_completed, self.analyses_failed, self.analyses_refused
            ),
            format!("Drift warnings: {}", self.drift_warnings),
        ]
        .join("\n")
    }
}
