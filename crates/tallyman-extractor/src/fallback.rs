//! Fallback decisions between primary and secondary providers
//!
//! Two questions are answered here, both from [`QualitySignal`]s alone:
//!
//! 1. Is the primary output poor enough to try the secondary provider?
//! 2. Is the secondary output good enough to replace the primary?
//!
//! The second check guards against a fallback that "fixes" one symptom by
//! losing most of the document.

use crate::config::ExtractorConfig;
use crate::quality::QualitySignal;
use serde::{Deserialize, Serialize};

/// Result of the should-accept-fallback check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceDecision {
    /// Whether the secondary output replaces the primary
    pub accepted: bool,

    /// Pages the secondary had to cover
    pub min_page_coverage: usize,

    /// Characters the secondary had to cover (unless it found more tables)
    pub min_text_coverage: usize,

    /// Rejection reasons, empty when accepted
    pub reasons: Vec<String>,
}

/// Threshold-driven fallback policy
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    min_chars_per_page: usize,
    page_coverage_ratio: f64,
    text_coverage_ratio: f64,
}

/// `ceil(count * ratio)`, with 1 as the floor for an empty baseline
///
/// The small epsilon keeps products like `10 * 0.6 = 6.000000000000001`
/// from rounding up to 7.
fn coverage(count: usize, ratio: f64) -> usize {
    if count == 0 {
        return 1;
    }
    ((count as f64 * ratio) - 1e-9).ceil().max(0.0) as usize
}

impl FallbackPolicy {
    /// Build a policy from extractor configuration
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            min_chars_per_page: config.min_chars_per_page,
            page_coverage_ratio: config.page_coverage_ratio,
            text_coverage_ratio: config.text_coverage_ratio,
        }
    }

    /// Reasons the primary output should be replaced, empty if it is adequate
    pub fn should_fallback(&self, primary: &QualitySignal) -> Vec<String> {
        let mut reasons = Vec::new();

        if primary.pages == 0 {
            reasons.push("0 pages detected".to_string());
        }
        if primary.tables == 0 {
            reasons.push("0 tables detected".to_string());
        }
        if let Some(density) = primary.chars_per_page() {
            if density < self.min_chars_per_page as f64 {
                reasons.push(format!(
                    "low text density: {} chars/page (min {})",
                    density.floor() as usize,
                    self.min_chars_per_page
                ));
            }
        }

        reasons
    }

    /// Decide whether the secondary output replaces the primary
    pub fn should_accept(
        &self,
        primary: &QualitySignal,
        secondary: &QualitySignal,
    ) -> AcceptanceDecision {
        let min_page_coverage = coverage(primary.pages, self.page_coverage_ratio);
        let min_text_coverage = coverage(primary.text_length, self.text_coverage_ratio);

        let mut reasons = Vec::new();

        if secondary.pages < min_page_coverage {
            reasons.push(format!(
                "fallback covers {} pages, needs at least {}",
                secondary.pages, min_page_coverage
            ));
        }

        let text_ok = secondary.text_length >= min_text_coverage;
        let more_tables = secondary.tables > primary.tables;
        if !text_ok && !more_tables {
            reasons.push(format!(
                "fallback recognized {} chars, needs at least {} (or more than {} tables)",
                secondary.text_length, min_text_coverage, primary.tables
            ));
        }

        AcceptanceDecision {
            accepted: reasons.is_empty(),
            min_page_coverage,
            min_text_coverage,
            reasons,
        }
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new(&ExtractorConfig::default())
    }
}
