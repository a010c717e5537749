//! Configuration for the Extractor
//!
//! The quality thresholds are business tuning constants, not derived values.
//! They are surfaced here so they can be adjusted without touching the
//! decision logic in [`crate::fallback`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default provider call timeout, sized for large multi-page documents
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 300;

/// Recognized characters per page below which output is considered sparse
pub const MIN_CHARS_PER_PAGE: usize = 200;

/// Share of the primary's pages a fallback must cover to be accepted
pub const PAGE_COVERAGE_RATIO: f64 = 0.8;

/// Share of the primary's text a fallback must cover (unless it finds more tables)
pub const TEXT_COVERAGE_RATIO: f64 = 0.6;

/// Number of most frequent numeric-code tokens kept on a quality signal
pub const DEFAULT_TOP_CODE_TERMS: usize = 10;

/// Configuration for the Extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Maximum time for a single provider call (seconds)
    pub provider_timeout_secs: u64,

    /// Minimum recognized characters per page before fallback is triggered
    pub min_chars_per_page: usize,

    /// Fallback must cover `ceil(primary.pages * ratio)` pages
    pub page_coverage_ratio: f64,

    /// Fallback must cover `ceil(primary.text_length * ratio)` characters
    pub text_coverage_ratio: f64,

    /// Numeric-code tokens reported on each quality signal
    pub top_code_terms: usize,
}

impl ExtractorConfig {
    /// Get the provider timeout as a Duration
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.provider_timeout_secs == 0 {
            return Err("provider_timeout_secs must be greater than 0".to_string());
        }
        if !(self.page_coverage_ratio > 0.0 && self.page_coverage_ratio <= 1.0) {
            return Err("page_coverage_ratio must be in (0.0, 1.0]".to_string());
        }
        if !(self.text_coverage_ratio > 0.0 && self.text_coverage_ratio <= 1.0) {
            return Err("text_coverage_ratio must be in (0.0, 1.0]".to_string());
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            min_chars_per_page: MIN_CHARS_PER_PAGE,
            page_coverage_ratio: PAGE_COVERAGE_RATIO,
            text_coverage_ratio: TEXT_COVERAGE_RATIO,
            top_code_terms: DEFAULT_TOP_CODE_TERMS,
        }
    }
}

impl ExtractorConfig {
    /// Strict preset: falls back sooner and demands fuller fallback coverage
    pub fn strict() -> Self {
        Self {
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            min_chars_per_page: 400,
            page_coverage_ratio: 0.9,
            text_coverage_ratio: 0.8,
            top_code_terms: DEFAULT_TOP_CODE_TERMS,
        }
    }

    /// Lenient preset: tolerates sparse output and partial fallback coverage
    pub fn lenient() -> Self {
        Self {
            provider_timeout_secs: 600,
            min_chars_per_page: 100,
            page_coverage_ratio: 0.6,
            text_coverage_ratio: 0.4,
            top_code_terms: 20,
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
