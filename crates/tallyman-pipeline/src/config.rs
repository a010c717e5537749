//! Configuration for pipeline orchestration
//!
//! Defines the analysis timeout and the background worker's sweep cadence.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default analysis engine timeout
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 180;

/// Default pause between worker sweeps
pub const DEFAULT_WORKER_INTERVAL_SECS: u64 = 60;

/// Default number of pending documents extracted per sweep
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Configuration for the pipeline controller and its worker
///
/// # Examples
///
/// ```
/// use tallyman_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.analysis_timeout_secs, 180);
///
/// let config = PipelineConfig::aggressive();
/// assert!(config.worker_interval_secs < PipelineConfig::default().worker_interval_secs);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Timeout for one analysis engine call (in seconds)
    pub analysis_timeout_secs: u64,

    /// How often the worker sweeps for pending documents (in seconds)
    pub worker_interval_secs: u64,

    /// Maximum number of pending documents handled per sweep
    pub batch_size: usize,

    /// Run analysis (without override) straight after a successful
    /// extraction in the worker
    #[serde(default)]
    pub auto_analyze: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analysis_timeout_secs: DEFAULT_ANALYSIS_TIMEOUT_SECS,
            worker_interval_secs: DEFAULT_WORKER_INTERVAL_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            auto_analyze: false,
        }
    }
}

impl PipelineConfig {
    /// Frequent sweeps over larger batches, analysis included
    pub fn aggressive() -> Self {
        Self {
            analysis_timeout_secs: DEFAULT_ANALYSIS_TIMEOUT_SECS,
            worker_interval_secs: 15,
            batch_size: 50,
            auto_analyze: true,
        }
    }

    /// Infrequent small sweeps with a generous analysis timeout
    pub fn lenient() -> Self {
        Self {
            analysis_timeout_secs: 600,
            worker_interval_secs: 300,
            batch_size: 5,
            auto_analyze: false,
        }
    }

    /// Get the analysis timeout as a Duration
    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }

    /// Get the worker interval as a Duration
    pub fn worker_interval(&self) -> Duration {
        Duration::from_secs(self.worker_interval_secs)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.analysis_timeout_secs == 0 {
            return Err("analysis_timeout_secs must be greater than 0".to_string());
        }
        if self.worker_interval_secs == 0 {
            return Err("worker_interval_secs must be greater than 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}
