//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tallyman_extractor::ExtractorConfig;
use tallyman_gatekeeper::GateConfig;
use tallyman_pipeline::PipelineConfig;

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Document store location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Where document handles are resolved
    #[serde(default)]
    pub source: SourceConfig,

    /// Extraction providers
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Analysis engine
    #[serde(default)]
    pub engine: EngineConfig,

    /// Provider orchestration thresholds
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Readiness rules
    #[serde(default)]
    pub gate: GateConfig,

    /// Analysis timeout and worker cadence
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// Document store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

/// Document source root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory that document handles are relative to
    #[serde(default = "default_source_root")]
    pub root: PathBuf,
}

/// Primary and optional secondary extraction provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Provider tried first
    #[serde(default = "default_primary")]
    pub primary: ProviderEndpoint,

    /// Provider tried when the primary output is weak
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ProviderEndpoint>,
}

/// A layout-analysis HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    /// Identity tag recorded with each extraction
    pub name: String,

    /// Endpoint URL
    pub endpoint: String,

    /// Optional API key sent with each request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Which analysis engine to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Local Ollama server
    Ollama,
    /// Canned engine that reports no opportunities
    Mock,
}

/// Analysis engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine implementation
    #[serde(default = "default_engine_kind")]
    pub kind: EngineKind,

    /// Engine endpoint
    #[serde(default = "default_engine_endpoint")]
    pub endpoint: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// HTTP timeout for one engine request (seconds)
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl Config {
    /// Get the configuration directory.
    pub fn dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".tallyman"))
    }

    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        Ok(Self::dir()?.join("config.toml"))
    }

    /// Load configuration from the default path, or defaults if it is absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load configuration from `path`, or defaults if it is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.extractor
            .validate()
            .map_err(|e| CliError::Config(format!("[extractor] {}", e)))?;
        self.gate
            .validate()
            .map_err(|e| CliError::Config(format!("[gate] {}", e)))?;
        self.pipeline
            .validate()
            .map_err(|e| CliError::Config(format!("[pipeline] {}", e)))?;

        if self.providers.primary.endpoint.is_empty() {
            return Err(CliError::Config("[providers.primary] endpoint is empty".into()));
        }
        if let Some(fallback) = &self.providers.fallback {
            if fallback.name == self.providers.primary.name {
                return Err(CliError::Config(format!(
                    "[providers] fallback must not reuse the primary name '{}'",
                    fallback.name
                )));
            }
        }
        if self.engine.timeout_secs == 0 {
            return Err(CliError::Config("[engine] timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: default_source_root(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            fallback: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: default_engine_kind(),
            endpoint: default_engine_endpoint(),
            model: default_model(),
            timeout_secs: default_engine_timeout(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_database() -> PathBuf {
    Config::dir()
        .map(|dir| dir.join("tallyman.db"))
        .unwrap_or_else(|_| PathBuf::from("tallyman.db"))
}

fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_primary() -> ProviderEndpoint {
    ProviderEndpoint {
        name: "layout".to_string(),
        endpoint: "http://localhost:8081/v1/layout".to_string(),
        api_key: None,
    }
}

fn default_engine_kind() -> EngineKind {
    EngineKind::Ollama
}

fn default_engine_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.1".to_string()
}

fn default_engine_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}
