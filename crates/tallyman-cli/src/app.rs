//! Wiring from configuration to a running pipeline controller.

use crate::config::{Config, EngineKind, ProviderEndpoint};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tallyman_domain::traits::{AnalysisEngine, DocumentSource, ExtractionProvider};
use tallyman_extractor::{Extractor, LineItemParser};
use tallyman_gatekeeper::ReadinessGate;
use tallyman_pipeline::PipelineController;
use tallyman_providers::{FsDocumentSource, HttpLayoutProvider, MockAnalysisEngine, OllamaEngine};
use tallyman_store::SqliteStore;

/// Controller over the SQLite store, as the binary runs it.
pub type Controller = PipelineController<SqliteStore>;

/// Build a controller from configuration.
pub fn build_controller(config: &Config) -> Result<Controller> {
    if let Some(parent) = config.storage.database.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = SqliteStore::new(&config.storage.database)?;
    tracing::debug!("Opened store at {}", config.storage.database.display());

    let source: Arc<dyn DocumentSource> =
        Arc::new(FsDocumentSource::new(config.source.root.clone()));

    let primary = provider(&config.providers.primary);
    let fallback = config.providers.fallback.as_ref().map(provider);
    let extractor = Extractor::new(primary, fallback, config.extractor.clone())?;

    let gate = ReadinessGate::new(config.gate.clone())?;
    let engine = engine(config);

    Ok(PipelineController::new(
        store,
        source,
        extractor,
        Arc::new(LineItemParser::new()),
        gate,
        engine,
        config.pipeline.clone(),
    )?)
}

fn provider(endpoint: &ProviderEndpoint) -> Arc<dyn ExtractionProvider> {
    let mut provider = HttpLayoutProvider::new(endpoint.name.clone(), endpoint.endpoint.clone());
    if let Some(key) = &endpoint.api_key {
        provider = provider.with_api_key(key.clone());
    }
    Arc::new(provider)
}

fn engine(config: &Config) -> Arc<dyn AnalysisEngine> {
    match config.engine.kind {
        EngineKind::Ollama => Arc::new(
            OllamaEngine::new(config.engine.endpoint.clone(), config.engine.model.clone())
                .with_timeout(Duration::from_secs(config.engine.timeout_secs)),
        ),
        EngineKind::Mock => Arc::new(MockAnalysisEngine::default()),
    }
}
