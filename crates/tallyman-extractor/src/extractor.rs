//! Core Extractor implementation

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::fallback::FallbackPolicy;
use crate::quality::{QualityEvaluator, QualitySignal};
use crate::types::{ExtractionRun, ExtractionSource};
use std::sync::Arc;
use tallyman_domain::traits::ExtractionProvider;
use tallyman_domain::{ProviderError, RawExtraction};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// The Extractor runs a document through the primary provider and, when the
/// output is poor or the call fails, through the secondary provider
pub struct Extractor {
    primary: Arc<dyn ExtractionProvider>,
    fallback: Option<Arc<dyn ExtractionProvider>>,
    evaluator: QualityEvaluator,
    policy: FallbackPolicy,
    config: ExtractorConfig,
}

impl Extractor {
    /// Create a new Extractor
    ///
    /// Passing `None` for `fallback` means low-quality primary output is kept
    /// with its quality problems recorded as warnings.
    pub fn new(
        primary: Arc<dyn ExtractionProvider>,
        fallback: Option<Arc<dyn ExtractionProvider>>,
        config: ExtractorConfig,
    ) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;

        Ok(Self {
            primary,
            fallback,
            evaluator: QualityEvaluator::new(config.top_code_terms),
            policy: FallbackPolicy::new(&config),
            config,
        })
    }

    /// Whether a secondary provider is configured
    pub fn fallback_configured(&self) -> bool {
        self.fallback.is_some()
    }

    /// Get the configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract a document
    pub async fn extract(&self, document: &[u8]) -> Result<ExtractionRun, ExtractorError> {
        info!(
            "Starting extraction of {} bytes with '{}' (fallback configured: {})",
            document.len(),
            self.primary.name(),
            self.fallback_configured()
        );

        match self.call(self.primary.as_ref(), document).await {
            Ok(raw) => self.after_primary(raw, document).await,
            Err(primary_err) => self.after_primary_failure(primary_err, document).await,
        }
    }

    /// Primary failed outright: any secondary output is used as-is
    async fn after_primary_failure(
        &self,
        primary_err: ProviderError,
        document: &[u8],
    ) -> Result<ExtractionRun, ExtractorError> {
        warn!("Primary provider failed: {}", primary_err);

        let Some(fallback) = &self.fallback else {
            return Err(ExtractorError::Provider(primary_err));
        };

        match self.call(fallback.as_ref(), document).await {
            Ok(raw) => {
                info!("Fallback provider '{}' used after primary failure", fallback.name());
                let quality = self.evaluator.evaluate(&raw);
                Ok(ExtractionRun {
                    provider_name: fallback.name().to_string(),
                    raw,
                    quality,
                    source: ExtractionSource::Fallback,
                    fallback_triggered: true,
                    acceptance: None,
                    warnings: vec![format!("primary {}", primary_err)],
                })
            }
            Err(fallback_err) => {
                warn!("Fallback provider failed: {}", fallback_err);
                Err(ExtractorError::AllProvidersFailed {
                    primary: primary_err,
                    fallback: fallback_err,
                })
            }
        }
    }

    /// Primary succeeded: score it and decide whether to try the secondary
    async fn after_primary(
        &self,
        raw: RawExtraction,
        document: &[u8],
    ) -> Result<ExtractionRun, ExtractorError> {
        let quality = self.evaluator.evaluate(&raw);
        debug!(
            "Primary quality: {} pages, {} tables, {} chars",
            quality.pages, quality.tables, quality.text_length
        );

        let reasons = self.policy.should_fallback(&quality);
        if reasons.is_empty() {
            return Ok(self.primary_run(raw, quality, false, Vec::new()));
        }

        let Some(fallback) = &self.fallback else {
            info!(
                "Primary output is low quality but no fallback is configured: {}",
                reasons.join("; ")
            );
            return Ok(self.primary_run(raw, quality, false, reasons));
        };

        info!("Fallback triggered: {}", reasons.join("; "));

        let secondary = match self.call(fallback.as_ref(), document).await {
            Ok(secondary) => secondary,
            Err(e) => {
                warn!("Fallback provider failed, keeping primary output: {}", e);
                let mut warnings = reasons;
                warnings.push(format!("fallback {}", e));
                return Ok(self.primary_run(raw, quality, true, warnings));
            }
        };

        let secondary_quality = self.evaluator.evaluate(&secondary);
        let decision = self.policy.should_accept(&quality, &secondary_quality);

        if decision.accepted {
            info!(
                "Fallback accepted: '{}' replaces '{}'",
                fallback.name(),
                self.primary.name()
            );
            Ok(ExtractionRun {
                provider_name: fallback.name().to_string(),
                raw: secondary,
                quality: secondary_quality,
                source: ExtractionSource::Fallback,
                fallback_triggered: true,
                warnings: vec![format!(
                    "primary output replaced by fallback: {}",
                    reasons.join("; ")
                )],
                acceptance: Some(decision),
            })
        } else {
            info!("Fallback rejected: {}", decision.reasons.join("; "));
            let mut warnings = reasons;
            warnings.extend(
                decision
                    .reasons
                    .iter()
                    .map(|r| format!("fallback rejected: {}", r)),
            );
            let mut run = self.primary_run(raw, quality, true, warnings);
            run.acceptance = Some(decision);
            Ok(run)
        }
    }

    fn primary_run(
        &self,
        raw: RawExtraction,
        quality: QualitySignal,
        fallback_triggered: bool,
        warnings: Vec<String>,
    ) -> ExtractionRun {
        ExtractionRun {
            provider_name: self.primary.name().to_string(),
            raw,
            quality,
            source: ExtractionSource::Primary,
            fallback_triggered,
            acceptance: None,
            warnings,
        }
    }

    /// Call a provider under the configured timeout
    async fn call(
        &self,
        provider: &dyn ExtractionProvider,
        document: &[u8],
    ) -> Result<RawExtraction, ProviderError> {
        let limit = self.config.provider_timeout();
        let raw = timeout(limit, provider.extract(document, limit))
            .await
            .map_err(|_| ProviderError::timeout(provider.name(), limit.as_secs()))??;
        Ok(raw.with_provider(provider.name()))
    }
}
