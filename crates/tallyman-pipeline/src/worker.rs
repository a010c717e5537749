//! Background worker for continuous extraction of pending documents

use crate::{AnalysisOutcome, PipelineController, PipelineError, PipelineMetrics};
use std::sync::Arc;
use tallyman_domain::traits::DocumentStore;
use tallyman_domain::ReadinessLevel;
use tokio::time::{interval, Duration};

/// Counts for one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pending documents picked up
    pub picked: usize,

    /// Extractions that completed
    pub extracted: usize,

    /// Extractions that failed or lost a status race
    pub failed: usize,

    /// Analyses persisted
    pub analyzed: usize,

    /// Analyses refused on `BLOCKED` records
    pub refused: usize,
}

/// Background worker that sweeps `pending` documents on a schedule
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tallyman_pipeline::{PipelineController, PipelineWorker};
/// # use tallyman_domain::traits::DocumentStore;
///
/// # async fn run<S>(controller: PipelineController<S>) -> Result<(), tallyman_pipeline::PipelineError>
/// # where S: DocumentStore + Send, S::Error: std::fmt::Display {
/// let worker = PipelineWorker::new(Arc::new(controller));
///
/// // Run indefinitely (until Ctrl+C)
/// worker.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct PipelineWorker<S> {
    controller: Arc<PipelineController<S>>,
    interval: Duration,
}

impl<S> PipelineWorker<S>
where
    S: DocumentStore + Send,
    S::Error: std::fmt::Display,
{
    /// Create a worker using the controller's configuration
    pub fn new(controller: Arc<PipelineController<S>>) -> Self {
        let interval = controller.config().worker_interval();
        Self {
            controller,
            interval,
        }
    }

    /// One pass over at most `batch_size` pending documents
    ///
    /// Per-document failures are logged and counted; only a failure to list
    /// pending documents is returned as an error.
    pub async fn sweep(&self) -> Result<SweepReport, PipelineError> {
        let config = self.controller.config();
        let pending = self.controller.pending(config.batch_size)?;
        let mut report = SweepReport {
            picked: pending.len(),
            ..SweepReport::default()
        };

        for document in pending {
            let outcome = match self.controller.extract(document.id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("Document {} not extracted: {}", document.id, e);
                    report.failed += 1;
                    continue;
                }
            };
            report.extracted += 1;

            if !config.auto_analyze || outcome.gate.level == ReadinessLevel::Blocked {
                continue;
            }
            match self.controller.analyze(document.id, false).await {
                Ok(AnalysisOutcome::Completed(_)) => report.analyzed += 1,
                Ok(AnalysisOutcome::Refused { .. }) => report.refused += 1,
                Err(e) => tracing::warn!("Document {} not analyzed: {}", document.id, e),
            }
        }

        self.controller.update_metrics(|m| m.sweep_count += 1);
        Ok(report)
    }

    /// Run the worker until a shutdown signal (Ctrl+C) is received
    pub async fn run(&self) -> Result<(), PipelineError> {
        let mut ticker = interval(self.interval);

        tracing::info!("Pipeline worker started (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::debug!("Starting sweep cycle");

                    match self.sweep().await {
                        Ok(report) => {
                            tracing::info!(
                                "Sweep completed: {} picked, {} extracted, {} failed, {} analyzed",
                                report.picked,
                                report.extracted,
                                report.failed,
                                report.analyzed
                            );
                        }
                        Err(e) => {
                            tracing::error!("Sweep failed: {}", e);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received, stopping worker");
                    break;
                }
            }
        }

        tracing::info!("Pipeline worker stopped. Final metrics:\n{}", self.metrics().summary());

        Ok(())
    }

    /// Run for a specific number of cycles (useful for testing)
    pub async fn run_cycles(&self, cycles: usize) -> Result<SweepReport, PipelineError> {
        let mut ticker = interval(self.interval);
        let mut total = SweepReport::default();

        tracing::info!(
            "Pipeline worker started for {} cycles (interval: {:?})",
            cycles,
            self.interval
        );

        for cycle in 0..cycles {
            ticker.tick().await;

            tracing::debug!("Starting sweep cycle {}/{}", cycle + 1, cycles);

            let report = self.sweep().await.inspect_err(|e| {
                tracing::error!("Sweep {}/{} failed: {}", cycle + 1, cycles, e);
            })?;
            total.picked += report.picked;
            total.extracted += report.extracted;
            total.failed += report.failed;
            total.analyzed += report.analyzed;
            total.refused += report.refused;
        }

        tracing::info!(
            "Pipeline worker finished {} cycles. Final metrics:\n{}",
            cycles,
            self.metrics().summary()
        );

        Ok(total)
    }

    /// Snapshot of the controller's metrics
    pub fn metrics(&self) -> PipelineMetrics {
        self.controller.metrics()
    }
}
