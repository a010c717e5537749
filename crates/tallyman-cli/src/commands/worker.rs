//! Worker command implementation.

use crate::cli::WorkerArgs;
use crate::error::Result;
use crate::output::Formatter;
use std::fmt::Display;
use std::sync::Arc;
use tallyman_domain::traits::DocumentStore;
use tallyman_pipeline::{PipelineController, PipelineWorker};

/// Execute the worker command.
///
/// Without `--cycles` this runs until Ctrl+C.
pub async fn execute_worker<S>(
    args: WorkerArgs,
    controller: Arc<PipelineController<S>>,
    formatter: &Formatter,
) -> Result<()>
where
    S: DocumentStore + Send,
    S::Error: Display,
{
    let worker = PipelineWorker::new(controller);

    match args.cycles {
        Some(cycles) => {
            let report = worker.run_cycles(cycles).await?;
            println!("{}", formatter.format_sweep(&report, &worker.metrics())?);
        }
        None => {
            println!("{}", formatter.info("Worker running; press Ctrl+C to stop"));
            worker.run().await?;
        }
    }

    Ok(())
}
