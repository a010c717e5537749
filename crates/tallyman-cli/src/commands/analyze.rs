//! Analyze command implementation.

use crate::cli::AnalyzeArgs;
use crate::commands::parse_id;
use crate::error::Result;
use crate::output::Formatter;
use std::fmt::Display;
use tallyman_domain::traits::DocumentStore;
use tallyman_pipeline::PipelineController;

/// Execute the analyze command.
///
/// A refusal is reported, not returned as an error: the document is parked
/// in `blocked` and nothing failed.
pub async fn execute_analyze<S>(
    args: AnalyzeArgs,
    controller: &PipelineController<S>,
    formatter: &Formatter,
) -> Result<()>
where
    S: DocumentStore + Send,
    S::Error: Display,
{
    let id = parse_id(&args.id)?;
    if args.force {
        tracing::warn!("Analysis of {} forced past the readiness gate", id);
    }

    let outcome = controller.analyze(id, args.force).await?;
    println!("{}", formatter.format_analysis(&outcome)?);
    Ok(())
}
