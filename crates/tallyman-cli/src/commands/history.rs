//! History command implementation.

use crate::cli::DocumentArgs;
use crate::commands::parse_id;
use crate::error::Result;
use crate::output::Formatter;
use std::fmt::Display;
use tallyman_domain::traits::DocumentStore;
use tallyman_pipeline::PipelineController;

/// Execute the history command.
pub async fn execute_history<S>(
    args: DocumentArgs,
    controller: &PipelineController<S>,
    formatter: &Formatter,
) -> Result<()>
where
    S: DocumentStore + Send,
    S::Error: Display,
{
    let analyses = controller.history(parse_id(&args.id)?)?;
    println!("{}", formatter.format_history(&analyses)?);
    Ok(())
}
