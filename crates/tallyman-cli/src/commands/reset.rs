//! Reset command implementation.

use crate::cli::DocumentArgs;
use crate::commands::parse_id;
use crate::error::Result;
use crate::output::Formatter;
use std::fmt::Display;
use tallyman_domain::traits::DocumentStore;
use tallyman_pipeline::PipelineController;

/// Execute the reset command.
pub async fn execute_reset<S>(
    args: DocumentArgs,
    controller: &PipelineController<S>,
    formatter: &Formatter,
) -> Result<()>
where
    S: DocumentStore + Send,
    S::Error: Display,
{
    let id = parse_id(&args.id)?;
    controller.reset(id)?;
    println!("{}", formatter.success(&format!("Document {} reset to pending", id)));
    Ok(())
}
