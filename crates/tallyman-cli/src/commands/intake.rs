//! Intake command implementation.

use crate::cli::IntakeArgs;
use crate::error::Result;
use crate::output::Formatter;
use std::fmt::Display;
use tallyman_domain::traits::DocumentStore;
use tallyman_pipeline::PipelineController;

/// Execute the intake command.
pub async fn execute_intake<S>(
    args: IntakeArgs,
    controller: &PipelineController<S>,
    formatter: &Formatter,
) -> Result<()>
where
    S: DocumentStore + Send,
    S::Error: Display,
{
    let document = controller.intake(
        args.entity_id,
        args.entity_name,
        args.period_end,
        args.handle,
    )?;

    if args.extract {
        let outcome = controller.extract(document.id).await?;
        println!("{}", formatter.format_extraction(&outcome)?);
        return Ok(());
    }

    println!("{}", formatter.format_document(&document)?);
    Ok(())
}
