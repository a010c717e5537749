//! Extract command implementation.

use crate::cli::ExtractArgs;
use crate::commands::parse_id;
use crate::error::Result;
use crate::output::Formatter;
use std::fmt::Display;
use tallyman_domain::traits::DocumentStore;
use tallyman_pipeline::PipelineController;

/// Execute the extract command.
pub async fn execute_extract<S>(
    args: ExtractArgs,
    controller: &PipelineController<S>,
    formatter: &Formatter,
) -> Result<()>
where
    S: DocumentStore + Send,
    S::Error: Display,
{
    let id = parse_id(&args.id)?;
    let outcome = controller.extract(id).await?;
    println!("{}", formatter.format_extraction(&outcome)?);

    if args.analyze {
        let analysis = controller.analyze(id, false).await?;
        println!("{}", formatter.format_analysis(&analysis)?);
    }

    Ok(())
}
