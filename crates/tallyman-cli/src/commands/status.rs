//! Status command implementation.

use crate::cli::StatusArgs;
use crate::commands::parse_id;
use crate::error::Result;
use crate::output::Formatter;
use std::fmt::Display;
use tallyman_domain::traits::{DocumentQuery, DocumentStore};
use tallyman_pipeline::PipelineController;

/// Execute the status command.
pub async fn execute_status<S>(
    args: StatusArgs,
    controller: &PipelineController<S>,
    formatter: &Formatter,
) -> Result<()>
where
    S: DocumentStore + Send,
    S::Error: Display,
{
    if let Some(id) = args.id {
        let document = controller.document(parse_id(&id)?)?;
        println!("{}", formatter.format_document(&document)?);
        return Ok(());
    }

    let query = DocumentQuery {
        extraction_status: args.status,
        entity_id: args.entity,
        limit: args.limit,
    };
    let documents = controller.documents(&query)?;
    println!("{}", formatter.format_documents(&documents)?);
    Ok(())
}
