//! Command implementations.

pub mod analyze;
pub mod extract;
pub mod history;
pub mod init;
pub mod intake;
pub mod reset;
pub mod status;
pub mod worker;

pub use self::analyze::execute_analyze;
pub use self::extract::execute_extract;
pub use self::history::execute_history;
pub use self::init::execute_init;
pub use self::intake::execute_intake;
pub use self::reset::execute_reset;
pub use self::status::execute_status;
pub use self::worker::execute_worker;

use crate::error::{CliError, Result};
use tallyman_domain::DocumentId;

/// Parse a document ID argument.
pub(crate) fn parse_id(s: &str) -> Result<DocumentId> {
    DocumentId::from_string(s.trim()).map_err(CliError::InvalidInput)
}
