//! CLI command definitions and argument parsing.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tallyman_domain::ExtractionStatus;

/// Tallyman - Drive financial filings through extraction and analysis.
#[derive(Debug, Parser)]
#[command(name = "tallyman")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "TALLYMAN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (IDs only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register a filing as a pending document
    Intake(IntakeArgs),

    /// Run extraction for a pending or failed document
    Extract(ExtractArgs),

    /// Analyze an extracted document
    Analyze(AnalyzeArgs),

    /// Show one document or list documents
    Status(StatusArgs),

    /// List analyses computed for a document, newest first
    History(DocumentArgs),

    /// Send a document back to pending for re-extraction
    Reset(DocumentArgs),

    /// Sweep pending documents on an interval
    Worker(WorkerArgs),

    /// Write the default configuration file
    Init(InitArgs),
}

/// Arguments for the intake command.
#[derive(Debug, Parser)]
pub struct IntakeArgs {
    /// Registry identifier of the filing entity
    pub entity_id: String,

    /// Entity display name
    pub entity_name: String,

    /// Period end date (YYYY-MM-DD)
    #[arg(value_parser = parse_period_end)]
    pub period_end: NaiveDate,

    /// Handle the document source resolves (path under the source root)
    pub handle: String,

    /// Extract immediately after registering
    #[arg(long)]
    pub extract: bool,
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Document ID
    pub id: String,

    /// Analyze after a successful extraction
    #[arg(long)]
    pub analyze: bool,
}

/// Arguments for the analyze command.
#[derive(Debug, Parser)]
pub struct AnalyzeArgs {
    /// Document ID
    pub id: String,

    /// Run even when the readiness gate blocks analysis
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the status command.
#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Document ID (omit to list documents)
    pub id: Option<String>,

    /// Filter by extraction status
    #[arg(short, long, value_parser = parse_extraction_status)]
    pub status: Option<ExtractionStatus>,

    /// Filter by entity identifier
    #[arg(short, long)]
    pub entity: Option<String>,

    /// Maximum number of results
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments naming a single document.
#[derive(Debug, Parser)]
pub struct DocumentArgs {
    /// Document ID
    pub id: String,
}

/// Arguments for the worker command.
#[derive(Debug, Parser)]
pub struct WorkerArgs {
    /// Stop after this many sweeps (runs until Ctrl+C otherwise)
    #[arg(long)]
    pub cycles: Option<usize>,

    /// Analyze each document that extracts without a block
    #[arg(long)]
    pub auto_analyze: bool,
}

/// Arguments for the init command.
#[derive(Debug, Parser)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

fn parse_period_end(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{}': {}", s, e))
}

fn parse_extraction_status(s: &str) -> Result<ExtractionStatus, String> {
    ExtractionStatus::parse(s)
        .ok_or_else(|| format!("unknown status '{}' (pending, processing, completed, failed)", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intake_command() {
        let cli = Cli::parse_from([
            "tallyman",
            "intake",
            "01234567",
            "Acme Ltd",
            "2024-03-31",
            "acme-2024.pdf",
        ]);
        match cli.command {
            Command::Intake(args) => {
                assert_eq!(args.entity_id, "01234567");
                assert_eq!(args.period_end, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
                assert!(!args.extract);
            }
            _ => panic!("Expected Intake command"),
        }
    }

    #[test]
    fn test_bad_period_end_rejected() {
        let result = Cli::try_parse_from([
            "tallyman",
            "intake",
            "01234567",
            "Acme Ltd",
            "31/03/2024",
            "acme-2024.pdf",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_analyze_force_flag() {
        let cli = Cli::parse_from(["tallyman", "analyze", "abc", "--force"]);
        match cli.command {
            Command::Analyze(args) => assert!(args.force),
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_status_filters() {
        let cli = Cli::parse_from([
            "tallyman", "status", "--status", "Failed", "--entity", "01234567", "-l", "5",
        ]);
        match cli.command {
            Command::Status(args) => {
                assert!(args.id.is_none());
                assert_eq!(args.status, Some(ExtractionStatus::Failed));
                assert_eq!(args.entity.as_deref(), Some("01234567"));
                assert_eq!(args.limit, Some(5));
            }
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(Cli::try_parse_from(["tallyman", "status", "--status", "done"]).is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["tallyman", "worker", "--cycles", "2", "--format", "json", "--no-color"]);
        assert!(matches!(cli.format, Some(CliFormat::Json)));
        assert!(cli.no_color);
        match cli.command {
            Command::Worker(args) => assert_eq!(args.cycles, Some(2)),
            _ => panic!("Expected Worker command"),
        }
    }
}
