//! Tallyman CLI - Drive financial filings through extraction and analysis.

use clap::Parser;
use std::sync::Arc;
use tallyman_cli::commands;
use tallyman_cli::config::OutputFormat;
use tallyman_cli::{build_controller, Cli, Command, Config, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> tallyman_cli::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so table and JSON output stay clean on stdout
    let default_level = if matches!(cli.command, Command::Worker(_)) { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::path()?,
    };

    let command = match cli.command {
        Command::Init(args) => {
            let format: OutputFormat = cli.format.map(Into::into).unwrap_or_default();
            let formatter = Formatter::new(format, !cli.no_color);
            return commands::execute_init(args, &config_path, &formatter);
        }
        command => command,
    };

    let mut config = Config::load_from(&config_path)?;

    // Determine output format
    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);

    // Determine color setting
    let color_enabled = !cli.no_color && config.settings.color;

    let formatter = Formatter::new(format, color_enabled);

    if let Command::Worker(args) = &command {
        if args.auto_analyze {
            config.pipeline.auto_analyze = true;
        }
    }

    let controller = build_controller(&config)?;

    match command {
        Command::Intake(args) => commands::execute_intake(args, &controller, &formatter).await?,
        Command::Extract(args) => commands::execute_extract(args, &controller, &formatter).await?,
        Command::Analyze(args) => commands::execute_analyze(args, &controller, &formatter).await?,
        Command::Status(args) => commands::execute_status(args, &controller, &formatter).await?,
        Command::History(args) => commands::execute_history(args, &controller, &formatter).await?,
        Command::Reset(args) => commands::execute_reset(args, &controller, &formatter).await?,
        Command::Worker(args) => {
            commands::execute_worker(args, Arc::new(controller), &formatter).await?
        }
        Command::Init(_) => unreachable!("handled before the config is loaded"),
    }

    Ok(())
}
