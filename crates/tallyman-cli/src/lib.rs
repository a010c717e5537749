//! Tallyman CLI library.
//!
//! Configuration loading, controller wiring, command execution and output
//! formatting for the `tallyman` binary.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use app::{build_controller, Controller};
pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{CliError, Result};
pub use output::Formatter;
