//! Command-line interface.

pub mod commands;

use clap::{Parser, Subcommand};

/// hepcode - phase-driven analysis-code generation assistant.
#[derive(Parser)]
#[command(name = "hepcode", version, about)]
pub struct Cli {
    /// Emit machine-readable JSON instead of human output.
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run an interactive code-generation session.
    Run(commands::run::RunArgs),

    /// Inspect the hint corpus and its loading manifest.
    Hints(commands::hints::HintsArgs),
}

/// Print a fatal error and exit non-zero.
pub fn handle_error(err: anyhow::Error, json: bool) {
    if json {
        let payload = serde_json::json!({ "error": format!("{err:#}") });
        eprintln!("{payload}");
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}
