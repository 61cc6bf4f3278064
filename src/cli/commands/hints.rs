//! Hint corpus inspection command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::style;

use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::hints;

/// Arguments for `hepcode hints`.
#[derive(Args)]
pub struct HintsArgs {
    /// Load configuration from this file instead of the default hierarchy.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Show what the hint corpus would contribute to generation prompts.
pub async fn execute(args: HintsArgs, json: bool) -> Result<()> {
    let config = match args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let corpus = hints::load(&config.hints);

    if json {
        let payload = serde_json::json!({
            "directory": config.hints.directory,
            "max_chars": config.hints.max_chars,
            "total_chars": corpus.total_chars(),
            "stopped_early": corpus.stopped_early,
            "files": corpus.manifest,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!(
        "Hint corpus: {} ({} chars of {} budget)",
        config.hints.directory.display(),
        corpus.total_chars(),
        config.hints.max_chars,
    );
    if corpus.manifest.is_empty() {
        println!("{}", style("no hint files loaded").dim());
        return Ok(());
    }
    for entry in &corpus.manifest {
        println!("  {:<40} {:?} ({} chars)", entry.file, entry.status, entry.chars);
    }
    if corpus.stopped_early {
        println!("{}", style("budget exhausted before all files were read").yellow());
    }
    Ok(())
}
