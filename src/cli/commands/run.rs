//! Interactive session command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::domain::models::{
    Config, ExecutionReport, SessionOutcome, MANUAL_INTERVENTION_MARKER,
};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::hints;
use crate::infrastructure::reasoning::AnthropicClient;
use crate::services::{PhaseController, StepOutcome};

/// Arguments for `hepcode run`.
#[derive(Args)]
pub struct RunArgs {
    /// Load configuration from this file instead of the default hierarchy.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Run an interactive session to completion.
pub async fn execute(args: RunArgs, json: bool) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let api_key = std::env::var(&config.reasoning.api_key_env).with_context(|| {
        format!(
            "reasoning API key not found in ${}",
            config.reasoning.api_key_env
        )
    })?;

    let client = AnthropicClient::from_config(&config.reasoning, &config.retry, api_key)?;
    let corpus = hints::load(&config.hints);
    let mut controller = PhaseController::new(&config, Arc::new(client), corpus);

    // Ctrl-C aborts the session, interrupting an in-flight sandbox run.
    let cancel = controller.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    println!(
        "{}",
        style("hepcode ready. Describe the analysis you need; type 'exit' to quit.").bold()
    );

    use std::io::Write as _;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        match controller.converse(input).await? {
            StepOutcome::AwaitingUser { reply } => {
                println!("\n{reply}\n");
            }
            StepOutcome::PlanningComplete { reply } => {
                println!("\n{reply}\n");
                println!("{}", style("Generating and testing code...").dim());
                let outcome = controller.drive().await?;
                print_outcome(&outcome, json);
                break;
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

fn print_outcome(outcome: &SessionOutcome, json: bool) {
    if json {
        match serde_json::to_string_pretty(outcome) {
            Ok(payload) => println!("{payload}"),
            Err(err) => eprintln!("could not serialize outcome: {err}"),
        }
        return;
    }

    match outcome {
        SessionOutcome::Delivered { code, test } => {
            println!("{}", style("Analysis code delivered.").green().bold());
            print_test_summary(test);
            println!("\n{code}");
        }
        SessionOutcome::ManualInterventionRequired {
            last_test,
            iterations,
            ..
        } => {
            println!(
                "{} - the session needs manual follow-up",
                style(MANUAL_INTERVENTION_MARKER).red().bold(),
            );
            println!("Testing iterations spent: {iterations}");
            if let Some(test) = last_test {
                print_test_summary(test);
                if !test.stderr.is_empty() {
                    println!("\nLast stderr:\n{}", test.stderr);
                }
            }
        }
    }
}

fn print_test_summary(test: &ExecutionReport) {
    println!(
        "Last run: {:?} in {} ms{}",
        test.outcome,
        test.duration_ms,
        if test.truncated {
            " (output truncated)"
        } else {
            ""
        }
    );
}
