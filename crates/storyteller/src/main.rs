//! Storyteller CLI binary.
//!
//! - Generate an illustrated story from a prompt or an interactive idea
//! - List stories already written to the output directory

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use storyteller::cli::{
    Cli, Commands, generate_story, init_tracing, list_command, render_outcome,
};
use storyteller::{
    ConfigOverrides, OpenAiClient, PromptValidator, StoryConfig, StorytellerResult,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_level.as_deref(), cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Storyteller failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> StorytellerResult<()> {
    match &cli.command {
        Some(Commands::Version) => {
            println!("storyteller {}", env!("CARGO_PKG_VERSION"));
            println!("{}", env!("CARGO_PKG_DESCRIPTION"));
            Ok(())
        }

        Some(Commands::List { output }) => {
            let config = StoryConfig::load_with(&ConfigOverrides {
                output_dir: output.clone().or_else(|| cli.output.clone()),
                ..Default::default()
            })?;
            list_command(config.output_dir()).await
        }

        None => {
            let config = StoryConfig::load_with(&cli.overrides())?;
            let client =
                OpenAiClient::from_env(config.api_base_url().clone(), config.request_timeout())?;

            let idea = match &cli.prompt {
                Some(prompt) => prompt.clone(),
                None => PromptValidator::new()?
                    .prompt_interactive(std::io::stdin().lock(), std::io::stdout())?
                    .text()
                    .to_string(),
            };

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling the run");
                    interrupt.cancel();
                }
            });

            let outcome = generate_story(config, Arc::new(client), &idea, cancel).await?;
            println!("{}", render_outcome(&outcome));
            Ok(())
        }
    }
}
