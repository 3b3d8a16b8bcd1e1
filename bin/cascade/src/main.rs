//! cascade deploys smart contract projects step by step from their yaml definitions.

mod cli;
mod commands;
mod settings;

use std::process::ExitCode;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use cli::{Cli, Command};
use settings::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize the logger.
    let level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{:#}", err), "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(&cli.config, &cli.overrides())?;
    tracing::debug!(
        rpchost = %settings.rpchost,
        projects = %settings.projects.display(),
        "Settings loaded"
    );

    let privkey = cli.privkey.as_deref();
    match &cli.command {
        Command::Deploy { project } => commands::run_deploy(&settings, privkey, project).await,
        Command::Sign { project } => commands::run_sign(&settings, privkey, project).await,
        Command::VerifyCodes { project, explorers } => {
            commands::run_verify_codes(&settings, project, explorers).await
        }
        Command::Status { project } => commands::run_status(&settings, project).await,
    }
}
