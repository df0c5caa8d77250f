//! azc-fixer entry point.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;

use azc_fixer::adapters::foundry::FoundryAgentsClient;
use azc_fixer::adapters::typespec::TypeSpecToolchain;
use azc_fixer::cli::{Cli, INTERRUPTED_EXIT_CODE, exit_code, render_outcome, watch_interrupts};
use azc_fixer::infrastructure::logging::LoggerImpl;
use azc_fixer::infrastructure::workspace::Workspace;
use azc_fixer::services::prompt_composer::worker_instructions;
use azc_fixer::services::{DispatcherConfig, FixerRegistry};
use azc_fixer::{
    ConfigLoader, ConvergenceController, ConvergenceSettings, RemoteWorkDispatcher, RunOutcome,
};

#[tokio::main]
async fn main() -> ExitCode {
    let _cli = Cli::parse();

    match run().await {
        Ok(outcome) => {
            println!("{}", render_outcome(&outcome));
            ExitCode::from(exit_code(&outcome))
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "run failed");
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<RunOutcome> {
    let config = ConfigLoader::load()?;
    let _logger = LoggerImpl::init(&config.logging)?;

    let client = Arc::new(FoundryAgentsClient::new(&config.worker)?);
    let dispatcher = RemoteWorkDispatcher::new(
        client,
        DispatcherConfig::from(&config.worker),
        worker_instructions(),
    );
    let toolchain = Arc::new(TypeSpecToolchain::new(&config.workspace, &config.toolchain));
    let controller = ConvergenceController::new(
        toolchain,
        dispatcher,
        FixerRegistry::builtin(),
        Workspace::new(&config.workspace),
        ConvergenceSettings::from(&config),
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if watch_interrupts(cancel, tokio::signal::ctrl_c).await {
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        }
    });

    Ok(controller.run(&cancel).await?)
}
