//! CLI entry point for the filebox server.

use std::process::ExitCode;

use anyhow::Context;

use filebox::cli::Cli;
use filebox::manager::FileboxManager;
use filebox::utils::init_debug_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_debug_logging(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.load_settings().context("loading settings")?;

    let manager = FileboxManager::new();
    manager
        .initialize(config)
        .await
        .context("starting file manager")?;

    if let Some(addr) = manager.local_addr() {
        println!("Filebox listening on http://{}", addr);
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    tracing::info!("Shutting down");
    manager.reset();

    Ok(())
}
