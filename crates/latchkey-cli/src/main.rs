//! Main entry point for the `latchkey` command line client.

use std::process::ExitCode;

use clap::Parser;
use latchkey_cli::{
    command,
    model::config::{Cli, Settings},
    startup,
};
use latchkey_core::LockClient;
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;

    let _logging_guard = startup::init_logging(&settings.logging_config())
        .map_err(|e| anyhow::anyhow!(e))?;
    latchkey_core::metrics::describe_metrics();

    let store = startup::build_store(&settings).await?;
    let client = LockClient::with_config(store, settings.lock.clone())?;

    debug!(command = ?cli.command, "Running command");
    command::run(&client, cli.command).await
}
