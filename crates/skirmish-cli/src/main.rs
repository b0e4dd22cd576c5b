mod agents;
mod commands;
mod config;
mod logging;

use clap::Parser;

use crate::config::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_file)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async {
        match &cli.command {
            Command::Schedule(args) => commands::schedule(&cli, args).await,
            Command::Run(args) => commands::run(&cli, args).await,
            Command::Report(args) => commands::report(&cli, args).await,
            Command::PickConfig(args) => commands::pick_config(&cli, args).await,
        }
    });
    if let Err(e) = &result {
        tracing::error!("command failed: {e:#}");
    }
    result
}
