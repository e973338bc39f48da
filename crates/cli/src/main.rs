//! draftsmith CLI entry point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod args;
mod commands;
mod config;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.as_deref().unwrap_or("info");
    init_logging(log_level)?;

    match cli.command {
        Commands::Capture(args) => commands::capture::execute(args, cli.config).await,
        Commands::Draft(args) => commands::draft::execute(args, cli.config).await,
        Commands::Queue(args) => commands::queue::execute(args, cli.config).await,
        Commands::Approve(args) => commands::queue::approve(args, cli.config).await,
        Commands::Publish(args) => commands::publish::execute(args, cli.config).await,
        Commands::Schedule(args) => commands::queue::schedule(args, cli.config).await,
        Commands::RunDue => commands::publish::run_due(cli.config).await,
        Commands::Undo(args) => commands::queue::undo(args, cli.config).await,
        Commands::Redraft(args) => commands::draft::redraft(args, cli.config).await,
        Commands::Edit(args) => commands::draft::edit(args, cli.config).await,
        Commands::DryRun(args) => commands::publish::dry_run(args, cli.config).await,
        Commands::Routing(args) => commands::routing::execute(args, cli.config).await,
        Commands::Status => commands::routing::status(cli.config).await,
        Commands::Config(args) => commands::config::execute(args).await,
        Commands::Doctor(args) => commands::doctor::execute(args, cli.config).await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}
