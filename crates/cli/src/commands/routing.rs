//! Routing and status commands

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

use crate::args::{RoutingArgs, RoutingCommands};
use crate::commands::build_app;
use crate::config::AppConfig;
use draftsmith_domain::{RouteSpec, Stage};

pub async fn execute(args: RoutingArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = build_app(config).await?;

    match args.command {
        RoutingCommands::Show => {
            let table = app.pipeline.router().table();
            for (stage, candidates) in table.stages() {
                let routes: Vec<String> = candidates.iter().map(RouteSpec::to_string).collect();
                println!("{}: {}", stage, routes.join(", "));
            }
            Ok(())
        }
        RoutingCommands::Set { stage, routes } => {
            let stage = Stage::from_str(&stage)
                .map_err(|e| anyhow::anyhow!(e))
                .context("Invalid stage")?;

            let mut candidates = Vec::with_capacity(routes.len());
            for route in &routes {
                let spec = RouteSpec::parse(route)
                    .map_err(|e| anyhow::anyhow!(e))
                    .context("Invalid route")?;
                candidates.push(spec);
            }

            app.pipeline
                .set_routing(stage, candidates)
                .await
                .context("Failed to update routing")?;

            println!("Routing for {} set to {}", stage, routes.join(", "));
            Ok(())
        }
    }
}

pub async fn status(config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = build_app(config).await?;

    let snapshot = app
        .pipeline
        .status_snapshot()
        .await
        .context("Failed to read status")?;

    println!("Dry-run: {}", if snapshot.dry_run { "on" } else { "off" });
    println!(
        "LLM calls: {} ({} failed)",
        snapshot.usage.calls, snapshot.usage.failures
    );
    println!(
        "Tokens: {} in / {} out",
        snapshot.usage.input_tokens, snapshot.usage.output_tokens
    );
    println!("Estimated cost: ${:.4}", snapshot.usage.cost_usd);
    Ok(())
}
