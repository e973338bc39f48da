//! Publishing commands: publish, run-due, dry-run toggle

use anyhow::{Context, Result, bail};
use std::path::PathBuf;

use crate::args::{DryRunArgs, PublishArgs};
use crate::commands::{build_app, report_outcome};
use crate::config::AppConfig;

pub async fn execute(args: PublishArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = build_app(config).await?;

    if args.all {
        let user = args.user.as_deref().expect("clap requires --user with --all");
        let outcomes = app
            .pipeline
            .publish_all_approved(user)
            .await
            .context("Publish failed")?;
        if outcomes.is_empty() {
            println!("No approved drafts for {}", user);
        }
        for outcome in &outcomes {
            report_outcome(outcome);
        }
        return Ok(());
    }

    let Some(draft_id) = args.draft_id else {
        bail!("Provide a draft id or --all");
    };

    let outcome = if args.approve {
        app.pipeline.approve_and_publish(draft_id).await
    } else {
        app.pipeline.publish(draft_id).await
    }
    .context("Publish failed")?;

    report_outcome(&outcome);
    Ok(())
}

pub async fn run_due(config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = build_app(config).await?;

    let outcomes = app.pipeline.run_due().await.context("Scheduler run failed")?;

    if outcomes.is_empty() {
        println!("No scheduled drafts due");
        return Ok(());
    }
    for outcome in &outcomes {
        report_outcome(outcome);
    }
    Ok(())
}

pub async fn dry_run(args: DryRunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = build_app(config).await?;

    match args.mode.as_str() {
        "on" => {
            app.pipeline.set_dry_run(true).await.context("Toggle failed")?;
            println!("Dry-run is now on");
        }
        "off" => {
            app.pipeline.set_dry_run(false).await.context("Toggle failed")?;
            println!("Dry-run is now off (publishes go to real platforms)");
        }
        _ => {
            let on = app
                .pipeline
                .effective_dry_run()
                .await
                .context("Failed to read dry-run state")?;
            println!("Dry-run is {}", if on { "on" } else { "off" });
        }
    }
    Ok(())
}
