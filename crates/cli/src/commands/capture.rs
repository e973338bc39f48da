//! Capture command: ingest an entry and honor its inline directives

use anyhow::{Context, Result, bail};
use std::io::Read;
use std::path::PathBuf;

use crate::args::CaptureArgs;
use crate::commands::{build_app, format_draft, report_outcome};
use crate::config::AppConfig;
use draftsmith_domain::DraftStatus;

pub async fn execute(args: CaptureArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = build_app(config).await?;

    let text = input_text(&args)?;
    if text.trim().is_empty() {
        bail!("No entry text provided");
    }

    let outcome = app
        .pipeline
        .ingest(&args.user, &text)
        .await
        .context("Capture failed")?;

    println!(
        "Captured entry #{} for {} ({})",
        outcome.entry.id,
        outcome.entry.user_id,
        outcome.entry.visibility.as_str()
    );

    let directives = outcome.directives;
    if directives.private {
        // Private entries end the pipeline at the entry
        return Ok(());
    }
    if !directives.draft && !directives.publish {
        return Ok(());
    }

    let platforms = if directives.publish_platforms.is_empty() {
        app.pipeline.config().enabled_platforms.clone()
    } else {
        directives.publish_platforms.clone()
    };

    let drafts = app
        .pipeline
        .draft(outcome.entry.id, &platforms)
        .await
        .context("Draft generation failed")?;

    for draft in &drafts {
        println!("\n{}", format_draft(draft));
    }

    // "#publish" is the explicit approve-and-publish combined action
    if directives.publish {
        for draft in drafts
            .iter()
            .filter(|d| d.status == DraftStatus::PendingApproval)
        {
            let outcome = app
                .pipeline
                .approve_and_publish(draft.id)
                .await
                .context("Publish failed")?;
            report_outcome(&outcome);
        }
    }

    Ok(())
}

fn input_text(args: &CaptureArgs) -> Result<String> {
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    match &args.file {
        Some(path) if path.as_os_str() == "-" => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => bail!("Provide entry text or --file"),
    }
}
