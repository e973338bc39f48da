//! Draft generation commands: draft, redraft, edit

use anyhow::{Context, Result, bail};
use std::path::PathBuf;

use crate::args::{DraftArgs, EditArgs, RedraftArgs};
use crate::commands::{build_app, format_draft};
use crate::config::AppConfig;
use draftsmith_domain::DraftStore;
use draftsmith_domain::directives::parse_platform_args;

pub async fn execute(args: DraftArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = build_app(config).await?;

    let entry_id = match (args.entry, &args.user) {
        (Some(entry_id), _) => entry_id,
        (None, Some(user)) => app
            .pipeline
            .store()
            .latest_entry_for_user(user)
            .await
            .context("Failed to look up latest entry")?
            .map(|entry| entry.id)
            .with_context(|| format!("No entries captured for {}", user))?,
        (None, None) => bail!("Provide --entry or --user"),
    };

    let platforms = parse_platform_args(&args.platforms, &app.pipeline.config().enabled_platforms);

    let drafts = app
        .pipeline
        .draft(entry_id, &platforms)
        .await
        .context("Draft generation failed")?;

    for draft in &drafts {
        println!("{}\n", format_draft(draft));
    }

    Ok(())
}

pub async fn redraft(args: RedraftArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = build_app(config).await?;

    let draft = app
        .pipeline
        .redraft(args.draft_id)
        .await
        .context("Redraft failed")?;

    println!("{}", format_draft(&draft));
    Ok(())
}

pub async fn edit(args: EditArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = build_app(config).await?;

    let draft = app
        .pipeline
        .edit(args.draft_id, &args.text)
        .await
        .context("Edit failed")?;

    println!("{}", format_draft(&draft));
    Ok(())
}
