//! Queue management commands: queue, approve, undo, schedule

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::args::{ApproveArgs, QueueArgs, ScheduleArgs, UndoArgs};
use crate::commands::{build_app, format_draft, report_outcome};
use crate::config::AppConfig;

pub async fn execute(args: QueueArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = build_app(config).await?;

    let queue = app
        .pipeline
        .list_queue(&args.user)
        .await
        .context("Failed to list queue")?;

    if args.json {
        let json = serde_json::to_string_pretty(&queue).context("Failed to serialize queue")?;
        println!("{}", json);
        return Ok(());
    }

    if queue.is_empty() {
        println!("Queue is empty for {}", args.user);
        return Ok(());
    }

    for draft in &queue {
        println!("{}\n", format_draft(draft));
    }
    Ok(())
}

pub async fn approve(args: ApproveArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = build_app(config).await?;

    if args.publish {
        let outcome = app
            .pipeline
            .approve_and_publish(args.draft_id)
            .await
            .context("Approve-and-publish failed")?;
        report_outcome(&outcome);
        return Ok(());
    }

    let draft = app
        .pipeline
        .approve(args.draft_id)
        .await
        .context("Approve failed")?;
    println!("Approved draft #{} for {}", draft.id, draft.platform);
    Ok(())
}

pub async fn undo(args: UndoArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = build_app(config).await?;

    let draft = app
        .pipeline
        .undo(args.draft_id)
        .await
        .context("Undo failed")?;
    println!("Discarded draft #{} ({})", draft.id, draft.platform);
    Ok(())
}

pub async fn schedule(args: ScheduleArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let offset_minutes = config.general.utc_offset_minutes;
    let app = build_app(config).await?;

    let at = parse_schedule_time(&args.at, offset_minutes)?;

    let draft = app
        .pipeline
        .schedule(args.draft_id, at)
        .await
        .context("Schedule failed")?;

    println!(
        "Scheduled draft #{} for {} at {}",
        draft.id,
        draft.platform,
        draft
            .scheduled_at
            .map(|at| at.to_string())
            .unwrap_or_default()
    );
    Ok(())
}

/// Accept RFC3339 or a naive "YYYY-MM-DD HH:MM" local time interpreted with
/// the configured UTC offset.
fn parse_schedule_time(input: &str, offset_minutes: i32) -> Result<OffsetDateTime> {
    if let Ok(at) = OffsetDateTime::parse(input.trim(), &Rfc3339) {
        return Ok(at);
    }

    let naive_format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    if let Ok(naive) = PrimitiveDateTime::parse(input.trim(), &naive_format) {
        let offset = UtcOffset::from_whole_seconds(offset_minutes * 60)
            .context("Invalid utc_offset_minutes in configuration")?;
        return Ok(naive.assume_offset(offset));
    }

    bail!(
        "Could not parse {:?}; expected RFC3339 or \"YYYY-MM-DD HH:MM\"",
        input
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_parse_rfc3339() {
        let at = parse_schedule_time("2025-07-01T09:30:00Z", 0).unwrap();
        assert_eq!(at, datetime!(2025-07-01 09:30 UTC));
    }

    #[test]
    fn test_parse_naive_with_offset() {
        // 09:30 at UTC+2 is 07:30 UTC
        let at = parse_schedule_time("2025-07-01 09:30", 120).unwrap();
        assert_eq!(
            at.to_offset(time::UtcOffset::UTC),
            datetime!(2025-07-01 07:30 UTC)
        );
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_schedule_time("next tuesday", 0).is_err());
    }
}
