//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// draftsmith: turn diary entries into platform drafts via routed LLM backends
#[derive(Parser, Debug)]
#[command(name = "draftsmith")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture a diary entry (inline #draft/#private/#strict/#publish honored)
    Capture(CaptureArgs),

    /// Generate drafts for an entry
    Draft(DraftArgs),

    /// List drafts awaiting action
    Queue(QueueArgs),

    /// Approve a draft for publishing
    Approve(ApproveArgs),

    /// Publish an approved draft (or all approved drafts)
    Publish(PublishArgs),

    /// Schedule an approved draft for later publishing
    Schedule(ScheduleArgs),

    /// Publish all scheduled drafts that are due
    RunDue,

    /// Discard a draft (kept for audit, excluded from queues)
    Undo(UndoArgs),

    /// Regenerate a draft as a fresh alternative version
    Redraft(RedraftArgs),

    /// Replace a draft's text manually as a new version
    Edit(EditArgs),

    /// Show or toggle the persisted dry-run mode
    DryRun(DryRunArgs),

    /// Show or override per-stage provider routing
    Routing(RoutingArgs),

    /// Show dry-run state and LLM usage totals
    Status,

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show component health
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// User the entry belongs to
    #[arg(long)]
    pub user: String,

    /// Entry text (use --file to read from a file instead)
    #[arg(conflicts_with = "file")]
    pub text: Option<String>,

    /// File containing the entry text (use - for stdin)
    #[arg(long, conflicts_with = "text")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DraftArgs {
    /// Entry to draft from; defaults to the user's latest entry
    #[arg(long)]
    pub entry: Option<i64>,

    /// User whose latest entry is drafted when --entry is omitted
    #[arg(long)]
    pub user: Option<String>,

    /// Target platforms (x, threads, linkedin); defaults to all enabled
    pub platforms: Vec<String>,
}

#[derive(Args, Debug)]
pub struct QueueArgs {
    /// User whose queue to list
    #[arg(long)]
    pub user: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ApproveArgs {
    /// Draft to approve
    pub draft_id: i64,

    /// Publish immediately after approving
    #[arg(long)]
    pub publish: bool,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Draft to publish
    #[arg(required_unless_present = "all")]
    pub draft_id: Option<i64>,

    /// Publish every approved draft for --user
    #[arg(long, requires = "user")]
    pub all: bool,

    /// User whose approved drafts are published with --all
    #[arg(long)]
    pub user: Option<String>,

    /// Approve the draft first (combined approve-and-publish)
    #[arg(long, conflicts_with = "all")]
    pub approve: bool,
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Draft to schedule
    pub draft_id: i64,

    /// When to publish: RFC3339, or naive "YYYY-MM-DD HH:MM" interpreted
    /// with the configured UTC offset
    #[arg(long)]
    pub at: String,
}

#[derive(Args, Debug)]
pub struct UndoArgs {
    /// Draft to discard
    pub draft_id: i64,
}

#[derive(Args, Debug)]
pub struct RedraftArgs {
    /// Draft to regenerate
    pub draft_id: i64,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Draft to replace
    pub draft_id: i64,

    /// Replacement text (truncated to the platform limit)
    #[arg(long)]
    pub text: String,
}

#[derive(Args, Debug)]
pub struct DryRunArgs {
    /// on, off, or show
    #[arg(value_parser = ["on", "off", "show"])]
    pub mode: String,
}

#[derive(Args, Debug)]
pub struct RoutingArgs {
    #[command(subcommand)]
    pub command: RoutingCommands,
}

#[derive(Subcommand, Debug)]
pub enum RoutingCommands {
    /// Print the effective routing table
    Show,

    /// Override the candidates for one stage (persisted)
    Set {
        /// Stage name (summarize, draft_x, draft_threads, draft_linkedin, check)
        stage: String,

        /// Ordered "provider:model" candidates
        #[arg(required = true)]
        routes: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
