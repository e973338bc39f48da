//! Domain models and value objects

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Target social platform for a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    X,
    Threads,
    Linkedin,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::X, Platform::Threads, Platform::Linkedin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::X => "x",
            Platform::Threads => "threads",
            Platform::Linkedin => "linkedin",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" => Ok(Platform::X),
            "threads" => Ok(Platform::Threads),
            "linkedin" => Ok(Platform::Linkedin),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// Entry visibility requested at capture time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    /// Stored for the journal only; no drafts are ever generated
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility: {}", other)),
        }
    }
}

/// One captured diary entry. Append-only; never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub user_id: String,
    pub raw_text: String,
    /// Hash of the whitespace-normalized text; unique per user
    pub content_hash: String,
    pub visibility: Visibility,
    pub strict: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Entry fields known before the store assigns an id
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub user_id: String,
    pub raw_text: String,
    pub content_hash: String,
    pub visibility: Visibility,
    pub strict: bool,
    pub created_at: OffsetDateTime,
}

/// Compute the dedup hash of an entry text.
///
/// Normalization collapses all whitespace runs and lowercases, so trivial
/// re-sends ("Hello   World" vs "hello world") hash identically.
pub fn content_hash(text: &str) -> String {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Draft lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    PendingSummary,
    PendingGeneration,
    PendingValidation,
    PendingApproval,
    Approved,
    Scheduled,
    Published,
    Failed,
    Discarded,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::PendingSummary => "pending_summary",
            DraftStatus::PendingGeneration => "pending_generation",
            DraftStatus::PendingValidation => "pending_validation",
            DraftStatus::PendingApproval => "pending_approval",
            DraftStatus::Approved => "approved",
            DraftStatus::Scheduled => "scheduled",
            DraftStatus::Published => "published",
            DraftStatus::Failed => "failed",
            DraftStatus::Discarded => "discarded",
        }
    }

    /// Terminal states admit no further transitions (undo included)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DraftStatus::Published | DraftStatus::Failed | DraftStatus::Discarded
        )
    }

    /// True once the length invariant must hold (validated or beyond)
    pub fn is_validated(&self) -> bool {
        matches!(
            self,
            DraftStatus::PendingApproval
                | DraftStatus::Approved
                | DraftStatus::Scheduled
                | DraftStatus::Published
        )
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DraftStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_summary" => Ok(DraftStatus::PendingSummary),
            "pending_generation" => Ok(DraftStatus::PendingGeneration),
            "pending_validation" => Ok(DraftStatus::PendingValidation),
            "pending_approval" => Ok(DraftStatus::PendingApproval),
            "approved" => Ok(DraftStatus::Approved),
            "scheduled" => Ok(DraftStatus::Scheduled),
            "published" => Ok(DraftStatus::Published),
            "failed" => Ok(DraftStatus::Failed),
            "discarded" => Ok(DraftStatus::Discarded),
            other => Err(format!("unknown draft status: {}", other)),
        }
    }
}

/// One platform-targeted candidate post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub id: i64,
    pub entry_id: i64,
    pub platform: Platform,
    pub status: DraftStatus,
    pub text: String,
    /// Character count of `text` (chars, not bytes)
    pub char_count: i64,
    /// Per-(entry, platform) revision counter; redraft/edit create new versions
    pub version: i64,
    pub generating_provider: Option<String>,
    pub generating_model: Option<String>,
    pub summarizing_provider: Option<String>,
    pub summarizing_model: Option<String>,
    /// Why the draft is `failed` (validation or publish reason)
    pub failure_reason: Option<String>,
    /// Outcome of the last publish attempt, if any
    pub publish_success: Option<bool>,
    /// Platform-assigned (or synthetic dry-run) id of the published post
    pub external_id: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub scheduled_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Draft {
    /// A failed draft is manually replayable only if the failure came from a
    /// publish attempt; validation failures never reach an adapter again.
    pub fn is_publish_retryable(&self) -> bool {
        self.status == DraftStatus::Failed && self.publish_success == Some(false)
    }
}

/// Draft fields known before the store assigns id and version
#[derive(Debug, Clone)]
pub struct NewDraft {
    pub entry_id: i64,
    pub platform: Platform,
    pub status: DraftStatus,
    pub created_at: OffsetDateTime,
}

/// Pipeline stage names used for provider routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Summarize,
    DraftX,
    DraftThreads,
    DraftLinkedin,
    Check,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Summarize,
        Stage::DraftX,
        Stage::DraftThreads,
        Stage::DraftLinkedin,
        Stage::Check,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Summarize => "summarize",
            Stage::DraftX => "draft_x",
            Stage::DraftThreads => "draft_threads",
            Stage::DraftLinkedin => "draft_linkedin",
            Stage::Check => "check",
        }
    }

    /// The generation stage for a given platform
    pub fn draft_for(platform: Platform) -> Stage {
        match platform {
            Platform::X => Stage::DraftX,
            Platform::Threads => Stage::DraftThreads,
            Platform::Linkedin => Stage::DraftLinkedin,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summarize" => Ok(Stage::Summarize),
            "draft_x" => Ok(Stage::DraftX),
            "draft_threads" => Ok(Stage::DraftThreads),
            "draft_linkedin" => Ok(Stage::DraftLinkedin),
            "check" => Ok(Stage::Check),
            other => Err(format!("unknown stage: {}", other)),
        }
    }
}

/// One (provider, model) routing candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub provider: String,
    pub model: String,
}

impl RouteSpec {
    /// Parse a `"provider:model"` route string
    pub fn parse(route: &str) -> Result<Self, String> {
        match route.split_once(':') {
            Some((provider, model)) if !provider.trim().is_empty() && !model.trim().is_empty() => {
                Ok(Self {
                    provider: provider.trim().to_string(),
                    model: model.trim().to_string(),
                })
            }
            _ => Err(format!("invalid route format: {:?}", route)),
        }
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

/// Ordered (provider, model) candidates per stage.
///
/// Immutable snapshot semantics: loaded once, replaced wholesale on runtime
/// override. Ordering is the single point of behavioral tuning; the router
/// never reorders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    routes: BTreeMap<Stage, Vec<RouteSpec>>,
}

impl RoutingTable {
    pub fn new(routes: BTreeMap<Stage, Vec<RouteSpec>>) -> Self {
        Self { routes }
    }

    pub fn empty() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }

    pub fn candidates(&self, stage: Stage) -> &[RouteSpec] {
        self.routes.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_stage(&mut self, stage: Stage, candidates: Vec<RouteSpec>) {
        self.routes.insert(stage, candidates);
    }

    pub fn stages(&self) -> impl Iterator<Item = (Stage, &[RouteSpec])> {
        self.routes
            .iter()
            .map(|(stage, specs)| (*stage, specs.as_slice()))
    }

    /// Route every stage to a single stub candidate (offline/test mode)
    pub fn stub() -> Self {
        let mut routes = BTreeMap::new();
        for stage in Stage::ALL {
            routes.insert(
                stage,
                vec![RouteSpec {
                    provider: "stub".to_string(),
                    model: "stub-small".to_string(),
                }],
            );
        }
        Self { routes }
    }
}

impl Default for RoutingTable {
    /// Cost/quality-tiered defaults: cheap models for summarize/check,
    /// stronger models for platform generation.
    fn default() -> Self {
        fn specs(routes: &[&str]) -> Vec<RouteSpec> {
            routes
                .iter()
                .map(|r| RouteSpec::parse(r).expect("builtin route"))
                .collect()
        }

        let mut routes = BTreeMap::new();
        routes.insert(
            Stage::Summarize,
            specs(&[
                "anthropic:claude-haiku-4-5",
                "openai:gpt-5-mini",
                "gemini:gemini-3-flash-preview",
            ]),
        );
        routes.insert(
            Stage::DraftX,
            specs(&[
                "anthropic:claude-sonnet-4-5",
                "openai:gpt-5.2",
                "gemini:gemini-3-pro-preview",
            ]),
        );
        routes.insert(
            Stage::DraftThreads,
            specs(&[
                "anthropic:claude-sonnet-4-5",
                "openai:gpt-5.2",
                "gemini:gemini-3-flash-preview",
            ]),
        );
        routes.insert(
            Stage::DraftLinkedin,
            specs(&[
                "anthropic:claude-sonnet-4-5",
                "openai:gpt-5.2",
                "gemini:gemini-3-pro-preview",
            ]),
        );
        routes.insert(
            Stage::Check,
            specs(&[
                "openai:gpt-5-nano",
                "anthropic:claude-haiku-4-5",
                "gemini:gemini-2.5-flash-lite",
            ]),
        );
        Self { routes }
    }
}

/// Successful output of one provider call
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// One row per LLM call attempt, successes and failures alike. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub stage: Stage,
    pub provider: String,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub latency_ms: i64,
    pub cost_usd: f64,
    pub succeeded: bool,
    pub error_kind: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Aggregated usage totals for the status command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    pub calls: i64,
    pub failures: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_usd: f64,
}

/// Style contract and per-platform prompt templates.
///
/// Loaded from an optional style document; embedded defaults keep the
/// pipeline operable with no external files at all.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    pub contract: String,
    templates: BTreeMap<Platform, String>,
}

pub const BUILTIN_STYLE_CONTRACT: &str = "Write concise, clear, first-person social posts. \
Avoid hype, avoid claims you cannot support, and keep practical value high.";

impl StyleSheet {
    pub fn new(contract: String, templates: BTreeMap<Platform, String>) -> Self {
        Self {
            contract,
            templates,
        }
    }

    pub fn template(&self, platform: Platform) -> &str {
        self.templates
            .get(&platform)
            .map(String::as_str)
            .unwrap_or_else(|| builtin_template(platform))
    }

    pub fn set_template(&mut self, platform: Platform, template: String) {
        self.templates.insert(platform, template);
    }
}

impl Default for StyleSheet {
    fn default() -> Self {
        Self {
            contract: BUILTIN_STYLE_CONTRACT.to_string(),
            templates: BTreeMap::new(),
        }
    }
}

fn builtin_template(platform: Platform) -> &'static str {
    match platform {
        Platform::X => {
            "Transform this diary entry into one X post. Keep it punchy and under the platform limit.\n\
             Diary:\n{entry_text}\n\nSummary:\n{summary}\n\nConstraints:\n{strict_rules}"
        }
        Platform::Threads => {
            "Transform this diary entry into one Threads post. Keep it conversational and concrete.\n\
             Diary:\n{entry_text}\n\nSummary:\n{summary}\n\nConstraints:\n{strict_rules}"
        }
        Platform::Linkedin => {
            "Transform this diary entry into one LinkedIn post with practical takeaways.\n\
             Diary:\n{entry_text}\n\nSummary:\n{summary}\n\nConstraints:\n{strict_rules}"
        }
    }
}
