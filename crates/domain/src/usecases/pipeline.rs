//! Pipeline orchestrator: ingest -> summarize -> generate -> validate ->
//! approve -> publish/schedule
//!
//! Every transition is persisted before the next network call, so an
//! interrupted run resumes from the stored status without reprocessing or
//! double-publishing. Approval is just a persisted status: the pipeline never
//! blocks waiting for it.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::directives::{Directives, parse_directives};
use crate::limits::{PlatformLimits, check_limit, truncate_to_limit};
use crate::model::{
    Draft, DraftStatus, Entry, NewDraft, NewEntry, Platform, RouteSpec, Stage, UsageSummary,
    Visibility, content_hash,
};
use crate::ports::{Clock, DraftStore, PublishAdapter, PublishReceipt, StoreError};
use crate::prompts;
use crate::usecases::router::ProviderRouter;
use crate::StyleSheet;

/// Persisted-settings key for the runtime dry-run override
const DRY_RUN_SETTING: &str = "dry_run";

/// Per-platform rolling 7-day publish caps; 0 disables the cap
#[derive(Debug, Clone, Copy)]
pub struct WeeklyCaps {
    pub x: u32,
    pub threads: u32,
    pub linkedin: u32,
}

impl WeeklyCaps {
    pub fn cap_for(&self, platform: Platform) -> Option<u32> {
        let cap = match platform {
            Platform::X => self.x,
            Platform::Threads => self.threads,
            Platform::Linkedin => self.linkedin,
        };
        (cap > 0).then_some(cap)
    }
}

impl Default for WeeklyCaps {
    fn default() -> Self {
        Self {
            x: 0,
            threads: 0,
            linkedin: 3,
        }
    }
}

/// Configuration for the pipeline orchestrator
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub limits: PlatformLimits,
    /// Bounded shorten-regeneration attempts before validation_exceeded
    pub max_regen_attempts: u32,
    /// Dry-run default when no persisted override exists
    pub dry_run_default: bool,
    pub weekly_caps: WeeklyCaps,
    /// Platforms drafted when the caller does not name any
    pub enabled_platforms: Vec<Platform>,
    /// Excerpt length used when the summarize stage is exhausted
    pub summary_fallback_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            limits: PlatformLimits::default(),
            max_regen_attempts: 2,
            dry_run_default: true,
            weekly_caps: WeeklyCaps::default(),
            enabled_platforms: Platform::ALL.to_vec(),
            summary_fallback_chars: 300,
        }
    }
}

/// Errors from pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("entry already captured")]
    DuplicateEntry,
    #[error("entry text is empty after removing directives")]
    EmptyEntry,
    #[error("{0} not found")]
    NotFound(String),
    #[error("entry {0} is private; drafts are not generated")]
    PrivateEntry(i64),
    #[error("draft {id} is {status}; expected {expected}")]
    InvalidStatus {
        id: i64,
        status: DraftStatus,
        expected: &'static str,
    },
    #[error("no publish adapter configured for {0}")]
    NoAdapter(Platform),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result of ingesting one entry
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub entry: Entry,
    pub directives: Directives,
}

/// Result of one publish attempt
#[derive(Debug)]
pub enum PublishOutcome {
    Published {
        draft: Draft,
        receipt: PublishReceipt,
    },
    /// Weekly platform cap reached; the adapter was never invoked and the
    /// draft keeps its status for a later attempt
    RateLimited { draft: Draft, cap: u32 },
    /// Adapter-reported failure; terminal for this attempt, manually
    /// replayable by re-invoking publish
    Failed { draft: Draft, reason: String },
}

/// Snapshot for the status command
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub dry_run: bool,
    pub usage: UsageSummary,
}

struct SummaryOutcome {
    text: String,
    provider: Option<String>,
    model: Option<String>,
}

/// The staged pipeline orchestrator
pub struct Pipeline<S: DraftStore + ?Sized> {
    store: Arc<S>,
    router: Arc<ProviderRouter<S>>,
    publishers: HashMap<Platform, Arc<dyn PublishAdapter>>,
    clock: Arc<dyn Clock>,
    style: StyleSheet,
    config: PipelineConfig,
}

impl<S: DraftStore + ?Sized> Pipeline<S> {
    pub fn new(
        store: Arc<S>,
        router: Arc<ProviderRouter<S>>,
        publishers: HashMap<Platform, Arc<dyn PublishAdapter>>,
        clock: Arc<dyn Clock>,
        style: StyleSheet,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            router,
            publishers,
            clock,
            style,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn router(&self) -> &Arc<ProviderRouter<S>> {
        &self.router
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Capture an entry. Inline directives are parsed and stripped; the
    /// `(user, content_hash)` uniqueness makes a re-send a terminal,
    /// user-visible duplicate, not a retry.
    pub async fn ingest(&self, user_id: &str, text: &str) -> Result<IngestOutcome, PipelineError> {
        let directives = parse_directives(text);
        if directives.cleaned_text.is_empty() {
            return Err(PipelineError::EmptyEntry);
        }

        let visibility = if directives.private {
            Visibility::Private
        } else {
            Visibility::Public
        };

        let new_entry = NewEntry {
            user_id: user_id.to_string(),
            raw_text: directives.cleaned_text.clone(),
            content_hash: content_hash(&directives.cleaned_text),
            visibility,
            strict: directives.strict,
            created_at: self.clock.now(),
        };

        let entry = match self.store.insert_entry(&new_entry).await {
            Ok(entry) => entry,
            Err(StoreError::Duplicate) => return Err(PipelineError::DuplicateEntry),
            Err(error) => return Err(error.into()),
        };

        tracing::info!(
            entry_id = entry.id,
            user_id = %entry.user_id,
            visibility = entry.visibility.as_str(),
            strict = entry.strict,
            "Captured entry"
        );

        Ok(IngestOutcome { entry, directives })
    }

    /// Generate drafts for an entry, one per requested platform.
    ///
    /// Failed platforms produce `failed` drafts with a surfaced reason; they
    /// never block the other platforms.
    pub async fn draft(
        &self,
        entry_id: i64,
        platforms: &[Platform],
    ) -> Result<Vec<Draft>, PipelineError> {
        let entry = self
            .store
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("entry {}", entry_id)))?;

        if entry.visibility == Visibility::Private {
            return Err(PipelineError::PrivateEntry(entry.id));
        }

        let platforms: Vec<Platform> = if platforms.is_empty() {
            self.config.enabled_platforms.clone()
        } else {
            platforms.to_vec()
        };

        let mut drafts = Vec::with_capacity(platforms.len());
        for platform in &platforms {
            let draft = self
                .store
                .create_draft(&NewDraft {
                    entry_id: entry.id,
                    platform: *platform,
                    status: DraftStatus::PendingSummary,
                    created_at: self.clock.now(),
                })
                .await?;
            drafts.push(draft);
        }

        let summary = self.summarize(&entry).await;

        let mut completed = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let limit = self.config.limits.limit_for(draft.platform);
            let prompt = prompts::draft_prompt(
                draft.platform,
                self.style.template(draft.platform),
                &entry.raw_text,
                &summary.text,
                entry.strict,
                limit,
            );
            let draft = self.generate_and_validate(draft, &summary, prompt).await?;
            completed.push(draft);
        }

        Ok(completed)
    }

    /// Summarize the entry via the router; on exhaustion fall back to a raw
    /// excerpt (degraded, never fatal).
    async fn summarize(&self, entry: &Entry) -> SummaryOutcome {
        let system = prompts::system_prompt(&self.style.contract);
        let prompt = prompts::summary_prompt(&entry.raw_text);

        match self.router.generate(Stage::Summarize, &system, &prompt).await {
            Ok(generation) if !generation.text.trim().is_empty() => SummaryOutcome {
                text: generation.text.trim().to_string(),
                provider: Some(generation.provider),
                model: Some(generation.model),
            },
            Ok(_) | Err(_) => {
                tracing::warn!(
                    entry_id = entry.id,
                    "Summarize stage exhausted, falling back to raw excerpt"
                );
                SummaryOutcome {
                    text: entry
                        .raw_text
                        .chars()
                        .take(self.config.summary_fallback_chars)
                        .collect(),
                    provider: None,
                    model: None,
                }
            }
        }
    }

    /// Drive one draft through generation and bounded validation.
    async fn generate_and_validate(
        &self,
        mut draft: Draft,
        summary: &SummaryOutcome,
        initial_prompt: String,
    ) -> Result<Draft, PipelineError> {
        let limit = self.config.limits.limit_for(draft.platform);
        let stage = Stage::draft_for(draft.platform);
        let system = prompts::system_prompt(&self.style.contract);

        draft.summarizing_provider = summary.provider.clone();
        draft.summarizing_model = summary.model.clone();
        draft.status = DraftStatus::PendingGeneration;
        self.persist(&mut draft).await?;

        match self.router.generate(stage, &system, &initial_prompt).await {
            Ok(generation) => {
                draft.text = generation.text.trim().to_string();
                draft.char_count = draft.text.chars().count() as i64;
                draft.generating_provider = Some(generation.provider);
                draft.generating_model = Some(generation.model);
                draft.status = DraftStatus::PendingValidation;
                self.persist(&mut draft).await?;
            }
            Err(error) => {
                tracing::error!(
                    draft_id = draft.id,
                    platform = %draft.platform,
                    error = %error,
                    "Generation stage exhausted"
                );
                draft.status = DraftStatus::Failed;
                draft.failure_reason = Some(format!("generation: {}", error));
                self.persist(&mut draft).await?;
                return Ok(draft);
            }
        }

        let mut attempts = 0u32;
        loop {
            match check_limit(&draft.text, limit) {
                Ok(()) => {
                    draft.status = DraftStatus::PendingApproval;
                    self.persist(&mut draft).await?;
                    tracing::info!(
                        draft_id = draft.id,
                        platform = %draft.platform,
                        chars = draft.char_count,
                        regen_attempts = attempts,
                        "Draft awaiting approval"
                    );
                    return Ok(draft);
                }
                Err(too_long) => {
                    if attempts >= self.config.max_regen_attempts {
                        draft.status = DraftStatus::Failed;
                        draft.failure_reason = Some(format!(
                            "validation_exceeded: {} chars over the {} limit after {} regeneration attempts",
                            too_long.excess(),
                            limit,
                            attempts
                        ));
                        self.persist(&mut draft).await?;
                        tracing::warn!(
                            draft_id = draft.id,
                            platform = %draft.platform,
                            chars = too_long.length,
                            limit = limit,
                            "Draft failed validation after bounded regeneration"
                        );
                        return Ok(draft);
                    }

                    attempts += 1;
                    draft.status = DraftStatus::PendingGeneration;
                    self.persist(&mut draft).await?;

                    let prompt = prompts::shorten_prompt(draft.platform, &draft.text, limit);
                    match self.router.generate(stage, &system, &prompt).await {
                        Ok(generation) => {
                            draft.text = generation.text.trim().to_string();
                            draft.char_count = draft.text.chars().count() as i64;
                            draft.generating_provider = Some(generation.provider);
                            draft.generating_model = Some(generation.model);
                            draft.status = DraftStatus::PendingValidation;
                            self.persist(&mut draft).await?;
                        }
                        Err(error) => {
                            draft.status = DraftStatus::Failed;
                            draft.failure_reason = Some(format!(
                                "validation_exceeded: {} chars over the {} limit (regeneration unavailable: {})",
                                too_long.excess(),
                                limit,
                                error
                            ));
                            self.persist(&mut draft).await?;
                            return Ok(draft);
                        }
                    }
                }
            }
        }
    }

    /// Human approval signal: pending_approval -> approved
    pub async fn approve(&self, draft_id: i64) -> Result<Draft, PipelineError> {
        let mut draft = self.require_draft(draft_id).await?;
        if draft.status != DraftStatus::PendingApproval {
            return Err(PipelineError::InvalidStatus {
                id: draft.id,
                status: draft.status,
                expected: "pending_approval",
            });
        }
        draft.status = DraftStatus::Approved;
        self.persist(&mut draft).await?;
        Ok(draft)
    }

    /// The explicit combined action; the only path that approves without a
    /// separate signal.
    pub async fn approve_and_publish(
        &self,
        draft_id: i64,
    ) -> Result<PublishOutcome, PipelineError> {
        self.approve(draft_id).await?;
        self.publish(draft_id).await
    }

    /// Publish one draft through its platform adapter.
    ///
    /// Accepted from approved, scheduled, or a failed publish attempt (manual
    /// replay). The weekly cap is checked before the adapter; adapter failures
    /// are recorded and surfaced, never auto-retried.
    pub async fn publish(&self, draft_id: i64) -> Result<PublishOutcome, PipelineError> {
        let mut draft = self.require_draft(draft_id).await?;

        let eligible = matches!(draft.status, DraftStatus::Approved | DraftStatus::Scheduled)
            || draft.is_publish_retryable();
        if !eligible {
            return Err(PipelineError::InvalidStatus {
                id: draft.id,
                status: draft.status,
                expected: "approved, scheduled, or a failed publish attempt",
            });
        }

        // Length invariant guard: nothing over the limit may reach an adapter.
        let limit = self.config.limits.limit_for(draft.platform);
        if let Err(too_long) = check_limit(&draft.text, limit) {
            draft.status = DraftStatus::Failed;
            draft.failure_reason = Some(format!(
                "validation_exceeded: {} chars over the {} limit",
                too_long.excess(),
                limit
            ));
            self.persist(&mut draft).await?;
            let reason = draft.failure_reason.clone().unwrap_or_default();
            return Ok(PublishOutcome::Failed { draft, reason });
        }

        if let Some(cap) = self.config.weekly_caps.cap_for(draft.platform) {
            let since = self.clock.now() - Duration::days(7);
            let published = self
                .store
                .count_published_since(draft.platform, since)
                .await?;
            if published >= cap as i64 {
                tracing::warn!(
                    draft_id = draft.id,
                    platform = %draft.platform,
                    cap = cap,
                    published = published,
                    "Weekly publish cap reached, refusing before adapter call"
                );
                return Ok(PublishOutcome::RateLimited { draft, cap });
            }
        }

        let dry_run = self.effective_dry_run().await?;
        let adapter = self
            .publishers
            .get(&draft.platform)
            .ok_or(PipelineError::NoAdapter(draft.platform))?
            .clone();

        // State is already fetched and released; nothing is held across the
        // network call.
        let result = adapter.publish(&draft.text, dry_run).await;

        match result {
            Ok(receipt) => {
                draft.status = DraftStatus::Published;
                draft.published_at = Some(self.clock.now());
                draft.publish_success = Some(true);
                draft.external_id = Some(receipt.external_id.clone());
                draft.failure_reason = None;
                self.persist(&mut draft).await?;
                tracing::info!(
                    draft_id = draft.id,
                    platform = %draft.platform,
                    external_id = %receipt.external_id,
                    dry_run = receipt.dry_run,
                    "Published draft"
                );
                Ok(PublishOutcome::Published { draft, receipt })
            }
            Err(error) => {
                let reason = error.to_string();
                draft.status = DraftStatus::Failed;
                draft.publish_success = Some(false);
                draft.failure_reason = Some(format!("publish: {}", reason));
                self.persist(&mut draft).await?;
                tracing::error!(
                    draft_id = draft.id,
                    platform = %draft.platform,
                    error = %reason,
                    "Publish failed; manual replay required"
                );
                Ok(PublishOutcome::Failed { draft, reason })
            }
        }
    }

    /// Publish every approved draft for a user, sequentially
    pub async fn publish_all_approved(
        &self,
        user_id: &str,
    ) -> Result<Vec<PublishOutcome>, PipelineError> {
        let queue = self.store.list_queue(user_id).await?;
        let mut outcomes = Vec::new();
        for draft in queue
            .into_iter()
            .filter(|d| d.status == DraftStatus::Approved)
        {
            outcomes.push(self.publish(draft.id).await?);
        }
        Ok(outcomes)
    }

    /// Defer publishing: scheduling is itself a human decision, so it is
    /// accepted from pending_approval as well as approved.
    pub async fn schedule(
        &self,
        draft_id: i64,
        at: OffsetDateTime,
    ) -> Result<Draft, PipelineError> {
        let mut draft = self.require_draft(draft_id).await?;
        if !matches!(
            draft.status,
            DraftStatus::PendingApproval | DraftStatus::Approved
        ) {
            return Err(PipelineError::InvalidStatus {
                id: draft.id,
                status: draft.status,
                expected: "pending_approval or approved",
            });
        }
        draft.status = DraftStatus::Scheduled;
        draft.scheduled_at = Some(at);
        self.persist(&mut draft).await?;
        Ok(draft)
    }

    /// Discard a non-terminal draft; it is excluded from queues but retained
    /// for audit.
    pub async fn undo(&self, draft_id: i64) -> Result<Draft, PipelineError> {
        let mut draft = self.require_draft(draft_id).await?;
        if draft.status.is_terminal() {
            return Err(PipelineError::InvalidStatus {
                id: draft.id,
                status: draft.status,
                expected: "any non-terminal status",
            });
        }
        draft.status = DraftStatus::Discarded;
        self.persist(&mut draft).await?;
        Ok(draft)
    }

    /// Generate a fresh alternative for a draft as a new version; the old
    /// draft is discarded (failed drafts stay failed for audit).
    pub async fn redraft(&self, draft_id: i64) -> Result<Draft, PipelineError> {
        let old = self.require_draft(draft_id).await?;
        if matches!(old.status, DraftStatus::Published | DraftStatus::Discarded) {
            return Err(PipelineError::InvalidStatus {
                id: old.id,
                status: old.status,
                expected: "an unpublished draft",
            });
        }
        let entry = self
            .store
            .get_entry(old.entry_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("entry {}", old.entry_id)))?;

        if !old.status.is_terminal() {
            let mut old = old.clone();
            old.status = DraftStatus::Discarded;
            self.persist(&mut old).await?;
        }

        let summary = self.summarize(&entry).await;
        let limit = self.config.limits.limit_for(old.platform);
        let prompt = prompts::redraft_prompt(
            old.platform,
            &entry.raw_text,
            &summary.text,
            &old.text,
            limit,
        );

        let draft = self
            .store
            .create_draft(&NewDraft {
                entry_id: entry.id,
                platform: old.platform,
                status: DraftStatus::PendingSummary,
                created_at: self.clock.now(),
            })
            .await?;

        self.generate_and_validate(draft, &summary, prompt).await
    }

    /// Replace a draft's text manually as a new version. The replacement is
    /// truncated to the platform limit, so it validates by construction.
    pub async fn edit(&self, draft_id: i64, text: &str) -> Result<Draft, PipelineError> {
        let old = self.require_draft(draft_id).await?;
        if matches!(old.status, DraftStatus::Published | DraftStatus::Discarded) {
            return Err(PipelineError::InvalidStatus {
                id: old.id,
                status: old.status,
                expected: "an unpublished draft",
            });
        }

        if !old.status.is_terminal() {
            let mut old = old.clone();
            old.status = DraftStatus::Discarded;
            self.persist(&mut old).await?;
        }

        let limit = self.config.limits.limit_for(old.platform);
        let text = truncate_to_limit(text.trim(), limit);

        let mut draft = self
            .store
            .create_draft(&NewDraft {
                entry_id: old.entry_id,
                platform: old.platform,
                status: DraftStatus::PendingApproval,
                created_at: self.clock.now(),
            })
            .await?;
        draft.char_count = text.chars().count() as i64;
        draft.text = text;
        draft.status = DraftStatus::PendingApproval;
        self.persist(&mut draft).await?;
        Ok(draft)
    }

    /// Drafts awaiting action for a user
    pub async fn list_queue(&self, user_id: &str) -> Result<Vec<Draft>, PipelineError> {
        Ok(self.store.list_queue(user_id).await?)
    }

    /// Persist the routing override, then swap the in-memory snapshot
    pub async fn set_routing(
        &self,
        stage: Stage,
        candidates: Vec<RouteSpec>,
    ) -> Result<(), PipelineError> {
        let routes: Vec<String> = candidates.iter().map(RouteSpec::to_string).collect();
        self.store
            .set_routing_override(stage.as_str(), &routes)
            .await?;
        self.router.set_stage_routes(stage, candidates);
        tracing::info!(stage = %stage, routes = ?routes, "Routing updated");
        Ok(())
    }

    /// Resolve the effective dry-run flag: persisted override else default
    pub async fn effective_dry_run(&self) -> Result<bool, StoreError> {
        match self.store.get_setting(DRY_RUN_SETTING).await? {
            Some(value) => Ok(value == "true"),
            None => Ok(self.config.dry_run_default),
        }
    }

    /// Persist the dry-run override so the toggle survives restarts
    pub async fn set_dry_run(&self, on: bool) -> Result<(), StoreError> {
        self.store
            .set_setting(DRY_RUN_SETTING, if on { "true" } else { "false" })
            .await
    }

    pub async fn status_snapshot(&self) -> Result<StatusSnapshot, PipelineError> {
        Ok(StatusSnapshot {
            dry_run: self.effective_dry_run().await?,
            usage: self.store.usage_summary().await?,
        })
    }

    async fn require_draft(&self, draft_id: i64) -> Result<Draft, PipelineError> {
        self.store
            .get_draft(draft_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("draft {}", draft_id)))
    }

    async fn persist(&self, draft: &mut Draft) -> Result<(), StoreError> {
        draft.updated_at = self.clock.now();
        self.store.update_draft(draft).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RoutingTable;
    use crate::test_support::{FixedClock, MemStore, ScriptedGenerator, ScriptedPublisher};
    use crate::usecases::router::RouterConfig;
    use crate::ports::TextGenerator;
    use std::collections::BTreeMap;
    use time::macros::datetime;

    struct Harness {
        store: Arc<MemStore>,
        clock: Arc<FixedClock>,
        publisher: Arc<ScriptedPublisher>,
        pipeline: Pipeline<MemStore>,
    }

    fn routing_for(provider: &str) -> RoutingTable {
        let mut map = BTreeMap::new();
        for stage in Stage::ALL {
            map.insert(
                stage,
                vec![RouteSpec {
                    provider: provider.to_string(),
                    model: "test-model".to_string(),
                }],
            );
        }
        RoutingTable::new(map)
    }

    fn harness_with(
        generators: Vec<Arc<dyn TextGenerator>>,
        table: RoutingTable,
        publisher: Arc<ScriptedPublisher>,
        config: PipelineConfig,
    ) -> Harness {
        let store = Arc::new(MemStore::new());
        let clock = FixedClock::at(datetime!(2025-06-01 12:00 UTC));
        let providers = generators
            .into_iter()
            .map(|g| (g.name().to_string(), g))
            .collect();
        let router = Arc::new(ProviderRouter::new(
            providers,
            table,
            store.clone(),
            clock.clone() as Arc<dyn Clock>,
            RouterConfig::default(),
            HashMap::new(),
        ));
        let mut publishers: HashMap<Platform, Arc<dyn PublishAdapter>> = HashMap::new();
        publishers.insert(publisher.platform(), publisher.clone());
        let pipeline = Pipeline::new(
            store.clone(),
            router,
            publishers,
            clock.clone() as Arc<dyn Clock>,
            StyleSheet::default(),
            config,
        );
        Harness {
            store,
            clock,
            publisher,
            pipeline,
        }
    }

    fn x_only_config() -> PipelineConfig {
        PipelineConfig {
            enabled_platforms: vec![Platform::X],
            ..Default::default()
        }
    }

    fn simple_harness() -> Harness {
        harness_with(
            vec![ScriptedGenerator::ok("stub", "a short generated draft")],
            routing_for("stub"),
            ScriptedPublisher::ok(Platform::X),
            x_only_config(),
        )
    }

    #[tokio::test]
    async fn test_ingest_rejects_duplicate_per_user() {
        let h = simple_harness();

        let first = h.pipeline.ingest("u1", "  Hello   World  ").await.unwrap();
        assert_eq!(first.entry.raw_text, "Hello World");

        let second = h.pipeline.ingest("u1", "hello world").await;
        assert!(matches!(second, Err(PipelineError::DuplicateEntry)));

        // A different user may capture the same text
        let third = h.pipeline.ingest("u2", "hello world").await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_ingest_empty_after_directives() {
        let h = simple_harness();
        let result = h.pipeline.ingest("u1", "#draft #strict").await;
        assert!(matches!(result, Err(PipelineError::EmptyEntry)));
    }

    #[tokio::test]
    async fn test_private_entry_blocks_drafting() {
        let h = simple_harness();
        let outcome = h.pipeline.ingest("u1", "just for me #private").await.unwrap();
        assert_eq!(outcome.entry.visibility, Visibility::Private);

        let result = h.pipeline.draft(outcome.entry.id, &[]).await;
        assert!(matches!(result, Err(PipelineError::PrivateEntry(_))));
    }

    #[tokio::test]
    async fn test_draft_happy_path_records_provenance() {
        let h = simple_harness();
        let entry = h.pipeline.ingest("u1", "Shipped the new scheduler today").await.unwrap();

        let drafts = h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];

        assert_eq!(draft.status, DraftStatus::PendingApproval);
        assert_eq!(draft.text, "a short generated draft");
        assert_eq!(draft.char_count, draft.text.chars().count() as i64);
        assert_eq!(draft.generating_provider.as_deref(), Some("stub"));
        assert_eq!(draft.generating_model.as_deref(), Some("test-model"));
        assert_eq!(draft.summarizing_provider.as_deref(), Some("stub"));
        assert_eq!(draft.version, 1);
    }

    #[tokio::test]
    async fn test_summary_exhaustion_degrades_to_excerpt() {
        // Summarize routed to a dead provider; generation routed to a live one
        let mut map = BTreeMap::new();
        map.insert(
            Stage::Summarize,
            vec![RouteSpec::parse("dead:model").unwrap()],
        );
        map.insert(Stage::DraftX, vec![RouteSpec::parse("live:model").unwrap()]);
        let table = RoutingTable::new(map);

        let h = harness_with(
            vec![
                ScriptedGenerator::failing("dead"),
                ScriptedGenerator::ok("live", "generated"),
            ],
            table,
            ScriptedPublisher::ok(Platform::X),
            x_only_config(),
        );

        let entry = h.pipeline.ingest("u1", "a diary entry").await.unwrap();
        let drafts = h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();

        // Degraded but non-fatal: the draft still reaches approval
        assert_eq!(drafts[0].status, DraftStatus::PendingApproval);
        assert_eq!(drafts[0].summarizing_provider, None);
        assert_eq!(drafts[0].generating_provider.as_deref(), Some("live"));
    }

    #[tokio::test]
    async fn test_generation_exhaustion_fails_draft() {
        let h = harness_with(
            vec![ScriptedGenerator::failing("stub")],
            routing_for("stub"),
            ScriptedPublisher::ok(Platform::X),
            x_only_config(),
        );

        let entry = h.pipeline.ingest("u1", "a diary entry").await.unwrap();
        let drafts = h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();

        assert_eq!(drafts[0].status, DraftStatus::Failed);
        let reason = drafts[0].failure_reason.as_deref().unwrap();
        assert!(reason.starts_with("generation:"), "reason: {}", reason);
    }

    #[tokio::test]
    async fn test_overlong_draft_regenerates_once_then_passes() {
        // 310 chars first, 260 chars on the shorten retry
        let generator = ScriptedGenerator::sequence(
            "stub",
            vec![
                Ok("short summary".to_string()),
                Ok("x".repeat(310)),
                Ok("y".repeat(260)),
            ],
        );
        let h = harness_with(
            vec![generator.clone()],
            routing_for("stub"),
            ScriptedPublisher::ok(Platform::X),
            x_only_config(),
        );

        let entry = h
            .pipeline
            .ingest("u1", "Shipped the new scheduler today")
            .await
            .unwrap();
        let drafts = h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();

        let draft = &drafts[0];
        assert_eq!(draft.status, DraftStatus::PendingApproval);
        assert_eq!(draft.char_count, 260);
        // summarize + generate + one shorten regeneration
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_validation_exceeded_after_bounded_attempts() {
        let long = "z".repeat(400);
        let generator = ScriptedGenerator::sequence(
            "stub",
            vec![
                Ok("summary".to_string()),
                Ok(long.clone()),
                Ok(long.clone()),
                Ok(long.clone()),
            ],
        );
        let h = harness_with(
            vec![generator.clone()],
            routing_for("stub"),
            ScriptedPublisher::ok(Platform::X),
            x_only_config(),
        );

        let entry = h.pipeline.ingest("u1", "text").await.unwrap();
        let drafts = h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();

        let draft = &drafts[0];
        assert_eq!(draft.status, DraftStatus::Failed);
        assert!(
            draft
                .failure_reason
                .as_deref()
                .unwrap()
                .contains("validation_exceeded")
        );
        // 1 summary + 1 generation + 2 bounded regenerations, no more
        assert_eq!(generator.calls(), 4);
    }

    #[tokio::test]
    async fn test_no_validated_draft_exceeds_limit() {
        let generator = ScriptedGenerator::sequence(
            "stub",
            vec![
                Ok("summary".to_string()),
                Ok("w".repeat(300)),
                Ok("w".repeat(290)),
                Ok("w".repeat(285)),
            ],
        );
        let h = harness_with(
            vec![generator],
            routing_for("stub"),
            ScriptedPublisher::ok(Platform::X),
            x_only_config(),
        );

        let entry = h.pipeline.ingest("u1", "text").await.unwrap();
        h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();

        for draft in h.store.drafts() {
            if draft.status.is_validated() {
                assert!(draft.char_count <= 280, "validated draft over limit");
            }
        }
    }

    #[tokio::test]
    async fn test_approve_then_publish_dry_run() {
        let h = simple_harness();
        let entry = h.pipeline.ingest("u1", "ship it").await.unwrap();
        let drafts = h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();
        let draft_id = drafts[0].id;

        let approved = h.pipeline.approve(draft_id).await.unwrap();
        assert_eq!(approved.status, DraftStatus::Approved);

        // dry_run_default is true and no override is set
        let outcome = h.pipeline.publish(draft_id).await.unwrap();
        match outcome {
            PublishOutcome::Published { draft, receipt } => {
                assert!(receipt.dry_run);
                assert_eq!(draft.status, DraftStatus::Published);
                assert!(draft.published_at.is_some());
                assert_eq!(draft.external_id.as_deref(), Some("fake-x"));
                assert_eq!(draft.publish_success, Some(true));
            }
            other => panic!("expected Published, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_requires_approval() {
        let h = simple_harness();
        let entry = h.pipeline.ingest("u1", "ship it").await.unwrap();
        let drafts = h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();

        let result = h.pipeline.publish(drafts[0].id).await;
        assert!(matches!(
            result,
            Err(PipelineError::InvalidStatus { .. })
        ));
        assert_eq!(h.publisher.calls(), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_is_recorded_and_replayable() {
        let failing = harness_with(
            vec![ScriptedGenerator::ok("stub", "short text")],
            routing_for("stub"),
            ScriptedPublisher::failing(Platform::X, "boom"),
            x_only_config(),
        );

        let entry = failing.pipeline.ingest("u1", "ship it").await.unwrap();
        let drafts = failing
            .pipeline
            .draft(entry.entry.id, &[Platform::X])
            .await
            .unwrap();
        let draft_id = drafts[0].id;
        failing.pipeline.approve(draft_id).await.unwrap();

        let outcome = failing.pipeline.publish(draft_id).await.unwrap();
        let failed = match outcome {
            PublishOutcome::Failed { draft, reason } => {
                assert!(reason.contains("boom"));
                draft
            }
            other => panic!("expected Failed, got {:?}", other),
        };
        assert_eq!(failed.status, DraftStatus::Failed);
        assert!(failed.is_publish_retryable());

        // Manual replay: same command, now with a working adapter
        let mut publishers: HashMap<Platform, Arc<dyn PublishAdapter>> = HashMap::new();
        let ok_publisher = ScriptedPublisher::ok(Platform::X);
        publishers.insert(Platform::X, ok_publisher.clone());
        let replay = Pipeline::new(
            failing.store.clone(),
            failing.pipeline.router().clone(),
            publishers,
            failing.clock.clone() as Arc<dyn Clock>,
            StyleSheet::default(),
            x_only_config(),
        );

        let outcome = replay.publish(draft_id).await.unwrap();
        assert!(matches!(outcome, PublishOutcome::Published { .. }));
    }

    #[tokio::test]
    async fn test_weekly_cap_fails_fast_before_adapter() {
        let config = PipelineConfig {
            enabled_platforms: vec![Platform::Linkedin],
            weekly_caps: WeeklyCaps {
                x: 0,
                threads: 0,
                linkedin: 1,
            },
            ..Default::default()
        };
        let h = harness_with(
            vec![ScriptedGenerator::ok("stub", "post body")],
            routing_for("stub"),
            ScriptedPublisher::ok(Platform::Linkedin),
            config,
        );

        let first = h.pipeline.ingest("u1", "first update").await.unwrap();
        let drafts = h
            .pipeline
            .draft(first.entry.id, &[Platform::Linkedin])
            .await
            .unwrap();
        h.pipeline.approve_and_publish(drafts[0].id).await.unwrap();
        assert_eq!(h.publisher.calls(), 1);

        let second = h.pipeline.ingest("u1", "second update").await.unwrap();
        let drafts = h
            .pipeline
            .draft(second.entry.id, &[Platform::Linkedin])
            .await
            .unwrap();
        h.pipeline.approve(drafts[0].id).await.unwrap();

        let outcome = h.pipeline.publish(drafts[0].id).await.unwrap();
        match outcome {
            PublishOutcome::RateLimited { draft, cap } => {
                assert_eq!(cap, 1);
                // The draft keeps its status for a later window
                assert_eq!(draft.status, DraftStatus::Approved);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
        // Adapter was never invoked for the capped attempt
        assert_eq!(h.publisher.calls(), 1);

        // A week later the cap window has rolled over
        h.clock.advance(Duration::days(8));
        let outcome = h.pipeline.publish(drafts[0].id).await.unwrap();
        assert!(matches!(outcome, PublishOutcome::Published { .. }));
    }

    #[tokio::test]
    async fn test_schedule_and_undo() {
        let h = simple_harness();
        let entry = h.pipeline.ingest("u1", "later please").await.unwrap();
        let drafts = h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();
        let draft_id = drafts[0].id;

        let at = datetime!(2025-06-02 09:00 UTC);
        let scheduled = h.pipeline.schedule(draft_id, at).await.unwrap();
        assert_eq!(scheduled.status, DraftStatus::Scheduled);
        assert_eq!(scheduled.scheduled_at, Some(at));

        let discarded = h.pipeline.undo(draft_id).await.unwrap();
        assert_eq!(discarded.status, DraftStatus::Discarded);

        // Terminal drafts cannot be undone
        let result = h.pipeline.undo(draft_id).await;
        assert!(matches!(result, Err(PipelineError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_queue_excludes_discarded_and_terminal() {
        let h = simple_harness();
        let entry = h.pipeline.ingest("u1", "queued entry").await.unwrap();
        let drafts = h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();

        let queue = h.pipeline.list_queue("u1").await.unwrap();
        assert_eq!(queue.len(), 1);

        h.pipeline.undo(drafts[0].id).await.unwrap();
        let queue = h.pipeline.list_queue("u1").await.unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_redraft_creates_new_version() {
        let h = simple_harness();
        let entry = h.pipeline.ingest("u1", "version this").await.unwrap();
        let drafts = h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();
        let first = &drafts[0];

        let second = h.pipeline.redraft(first.id).await.unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.status, DraftStatus::PendingApproval);

        let old = h.store.get_draft(first.id).await.unwrap().unwrap();
        assert_eq!(old.status, DraftStatus::Discarded);
    }

    #[tokio::test]
    async fn test_edit_truncates_to_limit() {
        let h = simple_harness();
        let entry = h.pipeline.ingest("u1", "edit me").await.unwrap();
        let drafts = h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();

        let replacement = "e".repeat(400);
        let edited = h.pipeline.edit(drafts[0].id, &replacement).await.unwrap();
        assert_eq!(edited.status, DraftStatus::PendingApproval);
        assert!(edited.char_count <= 280);
        assert!(edited.text.ends_with("..."));
        assert_eq!(edited.version, 2);
    }

    #[tokio::test]
    async fn test_dry_run_toggle_persists() {
        let h = simple_harness();
        assert!(h.pipeline.effective_dry_run().await.unwrap());

        h.pipeline.set_dry_run(false).await.unwrap();
        assert!(!h.pipeline.effective_dry_run().await.unwrap());

        h.pipeline.set_dry_run(true).await.unwrap();
        assert!(h.pipeline.effective_dry_run().await.unwrap());
    }

    #[tokio::test]
    async fn test_set_routing_persists_and_swaps() {
        let h = simple_harness();
        let candidates = vec![RouteSpec::parse("stub:stub-large").unwrap()];
        h.pipeline
            .set_routing(Stage::DraftX, candidates.clone())
            .await
            .unwrap();

        assert_eq!(
            h.pipeline.router().table().candidates(Stage::DraftX),
            candidates.as_slice()
        );
        let overrides = h.store.routing_overrides().await.unwrap();
        assert_eq!(
            overrides,
            vec![("draft_x".to_string(), vec!["stub:stub-large".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_regen_router_exhaustion_fails_validation() {
        // First generation succeeds but is too long; the shorten retry finds
        // the script exhausted and the router gives up.
        let generator = ScriptedGenerator::sequence(
            "stub",
            vec![Ok("summary".to_string()), Ok("q".repeat(400))],
        );
        let h = harness_with(
            vec![generator],
            routing_for("stub"),
            ScriptedPublisher::ok(Platform::X),
            x_only_config(),
        );

        let entry = h.pipeline.ingest("u1", "text").await.unwrap();
        let drafts = h.pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();
        assert_eq!(drafts[0].status, DraftStatus::Failed);
        assert!(
            drafts[0]
                .failure_reason
                .as_deref()
                .unwrap()
                .contains("validation_exceeded")
        );
    }
}
