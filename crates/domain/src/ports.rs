//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{
    Draft, Entry, Generation, NewDraft, NewEntry, Platform, Stage, UsageRecord, UsageSummary,
};

/// Error type for LLM provider calls, classified for usage logging
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("API error: {0}")]
    Api(String),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited")]
    RateLimited,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl GenerateError {
    /// Stable kind tag persisted in the usage log
    pub fn kind(&self) -> &'static str {
        match self {
            GenerateError::Api(_) => "api",
            GenerateError::Timeout => "timeout",
            GenerateError::RateLimited => "rate_limited",
            GenerateError::Auth(_) => "auth",
            GenerateError::MalformedResponse(_) => "malformed_response",
            GenerateError::Unavailable(_) => "unavailable",
        }
    }
}

/// One prompt dispatched to a provider; the model comes from the route
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub stage: Stage,
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Port for one LLM backend capability.
///
/// Implementations own their HTTP client and its bounded timeout; the router
/// treats a timeout like any other candidate failure.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name as referenced by routing entries (e.g. "anthropic")
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerateError>;
}

/// Error type for publish adapter operations
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("API error: {0}")]
    Api(String),
    #[error("rate limited")]
    RateLimited,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Result of a successful publish operation
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// Platform-assigned post id, or a synthetic id in dry-run mode
    pub external_id: String,
    /// URL to the published content, if the platform reports one
    pub url: Option<String>,
    pub dry_run: bool,
}

/// Port for publishing a finished draft to one platform.
///
/// With `dry_run` set, implementations must simulate success deterministically
/// with a synthetic external id and no network call.
#[async_trait]
pub trait PublishAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    async fn publish(&self, text: &str, dry_run: bool) -> Result<PublishReceipt, PublishError>;
}

/// Error type for the persistent store
#[derive(Debug, Error)]
pub enum StoreError {
    /// `(user_id, content_hash)` already exists; terminal and user-visible
    #[error("entry already captured")]
    Duplicate,
    #[error("database error: {0}")]
    Database(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Port for the persistent store: the single source of truth for entries,
/// drafts, usage, routing overrides, and runtime settings.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Insert an entry; the `(user_id, content_hash)` uniqueness is enforced
    /// by the storage layer, closing the race between concurrent identical
    /// submissions. Returns [`StoreError::Duplicate`] on conflict.
    async fn insert_entry(&self, entry: &NewEntry) -> Result<Entry, StoreError>;

    async fn get_entry(&self, id: i64) -> Result<Option<Entry>, StoreError>;

    async fn latest_entry_for_user(&self, user_id: &str) -> Result<Option<Entry>, StoreError>;

    /// Create a draft row; the store assigns the id and the next version
    /// number for the (entry, platform) pair.
    async fn create_draft(&self, draft: &NewDraft) -> Result<Draft, StoreError>;

    async fn get_draft(&self, id: i64) -> Result<Option<Draft>, StoreError>;

    /// Persist all mutable fields of a draft (last-writer-wins row update)
    async fn update_draft(&self, draft: &Draft) -> Result<(), StoreError>;

    /// Drafts awaiting action for a user: pending approval, approved, scheduled
    async fn list_queue(&self, user_id: &str) -> Result<Vec<Draft>, StoreError>;

    /// Scheduled drafts with `scheduled_at <= now`, oldest first
    async fn list_due_scheduled(&self, now: OffsetDateTime) -> Result<Vec<Draft>, StoreError>;

    async fn log_usage(&self, record: &UsageRecord) -> Result<(), StoreError>;

    async fn usage_summary(&self) -> Result<UsageSummary, StoreError>;

    /// Count drafts published to a platform since the given instant
    /// (weekly-cap window check)
    async fn count_published_since(
        &self,
        platform: Platform,
        since: OffsetDateTime,
    ) -> Result<i64, StoreError>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Persisted routing overrides as raw (stage, routes) strings; parsing
    /// and validation happen at load time so malformed rows degrade to a
    /// warning, not a failure.
    async fn routing_overrides(&self) -> Result<Vec<(String, Vec<String>)>, StoreError>;

    async fn set_routing_override(
        &self,
        stage: &str,
        routes: &[String],
    ) -> Result<(), StoreError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
