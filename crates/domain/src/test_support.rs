//! Shared fakes for use-case tests

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::model::{
    Draft, Entry, Generation, NewDraft, NewEntry, Platform, UsageRecord, UsageSummary,
};
use crate::ports::{
    Clock, DraftStore, GenerateError, GenerationRequest, PublishAdapter, PublishError,
    PublishReceipt, StoreError, TextGenerator,
};

/// In-memory DraftStore fake honoring the same contracts as the SQLite store
pub struct MemStore {
    inner: Mutex<MemStoreInner>,
}

#[derive(Default)]
struct MemStoreInner {
    entries: Vec<Entry>,
    drafts: Vec<Draft>,
    usage: Vec<UsageRecord>,
    settings: HashMap<String, String>,
    routing: HashMap<String, Vec<String>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemStoreInner::default()),
        }
    }

    pub fn usage_records(&self) -> Vec<UsageRecord> {
        self.inner.lock().unwrap().usage.clone()
    }

    pub fn drafts(&self) -> Vec<Draft> {
        self.inner.lock().unwrap().drafts.clone()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DraftStore for MemStore {
    async fn insert_entry(&self, entry: &NewEntry) -> Result<Entry, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .entries
            .iter()
            .any(|e| e.user_id == entry.user_id && e.content_hash == entry.content_hash)
        {
            return Err(StoreError::Duplicate);
        }
        let id = inner.entries.len() as i64 + 1;
        let stored = Entry {
            id,
            user_id: entry.user_id.clone(),
            raw_text: entry.raw_text.clone(),
            content_hash: entry.content_hash.clone(),
            visibility: entry.visibility,
            strict: entry.strict,
            created_at: entry.created_at,
        };
        inner.entries.push(stored.clone());
        Ok(stored)
    }

    async fn get_entry(&self, id: i64) -> Result<Option<Entry>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn latest_entry_for_user(&self, user_id: &str) -> Result<Option<Entry>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .max_by_key(|e| e.id)
            .cloned())
    }

    async fn create_draft(&self, draft: &NewDraft) -> Result<Draft, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.drafts.len() as i64 + 1;
        let version = inner
            .drafts
            .iter()
            .filter(|d| d.entry_id == draft.entry_id && d.platform == draft.platform)
            .map(|d| d.version)
            .max()
            .unwrap_or(0)
            + 1;
        let stored = Draft {
            id,
            entry_id: draft.entry_id,
            platform: draft.platform,
            status: draft.status,
            text: String::new(),
            char_count: 0,
            version,
            generating_provider: None,
            generating_model: None,
            summarizing_provider: None,
            summarizing_model: None,
            failure_reason: None,
            publish_success: None,
            external_id: None,
            scheduled_at: None,
            published_at: None,
            created_at: draft.created_at,
            updated_at: draft.created_at,
        };
        inner.drafts.push(stored.clone());
        Ok(stored)
    }

    async fn get_draft(&self, id: i64) -> Result<Option<Draft>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .drafts
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn update_draft(&self, draft: &Draft) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.drafts.iter_mut().find(|d| d.id == draft.id) {
            Some(slot) => {
                *slot = draft.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("draft {}", draft.id))),
        }
    }

    async fn list_queue(&self, user_id: &str) -> Result<Vec<Draft>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let entry_ids: Vec<i64> = inner
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.id)
            .collect();
        Ok(inner
            .drafts
            .iter()
            .filter(|d| entry_ids.contains(&d.entry_id))
            .filter(|d| {
                matches!(
                    d.status,
                    crate::model::DraftStatus::PendingApproval
                        | crate::model::DraftStatus::Approved
                        | crate::model::DraftStatus::Scheduled
                )
            })
            .cloned()
            .collect())
    }

    async fn list_due_scheduled(&self, now: OffsetDateTime) -> Result<Vec<Draft>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut due: Vec<Draft> = inner
            .drafts
            .iter()
            .filter(|d| d.status == crate::model::DraftStatus::Scheduled)
            .filter(|d| d.scheduled_at.is_some_and(|at| at <= now))
            .cloned()
            .collect();
        due.sort_by_key(|d| (d.scheduled_at, d.id));
        Ok(due)
    }

    async fn log_usage(&self, record: &UsageRecord) -> Result<(), StoreError> {
        self.inner.lock().unwrap().usage.push(record.clone());
        Ok(())
    }

    async fn usage_summary(&self) -> Result<UsageSummary, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut summary = UsageSummary::default();
        for record in &inner.usage {
            summary.calls += 1;
            if !record.succeeded {
                summary.failures += 1;
            }
            summary.input_tokens += record.input_tokens;
            summary.output_tokens += record.output_tokens;
            summary.cost_usd += record.cost_usd;
        }
        Ok(summary)
    }

    async fn count_published_since(
        &self,
        platform: Platform,
        since: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .drafts
            .iter()
            .filter(|d| d.platform == platform)
            .filter(|d| d.status == crate::model::DraftStatus::Published)
            .filter(|d| d.published_at.is_some_and(|at| at >= since))
            .count() as i64)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().unwrap().settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn routing_overrides(&self) -> Result<Vec<(String, Vec<String>)>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut overrides: Vec<_> = inner
            .routing
            .iter()
            .map(|(stage, routes)| (stage.clone(), routes.clone()))
            .collect();
        overrides.sort();
        Ok(overrides)
    }

    async fn set_routing_override(
        &self,
        stage: &str,
        routes: &[String],
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .routing
            .insert(stage.to_string(), routes.to_vec());
        Ok(())
    }
}

enum Script {
    AlwaysOk(String),
    AlwaysFail,
    Sequence(Mutex<VecDeque<Result<String, GenerateError>>>),
}

/// TextGenerator fake with a fixed or scripted response sequence
pub struct ScriptedGenerator {
    name: String,
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn ok(name: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Script::AlwaysOk(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Script::AlwaysFail,
            calls: AtomicUsize::new(0),
        })
    }

    /// Responses are consumed in order; once drained, calls fail
    pub fn sequence(name: &str, responses: Vec<Result<String, GenerateError>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Script::Sequence(Mutex::new(responses.into())),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = match &self.script {
            Script::AlwaysOk(text) => text.clone(),
            Script::AlwaysFail => return Err(GenerateError::Api("scripted failure".to_string())),
            Script::Sequence(queue) => {
                let next = queue.lock().unwrap().pop_front();
                match next {
                    Some(Ok(text)) => text,
                    Some(Err(error)) => return Err(error),
                    None => return Err(GenerateError::Api("script exhausted".to_string())),
                }
            }
        };
        Ok(Generation {
            text,
            provider: self.name.clone(),
            model: request.model.clone(),
            input_tokens: 10,
            output_tokens: 5,
        })
    }
}

/// PublishAdapter fake counting invocations
pub struct ScriptedPublisher {
    platform: Platform,
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedPublisher {
    pub fn ok(platform: Platform) -> Arc<Self> {
        Arc::new(Self {
            platform,
            fail_with: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(platform: Platform, reason: &str) -> Arc<Self> {
        Arc::new(Self {
            platform,
            fail_with: Some(reason.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublishAdapter for ScriptedPublisher {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn publish(&self, _text: &str, dry_run: bool) -> Result<PublishReceipt, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(reason) => Err(PublishError::Api(reason.clone())),
            None => Ok(PublishReceipt {
                external_id: format!("fake-{}", self.platform),
                url: None,
                dry_run,
            }),
        }
    }
}

/// Clock fake with an adjustable current time
pub struct FixedClock {
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    pub fn at(now: OffsetDateTime) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance(&self, by: time::Duration) {
        let mut guard = self.now.lock().unwrap();
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}
