//! SQLite draft store implementation

use async_trait::async_trait;
use draftsmith_domain::{
    Draft, DraftStatus, DraftStore, Entry, NewDraft, NewEntry, Platform, Stage, StoreError,
    UsageRecord, UsageSummary, Visibility,
};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

/// SQLite-backed draft store
pub struct SqliteDraftStore {
    pool: SqlitePool,
}

impl SqliteDraftStore {
    /// Open (creating if needed) the database at the given path
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                raw_text TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                visibility TEXT NOT NULL DEFAULT 'public',
                strict INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE(user_id, content_hash)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS drafts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entry_id INTEGER NOT NULL,
                platform TEXT NOT NULL,
                status TEXT NOT NULL,
                text TEXT NOT NULL DEFAULT '',
                char_count INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 1,
                generating_provider TEXT,
                generating_model TEXT,
                summarizing_provider TEXT,
                summarizing_model TEXT,
                failure_reason TEXT,
                publish_success INTEGER,
                external_id TEXT,
                scheduled_at TEXT,
                published_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY(entry_id) REFERENCES entries(id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS usage_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stage TEXT NOT NULL,
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                input_tokens INTEGER NOT NULL DEFAULT 0,
                output_tokens INTEGER NOT NULL DEFAULT 0,
                latency_ms INTEGER NOT NULL DEFAULT 0,
                cost_usd REAL NOT NULL DEFAULT 0,
                succeeded INTEGER NOT NULL,
                error_kind TEXT,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS routing_overrides (
                stage TEXT PRIMARY KEY,
                routes TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS global_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_entries_user ON entries(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_drafts_entry ON drafts(entry_id)",
            "CREATE INDEX IF NOT EXISTS idx_drafts_status ON drafts(status)",
            "CREATE INDEX IF NOT EXISTS idx_usage_stage ON usage_log(stage, created_at)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        Ok(())
    }
}

/// Format timestamps as second-precision UTC RFC3339 so stored strings order
/// lexicographically the same as chronologically (the due/window queries
/// compare them as text).
fn fmt_ts(t: OffsetDateTime) -> Result<String, StoreError> {
    t.to_offset(UtcOffset::UTC)
        .replace_nanosecond(0)
        .map_err(|e| StoreError::Serialization(e.to_string()))?
        .format(&Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_ts(s: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_opt_ts(s: Option<String>) -> Result<Option<OffsetDateTime>, StoreError> {
    s.as_deref().map(parse_ts).transpose()
}

fn entry_from_row(row: &SqliteRow) -> Result<Entry, StoreError> {
    let visibility: String = get(row, "visibility")?;
    let created_at: String = get(row, "created_at")?;
    Ok(Entry {
        id: get(row, "id")?,
        user_id: get(row, "user_id")?,
        raw_text: get(row, "raw_text")?,
        content_hash: get(row, "content_hash")?,
        visibility: visibility
            .parse::<Visibility>()
            .map_err(StoreError::Serialization)?,
        strict: get(row, "strict")?,
        created_at: parse_ts(&created_at)?,
    })
}

fn draft_from_row(row: &SqliteRow) -> Result<Draft, StoreError> {
    let platform: String = get(row, "platform")?;
    let status: String = get(row, "status")?;
    let scheduled_at: Option<String> = get(row, "scheduled_at")?;
    let published_at: Option<String> = get(row, "published_at")?;
    let created_at: String = get(row, "created_at")?;
    let updated_at: String = get(row, "updated_at")?;
    Ok(Draft {
        id: get(row, "id")?,
        entry_id: get(row, "entry_id")?,
        platform: platform
            .parse::<Platform>()
            .map_err(StoreError::Serialization)?,
        status: status
            .parse::<DraftStatus>()
            .map_err(StoreError::Serialization)?,
        text: get(row, "text")?,
        char_count: get(row, "char_count")?,
        version: get(row, "version")?,
        generating_provider: get(row, "generating_provider")?,
        generating_model: get(row, "generating_model")?,
        summarizing_provider: get(row, "summarizing_provider")?,
        summarizing_model: get(row, "summarizing_model")?,
        failure_reason: get(row, "failure_reason")?,
        publish_success: get(row, "publish_success")?,
        external_id: get(row, "external_id")?,
        scheduled_at: parse_opt_ts(scheduled_at)?,
        published_at: parse_opt_ts(published_at)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn get<'r, T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>>(
    row: &'r SqliteRow,
    column: &str,
) -> Result<T, StoreError> {
    row.try_get(column)
        .map_err(|e| StoreError::Database(format!("column {}: {}", column, e)))
}

#[async_trait]
impl DraftStore for SqliteDraftStore {
    async fn insert_entry(&self, entry: &NewEntry) -> Result<Entry, StoreError> {
        let created_at = fmt_ts(entry.created_at)?;

        let result = sqlx::query(
            r#"
            INSERT INTO entries (user_id, raw_text, content_hash, visibility, strict, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.user_id)
        .bind(&entry.raw_text)
        .bind(&entry.content_hash)
        .bind(entry.visibility.as_str())
        .bind(entry.strict)
        .bind(&created_at)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(sqlx::Error::Database(db))
                if db.kind() == sqlx::error::ErrorKind::UniqueViolation =>
            {
                return Err(StoreError::Duplicate);
            }
            Err(e) => return Err(StoreError::Database(e.to_string())),
        };

        let id = result.last_insert_rowid();
        self.get_entry(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("entry {}", id)))
    }

    async fn get_entry(&self, id: i64) -> Result<Option<Entry>, StoreError> {
        let row = sqlx::query("SELECT * FROM entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn latest_entry_for_user(&self, user_id: &str) -> Result<Option<Entry>, StoreError> {
        let row = sqlx::query("SELECT * FROM entries WHERE user_id = ? ORDER BY id DESC LIMIT 1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn create_draft(&self, draft: &NewDraft) -> Result<Draft, StoreError> {
        let created_at = fmt_ts(draft.created_at)?;

        let version: (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM drafts WHERE entry_id = ? AND platform = ?",
        )
        .bind(draft.entry_id)
        .bind(draft.platform.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO drafts (entry_id, platform, status, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(draft.entry_id)
        .bind(draft.platform.as_str())
        .bind(draft.status.as_str())
        .bind(version.0)
        .bind(&created_at)
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_draft(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("draft {}", id)))
    }

    async fn get_draft(&self, id: i64) -> Result<Option<Draft>, StoreError> {
        let row = sqlx::query("SELECT * FROM drafts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        row.as_ref().map(draft_from_row).transpose()
    }

    async fn update_draft(&self, draft: &Draft) -> Result<(), StoreError> {
        let scheduled_at = draft.scheduled_at.map(fmt_ts).transpose()?;
        let published_at = draft.published_at.map(fmt_ts).transpose()?;
        let updated_at = fmt_ts(draft.updated_at)?;

        let result = sqlx::query(
            r#"
            UPDATE drafts SET
                status = ?,
                text = ?,
                char_count = ?,
                generating_provider = ?,
                generating_model = ?,
                summarizing_provider = ?,
                summarizing_model = ?,
                failure_reason = ?,
                publish_success = ?,
                external_id = ?,
                scheduled_at = ?,
                published_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(draft.status.as_str())
        .bind(&draft.text)
        .bind(draft.char_count)
        .bind(&draft.generating_provider)
        .bind(&draft.generating_model)
        .bind(&draft.summarizing_provider)
        .bind(&draft.summarizing_model)
        .bind(&draft.failure_reason)
        .bind(draft.publish_success)
        .bind(&draft.external_id)
        .bind(&scheduled_at)
        .bind(&published_at)
        .bind(&updated_at)
        .bind(draft.id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("draft {}", draft.id)));
        }
        Ok(())
    }

    async fn list_queue(&self, user_id: &str) -> Result<Vec<Draft>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT d.* FROM drafts d
            JOIN entries e ON e.id = d.entry_id
            WHERE e.user_id = ?
              AND d.status IN ('pending_approval', 'approved', 'scheduled')
            ORDER BY d.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.iter().map(draft_from_row).collect()
    }

    async fn list_due_scheduled(&self, now: OffsetDateTime) -> Result<Vec<Draft>, StoreError> {
        let now = fmt_ts(now)?;
        let rows = sqlx::query(
            r#"
            SELECT * FROM drafts
            WHERE status = 'scheduled'
              AND scheduled_at IS NOT NULL
              AND scheduled_at <= ?
            ORDER BY scheduled_at, id
            "#,
        )
        .bind(&now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.iter().map(draft_from_row).collect()
    }

    async fn log_usage(&self, record: &UsageRecord) -> Result<(), StoreError> {
        let created_at = fmt_ts(record.created_at)?;

        sqlx::query(
            r#"
            INSERT INTO usage_log
                (stage, provider, model, input_tokens, output_tokens,
                 latency_ms, cost_usd, succeeded, error_kind, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.stage.as_str())
        .bind(&record.provider)
        .bind(&record.model)
        .bind(record.input_tokens)
        .bind(record.output_tokens)
        .bind(record.latency_ms)
        .bind(record.cost_usd)
        .bind(record.succeeded)
        .bind(&record.error_kind)
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn usage_summary(&self) -> Result<UsageSummary, StoreError> {
        let row: (i64, i64, i64, i64, f64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN succeeded = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(input_tokens), 0),
                COALESCE(SUM(output_tokens), 0),
                COALESCE(SUM(cost_usd), 0.0)
            FROM usage_log
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(UsageSummary {
            calls: row.0,
            failures: row.1,
            input_tokens: row.2,
            output_tokens: row.3,
            cost_usd: row.4,
        })
    }

    async fn count_published_since(
        &self,
        platform: Platform,
        since: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        let since = fmt_ts(since)?;
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM drafts
            WHERE platform = ?
              AND status = 'published'
              AND published_at IS NOT NULL
              AND published_at >= ?
            "#,
        )
        .bind(platform.as_str())
        .bind(&since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(count.0)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM global_settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(row.map(|(value,)| value))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO global_settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn routing_overrides(&self) -> Result<Vec<(String, Vec<String>)>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT stage, routes FROM routing_overrides ORDER BY stage")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut overrides = Vec::with_capacity(rows.len());
        for (stage, routes_json) in rows {
            match serde_json::from_str::<Vec<String>>(&routes_json) {
                Ok(routes) => overrides.push((stage, routes)),
                Err(error) => {
                    tracing::warn!(
                        stage = %stage,
                        error = %error,
                        "Skipping unreadable routing override row"
                    );
                }
            }
        }
        Ok(overrides)
    }

    async fn set_routing_override(
        &self,
        stage: &str,
        routes: &[String],
    ) -> Result<(), StoreError> {
        // Validate the stage label so garbage never lands in the table
        stage
            .parse::<Stage>()
            .map_err(StoreError::Serialization)?;

        let routes_json =
            serde_json::to_string(routes).map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO routing_overrides (stage, routes) VALUES (?, ?)
            ON CONFLICT(stage) DO UPDATE SET routes = excluded.routes
            "#,
        )
        .bind(stage)
        .bind(&routes_json)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    fn new_entry(user_id: &str, text: &str) -> NewEntry {
        NewEntry {
            user_id: user_id.to_string(),
            raw_text: text.to_string(),
            content_hash: draftsmith_domain::content_hash(text),
            visibility: Visibility::Public,
            strict: false,
            created_at: datetime!(2025-06-01 12:00 UTC),
        }
    }

    async fn entry_with_draft(store: &SqliteDraftStore, user_id: &str, text: &str) -> Draft {
        let entry = store.insert_entry(&new_entry(user_id, text)).await.unwrap();
        store
            .create_draft(&NewDraft {
                entry_id: entry.id,
                platform: Platform::X,
                status: DraftStatus::PendingSummary,
                created_at: datetime!(2025-06-01 12:00 UTC),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_entry_unique_constraint_per_user() {
        let store = SqliteDraftStore::in_memory().await.unwrap();

        store.insert_entry(&new_entry("u1", "hello")).await.unwrap();
        let duplicate = store.insert_entry(&new_entry("u1", "hello")).await;
        assert!(matches!(duplicate, Err(StoreError::Duplicate)));

        // Another user may store the same content
        assert!(store.insert_entry(&new_entry("u2", "hello")).await.is_ok());
    }

    #[tokio::test]
    async fn test_entry_roundtrip() {
        let store = SqliteDraftStore::in_memory().await.unwrap();

        let inserted = store
            .insert_entry(&NewEntry {
                strict: true,
                visibility: Visibility::Private,
                ..new_entry("u1", "private note")
            })
            .await
            .unwrap();

        let fetched = store.get_entry(inserted.id).await.unwrap().unwrap();
        assert_eq!(fetched.raw_text, "private note");
        assert_eq!(fetched.visibility, Visibility::Private);
        assert!(fetched.strict);
        assert_eq!(fetched.created_at, datetime!(2025-06-01 12:00 UTC));

        let latest = store.latest_entry_for_user("u1").await.unwrap().unwrap();
        assert_eq!(latest.id, inserted.id);
    }

    #[tokio::test]
    async fn test_draft_versions_increment_per_platform() {
        let store = SqliteDraftStore::in_memory().await.unwrap();
        let entry = store.insert_entry(&new_entry("u1", "text")).await.unwrap();

        let new_draft = |platform| NewDraft {
            entry_id: entry.id,
            platform,
            status: DraftStatus::PendingSummary,
            created_at: datetime!(2025-06-01 12:00 UTC),
        };

        let first = store.create_draft(&new_draft(Platform::X)).await.unwrap();
        let second = store.create_draft(&new_draft(Platform::X)).await.unwrap();
        let other = store
            .create_draft(&new_draft(Platform::Linkedin))
            .await
            .unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(other.version, 1);
    }

    #[tokio::test]
    async fn test_draft_update_roundtrip() {
        let store = SqliteDraftStore::in_memory().await.unwrap();
        let mut draft = entry_with_draft(&store, "u1", "text").await;

        draft.status = DraftStatus::PendingApproval;
        draft.text = "generated".to_string();
        draft.char_count = 9;
        draft.generating_provider = Some("anthropic".to_string());
        draft.generating_model = Some("claude-haiku-4-5".to_string());
        draft.scheduled_at = Some(datetime!(2025-06-02 09:00 UTC));
        draft.updated_at = datetime!(2025-06-01 12:05 UTC);
        store.update_draft(&draft).await.unwrap();

        let fetched = store.get_draft(draft.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DraftStatus::PendingApproval);
        assert_eq!(fetched.text, "generated");
        assert_eq!(fetched.generating_provider.as_deref(), Some("anthropic"));
        assert_eq!(fetched.scheduled_at, Some(datetime!(2025-06-02 09:00 UTC)));
    }

    #[tokio::test]
    async fn test_update_missing_draft_is_not_found() {
        let store = SqliteDraftStore::in_memory().await.unwrap();
        let mut draft = entry_with_draft(&store, "u1", "text").await;
        draft.id = 999;
        let result = store.update_draft(&draft).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_queue_filters_status_and_user() {
        let store = SqliteDraftStore::in_memory().await.unwrap();

        let mut mine = entry_with_draft(&store, "u1", "mine").await;
        mine.status = DraftStatus::PendingApproval;
        store.update_draft(&mine).await.unwrap();

        let mut discarded = {
            let entry = store.insert_entry(&new_entry("u1", "discarded")).await.unwrap();
            store
                .create_draft(&NewDraft {
                    entry_id: entry.id,
                    platform: Platform::X,
                    status: DraftStatus::PendingSummary,
                    created_at: datetime!(2025-06-01 12:00 UTC),
                })
                .await
                .unwrap()
        };
        discarded.status = DraftStatus::Discarded;
        store.update_draft(&discarded).await.unwrap();

        let mut theirs = entry_with_draft(&store, "u2", "theirs").await;
        theirs.status = DraftStatus::Approved;
        store.update_draft(&theirs).await.unwrap();

        let queue = store.list_queue("u1").await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, mine.id);
    }

    #[tokio::test]
    async fn test_due_scheduled_boundary_and_order() {
        let store = SqliteDraftStore::in_memory().await.unwrap();
        let now = datetime!(2025-06-02 09:00 UTC);

        let mut later = entry_with_draft(&store, "u1", "later").await;
        later.status = DraftStatus::Scheduled;
        later.scheduled_at = Some(now + Duration::minutes(1));
        store.update_draft(&later).await.unwrap();

        let mut exactly_due = entry_with_draft(&store, "u1", "exact").await;
        exactly_due.status = DraftStatus::Scheduled;
        exactly_due.scheduled_at = Some(now);
        store.update_draft(&exactly_due).await.unwrap();

        let mut earlier = entry_with_draft(&store, "u1", "early").await;
        earlier.status = DraftStatus::Scheduled;
        earlier.scheduled_at = Some(now - Duration::hours(1));
        store.update_draft(&earlier).await.unwrap();

        let due = store.list_due_scheduled(now).await.unwrap();
        assert_eq!(
            due.iter().map(|d| d.id).collect::<Vec<_>>(),
            vec![earlier.id, exactly_due.id]
        );
    }

    #[tokio::test]
    async fn test_usage_log_and_summary() {
        let store = SqliteDraftStore::in_memory().await.unwrap();

        store
            .log_usage(&UsageRecord {
                stage: Stage::Summarize,
                provider: "anthropic".to_string(),
                model: "claude-haiku-4-5".to_string(),
                input_tokens: 100,
                output_tokens: 20,
                latency_ms: 350,
                cost_usd: 0.0002,
                succeeded: true,
                error_kind: None,
                created_at: datetime!(2025-06-01 12:00 UTC),
            })
            .await
            .unwrap();

        store
            .log_usage(&UsageRecord {
                stage: Stage::DraftX,
                provider: "openai".to_string(),
                model: "gpt-5.2".to_string(),
                input_tokens: 0,
                output_tokens: 0,
                latency_ms: 30000,
                cost_usd: 0.0,
                succeeded: false,
                error_kind: Some("timeout".to_string()),
                created_at: datetime!(2025-06-01 12:01 UTC),
            })
            .await
            .unwrap();

        let summary = store.usage_summary().await.unwrap();
        assert_eq!(summary.calls, 2);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.input_tokens, 100);
        assert_eq!(summary.output_tokens, 20);
        assert!((summary.cost_usd - 0.0002).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_count_published_since_window() {
        let store = SqliteDraftStore::in_memory().await.unwrap();
        let now = datetime!(2025-06-10 12:00 UTC);

        let mut recent = entry_with_draft(&store, "u1", "recent").await;
        recent.status = DraftStatus::Published;
        recent.published_at = Some(now - Duration::days(2));
        store.update_draft(&recent).await.unwrap();

        let mut old = entry_with_draft(&store, "u1", "old").await;
        old.status = DraftStatus::Published;
        old.published_at = Some(now - Duration::days(10));
        store.update_draft(&old).await.unwrap();

        let count = store
            .count_published_since(Platform::X, now - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let count = store
            .count_published_since(Platform::Linkedin, now - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_settings_upsert() {
        let store = SqliteDraftStore::in_memory().await.unwrap();

        assert_eq!(store.get_setting("dry_run").await.unwrap(), None);
        store.set_setting("dry_run", "false").await.unwrap();
        assert_eq!(
            store.get_setting("dry_run").await.unwrap().as_deref(),
            Some("false")
        );
        store.set_setting("dry_run", "true").await.unwrap();
        assert_eq!(
            store.get_setting("dry_run").await.unwrap().as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_routing_override_roundtrip() {
        let store = SqliteDraftStore::in_memory().await.unwrap();

        store
            .set_routing_override(
                "summarize",
                &["openai:gpt-5-mini".to_string(), "stub:stub-small".to_string()],
            )
            .await
            .unwrap();
        store
            .set_routing_override("summarize", &["anthropic:claude-haiku-4-5".to_string()])
            .await
            .unwrap();

        let overrides = store.routing_overrides().await.unwrap();
        assert_eq!(
            overrides,
            vec![(
                "summarize".to_string(),
                vec!["anthropic:claude-haiku-4-5".to_string()]
            )]
        );

        // Unknown stage labels are rejected before they are persisted
        let result = store.set_routing_override("bogus_stage", &[]).await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
