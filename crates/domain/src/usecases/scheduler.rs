//! Scheduler: bounded batch over currently-due scheduled drafts
//!
//! Designed for a periodic external trigger, not a long-lived loop. Safe to
//! re-run frequently: already-published and failed drafts fall out of the
//! status filter, so idempotence holds by construction.

use crate::ports::DraftStore;
use crate::usecases::pipeline::{Pipeline, PipelineError, PublishOutcome};

impl<S: DraftStore + ?Sized> Pipeline<S> {
    /// Publish every scheduled draft whose `scheduled_at` has passed.
    ///
    /// Each draft goes through the full publish transition (weekly cap,
    /// dry-run resolution, adapter dispatch, outcome persistence), strictly
    /// sequentially.
    pub async fn run_due(&self) -> Result<Vec<PublishOutcome>, PipelineError> {
        let now = self.clock().now();
        let due = self.store().list_due_scheduled(now).await?;

        if due.is_empty() {
            tracing::debug!("No scheduled drafts due");
            return Ok(vec![]);
        }

        tracing::info!(count = due.len(), "Publishing due scheduled drafts");

        let mut outcomes = Vec::with_capacity(due.len());
        for draft in due {
            outcomes.push(self.publish(draft.id).await?);
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DraftStatus, Platform, RouteSpec, RoutingTable, Stage};
    use crate::ports::{Clock, PublishAdapter};
    use crate::test_support::{FixedClock, MemStore, ScriptedGenerator, ScriptedPublisher};
    use crate::usecases::pipeline::PipelineConfig;
    use crate::usecases::router::{ProviderRouter, RouterConfig};
    use crate::StyleSheet;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;
    use time::Duration;
    use time::macros::datetime;

    fn build(
        publisher: Arc<ScriptedPublisher>,
    ) -> (Pipeline<MemStore>, Arc<FixedClock>, Arc<MemStore>) {
        let store = Arc::new(MemStore::new());
        let clock = FixedClock::at(datetime!(2025-06-01 08:00 UTC));

        let generator = ScriptedGenerator::ok("stub", "scheduled post");
        let mut table = BTreeMap::new();
        for stage in Stage::ALL {
            table.insert(stage, vec![RouteSpec::parse("stub:stub-small").unwrap()]);
        }
        let providers = HashMap::from([(
            "stub".to_string(),
            generator as Arc<dyn crate::ports::TextGenerator>,
        )]);
        let router = Arc::new(ProviderRouter::new(
            providers,
            RoutingTable::new(table),
            store.clone(),
            clock.clone() as Arc<dyn Clock>,
            RouterConfig::default(),
            HashMap::new(),
        ));

        let mut publishers: HashMap<Platform, Arc<dyn PublishAdapter>> = HashMap::new();
        publishers.insert(publisher.platform(), publisher);

        let config = PipelineConfig {
            enabled_platforms: vec![Platform::X],
            ..Default::default()
        };
        let pipeline = Pipeline::new(
            store.clone(),
            router,
            publishers,
            clock.clone() as Arc<dyn Clock>,
            StyleSheet::default(),
            config,
        );
        (pipeline, clock, store)
    }

    async fn scheduled_draft(pipeline: &Pipeline<MemStore>, text: &str, at: time::OffsetDateTime) -> i64 {
        let entry = pipeline.ingest("u1", text).await.unwrap();
        let drafts = pipeline.draft(entry.entry.id, &[Platform::X]).await.unwrap();
        let draft = pipeline.schedule(drafts[0].id, at).await.unwrap();
        draft.id
    }

    #[tokio::test]
    async fn test_run_due_publishes_only_due_drafts() {
        let publisher = ScriptedPublisher::ok(Platform::X);
        let (pipeline, clock, store) = build(publisher.clone());

        let due_id =
            scheduled_draft(&pipeline, "due entry", datetime!(2025-06-01 07:00 UTC)).await;
        let future_id =
            scheduled_draft(&pipeline, "future entry", datetime!(2025-06-03 07:00 UTC)).await;

        let outcomes = pipeline.run_due().await.unwrap();
        assert_eq!(outcomes.len(), 1);

        let due = store.get_draft(due_id).await.unwrap().unwrap();
        assert_eq!(due.status, DraftStatus::Published);

        let future = store.get_draft(future_id).await.unwrap().unwrap();
        assert_eq!(future.status, DraftStatus::Scheduled);

        // The future draft becomes due once the clock passes it
        clock.advance(Duration::days(3));
        let outcomes = pipeline.run_due().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(publisher.calls(), 2);
    }

    #[tokio::test]
    async fn test_run_due_is_idempotent() {
        let publisher = ScriptedPublisher::ok(Platform::X);
        let (pipeline, _clock, _store) = build(publisher.clone());

        scheduled_draft(&pipeline, "only entry", datetime!(2025-06-01 07:00 UTC)).await;

        let first = pipeline.run_due().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(publisher.calls(), 1);

        // Re-running with no time elapsed and no new schedules publishes
        // nothing further
        let second = pipeline.run_due().await.unwrap();
        assert!(second.is_empty());
        assert_eq!(publisher.calls(), 1);
    }

    #[tokio::test]
    async fn test_run_due_failed_publish_not_retried() {
        let publisher = ScriptedPublisher::failing(Platform::X, "outage");
        let (pipeline, _clock, store) = build(publisher.clone());

        let id = scheduled_draft(&pipeline, "doomed entry", datetime!(2025-06-01 07:00 UTC)).await;

        let outcomes = pipeline.run_due().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        let draft = store.get_draft(id).await.unwrap().unwrap();
        assert_eq!(draft.status, DraftStatus::Failed);

        // Failed drafts drop out of the due set; no automatic retry
        let outcomes = pipeline.run_due().await.unwrap();
        assert!(outcomes.is_empty());
        assert_eq!(publisher.calls(), 1);
    }
}
