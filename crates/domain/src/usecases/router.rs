//! Provider router: ordered candidate fallback with per-attempt usage logging
//!
//! Resolves the candidate list for a stage from the routing snapshot, tries
//! each (provider, model) strictly in order, and returns the first success.
//! Every attempt is logged as a usage row; only exhaustion propagates.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use thiserror::Error;

use crate::model::{Generation, RouteSpec, RoutingTable, Stage, UsageRecord};
use crate::ports::{Clock, DraftStore, GenerationRequest, TextGenerator};

/// Generation parameters shared by all router calls
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_tokens: 700,
        }
    }
}

/// Per-1k-token pricing for one "provider:model" pair
#[derive(Debug, Clone, Copy, Default)]
pub struct Pricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// One candidate that was tried and failed
#[derive(Debug, Clone)]
pub struct CandidateFailure {
    pub route: String,
    pub error: String,
}

/// All candidates for a stage failed (or none were configured)
#[derive(Debug, Error)]
#[error("all provider routes failed for stage {stage}: [{}]", format_failures(.failures))]
pub struct RouterExhausted {
    pub stage: Stage,
    pub failures: Vec<CandidateFailure>,
}

fn format_failures(failures: &[CandidateFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.route, f.error))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Stage-based provider router over a polymorphic set of generators.
///
/// The routing table is an immutable snapshot behind an atomic swap: in-flight
/// calls keep the snapshot they started with, and runtime overrides replace it
/// wholesale.
pub struct ProviderRouter<S: DraftStore + ?Sized> {
    providers: HashMap<String, Arc<dyn TextGenerator>>,
    table: RwLock<Arc<RoutingTable>>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: RouterConfig,
    pricing: HashMap<String, Pricing>,
}

impl<S: DraftStore + ?Sized> ProviderRouter<S> {
    pub fn new(
        providers: HashMap<String, Arc<dyn TextGenerator>>,
        table: RoutingTable,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        config: RouterConfig,
        pricing: HashMap<String, Pricing>,
    ) -> Self {
        Self {
            providers,
            table: RwLock::new(Arc::new(table)),
            store,
            clock,
            config,
            pricing,
        }
    }

    /// Current routing snapshot
    pub fn table(&self) -> Arc<RoutingTable> {
        self.table
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the whole routing snapshot atomically
    pub fn swap_table(&self, table: RoutingTable) {
        let mut guard = self
            .table
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(table);
    }

    /// Replace the candidate list for one stage, keeping the rest
    pub fn set_stage_routes(&self, stage: Stage, candidates: Vec<RouteSpec>) {
        let mut guard = self
            .table
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = (**guard).clone();
        next.set_stage(stage, candidates);
        *guard = Arc::new(next);
    }

    /// Try each candidate for the stage in order; return the first success.
    ///
    /// Each failure is logged with its classified kind and swallowed; the
    /// same candidate is never retried. Later candidates are never tried once
    /// one succeeds.
    pub async fn generate(
        &self,
        stage: Stage,
        system: &str,
        prompt: &str,
    ) -> Result<Generation, RouterExhausted> {
        let snapshot = self.table();
        let candidates = snapshot.candidates(stage);

        if candidates.is_empty() {
            tracing::warn!(stage = %stage, "No routes configured for stage");
            return Err(RouterExhausted {
                stage,
                failures: vec![],
            });
        }

        let mut failures = Vec::new();

        for spec in candidates {
            let route = spec.to_string();

            let Some(provider) = self.providers.get(&spec.provider) else {
                let message = "provider not available".to_string();
                tracing::warn!(stage = %stage, route = %route, "Provider not available");
                self.record_attempt(stage, spec, 0, 0, 0, Some("unavailable"))
                    .await;
                failures.push(CandidateFailure {
                    route,
                    error: message,
                });
                continue;
            };

            let request = GenerationRequest {
                stage,
                model: spec.model.clone(),
                system: system.to_string(),
                prompt: prompt.to_string(),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            };

            let started = Instant::now();
            match provider.generate(&request).await {
                Ok(generation) => {
                    let latency_ms = started.elapsed().as_millis() as i64;
                    tracing::info!(
                        stage = %stage,
                        route = %route,
                        latency_ms = latency_ms,
                        "Provider call succeeded"
                    );
                    self.record_attempt(
                        stage,
                        spec,
                        generation.input_tokens,
                        generation.output_tokens,
                        latency_ms,
                        None,
                    )
                    .await;
                    return Ok(generation);
                }
                Err(error) => {
                    let latency_ms = started.elapsed().as_millis() as i64;
                    tracing::warn!(
                        stage = %stage,
                        route = %route,
                        error = %error,
                        error_kind = error.kind(),
                        "Provider call failed, advancing to next candidate"
                    );
                    self.record_attempt(stage, spec, 0, 0, latency_ms, Some(error.kind()))
                        .await;
                    failures.push(CandidateFailure {
                        route,
                        error: error.to_string(),
                    });
                }
            }
        }

        Err(RouterExhausted { stage, failures })
    }

    fn estimate_cost(&self, spec: &RouteSpec, input_tokens: i64, output_tokens: i64) -> f64 {
        let key = format!("{}:{}", spec.provider, spec.model);
        match self.pricing.get(&key) {
            Some(pricing) => {
                (input_tokens as f64 / 1000.0) * pricing.input_per_1k
                    + (output_tokens as f64 / 1000.0) * pricing.output_per_1k
            }
            None => 0.0,
        }
    }

    async fn record_attempt(
        &self,
        stage: Stage,
        spec: &RouteSpec,
        input_tokens: i64,
        output_tokens: i64,
        latency_ms: i64,
        error_kind: Option<&str>,
    ) {
        let record = UsageRecord {
            stage,
            provider: spec.provider.clone(),
            model: spec.model.clone(),
            input_tokens,
            output_tokens,
            latency_ms,
            cost_usd: if error_kind.is_none() {
                self.estimate_cost(spec, input_tokens, output_tokens)
            } else {
                0.0
            },
            succeeded: error_kind.is_none(),
            error_kind: error_kind.map(String::from),
            created_at: self.clock.now(),
        };

        // Usage logging is observability, not control flow; a store hiccup
        // must not fail the call.
        if let Err(error) = self.store.log_usage(&record).await {
            tracing::warn!(error = %error, "Failed to record usage log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RoutingTable;
    use crate::ports::SystemClock;
    use crate::test_support::{MemStore, ScriptedGenerator};
    use std::collections::BTreeMap;

    fn table_with(stage: Stage, routes: &[&str]) -> RoutingTable {
        let mut map = BTreeMap::new();
        map.insert(
            stage,
            routes
                .iter()
                .map(|r| RouteSpec::parse(r).unwrap())
                .collect(),
        );
        RoutingTable::new(map)
    }

    fn router_with(
        providers: Vec<Arc<dyn TextGenerator>>,
        table: RoutingTable,
        store: Arc<MemStore>,
    ) -> ProviderRouter<MemStore> {
        let providers: HashMap<String, Arc<dyn TextGenerator>> = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();
        ProviderRouter::new(
            providers,
            table,
            store,
            Arc::new(SystemClock),
            RouterConfig::default(),
            HashMap::new(),
        )
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let store = Arc::new(MemStore::new());
        let failing = ScriptedGenerator::failing("alpha");
        let ok = ScriptedGenerator::ok("beta", "from beta");
        let never = ScriptedGenerator::ok("gamma", "from gamma");

        let table = table_with(
            Stage::Summarize,
            &["alpha:model-a", "alpha:model-b", "beta:model-c", "gamma:model-d"],
        );
        let router = router_with(
            vec![failing.clone(), ok.clone(), never.clone()],
            table,
            store.clone(),
        );

        let generation = router
            .generate(Stage::Summarize, "system", "prompt")
            .await
            .unwrap();

        assert_eq!(generation.text, "from beta");
        assert_eq!(generation.provider, "beta");
        assert_eq!(generation.model, "model-c");
        // Candidate after the first success is never called
        assert_eq!(never.calls(), 0);
        assert_eq!(failing.calls(), 2);

        // Exactly 3 usage rows: 2 failed, 1 succeeded
        let usage = store.usage_records();
        assert_eq!(usage.len(), 3);
        assert_eq!(usage.iter().filter(|u| u.succeeded).count(), 1);
        assert_eq!(usage.iter().filter(|u| !u.succeeded).count(), 2);
        assert!(usage[2].succeeded);
    }

    #[tokio::test]
    async fn test_exhaustion_logs_every_candidate() {
        let store = Arc::new(MemStore::new());
        let failing = ScriptedGenerator::failing("alpha");

        let table = table_with(Stage::DraftX, &["alpha:model-a", "alpha:model-b"]);
        let router = router_with(vec![failing], table, store.clone());

        let error = router
            .generate(Stage::DraftX, "system", "prompt")
            .await
            .unwrap_err();

        assert_eq!(error.stage, Stage::DraftX);
        assert_eq!(error.failures.len(), 2);

        let usage = store.usage_records();
        assert_eq!(usage.len(), 2);
        assert!(usage.iter().all(|u| !u.succeeded));
        assert!(usage.iter().all(|u| u.error_kind.is_some()));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_a_logged_failure() {
        let store = Arc::new(MemStore::new());
        let ok = ScriptedGenerator::ok("known", "text");

        let table = table_with(Stage::Summarize, &["missing:model-x", "known:model-y"]);
        let router = router_with(vec![ok], table, store.clone());

        let generation = router
            .generate(Stage::Summarize, "system", "prompt")
            .await
            .unwrap();
        assert_eq!(generation.provider, "known");

        let usage = store.usage_records();
        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].error_kind.as_deref(), Some("unavailable"));
        assert!(usage[1].succeeded);
    }

    #[tokio::test]
    async fn test_empty_stage_exhausts_immediately() {
        let store = Arc::new(MemStore::new());
        let router = router_with(vec![], RoutingTable::empty(), store.clone());

        let error = router
            .generate(Stage::Check, "system", "prompt")
            .await
            .unwrap_err();
        assert!(error.failures.is_empty());
        assert!(store.usage_records().is_empty());
    }

    #[tokio::test]
    async fn test_set_stage_routes_swaps_atomically() {
        let store = Arc::new(MemStore::new());
        let first = ScriptedGenerator::ok("first", "one");
        let second = ScriptedGenerator::ok("second", "two");

        let table = table_with(Stage::Summarize, &["first:model-a"]);
        let router = router_with(vec![first, second], table, store.clone());

        let generation = router
            .generate(Stage::Summarize, "s", "p")
            .await
            .unwrap();
        assert_eq!(generation.text, "one");

        router.set_stage_routes(
            Stage::Summarize,
            vec![RouteSpec::parse("second:model-b").unwrap()],
        );

        let generation = router
            .generate(Stage::Summarize, "s", "p")
            .await
            .unwrap();
        assert_eq!(generation.text, "two");
        assert_eq!(
            router.table().candidates(Stage::Summarize),
            &[RouteSpec::parse("second:model-b").unwrap()]
        );
    }
}
