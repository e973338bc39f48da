//! Command implementations and shared wiring

pub mod capture;
pub mod config;
pub mod doctor;
pub mod draft;
pub mod publish;
pub mod queue;
pub mod routing;

use anyhow::{Context, Result};
use draftsmith_adapters::llm::{
    AnthropicGenerator, GeminiGenerator, OpenAiGenerator, StubGenerator,
};
use draftsmith_adapters::platforms::{LinkedinPublisher, ThreadsPublisher, XPublisher};
use draftsmith_adapters::store::SqliteDraftStore;
use draftsmith_adapters::style_fs::{apply_routing_overrides, load_routing, load_style};
use draftsmith_domain::limits::PlatformLimits;
use draftsmith_domain::usecases::{
    Pipeline, PipelineConfig, Pricing, ProviderRouter, PublishOutcome, RouterConfig, WeeklyCaps,
};
use draftsmith_domain::{
    Clock, Draft, DraftStore, Platform, PublishAdapter, RoutingTable, SystemClock, TextGenerator,
};
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AppConfig;

/// Fully wired application: store, router, pipeline
pub struct App {
    pub pipeline: Pipeline<SqliteDraftStore>,
    pub config: AppConfig,
}

/// Build the store, provider registry, routing snapshot, and pipeline from
/// configuration. Routing layers, weakest first: builtin defaults, config
/// file, routing document, persisted overrides.
pub async fn build_app(config: AppConfig) -> Result<App> {
    let store = Arc::new(
        SqliteDraftStore::new(&config.general.db_path)
            .await
            .context("Failed to open draft store")?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let table = if config.llm.use_stub {
        RoutingTable::stub()
    } else {
        let table = apply_routing_overrides(
            RoutingTable::default(),
            &config
                .routing
                .iter()
                .map(|(stage, routes)| (stage.clone(), routes.clone()))
                .collect::<Vec<_>>(),
        );
        let table = load_routing(&config.paths.routing, table);
        let persisted = store
            .routing_overrides()
            .await
            .context("Failed to load routing overrides")?;
        apply_routing_overrides(table, &persisted)
    };

    let providers = build_providers(&config);
    let pricing: HashMap<String, Pricing> = config
        .pricing
        .iter()
        .map(|(key, p)| {
            (
                key.clone(),
                Pricing {
                    input_per_1k: p.input_per_1k,
                    output_per_1k: p.output_per_1k,
                },
            )
        })
        .collect();

    let router = Arc::new(ProviderRouter::new(
        providers,
        table,
        store.clone(),
        clock.clone(),
        RouterConfig {
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        },
        pricing,
    ));

    let style = load_style(&config.paths.style);

    let pipeline = Pipeline::new(
        store,
        router,
        build_publishers(&config),
        clock,
        style,
        pipeline_config(&config),
    );

    Ok(App { pipeline, config })
}

fn pipeline_config(config: &AppConfig) -> PipelineConfig {
    let mut enabled = Vec::new();
    if config.x.enabled {
        enabled.push(Platform::X);
    }
    if config.threads.enabled {
        enabled.push(Platform::Threads);
    }
    if config.linkedin.enabled {
        enabled.push(Platform::Linkedin);
    }

    PipelineConfig {
        limits: PlatformLimits {
            x: config.x.max_chars,
            threads: config.threads.max_chars,
            linkedin: config.linkedin.max_chars,
        },
        max_regen_attempts: config.llm.max_regen_attempts,
        dry_run_default: config.general.dry_run,
        weekly_caps: WeeklyCaps {
            x: config.x.weekly_cap,
            threads: config.threads.weekly_cap,
            linkedin: config.linkedin.weekly_cap,
        },
        enabled_platforms: enabled,
        ..Default::default()
    }
}

fn build_providers(config: &AppConfig) -> HashMap<String, Arc<dyn TextGenerator>> {
    let mut providers: HashMap<String, Arc<dyn TextGenerator>> = HashMap::new();

    if config.llm.use_stub {
        providers.insert("stub".to_string(), Arc::new(StubGenerator::echo()));
        return providers;
    }

    let timeout = config.llm.timeout_secs;

    match env_secret(&config.llm.openai.api_key_env) {
        Some(key) => {
            providers.insert(
                "openai".to_string(),
                Arc::new(OpenAiGenerator::with_base_url(
                    key,
                    config.llm.openai.base_url.clone(),
                    timeout,
                )),
            );
        }
        None => tracing::debug!(env = %config.llm.openai.api_key_env, "OpenAI key absent, provider skipped"),
    }

    match env_secret(&config.llm.anthropic.api_key_env) {
        Some(key) => {
            providers.insert(
                "anthropic".to_string(),
                Arc::new(AnthropicGenerator::new(key, timeout)),
            );
        }
        None => tracing::debug!(env = %config.llm.anthropic.api_key_env, "Anthropic key absent, provider skipped"),
    }

    match env_secret(&config.llm.gemini.api_key_env) {
        Some(key) => {
            providers.insert(
                "gemini".to_string(),
                Arc::new(GeminiGenerator::new(key, timeout)),
            );
        }
        None => tracing::debug!(env = %config.llm.gemini.api_key_env, "Gemini key absent, provider skipped"),
    }

    providers
}

fn build_publishers(config: &AppConfig) -> HashMap<Platform, Arc<dyn PublishAdapter>> {
    let mut publishers: HashMap<Platform, Arc<dyn PublishAdapter>> = HashMap::new();

    if config.x.enabled {
        publishers.insert(
            Platform::X,
            Arc::new(XPublisher::new(env_secret(&config.x.access_token_env))),
        );
    }
    if config.threads.enabled {
        publishers.insert(
            Platform::Threads,
            Arc::new(ThreadsPublisher::new(
                env_value(&config.threads.user_id_env),
                env_secret(&config.threads.access_token_env),
            )),
        );
    }
    if config.linkedin.enabled {
        publishers.insert(
            Platform::Linkedin,
            Arc::new(LinkedinPublisher::new(
                env_secret(&config.linkedin.access_token_env),
                env_value(&config.linkedin.person_urn_env),
            )),
        );
    }

    publishers
}

pub(crate) fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

pub(crate) fn env_secret(name: &str) -> Option<SecretString> {
    env_value(name).map(|value| SecretString::new(value.into()))
}

/// Human-readable draft block for queue/draft output
pub(crate) fn format_draft(draft: &Draft) -> String {
    let writer = match (&draft.generating_provider, &draft.generating_model) {
        (Some(provider), Some(model)) => format!("{}:{}", provider, model),
        _ => "-".to_string(),
    };
    let summarizer = match (&draft.summarizing_provider, &draft.summarizing_model) {
        (Some(provider), Some(model)) => format!("{}:{}", provider, model),
        _ => "raw excerpt".to_string(),
    };

    let mut lines = format!(
        "Draft #{} | {} | v{} | status={}\nLength: {} chars\nWriter: {}\nSummary model: {}\n",
        draft.id,
        draft.platform.as_str().to_uppercase(),
        draft.version,
        draft.status,
        draft.char_count,
        writer,
        summarizer,
    );
    if let Some(reason) = &draft.failure_reason {
        lines.push_str(&format!("Failure: {}\n", reason));
    }
    if let Some(at) = draft.scheduled_at {
        lines.push_str(&format!("Scheduled: {}\n", at));
    }
    lines.push('\n');
    lines.push_str(&draft.text);
    lines
}

/// One-line report for a publish outcome
pub(crate) fn report_outcome(outcome: &PublishOutcome) {
    match outcome {
        PublishOutcome::Published { draft, receipt } => {
            let mode = if receipt.dry_run { " (dry run)" } else { "" };
            println!(
                "Published draft #{} to {}{}: {}",
                draft.id, draft.platform, mode, receipt.external_id
            );
        }
        PublishOutcome::RateLimited { draft, cap } => {
            println!(
                "Draft #{} not published: weekly cap of {} reached for {}",
                draft.id, cap, draft.platform
            );
        }
        PublishOutcome::Failed { draft, reason } => {
            println!(
                "Draft #{} failed to publish to {}: {}",
                draft.id, draft.platform, reason
            );
        }
    }
}
