//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub x: XConfig,

    #[serde(default)]
    pub threads: ThreadsConfig,

    #[serde(default)]
    pub linkedin: LinkedinConfig,

    /// Stage -> ordered "provider:model" routes, layered over the builtin
    /// defaults (the routing document and persisted overrides layer on top)
    #[serde(default)]
    pub routing: BTreeMap<String, Vec<String>>,

    /// "provider:model" -> per-1k-token pricing for usage-cost estimates
    #[serde(default = "default_pricing")]
    pub pricing: BTreeMap<String, PricingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry-run default; the persisted toggle overrides it at runtime
    #[serde(default = "default_true")]
    pub dry_run: bool,

    /// Offset applied to naive schedule datetimes (no tz database here)
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_style_path")]
    pub style: PathBuf,

    #[serde(default = "default_routing_path")]
    pub routing: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_regen_attempts")]
    pub max_regen_attempts: u32,

    /// Replace all providers and routes with the offline stub
    #[serde(default)]
    pub use_stub: bool,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub anthropic: AnthropicConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_anthropic_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_x_max_chars")]
    pub max_chars: usize,

    /// Rolling 7-day publish cap; 0 disables
    #[serde(default)]
    pub weekly_cap: u32,

    #[serde(default = "default_x_access_token_env")]
    pub access_token_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_threads_max_chars")]
    pub max_chars: usize,

    #[serde(default)]
    pub weekly_cap: u32,

    #[serde(default = "default_threads_user_id_env")]
    pub user_id_env: String,

    #[serde(default = "default_threads_access_token_env")]
    pub access_token_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedinConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_linkedin_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_linkedin_weekly_cap")]
    pub weekly_cap: u32,

    #[serde(default = "default_linkedin_access_token_env")]
    pub access_token_env: String,

    #[serde(default = "default_linkedin_person_urn_env")]
    pub person_urn_env: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricingConfig {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

// Default value functions

fn default_db_path() -> PathBuf {
    PathBuf::from("./draftsmith.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_style_path() -> PathBuf {
    PathBuf::from("./STYLE.md")
}

fn default_routing_path() -> PathBuf {
    PathBuf::from("./routing.toml")
}

fn default_temperature() -> f64 {
    0.4
}

fn default_max_tokens() -> u32 {
    700
}

fn default_timeout() -> u64 {
    30
}

fn default_max_regen_attempts() -> u32 {
    2
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_gemini_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_x_max_chars() -> usize {
    280
}

fn default_x_access_token_env() -> String {
    "X_ACCESS_TOKEN".to_string()
}

fn default_threads_max_chars() -> usize {
    500
}

fn default_threads_user_id_env() -> String {
    "THREADS_USER_ID".to_string()
}

fn default_threads_access_token_env() -> String {
    "THREADS_ACCESS_TOKEN".to_string()
}

fn default_linkedin_max_chars() -> usize {
    3000
}

fn default_linkedin_weekly_cap() -> u32 {
    3
}

fn default_linkedin_access_token_env() -> String {
    "LINKEDIN_ACCESS_TOKEN".to_string()
}

fn default_linkedin_person_urn_env() -> String {
    "LINKEDIN_PERSON_URN".to_string()
}

fn default_pricing() -> BTreeMap<String, PricingConfig> {
    let mut pricing = BTreeMap::new();
    let mut add = |key: &str, input_per_1k: f64, output_per_1k: f64| {
        pricing.insert(
            key.to_string(),
            PricingConfig {
                input_per_1k,
                output_per_1k,
            },
        );
    };
    add("openai:gpt-5.2", 0.00175, 0.014);
    add("openai:gpt-5-mini", 0.00025, 0.002);
    add("openai:gpt-5-nano", 0.00005, 0.0004);
    add("anthropic:claude-sonnet-4-5", 0.003, 0.015);
    add("anthropic:claude-haiku-4-5", 0.001, 0.005);
    add("gemini:gemini-3-pro-preview", 0.002, 0.012);
    add("gemini:gemini-3-flash-preview", 0.0005, 0.003);
    add("gemini:gemini-2.5-flash-lite", 0.0001, 0.0004);
    pricing
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            dry_run: default_true(),
            utc_offset_minutes: 0,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            style: default_style_path(),
            routing: default_routing_path(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout(),
            max_regen_attempts: default_max_regen_attempts(),
            use_stub: false,
            openai: OpenAiConfig::default(),
            anthropic: AnthropicConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_api_key_env(),
            base_url: default_openai_base_url(),
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_anthropic_api_key_env(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_api_key_env(),
        }
    }
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chars: default_x_max_chars(),
            weekly_cap: 0,
            access_token_env: default_x_access_token_env(),
        }
    }
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chars: default_threads_max_chars(),
            weekly_cap: 0,
            user_id_env: default_threads_user_id_env(),
            access_token_env: default_threads_access_token_env(),
        }
    }
}

impl Default for LinkedinConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chars: default_linkedin_max_chars(),
            weekly_cap: default_linkedin_weekly_cap(),
            access_token_env: default_linkedin_access_token_env(),
            person_urn_env: default_linkedin_person_urn_env(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DRAFTSMITH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# draftsmith configuration

[general]
db_path = "./draftsmith.sqlite"
log_level = "info"
dry_run = true
# Applied to naive "YYYY-MM-DD HH:MM" schedule times
utc_offset_minutes = 0

[paths]
style = "./STYLE.md"
routing = "./routing.toml"

[llm]
temperature = 0.4
max_tokens = 700
timeout_secs = 30
max_regen_attempts = 2
# use_stub = true routes every stage to the offline stub generator
use_stub = false

[llm.openai]
api_key_env = "OPENAI_API_KEY"
base_url = "https://api.openai.com/v1"

[llm.anthropic]
api_key_env = "ANTHROPIC_API_KEY"

[llm.gemini]
api_key_env = "GEMINI_API_KEY"

[x]
enabled = true
max_chars = 280
weekly_cap = 0
access_token_env = "X_ACCESS_TOKEN"

[threads]
enabled = true
max_chars = 500
weekly_cap = 0
user_id_env = "THREADS_USER_ID"
access_token_env = "THREADS_ACCESS_TOKEN"

[linkedin]
enabled = true
max_chars = 3000
weekly_cap = 3
access_token_env = "LINKEDIN_ACCESS_TOKEN"
person_urn_env = "LINKEDIN_PERSON_URN"

# Per-stage provider routes, strongest first. Omitted stages use the builtin
# defaults; the routing document and `draftsmith routing set` layer on top.
# [routing]
# summarize = ["anthropic:claude-haiku-4-5", "openai:gpt-5-mini"]
# draft_x = ["anthropic:claude-sonnet-4-5", "openai:gpt-5.2"]

# Per-1k-token pricing for cost estimates in the usage log.
# [pricing]
# "openai:gpt-5-mini" = { input_per_1k = 0.00025, output_per_1k = 0.002 }
"#
        .to_string()
    }
}
