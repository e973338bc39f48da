//! Doctor command: validate configuration and show component health

use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;

use crate::commands::{build_app, env_value};
use crate::args::DoctorArgs;
use crate::config::AppConfig;

struct Check {
    name: &'static str,
    ok: bool,
    detail: String,
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref()).context("Configuration failed to load")?;
    let mut checks = Vec::new();

    checks.push(Check {
        name: "style_document",
        ok: config.paths.style.exists(),
        detail: if config.paths.style.exists() {
            config.paths.style.display().to_string()
        } else {
            format!("{} absent, embedded defaults in use", config.paths.style.display())
        },
    });

    checks.push(Check {
        name: "routing_document",
        ok: config.paths.routing.exists(),
        detail: if config.paths.routing.exists() {
            config.paths.routing.display().to_string()
        } else {
            format!("{} absent, builtin routing in use", config.paths.routing.display())
        },
    });

    for (name, env) in [
        ("openai_key", config.llm.openai.api_key_env.as_str()),
        ("anthropic_key", config.llm.anthropic.api_key_env.as_str()),
        ("gemini_key", config.llm.gemini.api_key_env.as_str()),
        ("x_token", config.x.access_token_env.as_str()),
        ("threads_token", config.threads.access_token_env.as_str()),
        ("linkedin_token", config.linkedin.access_token_env.as_str()),
    ] {
        let present = env_value(env).is_some();
        checks.push(Check {
            name,
            ok: present,
            detail: if present {
                format!("{} set", env)
            } else {
                format!("{} not set", env)
            },
        });
    }

    // The store and routing snapshot must build cleanly
    let app = build_app(config).await;
    match &app {
        Ok(app) => {
            let dry_run = app.pipeline.effective_dry_run().await?;
            checks.push(Check {
                name: "store",
                ok: true,
                detail: app.config.general.db_path.display().to_string(),
            });
            checks.push(Check {
                name: "dry_run",
                ok: true,
                detail: if dry_run { "on" } else { "off" }.to_string(),
            });
        }
        Err(error) => {
            checks.push(Check {
                name: "store",
                ok: false,
                detail: format!("{:#}", error),
            });
        }
    }

    if args.json {
        let value: Vec<_> = checks
            .iter()
            .map(|c| json!({"check": c.name, "ok": c.ok, "detail": c.detail}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for check in &checks {
            let mark = if check.ok { "ok " } else { "warn" };
            println!("[{}] {:<18} {}", mark, check.name, check.detail);
        }
    }

    Ok(())
}
