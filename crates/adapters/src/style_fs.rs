//! Style and routing document loaders
//!
//! Both documents are optional: a missing or unparseable file falls back to
//! the embedded defaults with a low-severity log line. The pipeline is fully
//! operable with zero external files present.

use draftsmith_domain::{Platform, RouteSpec, RoutingTable, Stage, StyleSheet};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

/// Load the style document: a markdown file whose `## Style Contract` section
/// and per-platform `## <platform> template` sections override the embedded
/// defaults. The whole file body is the contract when no section matches.
pub fn load_style(path: &Path) -> StyleSheet {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) => {
            tracing::debug!(
                path = %path.display(),
                error = %error,
                "Style document not readable, using embedded defaults"
            );
            return StyleSheet::default();
        }
    };

    let sections = parse_markdown_sections(&text);

    let mut sheet = StyleSheet::default();

    let contract = sections
        .iter()
        .find(|(title, body)| title.contains("style contract") && !body.trim().is_empty())
        .map(|(_, body)| body.trim().to_string())
        .or_else(|| {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });
    if let Some(contract) = contract {
        sheet.contract = contract;
    }

    for platform in Platform::ALL {
        let template = sections.iter().find(|(title, body)| {
            title.contains("template") && title.contains(platform.as_str()) && !body.trim().is_empty()
        });
        if let Some((_, body)) = template {
            sheet.set_template(platform, body.trim().to_string());
        }
    }

    sheet
}

/// Split a markdown document into (lowercased heading, body) sections
fn parse_markdown_sections(text: &str) -> Vec<(String, String)> {
    let heading_re = Regex::new(r"(?m)^#{1,6}\s+(.+?)\s*$").expect("heading regex");
    let matches: Vec<_> = heading_re.captures_iter(text).collect();

    let mut sections = Vec::with_capacity(matches.len());
    for (idx, capture) in matches.iter().enumerate() {
        let whole = capture.get(0).expect("match");
        let title = capture.get(1).expect("heading title").as_str();
        let start = whole.end();
        let end = matches
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        sections.push((title.to_lowercase(), text[start..end].trim().to_string()));
    }
    sections
}

#[derive(serde::Deserialize, Default)]
struct RoutingDoc {
    #[serde(default)]
    routing: BTreeMap<String, Vec<String>>,
}

/// Load the routing document (TOML, `[routing]` table of stage -> route list)
/// on top of the given base table. Malformed stages or route entries are
/// skipped with a warning, never fatal; stages whose entries all fail to
/// parse keep the base candidates.
pub fn load_routing(path: &Path, base: RoutingTable) -> RoutingTable {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) => {
            tracing::debug!(
                path = %path.display(),
                error = %error,
                "Routing document not readable, using defaults"
            );
            return base;
        }
    };

    let doc: RoutingDoc = match toml::from_str(&text) {
        Ok(doc) => doc,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "Routing document malformed, using defaults"
            );
            return base;
        }
    };

    let overrides: Vec<(String, Vec<String>)> = doc.routing.into_iter().collect();
    apply_routing_overrides(base, &overrides)
}

/// Apply raw (stage, routes) overrides onto a table, skipping malformed
/// entries with a warning. Shared by the routing document loader and the
/// persisted override store.
pub fn apply_routing_overrides(
    mut table: RoutingTable,
    overrides: &[(String, Vec<String>)],
) -> RoutingTable {
    for (stage_label, routes) in overrides {
        let stage = match stage_label.parse::<Stage>() {
            Ok(stage) => stage,
            Err(error) => {
                tracing::warn!(stage = %stage_label, error = %error, "Skipping unknown routing stage");
                continue;
            }
        };

        let mut candidates = Vec::with_capacity(routes.len());
        for route in routes {
            match RouteSpec::parse(route) {
                Ok(spec) => candidates.push(spec),
                Err(error) => {
                    tracing::warn!(stage = %stage, route = %route, error = %error, "Skipping malformed route");
                }
            }
        }

        if candidates.is_empty() {
            tracing::warn!(stage = %stage, "No usable routes in override, keeping existing candidates");
            continue;
        }

        table.set_stage(stage, candidates);
    }
    table
}
