//! Prompt builders for the pipeline stages

use crate::model::Platform;

/// System prompt carrying the style contract into every generation call
pub fn system_prompt(style_contract: &str) -> String {
    format!(
        "You are a social writing assistant. Follow this style contract exactly when possible:\n\n{}",
        style_contract
    )
}

/// Summarize-stage prompt
pub fn summary_prompt(entry_text: &str) -> String {
    format!(
        "Summarize this diary entry in 2-3 sentences. \
         Preserve concrete facts, remove fluff, and do not invent details.\n\n\
         Diary entry:\n{}",
        entry_text
    )
}

/// Generation-stage prompt built from the platform template.
///
/// Templates use `{entry_text}`, `{summary}`, `{strict_rules}`, `{platform}`
/// and `{char_limit}` placeholders; unknown placeholders pass through.
pub fn draft_prompt(
    platform: Platform,
    template: &str,
    entry_text: &str,
    summary: &str,
    strict: bool,
    limit: usize,
) -> String {
    let strict_rules = if strict {
        format!("Hard limit: {} chars. Use conservative wording, no risky claims.", limit)
    } else {
        format!("Hard limit: {} chars. Keep tone natural and practical.", limit)
    };

    template
        .replace("{entry_text}", entry_text)
        .replace("{summary}", summary)
        .replace("{strict_rules}", &strict_rules)
        .replace("{platform}", platform.as_str())
        .replace("{char_limit}", &limit.to_string())
}

/// Bounded-regeneration prompt with an explicit shorten instruction
pub fn shorten_prompt(platform: Platform, current_text: &str, limit: usize) -> String {
    format!(
        "Rewrite this {} draft under {} chars without losing the core meaning.\n\n\
         Original draft:\n{}",
        platform, limit, current_text
    )
}

/// Redraft prompt asking for a fresh alternative to a previous draft
pub fn redraft_prompt(
    platform: Platform,
    entry_text: &str,
    summary: &str,
    previous_text: &str,
    limit: usize,
) -> String {
    format!(
        "Regenerate this {} draft as a fresh alternative. Keep under {} chars.\n\n\
         Diary:\n{}\n\nSummary:\n{}\n\nPrevious draft:\n{}",
        platform, limit, entry_text, summary, previous_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_prompt_substitutes_placeholders() {
        let template = "Post for {platform} ({char_limit}):\n{entry_text}\n{summary}\n{strict_rules}";
        let prompt = draft_prompt(
            Platform::X,
            template,
            "raw entry",
            "the summary",
            false,
            280,
        );
        assert!(prompt.contains("Post for x (280):"));
        assert!(prompt.contains("raw entry"));
        assert!(prompt.contains("the summary"));
        assert!(prompt.contains("natural and practical"));
    }

    #[test]
    fn test_strict_flag_tightens_rules() {
        let template = "{strict_rules}";
        let prompt = draft_prompt(Platform::Linkedin, template, "", "", true, 3000);
        assert!(prompt.contains("conservative wording"));
    }

    #[test]
    fn test_shorten_prompt_names_limit() {
        let prompt = shorten_prompt(Platform::X, "way too long", 280);
        assert!(prompt.contains("under 280 chars"));
        assert!(prompt.contains("way too long"));
    }
}
