//! Inline directive parsing for captured entries
//!
//! Entries may carry `#draft`, `#private`, `#strict`, and `#publish <platforms>`
//! tokens anywhere in the text; directives are stripped from the stored text.

use crate::model::Platform;

/// Directives extracted from an entry text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    /// Entry text with directive tokens removed
    pub cleaned_text: String,
    pub private: bool,
    pub strict: bool,
    pub draft: bool,
    pub publish: bool,
    /// Platforms named after `#publish`; empty means the caller's default
    pub publish_platforms: Vec<Platform>,
}

/// Resolve a platform token, accepting common aliases and trailing commas
pub fn normalize_platform(token: &str) -> Option<Platform> {
    let clean = token.trim().to_lowercase();
    let clean = clean.trim_end_matches(',');
    match clean {
        "x" | "twitter" => Some(Platform::X),
        "threads" | "thread" => Some(Platform::Threads),
        "linkedin" | "li" => Some(Platform::Linkedin),
        _ => None,
    }
}

/// Resolve explicit platform arguments, falling back to the default list.
/// Unknown tokens are dropped; duplicates collapse to the first occurrence.
pub fn parse_platform_args(args: &[String], default_platforms: &[Platform]) -> Vec<Platform> {
    if args.is_empty() {
        return default_platforms.to_vec();
    }
    let mut parsed = Vec::new();
    for arg in args {
        if let Some(platform) = normalize_platform(arg) {
            if !parsed.contains(&platform) {
                parsed.push(platform);
            }
        } else {
            tracing::warn!(token = %arg, "Skipping unknown platform token");
        }
    }
    if parsed.is_empty() {
        default_platforms.to_vec()
    } else {
        parsed
    }
}

/// Scan the text for directive tokens and return the cleaned remainder
pub fn parse_directives(text: &str) -> Directives {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut kept = Vec::new();
    let mut directives = Directives::default();

    let mut i = 0;
    while i < tokens.len() {
        let lower = tokens[i].to_lowercase();
        match lower.as_str() {
            "#draft" => {
                directives.draft = true;
                i += 1;
            }
            "#private" => {
                directives.private = true;
                i += 1;
            }
            "#strict" => {
                directives.strict = true;
                i += 1;
            }
            "#publish" => {
                directives.publish = true;
                i += 1;
                // Consume following platform tokens until one doesn't parse
                while i < tokens.len() {
                    let Some(platform) = normalize_platform(tokens[i]) else {
                        break;
                    };
                    if !directives.publish_platforms.contains(&platform) {
                        directives.publish_platforms.push(platform);
                    }
                    i += 1;
                }
            }
            _ => {
                kept.push(tokens[i]);
                i += 1;
            }
        }
    }

    directives.cleaned_text = kept.join(" ");
    directives
}
