//! Per-platform length ceilings and the pure length validator

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Platform;

/// Character ceilings per platform (chars, not bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformLimits {
    pub x: usize,
    pub threads: usize,
    pub linkedin: usize,
}

impl PlatformLimits {
    pub fn limit_for(&self, platform: Platform) -> usize {
        match platform {
            Platform::X => self.x,
            Platform::Threads => self.threads,
            Platform::Linkedin => self.linkedin,
        }
    }
}

impl Default for PlatformLimits {
    fn default() -> Self {
        Self {
            x: 280,
            threads: 500,
            linkedin: 3000,
        }
    }
}

/// Validation failure: text exceeds the platform ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("text is {length} chars, limit is {limit}")]
pub struct TooLong {
    pub length: usize,
    pub limit: usize,
}

impl TooLong {
    pub fn excess(&self) -> usize {
        self.length.saturating_sub(self.limit)
    }
}

/// Pure length check. The orchestrator, not this function, decides between
/// regeneration and terminal failure.
pub fn check_limit(text: &str, limit: usize) -> Result<(), TooLong> {
    let length = text.chars().count();
    if length <= limit {
        Ok(())
    } else {
        Err(TooLong { length, limit })
    }
}

/// Char-aware truncation with an ellipsis. Used only by the explicit edit
/// flow; the pipeline itself never silently truncates.
pub fn truncate_to_limit(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    if limit <= 3 {
        return text.chars().take(limit).collect();
    }
    let head: String = text.chars().take(limit - 3).collect();
    format!("{}...", head.trim_end())
}
