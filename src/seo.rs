//! Basic SEO checks for markdown bodies

use serde::{Deserialize, Serialize};

/// Minimum word count before a body is considered long enough
pub const MIN_WORDS: usize = 300;

/// Points deducted per issue
const ISSUE_PENALTY: u32 = 20;

/// Result of an SEO analysis
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeoReport {
    pub score: u32,
    pub issues: Vec<String>,
}

/// Score a markdown body
pub fn analyze(body: &str) -> SeoReport {
    let mut issues = Vec::new();

    if body.split_whitespace().count() < MIN_WORDS {
        issues.push("Content too short (under 300 words).".to_string());
    }

    if !body.contains("# ") {
        issues.push("Missing H1 title.".to_string());
    }

    let penalty = ISSUE_PENALTY.saturating_mul(issues.len() as u32);
    SeoReport {
        score: 100u32.saturating_sub(penalty),
        issues,
    }
}
