//! Text normalization, fingerprints and Jaccard similarity
//!
//! All functions here are pure.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::utils::normalize_whitespace;

/// Weight of the title score in the combined score
pub const TITLE_WEIGHT: f64 = 0.3;

/// Weight of the body score in the combined score
pub const BODY_WEIGHT: f64 = 0.7;

/// Lowercase, drop punctuation and symbols, collapse whitespace.
///
/// ASCII word characters, whitespace and Hangul syllables survive.
pub fn normalize(text: &str) -> String {
    static STRIP_RE: OnceLock<Regex> = OnceLock::new();

    let re = STRIP_RE
        .get_or_init(|| Regex::new(r"[^0-9A-Za-z_\s가-힣]").expect("Invalid regex pattern"));

    let lowered = text.to_lowercase();
    normalize_whitespace(&re.replace_all(&lowered, ""))
}

/// SHA-256 hex digest of the normalized text.
///
/// Equal fingerprints mean the texts differ at most in case, punctuation
/// and whitespace. Exact-duplicate signal only.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(normalize(text).as_bytes());
    format!("{digest:x}")
}

fn token_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of the lowercase whitespace token sets, in `[0, 1]`.
///
/// Two texts with no tokens at all score 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let left = token_set(a);
    let right = token_set(b);

    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }

    let intersection = left.intersection(&right).count();
    intersection as f64 / union as f64
}

/// Weighted title/body score, rounded to two decimals
pub fn combined_similarity(title_a: &str, body_a: &str, title_b: &str, body_b: &str) -> f64 {
    let score =
        TITLE_WEIGHT * similarity(title_a, title_b) + BODY_WEIGHT * similarity(body_a, body_b);
    round2(score)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
