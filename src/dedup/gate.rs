//! Duplicate screening against stored contents

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::DedupConfig;
use crate::dedup::similarity::{combined_similarity, fingerprint};
use crate::error::Result;
use crate::metrics::{self, DuplicateOutcome};
use crate::models::ContentId;
use crate::storage::ContentRepository;

/// A stored content that resembles the checked text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarContent {
    pub id: ContentId,
    pub title: String,
    pub similarity: f64,
}

/// Outcome of a duplicate check
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    /// Highest score first, capped by `max_similar`
    pub similar: Vec<SimilarContent>,
    /// Fingerprint of the checked body
    pub fingerprint: String,
}

impl DuplicateCheck {
    /// Whether the match came from an identical fingerprint
    pub fn is_exact(&self) -> bool {
        self.is_duplicate && self.similar.len() == 1 && self.similar[0].similarity >= 1.0
    }
}

/// Screens new or edited documents for exact and near duplicates.
///
/// Repository errors propagate unchanged; the gate never reports a clean
/// result it could not verify, and it writes nothing during a check.
#[derive(Clone)]
pub struct DuplicateGate {
    repo: Arc<dyn ContentRepository>,
    config: DedupConfig,
}

impl DuplicateGate {
    pub fn new(repo: Arc<dyn ContentRepository>, config: DedupConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn check_duplicate(
        &self,
        title: &str,
        body: &str,
        exclude: Option<ContentId>,
    ) -> Result<DuplicateCheck> {
        let fp = fingerprint(body);

        if let Some(exact) = self.repo.find_by_fingerprint(&fp, exclude)? {
            info!(matched = exact.id, "Exact duplicate fingerprint");
            metrics::record_duplicate_check(DuplicateOutcome::Exact);
            return Ok(DuplicateCheck {
                is_duplicate: true,
                similar: vec![SimilarContent {
                    id: exact.id,
                    title: exact.title,
                    similarity: 1.0,
                }],
                fingerprint: fp,
            });
        }

        let candidates = self
            .repo
            .recent_candidates(self.config.candidate_limit, exclude)?;

        let mut similar: Vec<SimilarContent> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let score = combined_similarity(title, body, &candidate.title, &candidate.body);
                (score >= self.config.near_threshold).then(|| SimilarContent {
                    id: candidate.id,
                    title: candidate.title,
                    similarity: score,
                })
            })
            .collect();

        similar.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        similar.truncate(self.config.max_similar);

        let is_duplicate = similar
            .first()
            .is_some_and(|top| top.similarity >= self.config.strict_threshold);

        metrics::record_duplicate_check(if similar.is_empty() {
            DuplicateOutcome::Clean
        } else {
            DuplicateOutcome::Near
        });

        debug!(
            similar = similar.len(),
            is_duplicate,
            "Duplicate check finished"
        );

        Ok(DuplicateCheck {
            is_duplicate,
            similar,
            fingerprint: fp,
        })
    }

    /// Store the body's fingerprint and clear the duplicate flag
    pub fn update_fingerprint(&self, id: ContentId, body: &str) -> Result<()> {
        self.repo.set_fingerprint(id, &fingerprint(body))
    }

    /// Flag a content as duplicate without touching its fingerprint
    pub fn mark_duplicate(&self, id: ContentId) -> Result<()> {
        self.repo.mark_duplicate(id)
    }
}
