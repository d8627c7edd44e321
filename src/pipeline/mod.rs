//! Content pipeline: status state machine with an audit trail
//!
//! ```text
//! DRAFT ──► REVIEW ──► APPROVED ──► SCHEDULED ──► PUBLISHED
//!   ▲         │  ▲        │  ▲          │             │
//!   └─────────┘  └────────┘  └──cancel──┘             │
//!   ▲                                                 │
//!   └──────────────────── unpublish ──────────────────┘
//! ```
//!
//! Entering SCHEDULED belongs to [`crate::scheduling`] and entering
//! PUBLISHED to [`crate::publishing`]; this coordinator rejects both.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, PipelineConfig};
use crate::dedup::{fingerprint, DuplicateCheck, DuplicateGate};
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{
    Actor, Content, ContentId, ContentPatch, ContentStatus, EditHistoryEntry, NewContent,
    NewHistoryEntry, PublishAttemptLog, ScheduledJob,
};
use crate::seo;
use crate::storage::{ContentChange, ContentDraft, ContentFilter, Page, Store};

/// History entries included in a content detail
const DETAIL_HISTORY: usize = 10;

/// Attempt logs included in a content detail
const DETAIL_ATTEMPTS: usize = 5;

/// Items listed per stage in the overview
const STAGE_ITEMS: usize = 10;

/// A content with its recent activity
#[derive(Debug, Clone, Serialize)]
pub struct ContentDetail {
    pub content: Content,
    pub history: Vec<EditHistoryEntry>,
    pub attempts: Vec<PublishAttemptLog>,
    pub pending_jobs: Vec<ScheduledJob>,
}

/// Result of a screened submission
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub content: Content,
    pub check: DuplicateCheck,
}

/// One column of the pipeline board
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub status: ContentStatus,
    pub count: u64,
    pub items: Vec<Content>,
}

/// Board view of the whole pipeline
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOverview {
    pub stages: Vec<StageSummary>,
    pub bottlenecks: Vec<String>,
    pub total: u64,
}

/// Owns the content status state machine
pub struct PipelineCoordinator {
    store: Arc<dyn Store>,
    gate: DuplicateGate,
    config: PipelineConfig,
}

impl PipelineCoordinator {
    pub fn new<S: Store + 'static>(store: Arc<S>, config: &Config) -> Self {
        let gate = DuplicateGate::new(store.clone(), config.dedup.clone());
        Self {
            store,
            gate,
            config: config.pipeline.clone(),
        }
    }

    pub fn gate(&self) -> &DuplicateGate {
        &self.gate
    }

    /// Create a DRAFT content without screening
    pub fn create_content(&self, new: NewContent, actor: Actor) -> Result<Content> {
        let draft = ContentDraft {
            seo: seo::analyze(&new.body),
            fingerprint: Some(crate::dedup::fingerprint(&new.body)),
            is_duplicate: false,
            content: &new,
            actor,
        };
        let content = self.store.create_content(draft)?;

        info!(content_id = content.id, %actor, "Content created");
        Ok(content)
    }

    /// Screen a new document, then create it.
    ///
    /// Flagged submissions are rejected with `Conflict` when duplicates are
    /// blocked, otherwise created with the duplicate flag set.
    pub fn submit(&self, new: NewContent, actor: Actor) -> Result<Submission> {
        let check = self.gate.check_duplicate(&new.title, &new.body, None)?;

        if check.is_duplicate && self.gate.config().block_duplicates {
            let matched = check.similar.first().map(|s| s.id).unwrap_or_default();
            warn!(matched, "Submission rejected as duplicate");
            return Err(Error::conflict(format!(
                "duplicate of content {matched}"
            )));
        }

        let draft = ContentDraft {
            seo: seo::analyze(&new.body),
            fingerprint: Some(check.fingerprint.clone()),
            is_duplicate: check.is_duplicate,
            content: &new,
            actor,
        };
        let content = self.store.create_content(draft)?;

        info!(
            content_id = content.id,
            is_duplicate = check.is_duplicate,
            similar = check.similar.len(),
            "Content submitted"
        );
        Ok(Submission { content, check })
    }

    pub fn get_content(&self, id: ContentId) -> Result<ContentDetail> {
        let content = self.load(id)?;
        Ok(ContentDetail {
            history: self.store.history(id, DETAIL_HISTORY)?,
            attempts: self.store.attempts_for_content(id, DETAIL_ATTEMPTS)?,
            pending_jobs: self.store.pending_jobs(id)?,
            content,
        })
    }

    /// Partial update; a status in the patch is validated like [`Self::change_status`]
    pub fn update_content(
        &self,
        id: ContentId,
        mut patch: ContentPatch,
        actor: Actor,
    ) -> Result<Content> {
        let current = self.load(id)?;

        let target = patch.status.filter(|s| *s != current.status);
        patch.status = target;
        let fields = patch.changed_fields();

        if fields.is_empty() && target.is_none() {
            debug!(content_id = id, "Nothing to update");
            return Ok(current);
        }

        let mut change = ContentChange::new(current.status);
        if let Some(to) = target {
            change.require_no_pending_job = validate_manual_transition(current.status, to)?;
        }

        // Body edits are screened again, excluding the content itself
        let check = match &patch.body {
            Some(body) => {
                let title = patch.title.as_deref().unwrap_or(&current.title);
                let check = self.gate.check_duplicate(title, body, Some(id))?;
                if check.is_duplicate && self.gate.config().block_duplicates {
                    return Err(Error::conflict(format!(
                        "edit duplicates content {}",
                        check.similar.first().map(|s| s.id).unwrap_or_default()
                    )));
                }
                change.seo = Some(seo::analyze(body));
                change.fingerprint = Some(fingerprint(body));
                change.is_duplicate = Some(check.is_duplicate);
                Some(check)
            }
            None => None,
        };

        if !fields.is_empty() {
            change
                .entries
                .push(NewHistoryEntry::content_update(actor, &fields));
        }
        if let Some(to) = target {
            change
                .entries
                .push(NewHistoryEntry::status_change(actor, current.status, to));
        }
        change.patch = patch;

        let updated = self.store.apply_change(id, change)?;

        if let Some(to) = target {
            metrics::record_status_transition(current.status, to);
            info!(content_id = id, from = %current.status, %to, %actor, "Status changed");
        }
        if let Some(check) = check {
            info!(
                content_id = id,
                fields = ?fields,
                is_duplicate = check.is_duplicate,
                "Content updated"
            );
        } else {
            info!(content_id = id, fields = ?fields, "Content updated");
        }

        Ok(updated)
    }

    /// Move a content to another status. Same status is a no-op.
    pub fn change_status(
        &self,
        id: ContentId,
        status: ContentStatus,
        actor: Actor,
    ) -> Result<Content> {
        let current = self.load(id)?;
        if current.status == status {
            return Ok(current);
        }

        let mut change = ContentChange::new(current.status);
        change.require_no_pending_job = validate_manual_transition(current.status, status)?;
        change.patch.status = Some(status);
        change
            .entries
            .push(NewHistoryEntry::status_change(actor, current.status, status));

        let updated = self.store.apply_change(id, change)?;

        metrics::record_status_transition(current.status, status);
        info!(content_id = id, from = %current.status, to = %status, %actor, "Status changed");
        Ok(updated)
    }

    /// Hard delete with history, attempt logs and jobs
    pub fn delete_content(&self, id: ContentId) -> Result<()> {
        if !self.store.delete_content(id)? {
            return Err(Error::not_found("content", id));
        }
        info!(content_id = id, "Content deleted");
        Ok(())
    }

    pub fn search(&self, filter: &ContentFilter) -> Result<Page<Content>> {
        self.store.search(filter)
    }

    pub fn status_counts(&self) -> Result<BTreeMap<ContentStatus, u64>> {
        self.store.status_counts()
    }

    /// Counts, recent items per stage, and bottleneck advisories
    pub fn overview(&self) -> Result<PipelineOverview> {
        let counts = self.store.status_counts()?;

        let mut stages = Vec::with_capacity(counts.len());
        for status in ContentStatus::all() {
            stages.push(StageSummary {
                status,
                count: counts.get(&status).copied().unwrap_or(0),
                items: self.store.recent_by_status(status, STAGE_ITEMS)?,
            });
        }

        let count_of = |status| counts.get(&status).copied().unwrap_or(0);
        let mut bottlenecks = Vec::new();
        if count_of(ContentStatus::Draft) > self.config.draft_threshold {
            bottlenecks.push("초안 단계에 많은 콘텐츠가 쌓여있습니다".to_string());
        }
        if count_of(ContentStatus::Review) > self.config.review_threshold {
            bottlenecks.push("검수 대기 중인 콘텐츠가 많습니다".to_string());
        }

        Ok(PipelineOverview {
            total: counts.values().sum(),
            stages,
            bottlenecks,
        })
    }

    fn load(&self, id: ContentId) -> Result<Content> {
        self.store
            .get_content(id)?
            .ok_or(Error::not_found("content", id))
    }
}

/// Check a transition requested by an editor.
///
/// Returns whether the move additionally requires that no PENDING job exists.
fn validate_manual_transition(from: ContentStatus, to: ContentStatus) -> Result<bool> {
    let reserved = matches!(to, ContentStatus::Scheduled | ContentStatus::Published);
    if reserved || !from.can_transition_to(to) {
        return Err(Error::InvalidTransition { from, to });
    }
    Ok(from == ContentStatus::Scheduled)
}
