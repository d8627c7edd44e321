//! Repository Pattern for Database Abstraction
//!
//! Trait-based repository abstractions that decouple the pipeline,
//! scheduling and dispatch logic from the storage implementation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Business Logic                          │
//! │     (DuplicateGate, Pipeline, Scheduling, Dispatcher)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Repository Traits                         │
//! │  ContentRepository, JobRepository, AttemptLogRepository,    │
//! │  ErrorSink                                                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                    ┌─────────────────┐
//!                    │   SqliteStore   │
//!                    └─────────────────┘
//! ```
//!
//! Every method that moves content status takes the status the caller
//! validated against (`expected_status`). The store applies the change only
//! if the row still has that status, so a concurrent writer surfaces as
//! `Error::Conflict` instead of a silently skipped check.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::{
    Actor, ApiErrorRecord, CalendarEvent, Content, ContentId, ContentPatch, ContentStatus,
    ContentSummary, DedupCandidate, EditHistoryEntry, JobId, NewApiError, NewAttemptLog,
    NewContent, NewHistoryEntry, Platform, PlatformTarget, PublishAttemptLog, ScheduledJob,
};
use crate::seo::SeoReport;

// ============================================================================
// Core Types
// ============================================================================

/// Default page size for listings
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// One page of a listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }
}

/// Search criteria for contents
#[derive(Debug, Clone)]
pub struct ContentFilter {
    /// Substring matched against title and body
    pub query: Option<String>,
    pub status: Option<ContentStatus>,
    pub author_id: Option<i64>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self {
            query: None,
            status: None,
            author_id: None,
            created_from: None,
            created_to: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ContentFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }
}

/// Listing criteria for API errors
#[derive(Debug, Clone)]
pub struct ErrorFilter {
    pub platform: Option<Platform>,
    pub resolved: Option<bool>,
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl Default for ErrorFilter {
    fn default() -> Self {
        Self {
            platform: None,
            resolved: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ErrorFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }
}

/// Aggregate view of platform errors for the operator monitor
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorStats {
    pub total: u64,
    pub unresolved: u64,
    pub last_24h: u64,
    pub last_7d: u64,
    /// Percent of failed attempts over the last 7 days, two decimals
    pub error_rate: f64,
    /// Percent of successful attempts over the last 7 days, two decimals; 100 with no attempts
    pub success_rate: f64,
    /// Errors per platform over the last 7 days
    pub by_platform: BTreeMap<Platform, u64>,
    /// Up to five most frequent endpoints over the last 7 days
    pub top_endpoints: Vec<(String, u64)>,
    /// One decimal
    pub avg_retry_count: f64,
    pub max_retry_count: u32,
}

/// A guarded update of one content row plus its audit entries.
///
/// Applied in one transaction. Fails with `Conflict` when the stored
/// status no longer equals `expected_status`, or when an immediate publish
/// holds the content and `publish_token` is not its token.
#[derive(Debug, Clone)]
pub struct ContentChange {
    pub expected_status: ContentStatus,
    /// Field updates; `patch.status` is the target status
    pub patch: ContentPatch,
    pub seo: Option<SeoReport>,
    pub published_at: Option<DateTime<Utc>>,
    /// Reject the change while a PENDING job exists for the content
    pub require_no_pending_job: bool,
    /// New body fingerprint, written together with `is_duplicate`
    pub fingerprint: Option<String>,
    pub is_duplicate: Option<bool>,
    /// Token from [`ContentRepository::claim_publish`]; the change releases that lock
    pub publish_token: Option<String>,
    pub entries: Vec<NewHistoryEntry>,
}

impl ContentChange {
    pub fn new(expected_status: ContentStatus) -> Self {
        Self {
            expected_status,
            patch: ContentPatch::default(),
            seo: None,
            published_at: None,
            require_no_pending_job: false,
            fingerprint: None,
            is_duplicate: None,
            publish_token: None,
            entries: Vec::new(),
        }
    }
}

/// Content row to insert, with the screening results already computed
#[derive(Debug, Clone)]
pub struct ContentDraft<'a> {
    pub content: &'a NewContent,
    pub seo: SeoReport,
    pub fingerprint: Option<String>,
    pub is_duplicate: bool,
    pub actor: Actor,
}

/// How a claimed job ends
#[derive(Debug, Clone)]
pub enum JobResolution {
    /// Every configured target succeeded
    Published {
        /// Platform and URL of each success in this run
        posts: Vec<(Platform, Option<String>)>,
    },
    /// Failed attempt with retries left
    Retry {
        error: String,
        next_attempt_at: DateTime<Utc>,
    },
    /// No further automatic attempts
    Failed {
        error: String,
        count_attempt: bool,
    },
}

// ============================================================================
// Repository Traits
// ============================================================================

/// Contents, their audit trail and duplicate-screening lookups
pub trait ContentRepository: Send + Sync {
    /// Insert a content with its `CREATE` entry
    fn create_content(&self, draft: ContentDraft<'_>) -> Result<Content>;

    fn get_content(&self, id: ContentId) -> Result<Option<Content>>;

    /// Apply a guarded update (see [`ContentChange`])
    fn apply_change(&self, id: ContentId, change: ContentChange) -> Result<Content>;

    /// Hard delete, cascading history, attempt logs and jobs.
    ///
    /// `Conflict` while a dispatch holds a claimed job or a publish lock.
    fn delete_content(&self, id: ContentId) -> Result<bool>;

    /// Lock a content for an immediate publish until `until`.
    ///
    /// `Conflict` if the status is no longer `expected_status` or another
    /// unexpired lock is held. While locked, scheduling, deletion and
    /// changes without the returned token are rejected.
    fn claim_publish(
        &self,
        id: ContentId,
        expected_status: ContentStatus,
        until: DateTime<Utc>,
    ) -> Result<String>;

    /// Drop a publish lock if `token` still holds it
    fn release_publish(&self, id: ContentId, token: &str) -> Result<()>;

    fn search(&self, filter: &ContentFilter) -> Result<Page<Content>>;

    /// Number of contents per status; every status is present
    fn status_counts(&self) -> Result<BTreeMap<ContentStatus, u64>>;

    /// Most recently updated contents with the given status
    fn recent_by_status(&self, status: ContentStatus, limit: usize) -> Result<Vec<Content>>;

    /// Newest audit entries first
    fn history(&self, id: ContentId, limit: usize) -> Result<Vec<EditHistoryEntry>>;

    /// Any other content with this stored fingerprint
    fn find_by_fingerprint(
        &self,
        fingerprint: &str,
        exclude: Option<ContentId>,
    ) -> Result<Option<ContentSummary>>;

    /// Most recently created contents, newest first
    fn recent_candidates(
        &self,
        limit: usize,
        exclude: Option<ContentId>,
    ) -> Result<Vec<DedupCandidate>>;

    /// Store a fingerprint and clear the duplicate flag
    fn set_fingerprint(&self, id: ContentId, fingerprint: &str) -> Result<()>;

    /// Set the duplicate flag, leaving the fingerprint alone
    fn mark_duplicate(&self, id: ContentId) -> Result<()>;
}

/// Scheduled publish jobs
pub trait JobRepository: Send + Sync {
    /// Insert a PENDING job and move the content to SCHEDULED.
    ///
    /// `Conflict` if the content already has a PENDING job or its status is
    /// no longer `expected_status`.
    fn create_job(
        &self,
        content_id: ContentId,
        expected_status: ContentStatus,
        platform: PlatformTarget,
        scheduled_for: DateTime<Utc>,
        actor: Actor,
    ) -> Result<ScheduledJob>;

    fn get_job(&self, id: JobId) -> Result<Option<ScheduledJob>>;

    fn pending_jobs(&self, content_id: ContentId) -> Result<Vec<ScheduledJob>>;

    /// Move the due time of a PENDING, unclaimed job and clear its backoff
    fn reschedule_job(&self, id: JobId, scheduled_for: DateTime<Utc>) -> Result<ScheduledJob>;

    /// Delete a PENDING, unclaimed job and move its content back to APPROVED
    fn cancel_job(&self, id: JobId, actor: Actor) -> Result<ScheduledJob>;

    /// Return a FAILED job to PENDING with a fresh retry budget
    fn requeue_job(&self, id: JobId, actor: Actor) -> Result<ScheduledJob>;

    /// Claim due PENDING jobs whose claim is absent or older than `stale_before`
    fn claim_due_jobs(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledJob>>;

    /// Close out a claimed job. `Conflict` if the claim was lost.
    fn resolve_job(
        &self,
        id: JobId,
        claim_token: &str,
        resolution: JobResolution,
    ) -> Result<ScheduledJob>;

    /// Jobs due in `[from, to)`; only PENDING unless `include_history`
    fn calendar(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        include_history: bool,
    ) -> Result<Vec<CalendarEvent>>;
}

/// Append-only publish attempt log
pub trait AttemptLogRepository: Send + Sync {
    fn record_attempt(&self, attempt: &NewAttemptLog) -> Result<PublishAttemptLog>;

    /// Newest first
    fn attempts_for_content(
        &self,
        content_id: ContentId,
        limit: usize,
    ) -> Result<Vec<PublishAttemptLog>>;

    /// Platforms with a SUCCESS attempt for this job
    fn succeeded_platforms(&self, job_id: JobId) -> Result<Vec<Platform>>;
}

/// Durable log of failed platform calls
pub trait ErrorSink: Send + Sync {
    fn record(&self, error: &NewApiError) -> Result<ApiErrorRecord>;

    /// Newest first
    fn list_errors(&self, filter: &ErrorFilter) -> Result<Page<ApiErrorRecord>>;

    fn error_stats(&self, now: DateTime<Utc>) -> Result<ErrorStats>;

    /// Mark resolved; `NotFound` for unknown ids
    fn resolve(&self, id: i64) -> Result<ApiErrorRecord>;
}

/// Everything the coordinators need, in one object
pub trait Store: ContentRepository + JobRepository + AttemptLogRepository + ErrorSink {}

impl<T> Store for T where T: ContentRepository + JobRepository + AttemptLogRepository + ErrorSink {}
