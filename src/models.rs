// Core data structures for the nuri publishing pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content identifier
pub type ContentId = i64;

/// Scheduled job identifier
pub type JobId = i64;

/// Error returned when a stored or user-supplied enum value is unknown
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ============================================================================
// Content Status State Machine
// ============================================================================

/// Publication status of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentStatus {
    Draft,
    Review,
    Approved,
    Scheduled,
    Published,
}

impl ContentStatus {
    /// Get string representation (as stored)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Review => "REVIEW",
            Self::Approved => "APPROVED",
            Self::Scheduled => "SCHEDULED",
            Self::Published => "PUBLISHED",
        }
    }

    /// Get Korean name
    pub fn korean_name(&self) -> &'static str {
        match self {
            Self::Draft => "초안",
            Self::Review => "검수",
            Self::Approved => "승인",
            Self::Scheduled => "예약",
            Self::Published => "발행",
        }
    }

    /// All statuses in pipeline order
    pub fn all() -> [Self; 5] {
        [
            Self::Draft,
            Self::Review,
            Self::Approved,
            Self::Scheduled,
            Self::Published,
        ]
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// This only describes the graph. Entering `Scheduled` is further
    /// restricted to the scheduling coordinator and entering `Published`
    /// to the publish dispatcher; those checks live with the callers.
    pub fn can_transition_to(&self, next: ContentStatus) -> bool {
        use ContentStatus::*;

        matches!(
            (self, next),
            (Draft, Review)
                | (Review, Draft)
                | (Review, Approved)
                | (Approved, Review)
                | (Approved, Draft)
                | (Approved, Scheduled)
                | (Approved, Published)
                | (Scheduled, Approved)
                | (Scheduled, Published)
                | (Published, Draft)
        )
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DRAFT" | "초안" => Ok(Self::Draft),
            "REVIEW" | "검수" => Ok(Self::Review),
            "APPROVED" | "승인" => Ok(Self::Approved),
            "SCHEDULED" | "예약" => Ok(Self::Scheduled),
            "PUBLISHED" | "발행" => Ok(Self::Published),
            _ => Err(UnknownVariant::new("content status", s)),
        }
    }
}

// ============================================================================
// Platforms
// ============================================================================

/// An external blogging platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Tistory,
    Wordpress,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tistory => "TISTORY",
            Self::Wordpress => "WORDPRESS",
        }
    }

    /// Lowercase label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Tistory => "tistory",
            Self::Wordpress => "wordpress",
        }
    }

    pub fn all() -> [Self; 2] {
        [Self::Tistory, Self::Wordpress]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TISTORY" | "티스토리" => Ok(Self::Tistory),
            "WORDPRESS" | "워드프레스" => Ok(Self::Wordpress),
            _ => Err(UnknownVariant::new("platform", s)),
        }
    }
}

/// Publication target: one platform or both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlatformTarget {
    #[default]
    Tistory,
    Wordpress,
    Both,
}

impl PlatformTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tistory => "TISTORY",
            Self::Wordpress => "WORDPRESS",
            Self::Both => "BOTH",
        }
    }

    /// Expand the target into concrete platforms
    pub fn platforms(&self) -> Vec<Platform> {
        match self {
            Self::Tistory => vec![Platform::Tistory],
            Self::Wordpress => vec![Platform::Wordpress],
            Self::Both => Platform::all().to_vec(),
        }
    }
}

impl From<Platform> for PlatformTarget {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Tistory => Self::Tistory,
            Platform::Wordpress => Self::Wordpress,
        }
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlatformTarget {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BOTH" | "ALL" => Ok(Self::Both),
            other => other
                .parse::<Platform>()
                .map(Self::from)
                .map_err(|_| UnknownVariant::new("platform target", s)),
        }
    }
}

// ============================================================================
// Actors and Audit Trail
// ============================================================================

/// Who performed an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    /// A known user
    User(i64),
    /// The scheduler, dispatcher or any other background process
    System,
}

impl Actor {
    /// Build from an optional user id, falling back to the system actor
    pub fn from_user(user_id: Option<i64>) -> Self {
        user_id.map_or(Self::System, Self::User)
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::User(id) => Some(*id),
            Self::System => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Kind of audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditAction {
    Create,
    StatusChange,
    ContentUpdate,
    Publish,
}

impl EditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::StatusChange => "STATUS_CHANGE",
            Self::ContentUpdate => "CONTENT_UPDATE",
            Self::Publish => "PUBLISH",
        }
    }
}

impl FromStr for EditAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "STATUS_CHANGE" => Ok(Self::StatusChange),
            "CONTENT_UPDATE" => Ok(Self::ContentUpdate),
            "PUBLISH" => Ok(Self::Publish),
            _ => Err(UnknownVariant::new("edit action", s)),
        }
    }
}

/// Immutable audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditHistoryEntry {
    pub id: i64,
    pub content_id: ContentId,
    pub actor: Actor,
    pub action: EditAction,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit record that has not been written yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub actor: Actor,
    pub action: EditAction,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl NewHistoryEntry {
    pub fn created(actor: Actor) -> Self {
        Self {
            actor,
            action: EditAction::Create,
            field: None,
            old_value: None,
            new_value: None,
        }
    }

    pub fn status_change(actor: Actor, from: ContentStatus, to: ContentStatus) -> Self {
        Self {
            actor,
            action: EditAction::StatusChange,
            field: Some("status".to_string()),
            old_value: Some(from.as_str().to_string()),
            new_value: Some(to.as_str().to_string()),
        }
    }

    /// Bulk field update; only the field names are recorded
    pub fn content_update(actor: Actor, fields: &[&str]) -> Self {
        Self {
            actor,
            action: EditAction::ContentUpdate,
            field: Some(fields.join(", ")),
            old_value: None,
            new_value: None,
        }
    }

    pub fn published(actor: Actor, platform: Platform, url: Option<&str>) -> Self {
        Self {
            actor,
            action: EditAction::Publish,
            field: Some(platform.label().to_string()),
            old_value: None,
            new_value: url.map(String::from),
        }
    }
}

// ============================================================================
// Content
// ============================================================================

/// The unit of work moving through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,
    pub title: String,
    pub body: String,
    pub excerpt: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub status: ContentStatus,
    pub platform: PlatformTarget,
    pub seo_score: u32,
    pub seo_issues: Vec<String>,
    pub fingerprint: Option<String>,
    pub is_duplicate: bool,
    pub author_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Fields for a content item that is about to be created
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewContent {
    pub title: String,
    pub body: String,
    pub excerpt: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub platform: PlatformTarget,
    pub author_id: Option<i64>,
}

impl NewContent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    pub fn with_platform(mut self, platform: PlatformTarget) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }
}

/// Partial update of a content item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub excerpt: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub platform: Option<PlatformTarget>,
    pub status: Option<ContentStatus>,
}

impl ContentPatch {
    /// Names of the non-status fields set in this patch
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.body.is_some() {
            fields.push("body");
        }
        if self.excerpt.is_some() {
            fields.push("excerpt");
        }
        if self.meta_title.is_some() {
            fields.push("metaTitle");
        }
        if self.meta_description.is_some() {
            fields.push("metaDescription");
        }
        if self.platform.is_some() {
            fields.push("platform");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty() && self.status.is_none()
    }
}

/// Lightweight projection used by duplicate screening
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSummary {
    pub id: ContentId,
    pub title: String,
}

/// Candidate for near-duplicate comparison
#[derive(Debug, Clone)]
pub struct DedupCandidate {
    pub id: ContentId,
    pub title: String,
    pub body: String,
}

// ============================================================================
// Scheduled Jobs
// ============================================================================

/// Lifecycle of a scheduled publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Published,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Published => "PUBLISHED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PUBLISHED" => Ok(Self::Published),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(UnknownVariant::new("job status", s)),
        }
    }
}

/// A booked future publish
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub content_id: ContentId,
    pub platform: PlatformTarget,
    pub scheduled_for: DateTime<Utc>,
    pub status: JobStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    /// Earliest time of the next attempt after a failure
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub claim_token: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledJob {
    /// When the job becomes eligible for dispatch
    pub fn due_at(&self) -> DateTime<Utc> {
        self.next_attempt_at.unwrap_or(self.scheduled_for)
    }

    pub fn is_claimed(&self) -> bool {
        self.claim_token.is_some()
    }
}

/// Calendar entry for a scheduled job
#[derive(Debug, Clone, Serialize)]
pub struct CalendarEvent {
    pub job_id: JobId,
    pub content_id: ContentId,
    pub title: String,
    pub platform: PlatformTarget,
    pub scheduled_for: DateTime<Utc>,
    pub status: JobStatus,
}

// ============================================================================
// Publish Attempts and API Errors
// ============================================================================

/// Outcome of one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    Success,
    Failed,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl FromStr for AttemptOutcome {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            _ => Err(UnknownVariant::new("attempt outcome", s)),
        }
    }
}

/// Immutable record of one dispatch attempt against one platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishAttemptLog {
    pub id: i64,
    pub content_id: ContentId,
    pub job_id: Option<JobId>,
    pub platform: Platform,
    pub outcome: AttemptOutcome,
    pub external_id: Option<String>,
    pub external_url: Option<String>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Attempt log that has not been written yet
#[derive(Debug, Clone)]
pub struct NewAttemptLog {
    pub content_id: ContentId,
    pub job_id: Option<JobId>,
    pub platform: Platform,
    pub outcome: AttemptOutcome,
    pub external_id: Option<String>,
    pub external_url: Option<String>,
    pub error: Option<String>,
    pub retry_count: u32,
}

impl NewAttemptLog {
    pub fn success(
        content_id: ContentId,
        job_id: Option<JobId>,
        platform: Platform,
        external_id: impl Into<String>,
        external_url: impl Into<String>,
        retry_count: u32,
    ) -> Self {
        Self {
            content_id,
            job_id,
            platform,
            outcome: AttemptOutcome::Success,
            external_id: Some(external_id.into()),
            external_url: Some(external_url.into()),
            error: None,
            retry_count,
        }
    }

    pub fn failure(
        content_id: ContentId,
        job_id: Option<JobId>,
        platform: Platform,
        error: impl Into<String>,
        retry_count: u32,
    ) -> Self {
        Self {
            content_id,
            job_id,
            platform,
            outcome: AttemptOutcome::Failed,
            external_id: None,
            external_url: None,
            error: Some(error.into()),
            retry_count,
        }
    }
}

/// Failed outbound platform call, kept for operator triage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorRecord {
    pub id: i64,
    pub platform: Platform,
    pub endpoint: String,
    pub method: String,
    pub status_code: Option<u16>,
    pub message: String,
    pub resolved: bool,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

/// API error that has not been written yet
#[derive(Debug, Clone)]
pub struct NewApiError {
    pub platform: Platform,
    pub endpoint: String,
    pub method: String,
    pub status_code: Option<u16>,
    pub message: String,
    pub retry_count: u32,
}
