//! Multi-platform publishing
//!
//! This module provides the [`PlatformAdapter`] seam, the Tistory and
//! WordPress adapters, and the [`dispatcher::PublishDispatcher`] that runs
//! immediate and scheduled publishes against them.

pub mod dispatcher;
pub mod tistory;
pub mod wordpress;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::PlatformsConfig;
use crate::models::Platform;

pub use dispatcher::{DispatcherHandle, PublishDispatcher, SweepReport};
pub use tistory::TistoryAdapter;
pub use wordpress::WordpressAdapter;

/// Errors raised by a platform call
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Credentials missing; the platform is skipped, not failed
    #[error("{platform} is not configured")]
    NotConfigured { platform: Platform },

    /// Transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx response carrying an API-level error
    #[error("API error: {0}")]
    Api(String),

    /// Call exceeded the dispatcher timeout
    #[error("Timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl PlatformError {
    /// Whether a later attempt may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::NotConfigured { .. })
    }

    /// HTTP status, when the failure came with one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Get Korean description for user-facing messages
    pub fn korean_desc(&self) -> String {
        match self {
            Self::NotConfigured { platform } => format!("{platform} 설정 없음"),
            Self::Http(_) => "네트워크 요청 실패".to_string(),
            Self::Status { status, .. } => format!("HTTP 오류 {status}"),
            Self::Api(msg) => format!("플랫폼 API 오류: {msg}"),
            Self::Timeout { seconds } => format!("{seconds}초 내 응답 없음"),
            Self::InvalidResponse(_) => "응답 형식 오류".to_string(),
        }
    }
}

/// A post created on a platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub external_id: String,
    pub external_url: String,
}

/// One blogging platform
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Endpoint recorded with API errors
    fn endpoint(&self) -> String;

    /// Create a post. `NotConfigured` when credentials are missing.
    async fn create_post(&self, title: &str, body: &str) -> Result<PublishedPost, PlatformError>;
}

/// Outcome for one platform in one dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishOutcome {
    Success {
        external_id: String,
        external_url: String,
    },
    Failed {
        error: String,
        status_code: Option<u16>,
    },
    Skipped {
        reason: String,
    },
}

/// Result for one platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformResult {
    pub platform: Platform,
    #[serde(flatten)]
    pub outcome: PublishOutcome,
}

impl PlatformResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, PublishOutcome::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, PublishOutcome::Skipped { .. })
    }

    pub fn external_url(&self) -> Option<&str> {
        match &self.outcome {
            PublishOutcome::Success { external_url, .. } => Some(external_url),
            _ => None,
        }
    }
}

impl fmt::Display for PlatformResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            PublishOutcome::Success { external_url, .. } => {
                write!(f, "[SUCCESS] {}: {external_url}", self.platform)
            }
            PublishOutcome::Failed { error, .. } => write!(f, "[FAILED] {}: {error}", self.platform),
            PublishOutcome::Skipped { reason } => {
                write!(f, "[SKIPPED] {}: {reason}", self.platform)
            }
        }
    }
}

/// Build one adapter per supported platform from configuration
pub fn build_adapters(
    config: &PlatformsConfig,
    requests_per_second: u32,
) -> Result<Vec<Arc<dyn PlatformAdapter>>, PlatformError> {
    let tistory: Arc<dyn PlatformAdapter> = Arc::new(TistoryAdapter::new(
        config.tistory.clone(),
        requests_per_second,
    )?);
    let wordpress: Arc<dyn PlatformAdapter> = Arc::new(WordpressAdapter::new(
        config.wordpress.clone(),
        requests_per_second,
    )?);
    Ok(vec![tistory, wordpress])
}

pub(crate) fn http_client() -> Result<reqwest::Client, PlatformError> {
    Ok(reqwest::Client::builder()
        .user_agent(format!("nuri/{}", env!("CARGO_PKG_VERSION")))
        .build()?)
}

pub(crate) fn rate_limiter(
    requests_per_second: u32,
) -> governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
> {
    let rate = std::num::NonZeroU32::new(requests_per_second).unwrap_or(std::num::NonZeroU32::MIN);
    governor::RateLimiter::direct(governor::Quota::per_second(rate))
}
