//! Unified error handling for the nuri crate
//!
//! This module provides a unified error type that consolidates the
//! pipeline, scheduling, storage and platform failures into a single
//! `Error` enum.
//!
//! # Architecture
//!
//! - [`NuriErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use nuri::error::{Error, NuriErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("재시도: {}", err.korean_desc());
//!     } else {
//!         eprintln!("Fatal error: {}", err);
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

use crate::models::{ContentStatus, Platform};

// Re-export domain-specific errors for convenience
pub use crate::publishing::PlatformError;

/// Common trait for all nuri error types
pub trait NuriErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get Korean description for user-facing messages
    fn korean_desc(&self) -> String;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Unknown identifiers
    Lookup,
    /// Request conflicts with current state (duplicates, illegal transitions, claimed jobs)
    Conflict,
    /// Platform calls (HTTP, timeout, API rejection)
    Network,
    /// Storage and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get Korean description for the category
    pub fn korean_desc(&self) -> &'static str {
        match self {
            Self::Lookup => "조회 오류",
            Self::Conflict => "상태 충돌",
            Self::Network => "네트워크 오류",
            Self::Storage => "저장소 오류",
            Self::Config => "설정 오류",
            Self::Other => "기타 오류",
        }
    }
}

/// Unified error type for the nuri crate
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced entity does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Request conflicts with the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Status change not allowed by the pipeline state machine
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: ContentStatus,
        to: ContentStatus,
    },

    /// Platform has no credentials or no adapter
    #[error("Platform {platform} is not configured")]
    NotConfigured { platform: Platform },

    /// Platform call failed
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// Storage errors that are not raised by SQLite itself
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl NuriErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Platform(e) => e.is_transient(),
            Self::Io(_) => true,
            Self::Database(e) => matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            Self::NotFound { .. }
            | Self::Conflict(_)
            | Self::InvalidTransition { .. }
            | Self::NotConfigured { .. }
            | Self::Storage(_)
            | Self::Config(_)
            | Self::Json(_)
            | Self::Other { .. } => false,
        }
    }

    fn korean_desc(&self) -> String {
        match self {
            Self::NotFound { entity, id } => format!("{entity} {id}을(를) 찾을 수 없음"),
            Self::Conflict(msg) => format!("상태 충돌: {msg}"),
            Self::InvalidTransition { from, to } => format!(
                "허용되지 않는 상태 변경: {} -> {}",
                from.korean_name(),
                to.korean_name()
            ),
            Self::NotConfigured { platform } => format!("{platform} 플랫폼 설정 없음"),
            Self::Platform(e) => e.korean_desc(),
            Self::Database(e) => format!("데이터베이스 오류: {e}"),
            Self::Storage(msg) => format!("저장소 오류: {msg}"),
            Self::Config(msg) => format!("설정 오류: {msg}"),
            Self::Io(e) => format!("입출력 오류: {e}"),
            Self::Json(e) => format!("JSON 오류: {e}"),
            Self::Other { context, .. } => context.clone(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::Lookup,
            Self::Conflict(_) | Self::InvalidTransition { .. } => ErrorCategory::Conflict,
            Self::NotConfigured { .. } => ErrorCategory::Config,
            Self::Platform(PlatformError::NotConfigured { .. }) => ErrorCategory::Config,
            Self::Platform(_) => ErrorCategory::Network,
            Self::Database(_) | Self::Storage(_) | Self::Io(_) | Self::Json(_) => {
                ErrorCategory::Storage
            }
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a not-found error
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from rusqlite::Error
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
