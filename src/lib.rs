//! nuri - Korean blog publishing pipeline
//!
//! Takes editorial content from draft to publication on Tistory and
//! WordPress, with duplicate screening, scheduled publishing and an audit
//! trail of every change.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures and types
//! - [`storage`] - Repository traits and the SQLite store
//! - [`dedup`] - Fingerprints, similarity and the duplicate gate
//! - [`pipeline`] - Content status state machine
//! - [`scheduling`] - Scheduled publish jobs and calendar views
//! - [`publishing`] - Platform adapters and the publish dispatcher
//! - [`seo`] - Basic SEO scoring
//! - [`metrics`] - Prometheus counters
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nuri::config::Config;
//! use nuri::models::{Actor, NewContent};
//! use nuri::pipeline::PipelineCoordinator;
//! use nuri::storage::SqliteStore;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(SqliteStore::new(&config.database.sqlite_path, config.busy_timeout())?);
//!     let pipeline = PipelineCoordinator::new(store, &config);
//!     let submission = pipeline.submit(NewContent::new("제목", "# 본문"), Actor::System)?;
//!     println!("created #{}", submission.content.id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dedup;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod publishing;
pub mod scheduling;
pub mod seo;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::dedup::{DuplicateCheck, DuplicateGate};
    pub use crate::error::{Error, ErrorCategory, NuriErrorTrait, Result};
    pub use crate::models::{
        Actor, Content, ContentStatus, NewContent, Platform, PlatformTarget, ScheduledJob,
    };
    pub use crate::pipeline::PipelineCoordinator;
    pub use crate::publishing::{PlatformAdapter, PublishDispatcher};
    pub use crate::scheduling::SchedulingCoordinator;
    pub use crate::storage::{SqliteStore, Store};
}

// Direct re-exports for convenience
pub use models::{Content, ContentStatus, Platform, PlatformTarget};
