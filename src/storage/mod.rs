//! Persistence for contents, audit trail, scheduled jobs, attempt logs and API errors
//!
//! Business logic talks to the traits in [`repository`]; [`SqliteStore`]
//! implements all of them over one SQLite connection.

pub mod repository;
pub mod sqlite;

pub use repository::{
    AttemptLogRepository, ContentChange, ContentDraft, ContentFilter, ContentRepository,
    ErrorFilter, ErrorSink, ErrorStats, JobRepository, JobResolution, Page, Store,
};
pub use sqlite::SqliteStore;
