pub mod content;
pub mod monitor;
pub mod publish;
pub mod schedule;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;

use nuri::config::Config;
use nuri::pipeline::PipelineCoordinator;
use nuri::publishing::{build_adapters, PublishDispatcher};
use nuri::scheduling::SchedulingCoordinator;
use nuri::storage::SqliteStore;

// Re-export command functions for convenience
pub use content::{create, list, pipeline, show, status};
pub use monitor::{errors, resolve_error};
pub use publish::{dispatch, publish};
pub use schedule::{calendar, cancel, requeue, reschedule, schedule};

/// Opened store plus the configuration every command builds from
pub struct App {
    pub config: Config,
    pub store: Arc<SqliteStore>,
}

impl App {
    pub fn open(config: Config) -> Result<Self> {
        let store = SqliteStore::new(&config.database.sqlite_path, config.busy_timeout())
            .with_context(|| {
                format!(
                    "Failed to open database: {}",
                    config.database.sqlite_path.display()
                )
            })?;

        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    pub fn pipeline(&self) -> PipelineCoordinator {
        PipelineCoordinator::new(self.store.clone(), &self.config)
    }

    pub fn scheduling(&self) -> SchedulingCoordinator {
        SchedulingCoordinator::new(self.store.clone())
    }

    pub fn dispatcher(&self) -> Result<PublishDispatcher> {
        let adapters = build_adapters(
            &self.config.platforms,
            self.config.dispatcher.requests_per_second,
        )
        .context("Failed to build platform adapters")?;

        Ok(PublishDispatcher::new(
            self.store.clone(),
            adapters,
            self.config.dispatcher.clone(),
        ))
    }
}

/// Parse an RFC3339 timestamp or `YYYY-MM-DD HH:MM` in UTC
pub fn parse_when(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M")
        .map(|naive| naive.and_utc())
        .with_context(|| format!("Invalid time '{input}', expected RFC3339 or YYYY-MM-DD HH:MM"))
}
