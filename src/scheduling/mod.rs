//! Scheduled publishing and calendar views
//!
//! Keeps a content's status in step with its publish job: scheduling moves
//! the content to SCHEDULED together with inserting the PENDING job, and
//! cancelling deletes the job together with moving the content back to
//! APPROVED. Each pair is one storage transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{
    Actor, CalendarEvent, ContentId, ContentStatus, JobId, PlatformTarget, ScheduledJob,
};
use crate::storage::Store;

/// Calendar events grouped by UTC day
#[derive(Debug, Clone, Serialize)]
pub struct CalendarView {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub days: BTreeMap<NaiveDate, Vec<CalendarEvent>>,
    pub total: usize,
}

pub struct SchedulingCoordinator {
    store: Arc<dyn Store>,
}

impl SchedulingCoordinator {
    pub fn new<S: Store + 'static>(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Book a future publish for an APPROVED content
    pub fn schedule(
        &self,
        content_id: ContentId,
        platform: PlatformTarget,
        when: DateTime<Utc>,
        actor: Actor,
    ) -> Result<ScheduledJob> {
        let content = self
            .store
            .get_content(content_id)?
            .ok_or(Error::not_found("content", content_id))?;

        match content.status {
            ContentStatus::Approved => {}
            // Left behind by a job that ran out of retries
            ContentStatus::Scheduled => {
                if !self.store.pending_jobs(content_id)?.is_empty() {
                    return Err(Error::conflict(format!(
                        "content {content_id} already has a pending scheduled job"
                    )));
                }
            }
            from => {
                return Err(Error::InvalidTransition {
                    from,
                    to: ContentStatus::Scheduled,
                });
            }
        }

        let job = self
            .store
            .create_job(content_id, content.status, platform, when, actor)?;

        if content.status != ContentStatus::Scheduled {
            metrics::record_status_transition(content.status, ContentStatus::Scheduled);
        }
        info!(
            job_id = job.id,
            content_id,
            %platform,
            scheduled_for = %when,
            "Publish scheduled"
        );
        Ok(job)
    }

    /// Move a PENDING job to a new time
    pub fn reschedule(&self, job_id: JobId, when: DateTime<Utc>) -> Result<ScheduledJob> {
        let job = self.store.reschedule_job(job_id, when)?;
        info!(job_id, scheduled_for = %when, "Publish rescheduled");
        Ok(job)
    }

    /// Drop a PENDING job and return its content to APPROVED
    pub fn cancel(&self, job_id: JobId, actor: Actor) -> Result<ScheduledJob> {
        let job = self.store.cancel_job(job_id, actor)?;
        metrics::record_status_transition(ContentStatus::Scheduled, ContentStatus::Approved);
        info!(job_id, content_id = job.content_id, %actor, "Publish cancelled");
        Ok(job)
    }

    /// Give a FAILED job a fresh retry budget
    pub fn requeue(&self, job_id: JobId, actor: Actor) -> Result<ScheduledJob> {
        let job = self.store.requeue_job(job_id, actor)?;
        info!(job_id, content_id = job.content_id, %actor, "Job requeued");
        Ok(job)
    }

    /// Jobs scheduled in `[from, to)`, grouped by UTC day
    pub fn calendar_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        include_history: bool,
    ) -> Result<CalendarView> {
        let events = self.store.calendar(from, to, include_history)?;
        let total = events.len();

        let mut days: BTreeMap<NaiveDate, Vec<CalendarEvent>> = BTreeMap::new();
        for event in events {
            days.entry(event.scheduled_for.date_naive())
                .or_default()
                .push(event);
        }

        Ok(CalendarView {
            from,
            to,
            days,
            total,
        })
    }

    /// All jobs of one calendar month
    pub fn monthly_calendar(&self, year: i32, month: u32) -> Result<CalendarView> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| Error::other(format!("invalid calendar month {year}-{month}")))?;
        let next = first
            .checked_add_months(Months::new(1))
            .ok_or_else(|| Error::other(format!("calendar month {year}-{month} out of range")))?;

        self.calendar_range(start_of_day(first), start_of_day(next), true)
    }

    /// All jobs of the seven days starting at `start`
    pub fn weekly_calendar(&self, start: NaiveDate) -> Result<CalendarView> {
        let end = start
            .checked_add_days(chrono::Days::new(7))
            .ok_or_else(|| Error::other(format!("week starting {start} out of range")))?;

        self.calendar_range(start_of_day(start), start_of_day(end), true)
    }

    /// Current month view
    pub fn this_month(&self, now: DateTime<Utc>) -> Result<CalendarView> {
        self.monthly_calendar(now.year(), now.month())
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
