//! Publish dispatcher
//!
//! Runs immediate publishes and sweeps due scheduled jobs. Platform calls for
//! one content run concurrently, each under its own timeout; a failure on one
//! platform never aborts the others. Platform failures are recovered here and
//! recorded; repository failures propagate.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use super::{PlatformAdapter, PlatformError, PlatformResult, PublishOutcome, PublishedPost};
use crate::config::DispatcherConfig;
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{
    Actor, AttemptOutcome, Content, ContentId, ContentStatus, JobId, JobStatus, NewApiError,
    NewAttemptLog, NewHistoryEntry, Platform, PlatformTarget, ScheduledJob,
};
use crate::storage::{ContentChange, JobResolution, Store};
use crate::utils::retry::RetryConfig;

/// Jobs claimed per sweep
const SWEEP_BATCH: usize = 50;

/// Attempt logs scanned when collecting a job's successes
const JOB_ATTEMPT_SCAN: usize = 100;

/// What happened to one claimed job
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub content_id: ContentId,
    /// Job status after the sweep; PENDING means a retry was booked
    pub status: JobStatus,
    pub results: Vec<PlatformResult>,
}

/// Summary of one sweep over due jobs
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub claimed: usize,
    pub published: usize,
    pub retried: usize,
    pub failed: usize,
    /// Jobs whose claim was taken over or cancelled mid-dispatch
    pub lost: usize,
    pub jobs: Vec<JobReport>,
}

pub struct PublishDispatcher {
    store: Arc<dyn Store>,
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
    config: DispatcherConfig,
    retry: RetryConfig,
}

impl PublishDispatcher {
    pub fn new<S: Store + 'static>(
        store: Arc<S>,
        adapters: Vec<Arc<dyn PlatformAdapter>>,
        config: DispatcherConfig,
    ) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.platform(), adapter))
            .collect();
        Self {
            store,
            adapters,
            retry: config.retry_config(),
            config,
        }
    }

    /// Publish a content right away.
    ///
    /// `target` defaults to the content's own platform. The content must be
    /// APPROVED or already PUBLISHED; a SCHEDULED content has to be
    /// cancelled first. The content stays locked against scheduling, edits
    /// and deletion until the results are reconciled.
    pub async fn publish_now(
        &self,
        content_id: ContentId,
        target: Option<PlatformTarget>,
        actor: Actor,
    ) -> Result<Vec<PlatformResult>> {
        let content = self
            .store
            .get_content(content_id)?
            .ok_or(Error::not_found("content", content_id))?;

        match content.status {
            ContentStatus::Approved | ContentStatus::Published => {}
            ContentStatus::Scheduled => {
                return Err(Error::conflict(format!(
                    "content {content_id} is scheduled; cancel the job before publishing now"
                )));
            }
            from => {
                return Err(Error::InvalidTransition {
                    from,
                    to: ContentStatus::Published,
                });
            }
        }

        let until = Utc::now() + self.config.claim_timeout();
        let token = self.store.claim_publish(content_id, content.status, until)?;

        let platforms = target.unwrap_or(content.platform).platforms();
        let results = match self.dispatch(&content, &platforms, None, 0).await {
            Ok(results) => results,
            Err(e) => {
                self.release_publish(content_id, &token);
                return Err(e);
            }
        };

        let posts: Vec<(Platform, Option<String>)> = results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| (r.platform, r.external_url().map(str::to_string)))
            .collect();

        if posts.is_empty() {
            self.release_publish(content_id, &token);
        } else {
            let mut change = ContentChange::new(content.status);
            change.publish_token = Some(token.clone());
            if content.status == ContentStatus::Approved {
                change.patch.status = Some(ContentStatus::Published);
                change.published_at = Some(Utc::now());
                change.entries.push(NewHistoryEntry::status_change(
                    actor,
                    ContentStatus::Approved,
                    ContentStatus::Published,
                ));
            }
            for (platform, url) in &posts {
                change
                    .entries
                    .push(NewHistoryEntry::published(actor, *platform, url.as_deref()));
            }
            match self.store.apply_change(content_id, change) {
                Ok(_) => {
                    if content.status == ContentStatus::Approved {
                        metrics::record_status_transition(
                            ContentStatus::Approved,
                            ContentStatus::Published,
                        );
                    }
                    info!(content_id, %actor, platforms = posts.len(), "Content published");
                }
                // posts are live and already in the attempt log
                Err(Error::Conflict(reason)) => {
                    warn!(content_id, %reason, "Published, but content changed during dispatch");
                    self.release_publish(content_id, &token);
                }
                Err(e) => {
                    self.release_publish(content_id, &token);
                    return Err(e);
                }
            }
        }

        Ok(results)
    }

    fn release_publish(&self, content_id: ContentId, token: &str) {
        if let Err(e) = self.store.release_publish(content_id, token) {
            warn!(content_id, error = %e, "Failed to release publish lock");
        }
    }

    /// Attempt every due job once
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let _timer = metrics::start_sweep_timer();

        let stale_before = now - self.config.claim_timeout();
        let jobs = self.store.claim_due_jobs(now, stale_before, SWEEP_BATCH)?;

        let mut report = SweepReport {
            claimed: jobs.len(),
            ..Default::default()
        };

        for job in jobs {
            match self.process_job(&job, now).await {
                Ok(job_report) => {
                    match job_report.status {
                        JobStatus::Published => report.published += 1,
                        JobStatus::Failed => report.failed += 1,
                        _ => report.retried += 1,
                    }
                    report.jobs.push(job_report);
                }
                Err(e @ (Error::Conflict(_) | Error::NotFound { .. })) => {
                    warn!(job_id = job.id, error = %e, "Lost claim during dispatch");
                    report.lost += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if report.claimed > 0 {
            info!(
                claimed = report.claimed,
                published = report.published,
                retried = report.retried,
                failed = report.failed,
                lost = report.lost,
                "Sweep finished"
            );
        }
        Ok(report)
    }

    /// Run [`Self::run_due`] on the configured interval until stopped
    pub fn start(self: Arc<Self>) -> DispatcherHandle {
        let (shutdown, mut shutdown_rx) = tokio::sync::watch::channel(false);
        let period = self.config.sweep_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_due(Utc::now()).await {
                            error!(error = %e, "Sweep failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Dispatcher stopping");
                        break;
                    }
                }
            }
        });

        DispatcherHandle { handle, shutdown }
    }

    async fn process_job(&self, job: &ScheduledJob, now: DateTime<Utc>) -> Result<JobReport> {
        let claim = job
            .claim_token
            .as_deref()
            .ok_or_else(|| Error::conflict(format!("job {} is not claimed", job.id)))?;

        let content = self
            .store
            .get_content(job.content_id)?
            .ok_or(Error::not_found("content", job.content_id))?;

        let done = self.store.succeeded_platforms(job.id)?;
        let remaining: Vec<Platform> = job
            .platform
            .platforms()
            .into_iter()
            .filter(|p| !done.contains(p))
            .collect();

        let results = self
            .dispatch(&content, &remaining, Some(job.id), job.retry_count)
            .await?;

        let failures: Vec<&PlatformResult> = results
            .iter()
            .filter(|r| matches!(r.outcome, PublishOutcome::Failed { .. }))
            .collect();
        let any_success = !done.is_empty() || results.iter().any(PlatformResult::is_success);

        let resolution = if !failures.is_empty() {
            let error = failures
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            let failures_so_far = job.retry_count + 1;
            if self.retry.is_exhausted(failures_so_far) {
                metrics::record_job_failed();
                warn!(job_id = job.id, retries = failures_so_far, %error, "Job failed permanently");
                JobResolution::Failed {
                    error,
                    count_attempt: true,
                }
            } else {
                let next_attempt_at = self.retry.next_attempt_at(now, failures_so_far);
                info!(job_id = job.id, %next_attempt_at, "Job will be retried");
                JobResolution::Retry {
                    error,
                    next_attempt_at,
                }
            }
        } else if any_success {
            JobResolution::Published {
                posts: self.job_posts(&content, job.id)?,
            }
        } else {
            warn!(job_id = job.id, "No configured platform for job");
            JobResolution::Failed {
                error: format!("no configured platform for {}", job.platform),
                count_attempt: false,
            }
        };

        let published = matches!(resolution, JobResolution::Published { .. });
        let resolved = self.store.resolve_job(job.id, claim, resolution)?;
        if published && content.status != ContentStatus::Published {
            metrics::record_status_transition(content.status, ContentStatus::Published);
            info!(job_id = job.id, content_id = content.id, "Scheduled content published");
        }

        Ok(self.job_report(resolved, results))
    }

    fn job_report(&self, job: ScheduledJob, results: Vec<PlatformResult>) -> JobReport {
        JobReport {
            job_id: job.id,
            content_id: job.content_id,
            status: job.status,
            results,
        }
    }

    /// Platform and URL of every success recorded for the job
    fn job_posts(&self, content: &Content, job_id: JobId) -> Result<Vec<(Platform, Option<String>)>> {
        let mut posts: Vec<(Platform, Option<String>)> = Vec::new();
        for attempt in self.store.attempts_for_content(content.id, JOB_ATTEMPT_SCAN)? {
            if attempt.job_id != Some(job_id) || attempt.outcome != AttemptOutcome::Success {
                continue;
            }
            if !posts.iter().any(|(p, _)| *p == attempt.platform) {
                posts.push((attempt.platform, attempt.external_url));
            }
        }
        posts.sort_by_key(|(p, _)| *p);
        Ok(posts)
    }

    /// Call every platform concurrently, then record each outcome
    async fn dispatch(
        &self,
        content: &Content,
        platforms: &[Platform],
        job_id: Option<JobId>,
        retry_count: u32,
    ) -> Result<Vec<PlatformResult>> {
        let calls = platforms.iter().map(|&platform| async move {
            let outcome = match self.adapters.get(&platform) {
                Some(adapter) => Some(self.call(adapter.as_ref(), content).await),
                None => None,
            };
            (platform, outcome)
        });
        let outcomes = join_all(calls).await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (platform, outcome) in outcomes {
            let result = match outcome {
                None => {
                    debug!(%platform, "No adapter registered, skipping");
                    metrics::record_publish_attempt(platform, "skipped");
                    PlatformResult {
                        platform,
                        outcome: PublishOutcome::Skipped {
                            reason: "no adapter registered".to_string(),
                        },
                    }
                }
                Some(outcome) => {
                    self.record_outcome(content.id, job_id, platform, retry_count, outcome)?
                }
            };
            results.push(result);
        }
        Ok(results)
    }

    async fn call(
        &self,
        adapter: &dyn PlatformAdapter,
        content: &Content,
    ) -> std::result::Result<PublishedPost, PlatformError> {
        let limit = self.config.platform_timeout();
        match tokio::time::timeout(limit, adapter.create_post(&content.title, &content.body)).await
        {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Timeout {
                seconds: limit.as_secs(),
            }),
        }
    }

    fn record_outcome(
        &self,
        content_id: ContentId,
        job_id: Option<JobId>,
        platform: Platform,
        retry_count: u32,
        outcome: std::result::Result<PublishedPost, PlatformError>,
    ) -> Result<PlatformResult> {
        let outcome = match outcome {
            Ok(post) => {
                self.store.record_attempt(&NewAttemptLog::success(
                    content_id,
                    job_id,
                    platform,
                    post.external_id.clone(),
                    post.external_url.clone(),
                    retry_count,
                ))?;
                metrics::record_publish_attempt(platform, "success");
                info!(content_id, %platform, url = %post.external_url, "Post created");
                PublishOutcome::Success {
                    external_id: post.external_id,
                    external_url: post.external_url,
                }
            }
            Err(e @ PlatformError::NotConfigured { .. }) => {
                debug!(%platform, "Platform not configured, skipping");
                metrics::record_publish_attempt(platform, "skipped");
                PublishOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!(content_id, %platform, error = %message, "Platform call failed");

                self.store.record_attempt(&NewAttemptLog::failure(
                    content_id,
                    job_id,
                    platform,
                    message.clone(),
                    retry_count,
                ))?;
                let endpoint = self
                    .adapters
                    .get(&platform)
                    .map(|a| a.endpoint())
                    .unwrap_or_default();
                self.store.record(&NewApiError {
                    platform,
                    endpoint,
                    method: "POST".to_string(),
                    status_code: e.status_code(),
                    message: message.clone(),
                    retry_count,
                })?;
                metrics::record_publish_attempt(platform, "failed");

                PublishOutcome::Failed {
                    error: message,
                    status_code: e.status_code(),
                }
            }
        };

        Ok(PlatformResult { platform, outcome })
    }
}

/// Running sweep loop
pub struct DispatcherHandle {
    handle: tokio::task::JoinHandle<()>,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl DispatcherHandle {
    /// Wait for the loop to exit
    pub async fn wait(self) {
        let _ = self.handle.await;
    }

    /// Signal shutdown and wait; an in-flight sweep finishes first
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        self.wait().await;
    }
}
