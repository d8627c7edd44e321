//! Dispatch integration tests
//!
//! Immediate publishing, scheduled job sweeps with retry and backoff, and
//! the error monitor, all against scripted adapters.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use nuri::config::DispatcherConfig;
use nuri::error::Error;
use nuri::models::{
    Actor, AttemptOutcome, ContentStatus, EditAction, JobStatus, Platform, PlatformTarget,
};
use nuri::pipeline::PipelineCoordinator;
use nuri::publishing::{PlatformAdapter, PublishDispatcher, PublishOutcome, PublishedPost};
use nuri::scheduling::SchedulingCoordinator;
use nuri::storage::{
    AttemptLogRepository, ContentRepository, ErrorFilter, ErrorSink, JobRepository, SqliteStore,
};

use crate::common::{
    adapters, create_approved, create_test_store, test_config, Behavior, FakeAdapter, HookAdapter,
};

struct Harness {
    store: Arc<SqliteStore>,
    pipeline: PipelineCoordinator,
    scheduling: SchedulingCoordinator,
    tistory: Arc<FakeAdapter>,
    wordpress: Arc<FakeAdapter>,
    dispatcher: PublishDispatcher,
}

fn harness(tistory: Behavior, wordpress: Behavior) -> Harness {
    let store = create_test_store();
    let tistory = FakeAdapter::new(Platform::Tistory, tistory);
    let wordpress = FakeAdapter::new(Platform::Wordpress, wordpress);
    let dispatcher = PublishDispatcher::new(
        store.clone(),
        adapters(&[&tistory, &wordpress]),
        DispatcherConfig::default(),
    );

    Harness {
        pipeline: PipelineCoordinator::new(store.clone(), &test_config()),
        scheduling: SchedulingCoordinator::new(store.clone()),
        store,
        tistory,
        wordpress,
        dispatcher,
    }
}

/// Current time at the precision the store keeps
fn store_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Schedule an approved content one minute before `now`
fn schedule_due(h: &Harness, target: PlatformTarget, now: DateTime<Utc>) -> (i64, i64) {
    let content = create_approved(&h.pipeline, "예약 발행", "# 제목\n본문", target);
    let job = h
        .scheduling
        .schedule(content.id, target, now - Duration::minutes(1), Actor::User(1))
        .unwrap();
    (content.id, job.id)
}

// ============================================================================
// Immediate Publish
// ============================================================================

#[tokio::test]
async fn test_publish_now_to_both_platforms() {
    let h = harness(Behavior::Succeed, Behavior::Succeed);
    let content = create_approved(&h.pipeline, "즉시 발행", "본문", PlatformTarget::Both);

    let results = h
        .dispatcher
        .publish_now(content.id, None, Actor::User(7))
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_success()));

    let detail = h.pipeline.get_content(content.id).unwrap();
    assert_eq!(detail.content.status, ContentStatus::Published);
    assert!(detail.content.published_at.is_some());
    assert_eq!(detail.attempts.len(), 2);
    assert!(detail
        .attempts
        .iter()
        .all(|a| a.outcome == AttemptOutcome::Success && a.job_id.is_none()));

    let publish_entries: Vec<_> = detail
        .history
        .iter()
        .filter(|e| e.action == EditAction::Publish)
        .collect();
    assert_eq!(publish_entries.len(), 2);
    assert!(publish_entries
        .iter()
        .any(|e| e.field.as_deref() == Some("wordpress")
            && e.new_value.as_deref() == Some("https://wordpress.example.com/1")));

    let status_change = detail
        .history
        .iter()
        .find(|e| e.action == EditAction::StatusChange)
        .unwrap();
    assert_eq!(status_change.new_value.as_deref(), Some("PUBLISHED"));
    assert_eq!(status_change.actor, Actor::User(7));
}

#[tokio::test]
async fn test_one_platform_failure_does_not_block_the_other() {
    let h = harness(Behavior::FailStatus(500), Behavior::Succeed);
    let content = create_approved(&h.pipeline, "격리", "본문", PlatformTarget::Both);

    let results = h
        .dispatcher
        .publish_now(content.id, None, Actor::System)
        .await
        .unwrap();

    let tistory = results.iter().find(|r| r.platform == Platform::Tistory).unwrap();
    assert!(matches!(
        tistory.outcome,
        PublishOutcome::Failed {
            status_code: Some(500),
            ..
        }
    ));
    let wordpress = results.iter().find(|r| r.platform == Platform::Wordpress).unwrap();
    assert!(wordpress.is_success());

    let content = h.store.get_content(content.id).unwrap().unwrap();
    assert_eq!(content.status, ContentStatus::Published);

    let errors = h.store.list_errors(&ErrorFilter::default()).unwrap();
    assert_eq!(errors.total, 1);
    let record = &errors.items[0];
    assert_eq!(record.platform, Platform::Tistory);
    assert_eq!(record.endpoint, "/fake/tistory");
    assert_eq!(record.method, "POST");
    assert_eq!(record.status_code, Some(500));
    assert!(!record.resolved);

    let stats = h.store.error_stats(Utc::now()).unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.unresolved, 1);
    assert_eq!(stats.error_rate, 50.0);
    assert_eq!(stats.success_rate, 50.0);
    assert_eq!(stats.by_platform.get(&Platform::Tistory), Some(&1));
    assert_eq!(stats.top_endpoints, vec![("/fake/tistory".to_string(), 1)]);

    h.store.resolve(record.id).unwrap();
    assert_eq!(h.store.error_stats(Utc::now()).unwrap().unresolved, 0);
}

#[tokio::test]
async fn test_unconfigured_platforms_are_skipped_silently() {
    let store = create_test_store();
    let tistory = FakeAdapter::new(Platform::Tistory, Behavior::NotConfigured);
    let dispatcher = PublishDispatcher::new(
        store.clone(),
        adapters(&[&tistory]),
        DispatcherConfig::default(),
    );
    let pipeline = PipelineCoordinator::new(store.clone(), &test_config());
    let content = create_approved(&pipeline, "설정 없음", "본문", PlatformTarget::Both);

    let results = dispatcher
        .publish_now(content.id, None, Actor::System)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_skipped()));
    assert!(store.attempts_for_content(content.id, 10).unwrap().is_empty());
    assert_eq!(store.list_errors(&ErrorFilter::default()).unwrap().total, 0);
    assert_eq!(
        store.get_content(content.id).unwrap().unwrap().status,
        ContentStatus::Approved
    );
}

#[tokio::test]
async fn test_publish_now_status_rules() {
    let h = harness(Behavior::Succeed, Behavior::Succeed);

    let draft = h
        .pipeline
        .create_content(nuri::models::NewContent::new("초안", "본문"), Actor::System)
        .unwrap();
    assert!(matches!(
        h.dispatcher.publish_now(draft.id, None, Actor::System).await,
        Err(Error::InvalidTransition { .. })
    ));

    let (scheduled, _) = schedule_due(&h, PlatformTarget::Tistory, Utc::now() + Duration::days(1));
    assert!(matches!(
        h.dispatcher.publish_now(scheduled, None, Actor::System).await,
        Err(Error::Conflict(_))
    ));

    assert!(matches!(
        h.dispatcher.publish_now(999, None, Actor::System).await,
        Err(Error::NotFound { .. })
    ));
    assert_eq!(h.tistory.calls(), 0);
}

#[tokio::test]
async fn test_republish_adds_publish_entry_only() {
    let h = harness(Behavior::Succeed, Behavior::Succeed);
    let content = create_approved(&h.pipeline, "재발행", "본문", PlatformTarget::Tistory);

    h.dispatcher
        .publish_now(content.id, None, Actor::System)
        .await
        .unwrap();
    let before = h.store.history(content.id, 50).unwrap().len();

    h.dispatcher
        .publish_now(content.id, Some(PlatformTarget::Wordpress), Actor::User(3))
        .await
        .unwrap();

    let history = h.store.history(content.id, 50).unwrap();
    assert_eq!(history.len(), before + 1);
    assert_eq!(history[0].action, EditAction::Publish);
    assert_eq!(history[0].field.as_deref(), Some("wordpress"));
    assert_eq!(h.wordpress.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_platform_calls_run_concurrently() {
    let delay = std::time::Duration::from_millis(300);
    let h = harness(Behavior::Slow(delay), Behavior::Slow(delay));
    let content = create_approved(&h.pipeline, "동시 호출", "본문", PlatformTarget::Both);

    let started = tokio::time::Instant::now();
    let results = h
        .dispatcher
        .publish_now(content.id, None, Actor::System)
        .await
        .unwrap();

    assert!(results.iter().all(|r| r.is_success()));
    assert!(started.elapsed() < delay * 2);
}

// ============================================================================
// Scheduled Dispatch
// ============================================================================

#[tokio::test]
async fn test_due_job_is_published() {
    let h = harness(Behavior::Succeed, Behavior::Succeed);
    let now = store_now();
    let (content_id, job_id) = schedule_due(&h, PlatformTarget::Both, now);

    let report = h.dispatcher.run_due(now).await.unwrap();
    assert_eq!(report.claimed, 1);
    assert_eq!(report.published, 1);
    assert_eq!(report.jobs[0].status, JobStatus::Published);

    let job = h.store.get_job(job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Published);
    assert!(!job.is_claimed());

    let detail = h.pipeline.get_content(content_id).unwrap();
    assert_eq!(detail.content.status, ContentStatus::Published);
    assert!(detail.content.published_at.is_some());
    assert!(detail.pending_jobs.is_empty());
    assert!(detail
        .attempts
        .iter()
        .all(|a| a.job_id == Some(job_id) && a.outcome == AttemptOutcome::Success));

    let status_change = detail
        .history
        .iter()
        .find(|e| e.action == EditAction::StatusChange)
        .unwrap();
    assert_eq!(status_change.actor, Actor::System);
    assert_eq!(status_change.old_value.as_deref(), Some("SCHEDULED"));
    assert_eq!(status_change.new_value.as_deref(), Some("PUBLISHED"));
    assert_eq!(
        detail
            .history
            .iter()
            .filter(|e| e.action == EditAction::Publish)
            .count(),
        2
    );

    // nothing left to do
    let report = h.dispatcher.run_due(now + Duration::hours(1)).await.unwrap();
    assert_eq!(report.claimed, 0);
}

#[tokio::test]
async fn test_failing_job_backs_off_then_fails() {
    let h = harness(Behavior::FailStatus(503), Behavior::Succeed);
    let now = store_now();
    let (content_id, job_id) = schedule_due(&h, PlatformTarget::Tistory, now);

    // first failure: retry in 60s
    let report = h.dispatcher.run_due(now).await.unwrap();
    assert_eq!(report.retried, 1);
    let job = h.store.get_job(job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retry_count, 1);
    assert!(job.last_error.as_deref().unwrap().contains("503"));
    assert_eq!(job.next_attempt_at, Some(now + Duration::seconds(60)));

    // not due yet
    assert_eq!(h.dispatcher.run_due(now + Duration::seconds(30)).await.unwrap().claimed, 0);

    // second failure: retry in 120s
    let second = now + Duration::seconds(61);
    assert_eq!(h.dispatcher.run_due(second).await.unwrap().retried, 1);
    let job = h.store.get_job(job_id).unwrap().unwrap();
    assert_eq!(job.retry_count, 2);
    assert_eq!(job.next_attempt_at, Some(second + Duration::seconds(120)));

    // third failure exhausts the budget
    let third = second + Duration::seconds(121);
    assert_eq!(h.dispatcher.run_due(third).await.unwrap().failed, 1);
    let job = h.store.get_job(job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 3);

    let content = h.store.get_content(content_id).unwrap().unwrap();
    assert_eq!(content.status, ContentStatus::Scheduled);
    assert_eq!(h.tistory.calls(), 3);
    assert_eq!(h.wordpress.calls(), 0);

    let attempts = h.store.attempts_for_content(content_id, 10).unwrap();
    assert_eq!(attempts.len(), 3);
    let mut retries: Vec<u32> = attempts.iter().map(|a| a.retry_count).collect();
    retries.sort_unstable();
    assert_eq!(retries, vec![0, 1, 2]);

    let errors = h.store.list_errors(&ErrorFilter::default()).unwrap();
    assert_eq!(errors.total, 3);
    assert!(errors.items.iter().all(|e| e.status_code == Some(503)));
    assert_eq!(h.store.error_stats(Utc::now()).unwrap().max_retry_count, 2);

    // operator requeues after the platform recovers
    h.tistory.set_behavior(Behavior::Succeed);
    let job = h.scheduling.requeue(job_id, Actor::User(9)).unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retry_count, 0);

    let report = h.dispatcher.run_due(third + Duration::seconds(1)).await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(
        h.store.get_content(content_id).unwrap().unwrap().status,
        ContentStatus::Published
    );
}

#[tokio::test]
async fn test_partial_success_retries_only_failed_platform() {
    let h = harness(Behavior::Succeed, Behavior::FailStatus(502));
    let now = store_now();
    let (content_id, job_id) = schedule_due(&h, PlatformTarget::Both, now);

    let report = h.dispatcher.run_due(now).await.unwrap();
    assert_eq!(report.retried, 1);
    assert_eq!(
        h.store.get_content(content_id).unwrap().unwrap().status,
        ContentStatus::Scheduled
    );
    assert_eq!(h.store.succeeded_platforms(job_id).unwrap(), vec![Platform::Tistory]);

    h.wordpress.set_behavior(Behavior::Succeed);
    let report = h
        .dispatcher
        .run_due(now + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(report.jobs[0].results.len(), 1);
    assert_eq!(report.jobs[0].results[0].platform, Platform::Wordpress);

    assert_eq!(h.tistory.calls(), 1);
    assert_eq!(h.wordpress.calls(), 2);

    let history = h.store.history(content_id, 50).unwrap();
    let mut published: Vec<_> = history
        .iter()
        .filter(|e| e.action == EditAction::Publish)
        .filter_map(|e| e.field.clone())
        .collect();
    published.sort();
    assert_eq!(published, vec!["tistory".to_string(), "wordpress".to_string()]);
}

#[tokio::test]
async fn test_job_without_configured_platform_fails_without_retry() {
    let store = create_test_store();
    let dispatcher = PublishDispatcher::new(store.clone(), Vec::new(), DispatcherConfig::default());
    let pipeline = PipelineCoordinator::new(store.clone(), &test_config());
    let scheduling = SchedulingCoordinator::new(store.clone());

    let now = store_now();
    let content = create_approved(&pipeline, "어댑터 없음", "본문", PlatformTarget::Wordpress);
    let job = scheduling
        .schedule(content.id, PlatformTarget::Wordpress, now, Actor::System)
        .unwrap();

    let report = dispatcher.run_due(now).await.unwrap();
    assert_eq!(report.failed, 1);

    let job = store.get_job(job.id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 0);
    assert!(store.attempts_for_content(content.id, 10).unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_claim_is_reclaimed() {
    let h = harness(Behavior::Succeed, Behavior::Succeed);
    let now = store_now();
    let (_, job_id) = schedule_due(&h, PlatformTarget::Tistory, now);

    // a dispatcher that claimed the job and died
    let claimed = h
        .store
        .claim_due_jobs(now, now - Duration::minutes(10), 10)
        .unwrap();
    assert_eq!(claimed.len(), 1);

    assert_eq!(h.dispatcher.run_due(now).await.unwrap().claimed, 0);

    let report = h
        .dispatcher
        .run_due(now + Duration::minutes(11))
        .await
        .unwrap();
    assert_eq!(report.claimed, 1);
    assert_eq!(report.published, 1);
    assert_eq!(
        h.store.get_job(job_id).unwrap().unwrap().status,
        JobStatus::Published
    );
}

#[tokio::test]
async fn test_calendar_history_shows_finished_jobs() {
    let h = harness(Behavior::Succeed, Behavior::Succeed);
    let now = store_now();
    let (_, job_id) = schedule_due(&h, PlatformTarget::Tistory, now);
    h.dispatcher.run_due(now).await.unwrap();

    let from = now - Duration::days(1);
    let to = now + Duration::days(1);

    let pending_only = h.scheduling.calendar_range(from, to, false).unwrap();
    assert_eq!(pending_only.total, 0);

    let with_history = h.scheduling.calendar_range(from, to, true).unwrap();
    assert_eq!(with_history.total, 1);
    let event = &with_history.days.values().next().unwrap()[0];
    assert_eq!(event.job_id, job_id);
    assert_eq!(event.status, JobStatus::Published);
}

#[tokio::test]
async fn test_scheduled_publish_waits_for_due_time() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store.clone(), &test_config());
    let scheduling = SchedulingCoordinator::new(store.clone());
    let adapter = HookAdapter::new(Platform::Tistory, fixed_post(), |_| {});
    let dispatcher = PublishDispatcher::new(
        store.clone(),
        vec![adapter.clone() as Arc<dyn PlatformAdapter>],
        DispatcherConfig::default(),
    );

    let t = store_now();
    let content = create_approved(&pipeline, "한 시간 뒤 발행", "# 제목\n본문", PlatformTarget::Tistory);
    let job = scheduling
        .schedule(content.id, PlatformTarget::Tistory, t + Duration::hours(1), Actor::User(1))
        .unwrap();

    let early = dispatcher.run_due(t + Duration::minutes(59)).await.unwrap();
    assert_eq!(early.claimed, 0);
    assert_eq!(adapter.calls(), 0);
    assert_eq!(
        store.get_content(content.id).unwrap().unwrap().status,
        ContentStatus::Scheduled
    );

    let report = dispatcher.run_due(t + Duration::hours(1)).await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(adapter.calls(), 1);
    assert_eq!(store.get_job(job.id).unwrap().unwrap().status, JobStatus::Published);

    let detail = pipeline.get_content(content.id).unwrap();
    assert_eq!(detail.content.status, ContentStatus::Published);
    assert!(detail.content.published_at.is_some());
    assert_eq!(detail.attempts.len(), 1);
    assert_eq!(detail.attempts[0].outcome, AttemptOutcome::Success);
    assert_eq!(detail.attempts[0].external_id.as_deref(), Some("42"));
    assert_eq!(detail.attempts[0].external_url.as_deref(), Some("https://x/42"));
    assert!(detail
        .history
        .iter()
        .any(|e| e.action == EditAction::Publish && e.new_value.as_deref() == Some("https://x/42")));
}

// ============================================================================
// Concurrent Writers
// ============================================================================

fn fixed_post() -> PublishedPost {
    PublishedPost {
        external_id: "42".to_string(),
        external_url: "https://x/42".to_string(),
    }
}

#[tokio::test]
async fn test_delete_during_dispatch_keeps_sweep_going() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store.clone(), &test_config());
    let scheduling = SchedulingCoordinator::new(store.clone());

    let now = store_now();
    let first = create_approved(&pipeline, "첫 번째 예약", "첫 번째 본문", PlatformTarget::Tistory);
    let second = create_approved(&pipeline, "두 번째 예약", "두 번째 본문", PlatformTarget::Tistory);
    let first_job = scheduling
        .schedule(first.id, PlatformTarget::Tistory, now - Duration::minutes(2), Actor::System)
        .unwrap();
    let second_job = scheduling
        .schedule(second.id, PlatformTarget::Tistory, now - Duration::minutes(1), Actor::System)
        .unwrap();

    // the operator tries to delete the first content while it is being posted
    let rejected = Arc::new(Mutex::new(Vec::new()));
    let adapter = {
        let store = store.clone();
        let rejected = rejected.clone();
        let target = first.id;
        HookAdapter::new(Platform::Tistory, fixed_post(), move |n| {
            if n == 1 {
                let result = store.delete_content(target);
                rejected
                    .lock()
                    .unwrap()
                    .push(matches!(result, Err(Error::Conflict(_))));
            }
        })
    };
    let dispatcher = PublishDispatcher::new(
        store.clone(),
        vec![adapter.clone() as Arc<dyn PlatformAdapter>],
        DispatcherConfig::default(),
    );

    let report = dispatcher.run_due(now).await.unwrap();
    assert_eq!(report.claimed, 2);
    assert_eq!(report.published, 2);
    assert_eq!(report.lost, 0);
    assert_eq!(*rejected.lock().unwrap(), vec![true]);

    for job_id in [first_job.id, second_job.id] {
        let job = store.get_job(job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Published);
        assert!(!job.is_claimed());
    }
    assert_eq!(store.attempts_for_content(first.id, 10).unwrap().len(), 1);

    // once the job is closed the delete goes through
    pipeline.delete_content(first.id).unwrap();
    assert!(store.get_content(first.id).unwrap().is_none());
}

#[tokio::test]
async fn test_schedule_during_publish_now_is_rejected() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store.clone(), &test_config());
    let content = create_approved(&pipeline, "즉시 발행 중", "본문", PlatformTarget::Tistory);

    let rejected = Arc::new(Mutex::new(Vec::new()));
    let adapter = {
        let scheduling = SchedulingCoordinator::new(store.clone());
        let rejected = rejected.clone();
        let target = content.id;
        HookAdapter::new(Platform::Tistory, fixed_post(), move |_| {
            let result = scheduling.schedule(
                target,
                PlatformTarget::Tistory,
                Utc::now() + Duration::hours(1),
                Actor::User(3),
            );
            rejected
                .lock()
                .unwrap()
                .push(matches!(result, Err(Error::Conflict(_))));
        })
    };
    let dispatcher = PublishDispatcher::new(
        store.clone(),
        vec![adapter as Arc<dyn PlatformAdapter>],
        DispatcherConfig::default(),
    );

    let results = dispatcher
        .publish_now(content.id, None, Actor::User(7))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].is_success());
    assert_eq!(*rejected.lock().unwrap(), vec![true]);

    let detail = pipeline.get_content(content.id).unwrap();
    assert_eq!(detail.content.status, ContentStatus::Published);
    assert!(detail.pending_jobs.is_empty());

    // lock is gone after reconciling
    pipeline
        .change_status(content.id, ContentStatus::Draft, Actor::User(7))
        .unwrap();
}

#[tokio::test]
async fn test_publish_now_returns_results_when_content_moved() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store.clone(), &test_config());
    let content = create_approved(&pipeline, "잠금 만료", "본문", PlatformTarget::Tistory);

    let adapter = {
        let scheduling = SchedulingCoordinator::new(store.clone());
        let target = content.id;
        HookAdapter::new(Platform::Tistory, fixed_post(), move |_| {
            scheduling
                .schedule(
                    target,
                    PlatformTarget::Tistory,
                    Utc::now() + Duration::hours(1),
                    Actor::User(3),
                )
                .unwrap();
        })
    };
    // a zero-length lock expires before the platform call returns
    let config = DispatcherConfig {
        claim_timeout_secs: 0,
        ..Default::default()
    };
    let dispatcher = PublishDispatcher::new(
        store.clone(),
        vec![adapter as Arc<dyn PlatformAdapter>],
        config,
    );

    let results = dispatcher
        .publish_now(content.id, None, Actor::System)
        .await
        .unwrap();

    assert!(results[0].is_success());
    let detail = pipeline.get_content(content.id).unwrap();
    assert_eq!(detail.content.status, ContentStatus::Scheduled);
    assert_eq!(detail.attempts.len(), 1);
    assert_eq!(detail.attempts[0].external_url.as_deref(), Some("https://x/42"));
}
