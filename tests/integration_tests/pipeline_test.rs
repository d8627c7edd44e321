//! Pipeline integration tests
//!
//! Status transitions with their audit entries, duplicate screening on
//! submission and edit, and the pipeline overview.

use nuri::error::Error;
use nuri::models::{
    Actor, ContentPatch, ContentStatus, EditAction, NewContent, PlatformTarget,
};
use nuri::pipeline::PipelineCoordinator;
use nuri::storage::{ContentFilter, ContentRepository};

use crate::common::{create_approved, create_test_store, markdown_body, test_config};

// ============================================================================
// Status Transitions
// ============================================================================

#[test]
fn test_draft_to_approved_records_every_step() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store, &test_config());

    let content = create_approved(
        &pipeline,
        "러스트 입문",
        &markdown_body(10),
        PlatformTarget::Tistory,
    );
    assert_eq!(content.status, ContentStatus::Approved);

    let detail = pipeline.get_content(content.id).unwrap();
    let actions: Vec<EditAction> = detail.history.iter().map(|h| h.action).collect();
    assert_eq!(
        actions,
        vec![
            EditAction::StatusChange,
            EditAction::StatusChange,
            EditAction::Create
        ]
    );

    let latest = &detail.history[0];
    assert_eq!(latest.actor, Actor::User(2));
    assert_eq!(latest.field.as_deref(), Some("status"));
    assert_eq!(latest.old_value.as_deref(), Some("REVIEW"));
    assert_eq!(latest.new_value.as_deref(), Some("APPROVED"));
}

#[test]
fn test_illegal_transition_leaves_no_trace() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store, &test_config());

    let content = pipeline
        .create_content(NewContent::new("제목", "본문"), Actor::User(1))
        .unwrap();

    let result = pipeline.change_status(content.id, ContentStatus::Approved, Actor::User(1));
    assert!(matches!(
        result,
        Err(Error::InvalidTransition {
            from: ContentStatus::Draft,
            to: ContentStatus::Approved
        })
    ));

    let detail = pipeline.get_content(content.id).unwrap();
    assert_eq!(detail.content.status, ContentStatus::Draft);
    assert_eq!(detail.history.len(), 1);
}

#[test]
fn test_scheduled_and_published_are_not_manual_targets() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store, &test_config());
    let content = create_approved(&pipeline, "t", "b", PlatformTarget::Tistory);

    for target in [ContentStatus::Scheduled, ContentStatus::Published] {
        let result = pipeline.change_status(content.id, target, Actor::User(1));
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));
    }
}

#[test]
fn test_same_status_is_noop() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store, &test_config());

    let content = pipeline
        .create_content(NewContent::new("제목", "본문"), Actor::System)
        .unwrap();
    pipeline
        .change_status(content.id, ContentStatus::Draft, Actor::System)
        .unwrap();

    assert_eq!(pipeline.get_content(content.id).unwrap().history.len(), 1);
}

#[test]
fn test_missing_content_is_not_found() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store, &test_config());

    assert!(matches!(
        pipeline.change_status(404, ContentStatus::Review, Actor::System),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(pipeline.get_content(404), Err(Error::NotFound { .. })));
    assert!(matches!(pipeline.delete_content(404), Err(Error::NotFound { .. })));
}

// ============================================================================
// Updates
// ============================================================================

#[test]
fn test_update_records_fields_and_rescores() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store.clone(), &test_config());

    let content = pipeline
        .create_content(NewContent::new("제목", "짧은 본문"), Actor::User(1))
        .unwrap();
    assert_eq!(content.seo_score, 60);

    let patch = ContentPatch {
        title: Some("새 제목".to_string()),
        body: Some(markdown_body(320)),
        status: Some(ContentStatus::Review),
        ..Default::default()
    };
    let updated = pipeline
        .update_content(content.id, patch, Actor::User(3))
        .unwrap();

    assert_eq!(updated.title, "새 제목");
    assert_eq!(updated.status, ContentStatus::Review);
    assert_eq!(updated.seo_score, 100);
    assert_eq!(
        updated.fingerprint,
        Some(nuri::dedup::fingerprint(&markdown_body(320)))
    );

    let history = store.history(content.id, 10).unwrap();
    assert_eq!(history[0].action, EditAction::StatusChange);
    assert_eq!(history[1].action, EditAction::ContentUpdate);
    assert_eq!(history[1].field.as_deref(), Some("title, body"));
    assert_eq!(history[1].actor, Actor::User(3));
}

#[test]
fn test_empty_update_is_noop() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store.clone(), &test_config());

    let content = pipeline
        .create_content(NewContent::new("제목", "본문"), Actor::System)
        .unwrap();
    let patch = ContentPatch {
        status: Some(ContentStatus::Draft),
        ..Default::default()
    };
    pipeline
        .update_content(content.id, patch, Actor::System)
        .unwrap();

    assert_eq!(store.history(content.id, 10).unwrap().len(), 1);
}

#[test]
fn test_body_edit_into_duplicate_sets_flag() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store, &test_config());

    let original = pipeline
        .create_content(
            NewContent::new("원본", "러스트 소유권 개념 정리"),
            Actor::System,
        )
        .unwrap();
    let other = pipeline
        .create_content(NewContent::new("다른 글", "완전히 다른 내용"), Actor::System)
        .unwrap();
    assert!(!other.is_duplicate);

    let patch = ContentPatch {
        body: Some("러스트 소유권 개념 정리".to_string()),
        ..Default::default()
    };
    let updated = pipeline
        .update_content(other.id, patch, Actor::System)
        .unwrap();

    assert!(updated.is_duplicate);
    assert_eq!(updated.fingerprint, original.fingerprint);

    // returned row and stored row agree without a second write
    let stored = pipeline.get_content(other.id).unwrap().content;
    assert!(stored.is_duplicate);
    assert_eq!(stored.fingerprint, original.fingerprint);

    let patch = ContentPatch {
        body: Some("전혀 겹치지 않는 새로운 문장".to_string()),
        ..Default::default()
    };
    let rewritten = pipeline
        .update_content(other.id, patch, Actor::System)
        .unwrap();
    assert!(!rewritten.is_duplicate);
    assert_ne!(rewritten.fingerprint, original.fingerprint);
}

// ============================================================================
// Duplicate Screening
// ============================================================================

#[test]
fn test_exact_duplicate_submission_is_flagged() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store, &test_config());

    let first = pipeline
        .submit(
            NewContent::new("비동기 러스트", "Tokio 런타임으로 비동기 코드를 작성한다"),
            Actor::User(1),
        )
        .unwrap();
    assert!(!first.check.is_duplicate);
    assert!(!first.content.is_duplicate);

    let second = pipeline
        .submit(
            NewContent::new("전혀 다른 제목", "tokio 런타임으로 비동기 코드를 작성한다!!"),
            Actor::User(2),
        )
        .unwrap();

    assert!(second.check.is_exact());
    assert_eq!(second.check.similar[0].id, first.content.id);
    assert!(second.content.is_duplicate);
    assert_eq!(second.content.status, ContentStatus::Draft);
}

#[test]
fn test_blocked_duplicate_is_rejected() {
    let store = create_test_store();
    let mut config = test_config();
    config.dedup.block_duplicates = true;
    let pipeline = PipelineCoordinator::new(store, &config);

    pipeline
        .submit(NewContent::new("제목", "같은 본문 내용"), Actor::System)
        .unwrap();
    let result = pipeline.submit(NewContent::new("제목", "같은 본문 내용"), Actor::System);

    assert!(matches!(result, Err(Error::Conflict(_))));
    let total: u64 = pipeline.status_counts().unwrap().values().sum();
    assert_eq!(total, 1);
}

// ============================================================================
// Overview and Search
// ============================================================================

#[test]
fn test_overview_reports_bottlenecks() {
    let store = create_test_store();
    let mut config = test_config();
    config.pipeline.draft_threshold = 1;
    config.pipeline.review_threshold = 0;
    let pipeline = PipelineCoordinator::new(store, &config);

    for i in 0..2 {
        pipeline
            .create_content(NewContent::new(format!("초안 {i}"), format!("본문 {i}")), Actor::System)
            .unwrap();
    }

    let overview = pipeline.overview().unwrap();
    assert_eq!(overview.total, 2);
    assert_eq!(overview.stages.len(), 5);
    assert_eq!(overview.stages[0].status, ContentStatus::Draft);
    assert_eq!(overview.stages[0].count, 2);
    assert_eq!(overview.stages[0].items.len(), 2);
    assert_eq!(
        overview.bottlenecks,
        vec!["초안 단계에 많은 콘텐츠가 쌓여있습니다".to_string()]
    );
}

#[test]
fn test_search_filters_and_paginates() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store, &test_config());

    for i in 0..3 {
        pipeline
            .create_content(
                NewContent::new(format!("러스트 {i}"), "본문"),
                Actor::System,
            )
            .unwrap();
    }
    let approved = create_approved(&pipeline, "파이썬", "본문", PlatformTarget::Both);

    let page = pipeline
        .search(&ContentFilter {
            query: Some("러스트".to_string()),
            limit: 2,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total_pages(), 2);

    let page = pipeline
        .search(&ContentFilter {
            status: Some(ContentStatus::Approved),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, approved.id);
}

#[test]
fn test_delete_removes_content_and_history() {
    let store = create_test_store();
    let pipeline = PipelineCoordinator::new(store.clone(), &test_config());

    let content = pipeline
        .create_content(NewContent::new("제목", "본문"), Actor::System)
        .unwrap();
    pipeline.delete_content(content.id).unwrap();

    assert!(store.get_content(content.id).unwrap().is_none());
    assert!(store.history(content.id, 10).unwrap().is_empty());
}
