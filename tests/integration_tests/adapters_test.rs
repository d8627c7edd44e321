//! Platform adapter tests against a mock HTTP server

use chrono::Utc;
use nuri::config::{DispatcherConfig, PlatformsConfig, TistoryConfig, WordpressConfig};
use nuri::models::{Actor, ContentStatus, Platform, PlatformTarget};
use nuri::pipeline::PipelineCoordinator;
use nuri::publishing::{
    build_adapters, PlatformAdapter, PlatformError, PublishDispatcher, TistoryAdapter,
    WordpressAdapter,
};
use nuri::storage::{ContentRepository, ErrorFilter, ErrorSink};
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{create_approved, create_test_store, test_config};

fn tistory_config(server: &MockServer) -> TistoryConfig {
    TistoryConfig {
        access_token: Some("secret-token".to_string()),
        blog_name: Some("myblog".to_string()),
        visibility: 3,
        base_url: server.uri(),
    }
}

fn wordpress_config(server: &MockServer) -> WordpressConfig {
    WordpressConfig {
        site_url: Some(format!("{}/", server.uri())),
        username: Some("editor".to_string()),
        app_password: Some("app pass word".to_string()),
        post_status: "publish".to_string(),
    }
}

// ============================================================================
// Tistory
// ============================================================================

#[tokio::test]
async fn test_tistory_post_created() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apis/post/write"))
        .and(body_string_contains("access_token=secret-token"))
        .and(body_string_contains("blogName=myblog"))
        .and(body_string_contains("output=json"))
        .and(body_string_contains("visibility=3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tistory": {
                "status": "200",
                "postId": "74",
                "url": "https://myblog.tistory.com/74"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = TistoryAdapter::new(tistory_config(&server), 10).unwrap();
    let post = adapter.create_post("제목", "# 본문").await.unwrap();

    assert_eq!(post.external_id, "74");
    assert_eq!(post.external_url, "https://myblog.tistory.com/74");
}

#[tokio::test]
async fn test_tistory_numeric_post_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apis/post/write"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tistory": { "status": "200", "postId": 75, "url": "https://myblog.tistory.com/75" }
        })))
        .mount(&server)
        .await;

    let adapter = TistoryAdapter::new(tistory_config(&server), 10).unwrap();
    let post = adapter.create_post("t", "b").await.unwrap();
    assert_eq!(post.external_id, "75");
}

#[tokio::test]
async fn test_tistory_api_error_in_ok_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apis/post/write"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tistory": { "status": "403", "error_message": "접근 권한이 없습니다." }
        })))
        .mount(&server)
        .await;

    let adapter = TistoryAdapter::new(tistory_config(&server), 10).unwrap();
    let err = adapter.create_post("t", "b").await.unwrap_err();

    match err {
        PlatformError::Api(message) => assert_eq!(message, "접근 권한이 없습니다."),
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_tistory_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apis/post/write"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let adapter = TistoryAdapter::new(tistory_config(&server), 10).unwrap();
    let err = adapter.create_post("t", "b").await.unwrap_err();

    assert_eq!(err.status_code(), Some(500));
    assert!(err.is_transient());
}

// ============================================================================
// WordPress
// ============================================================================

#[tokio::test]
async fn test_wordpress_post_created() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(basic_auth("editor", "app pass word"))
        .and(body_json(json!({
            "title": "워드프레스 글",
            "content": "본문",
            "status": "publish"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 123,
            "link": "https://blog.example.com/?p=123",
            "status": "publish"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = WordpressAdapter::new(wordpress_config(&server), 10).unwrap();
    let post = adapter.create_post("워드프레스 글", "본문").await.unwrap();

    assert_eq!(post.external_id, "123");
    assert_eq!(post.external_url, "https://blog.example.com/?p=123");
}

#[tokio::test]
async fn test_wordpress_rejection_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(
            ResponseTemplate::new(401).set_body_string(r#"{"code":"rest_cannot_create"}"#),
        )
        .mount(&server)
        .await;

    let adapter = WordpressAdapter::new(wordpress_config(&server), 10).unwrap();
    let err = adapter.create_post("t", "b").await.unwrap_err();

    match err {
        PlatformError::Status { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("rest_cannot_create"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

// ============================================================================
// Through the dispatcher
// ============================================================================

#[tokio::test]
async fn test_dispatcher_with_http_adapters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apis/post/write"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tistory": { "status": "200", "postId": "1", "url": "https://myblog.tistory.com/1" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let platforms = PlatformsConfig {
        tistory: tistory_config(&server),
        wordpress: wordpress_config(&server),
    };
    let store = create_test_store();
    let dispatcher = PublishDispatcher::new(
        store.clone(),
        build_adapters(&platforms, 10).unwrap(),
        DispatcherConfig::default(),
    );
    let pipeline = PipelineCoordinator::new(store.clone(), &test_config());
    let content = create_approved(&pipeline, "HTTP 발행", "본문", PlatformTarget::Both);

    let results = dispatcher
        .publish_now(content.id, None, Actor::System)
        .await
        .unwrap();

    assert!(results
        .iter()
        .any(|r| r.platform == Platform::Tistory && r.is_success()));
    assert!(results
        .iter()
        .any(|r| r.platform == Platform::Wordpress && !r.is_success() && !r.is_skipped()));

    let content = store.get_content(content.id).unwrap().unwrap();
    assert_eq!(content.status, ContentStatus::Published);

    let errors = store.list_errors(&ErrorFilter::default()).unwrap();
    assert_eq!(errors.total, 1);
    assert_eq!(errors.items[0].endpoint, "/wp-json/wp/v2/posts");
    assert_eq!(errors.items[0].status_code, Some(503));
    assert_eq!(store.error_stats(Utc::now()).unwrap().last_24h, 1);
}

#[tokio::test]
async fn test_unconfigured_adapters_are_skipped() {
    let store = create_test_store();
    let dispatcher = PublishDispatcher::new(
        store.clone(),
        build_adapters(&PlatformsConfig::default(), 10).unwrap(),
        DispatcherConfig::default(),
    );
    let pipeline = PipelineCoordinator::new(store.clone(), &test_config());
    let content = create_approved(&pipeline, "설정 없음", "본문", PlatformTarget::Both);

    let results = dispatcher
        .publish_now(content.id, None, Actor::System)
        .await
        .unwrap();

    assert!(results.iter().all(|r| r.is_skipped()));
    assert_eq!(store.list_errors(&ErrorFilter::default()).unwrap().total, 0);
}
