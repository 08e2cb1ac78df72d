//! Web API tests.

mod common;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use axum_test::TestServer;
use serde_json::Value;
use std::sync::Arc;

use common::{harness, item, rss_document, spawn_server, FakeFetcher, FakeProvider, FakePublisher, Harness};
use feedrelay::config::LegacyConfig;
use feedrelay::feed::FeedRepository;
use feedrelay::web::handlers::PROXY_CONTENT_TYPE;
use feedrelay::web::{create_router, AppState};

async fn default_harness() -> Harness {
    harness(
        FakeFetcher::new(rss_document(&[
            item("First", "https://example.com/1"),
            item("Second", "https://example.com/2"),
        ])),
        FakeProvider::new("openai"),
        FakePublisher::new(),
    )
    .await
}

fn create_test_server(h: &Harness, legacy: &LegacyConfig) -> TestServer {
    let state = AppState::new(h.db.clone(), h.orchestrator.clone(), legacy).unwrap();
    let router = create_router(Arc::new(state), legacy.enabled);
    TestServer::new(router).expect("Failed to create test server")
}

fn legacy(url: &str) -> LegacyConfig {
    LegacyConfig {
        enabled: true,
        proxy_url: url.to_string(),
        user_agent: "Mozilla/5.0".to_string(),
    }
}

// ============================================================================
// Health and feeds
// ============================================================================

#[tokio::test]
async fn test_health() {
    let h = default_harness().await;
    let server = create_test_server(&h, &LegacyConfig::default());

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_list_feeds() {
    let h = default_harness().await;
    let server = create_test_server(&h, &LegacyConfig::default());

    let response = server.get("/api/feeds").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let feeds = body["data"].as_array().unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0]["name"], "test-feed");
    assert_eq!(feeds[0]["schedule"], "manual");
    assert!(feeds[0]["last_processed_at"].is_null());
    assert_eq!(feeds[0]["running"], false);
    assert_eq!(feeds[0]["total_cost_usd"], 0.0);
}

#[tokio::test]
async fn test_list_feeds_reports_cost_and_running_state() {
    let h = default_harness().await;
    let server = create_test_server(&h, &LegacyConfig::default());

    server
        .post(&format!("/api/feeds/{}/process", h.feed_id))
        .await
        .assert_status_ok();

    let _guard = h.orchestrator.locks().try_acquire(h.feed_id).unwrap();
    let body: Value = server.get("/api/feeds").await.json();
    let feed = &body["data"][0];

    assert_eq!(feed["running"], true);
    // Two transforms at 1000 in / 500 out tokens
    assert!((feed["total_cost_usd"].as_f64().unwrap() - 0.004).abs() < 1e-9);
    assert!(feed["last_processed_at"].is_string());
}

// ============================================================================
// Processing
// ============================================================================

#[tokio::test]
async fn test_process_feed_returns_summary() {
    let h = default_harness().await;
    let server = create_test_server(&h, &LegacyConfig::default());

    let response = server
        .post(&format!("/api/feeds/{}/process", h.feed_id))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "success");
    assert_eq!(body["data"]["entries_found"], 2);
    assert_eq!(body["data"]["posts_created"], 2);
    assert_eq!(h.publisher.posts().len(), 2);
}

#[tokio::test]
async fn test_process_unknown_feed_is_404() {
    let h = default_harness().await;
    let server = create_test_server(&h, &LegacyConfig::default());

    let response = server.post("/api/feeds/999/process").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_process_disabled_feed_is_409() {
    let h = default_harness().await;
    FeedRepository::new(h.db.pool())
        .set_enabled(h.feed_id, false)
        .await
        .unwrap();
    let server = create_test_server(&h, &LegacyConfig::default());

    let response = server
        .post(&format!("/api/feeds/{}/process", h.feed_id))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_process_running_feed_is_409() {
    let h = default_harness().await;
    let server = create_test_server(&h, &LegacyConfig::default());

    let _guard = h.orchestrator.locks().try_acquire(h.feed_id).unwrap();
    let response = server
        .post(&format!("/api/feeds/{}/process", h.feed_id))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "CONFLICT");
}

// ============================================================================
// Run history
// ============================================================================

#[tokio::test]
async fn test_list_runs_newest_first_with_limit() {
    let h = default_harness().await;
    let server = create_test_server(&h, &LegacyConfig::default());
    let process_url = format!("/api/feeds/{}/process", h.feed_id);

    server.post(&process_url).await.assert_status_ok();
    server.post(&process_url).await.assert_status_ok();
    server.post(&process_url).await.assert_status_ok();

    let response = server
        .get(&format!("/api/feeds/{}/runs", h.feed_id))
        .add_query_param("limit", 2)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let runs = body["data"].as_array().unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs[0]["id"].as_i64().unwrap() > runs[1]["id"].as_i64().unwrap());
    // Only the first run published anything
    assert_eq!(runs[0]["posts_created"], 0);
}

#[tokio::test]
async fn test_list_runs_unknown_feed_is_404() {
    let h = default_harness().await;
    let server = create_test_server(&h, &LegacyConfig::default());

    server
        .get("/api/feeds/999/runs")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_run_detail() {
    let h = default_harness().await;
    let server = create_test_server(&h, &LegacyConfig::default());

    let response = server
        .post(&format!("/api/feeds/{}/process", h.feed_id))
        .await;
    let body: Value = response.json();
    let run_id = body["data"]["run_id"].as_i64().unwrap();

    let response = server.get(&format!("/api/runs/{run_id}")).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["id"], run_id);
    assert_eq!(body["data"]["status"], "success");
    assert_eq!(body["data"]["usage"].as_array().unwrap().len(), 2);
    assert!(body["data"]["failures"].as_array().unwrap().is_empty());
    assert!(body["data"]["cost_usd"].as_f64().unwrap() > 0.0);

    server
        .get("/api/runs/999")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ============================================================================
// Legacy passthrough
// ============================================================================

#[tokio::test]
async fn test_proxy_passes_body_through() {
    let upstream = Router::new().route(
        "/feed",
        get(|| async { "<rss><channel><title>Upstream</title></channel></rss>" }),
    );
    let base = spawn_server(upstream).await;

    let h = default_harness().await;
    let server = create_test_server(&h, &legacy(&format!("{base}/feed")));

    let response = server.get("/proxy").await;
    response.assert_status_ok();
    response.assert_text("<rss><channel><title>Upstream</title></channel></rss>");
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        PROXY_CONTENT_TYPE
    );
}

#[tokio::test]
async fn test_proxy_passes_status_through() {
    let upstream = Router::new().route(
        "/feed",
        get(|| async { (StatusCode::FORBIDDEN, "denied") }),
    );
    let base = spawn_server(upstream).await;

    let h = default_harness().await;
    let server = create_test_server(&h, &legacy(&format!("{base}/feed")));

    let response = server.get("/proxy").await;
    response.assert_status(StatusCode::FORBIDDEN);
    response.assert_text("denied");
}

#[tokio::test]
async fn test_proxy_sends_configured_user_agent() {
    let upstream = Router::new().route(
        "/feed",
        get(|headers: axum::http::HeaderMap| async move {
            headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        }),
    );
    let base = spawn_server(upstream).await;

    let h = default_harness().await;
    let server = create_test_server(&h, &legacy(&format!("{base}/feed")));

    server.get("/proxy").await.assert_text("Mozilla/5.0");
}

#[tokio::test]
async fn test_proxy_transport_failure_is_500() {
    let h = default_harness().await;
    // Nothing listens on the discard port
    let server = create_test_server(&h, &legacy("http://127.0.0.1:9/feed"));

    let response = server.get("/proxy").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().starts_with("Error fetching feed: "));
}

#[tokio::test]
async fn test_proxy_not_mounted_when_disabled() {
    let h = default_harness().await;
    let config = LegacyConfig {
        enabled: false,
        ..LegacyConfig::default()
    };
    let server = create_test_server(&h, &config);

    server
        .get("/proxy")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
