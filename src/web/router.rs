//! Router configuration for the web API.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{get_run, list_feeds, list_runs, process_feed, proxy, AppState};

/// Create the API router.
///
/// `/proxy` is mounted only when `legacy_enabled` is set.
pub fn create_router(app_state: Arc<AppState>, legacy_enabled: bool) -> Router {
    let feed_routes = Router::new()
        .route("/", get(list_feeds))
        .route("/:id/process", post(process_feed))
        .route("/:id/runs", get(list_runs));

    let api_routes = Router::new()
        .nest("/feeds", feed_routes)
        .route("/runs/:id", get(get_run));

    let mut router = Router::new().nest("/api", api_routes);
    if legacy_enabled {
        router = router.route("/proxy", get(proxy));
    }

    router
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
        .merge(create_health_router())
}

/// Create the health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "OK"
}
