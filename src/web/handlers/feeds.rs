//! Feed and run handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::feed::FeedRepository;
use crate::pipeline::{
    EntryFailureRepository, ProcessingRun, RunRepository, RunSummary, UsageRepository,
};
use crate::web::dto::{ApiResponse, FeedResponse, RunDetailResponse, RunsQuery};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// GET /api/feeds - List enabled feeds.
pub async fn list_feeds(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<FeedResponse>>>, ApiError> {
    let feeds = FeedRepository::new(state.db.pool()).list_enabled().await?;
    let usage = UsageRepository::new(state.db.pool());
    let locks = state.orchestrator.locks();

    let mut response = Vec::with_capacity(feeds.len());
    for feed in feeds {
        let total_cost = usage.total_cost_by_feed(feed.id).await?;
        let running = locks.is_locked(feed.id);
        response.push(FeedResponse::new(feed, running, total_cost));
    }
    Ok(Json(ApiResponse::new(response)))
}

/// POST /api/feeds/:id/process - Process a feed now.
pub async fn process_feed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<RunSummary>>, ApiError> {
    tracing::info!(feed_id = id, "Manual processing requested");
    let summary = state.orchestrator.process(id).await?;
    Ok(Json(ApiResponse::new(summary)))
}

/// GET /api/feeds/:id/runs - Recent runs of a feed, newest first.
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<ProcessingRun>>>, ApiError> {
    if FeedRepository::new(state.db.pool())
        .get_by_id(id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found(format!("feed {id} not found")));
    }

    let runs = RunRepository::new(state.db.pool())
        .list_by_feed(id, query.limit())
        .await?;
    Ok(Json(ApiResponse::new(runs)))
}

/// GET /api/runs/:id - Run with its usage and failures.
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<RunDetailResponse>>, ApiError> {
    let pool = state.db.pool();
    let run = RunRepository::new(pool)
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("run {id} not found")))?;

    let usage = UsageRepository::new(pool).list_by_run(id).await?;
    let failures = EntryFailureRepository::new(pool).list_by_run(id).await?;
    let cost_usd = usage.iter().map(|u| u.cost_usd).sum();

    Ok(Json(ApiResponse::new(RunDetailResponse {
        run,
        usage,
        failures,
        cost_usd,
    })))
}
