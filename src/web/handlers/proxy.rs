//! Legacy feed passthrough.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::web::handlers::AppState;

/// Content type of every successful passthrough response.
pub const PROXY_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// GET /proxy - Return the configured upstream feed verbatim.
///
/// The upstream status code is passed through; transport failures become
/// `500` with a plain-text cause.
pub async fn proxy(State(state): State<Arc<AppState>>) -> Response {
    match fetch_upstream(&state).await {
        Ok((status, body)) => {
            (status, [(header::CONTENT_TYPE, PROXY_CONTENT_TYPE)], body).into_response()
        }
        Err(e) => {
            tracing::warn!("Proxy fetch of {} failed: {}", state.proxy_url, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error fetching feed: {e}"),
            )
                .into_response()
        }
    }
}

async fn fetch_upstream(state: &AppState) -> Result<(StatusCode, Vec<u8>), reqwest::Error> {
    let response = state.proxy_client.get(&state.proxy_url).send().await?;
    let status = response.status();
    let body = response.bytes().await?;
    Ok((status, body.to_vec()))
}
