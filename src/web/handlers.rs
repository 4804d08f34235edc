use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use super::{cycle_response, ApiError, AppState, HealthResponse, ScrapeResponse};
use crate::models::ProductState;

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeParams {
    pub concurrency: Option<usize>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.watcher.is_running()))
}

/// Runs one cycle to completion and reports how it went.
pub async fn trigger_scrape(
    State(state): State<AppState>,
    Query(params): Query<ScrapeParams>,
) -> Result<(StatusCode, Json<ScrapeResponse>), ApiError> {
    if params.concurrency == Some(0) {
        return Err(ApiError::bad_request("concurrency must be at least 1"));
    }

    tracing::info!(concurrency = ?params.concurrency, "scrape cycle requested over HTTP");
    cycle_response(state.watcher.run_cycle(params.concurrency).await)
}

pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<ProductState>>, ApiError> {
    let products = state.watcher.list_products().await.map_err(|e| {
        tracing::error!("failed to list products: {}", e);
        ApiError::from(e)
    })?;
    Ok(Json(products))
}
