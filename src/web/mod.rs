use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::watcher::PriceWatcher;

pub mod handlers;
pub mod responses;

pub use handlers::{health_check, list_products, trigger_scrape, ScrapeParams};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub watcher: Arc<PriceWatcher>,
}

impl AppState {
    pub fn new(watcher: Arc<PriceWatcher>) -> Self {
        Self { watcher }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            ),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/scrape", post(trigger_scrape))
        .route("/products", get(list_products))
}

pub async fn serve(state: AppState, host: &str, port: u16, shutdown: tokio_util::sync::CancellationToken) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(address = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
