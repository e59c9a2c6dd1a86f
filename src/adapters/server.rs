use crate::core::pipeline::FeedPipeline;
use crate::domain::ports::FeedSource;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;

pub const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

/// Shared, read-only state for the feed handler.
pub struct AppState<S: FeedSource> {
    pub pipeline: Arc<FeedPipeline<S>>,
}

impl<S: FeedSource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl<S: FeedSource> AppState<S> {
    pub fn new(pipeline: FeedPipeline<S>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn create_router<S: FeedSource + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/feed", get(proxy_feed::<S>))
        .with_state(state)
}

async fn proxy_feed<S: FeedSource + 'static>(State(state): State<AppState<S>>) -> Response {
    match state.pipeline.run().await {
        Ok(body) => ([(header::CONTENT_TYPE, RSS_CONTENT_TYPE)], body).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Serves the router on an already-bound listener until the process stops.
pub async fn serve<S: FeedSource + 'static>(
    listener: TcpListener,
    state: AppState<S>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Serving transformed feed on http://{}/feed", addr);
    }
    let app = create_router(state);
    axum::serve(listener, app.into_make_service()).await
}
