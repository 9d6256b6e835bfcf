//! Application setup and router configuration.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerKernel;

use super::routes::channels::{
    create_channel, delete_channel, force_fetch, latest_job, list_channels,
};
use super::routes::health::health_handler;
use super::routes::posts::list_posts;
use super::routes::summaries::summarize_post;

pub fn build_app(kernel: Arc<ServerKernel>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/channels", post(create_channel).get(list_channels))
        .route("/api/channels/:id", delete(delete_channel))
        .route("/api/channels/:id/fetch", post(force_fetch))
        .route("/api/channels/:id/jobs/latest", get(latest_job))
        .route("/api/channels/:id/posts", get(list_posts))
        .route("/api/posts/:id/summarize", post(summarize_post))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(kernel)
}
