//! Post listing with optional full-text filtering.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::domains::posts::PostsPage;
use crate::kernel::ServerKernel;
use crate::server::error::ApiError;

#[derive(Deserialize)]
pub struct PostsQuery {
    pub query: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

/// `GET /api/channels/:id/posts?query=&page=&page_size=`
pub async fn list_posts(
    State(kernel): State<Arc<ServerKernel>>,
    Path(channel_id): Path<i64>,
    Query(params): Query<PostsQuery>,
) -> Result<Json<PostsPage>, ApiError> {
    if params.page < 1 {
        return Err(ApiError::UnprocessableEntity(
            "page must be >= 1".to_string(),
        ));
    }
    if !(1..=100).contains(&params.page_size) {
        return Err(ApiError::UnprocessableEntity(
            "page_size must be between 1 and 100".to_string(),
        ));
    }
    let stores = kernel.stores().ok_or(ApiError::DbUnavailable)?;
    stores
        .channels
        .find(channel_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Channel not found".to_string()))?;
    let query = params.query.as_deref().filter(|q| !q.trim().is_empty());
    let page = stores
        .posts
        .page(channel_id, query, params.page, params.page_size)
        .await?;
    Ok(Json(page))
}
