//! Post summarization with a cache-first policy.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::kernel::ServerKernel;
use crate::server::error::ApiError;

/// Texts at or below this length are returned as-is, uncached.
const SUMMARIZE_THRESHOLD_CHARS: usize = 500;

#[derive(Deserialize)]
pub struct SummarizeQuery {
    pub model: Option<String>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub post_id: i64,
    pub summary: String,
    pub cached: bool,
}

/// `POST /api/posts/:id/summarize`
pub async fn summarize_post(
    State(kernel): State<Arc<ServerKernel>>,
    Path(post_id): Path<i64>,
    Query(params): Query<SummarizeQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let stores = kernel.stores().ok_or(ApiError::DbUnavailable)?;
    let post = stores
        .posts
        .find(post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    if let Some(cached) = stores.summaries.find(post_id).await? {
        return Ok(Json(SummaryResponse {
            post_id,
            summary: cached.summary,
            cached: true,
        }));
    }

    let text = post.text.unwrap_or_default();
    if text.chars().count() <= SUMMARIZE_THRESHOLD_CHARS {
        return Ok(Json(SummaryResponse {
            post_id,
            summary: text,
            cached: false,
        }));
    }

    let summary = kernel
        .summarizer
        .summarize(&text, params.model.as_deref())
        .await?;
    stores
        .summaries
        .upsert(post_id, params.model.as_deref().unwrap_or(""), &summary)
        .await?;
    Ok(Json(SummaryResponse {
        post_id,
        summary,
        cached: false,
    }))
}
