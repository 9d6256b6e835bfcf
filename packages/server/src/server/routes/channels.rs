//! Channel registration and fetch management routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domains::channels::{resolve_if_needed, Channel, RegisterError};
use crate::domains::fetch::FetchJob;
use crate::kernel::ServerKernel;
use crate::server::error::ApiError;

#[derive(Deserialize)]
pub struct ChannelCreate {
    pub tg_url: String,
}

#[derive(Serialize)]
pub struct ForceFetchResponse {
    pub channel_id: i64,
    pub enqueued: bool,
    pub resolved: bool,
}

/// `POST /api/channels` - register a channel. New channels get their initial
/// fetch job queued right away; re-registering is a no-op read.
pub async fn create_channel(
    State(kernel): State<Arc<ServerKernel>>,
    Json(payload): Json<ChannelCreate>,
) -> Result<(StatusCode, Json<Channel>), ApiError> {
    let stores = kernel.stores().ok_or(ApiError::DbUnavailable)?;
    let (channel, created) = stores
        .channels
        .register(&payload.tg_url)
        .await
        .map_err(|err| match err {
            RegisterError::InvalidReference(invalid) => {
                ApiError::UnprocessableEntity(invalid.to_string())
            }
            RegisterError::Store(err) => ApiError::Internal(err),
        })?;
    if created {
        let job_id = stores.jobs.enqueue(channel.id).await?;
        info!(channel_id = channel.id, job_id, tg_url = %channel.tg_url, "registered channel");
    }
    let code = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((code, Json(channel)))
}

/// `GET /api/channels`
pub async fn list_channels(
    State(kernel): State<Arc<ServerKernel>>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    let stores = kernel.stores().ok_or(ApiError::DbUnavailable)?;
    Ok(Json(stores.channels.list().await?))
}

/// `DELETE /api/channels/:id` - 204 whether or not the channel existed.
pub async fn delete_channel(
    State(kernel): State<Arc<ServerKernel>>,
    Path(channel_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let stores = kernel.stores().ok_or(ApiError::DbUnavailable)?;
    stores.channels.delete(channel_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/channels/:id/fetch` - resolve eagerly if possible, then queue a
/// fetch job. Resolution failure is not fatal here; the job retries it.
pub async fn force_fetch(
    State(kernel): State<Arc<ServerKernel>>,
    Path(channel_id): Path<i64>,
) -> Result<Json<ForceFetchResponse>, ApiError> {
    let stores = kernel.stores().ok_or(ApiError::DbUnavailable)?;
    let channel = stores
        .channels
        .find(channel_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Channel not found".to_string()))?;

    let resolved = match resolve_if_needed(
        &channel,
        stores.channels.as_ref(),
        kernel.history_source.as_ref(),
    )
    .await
    {
        Ok(resolution) => resolution.resolved,
        Err(err) => {
            warn!(channel_id, error = %err, "eager resolution failed, leaving it to the job");
            false
        }
    };

    stores.jobs.enqueue(channel_id).await?;
    Ok(Json(ForceFetchResponse {
        channel_id,
        enqueued: true,
        resolved,
    }))
}

/// `GET /api/channels/:id/jobs/latest`
pub async fn latest_job(
    State(kernel): State<Arc<ServerKernel>>,
    Path(channel_id): Path<i64>,
) -> Result<Json<FetchJob>, ApiError> {
    let stores = kernel.stores().ok_or(ApiError::DbUnavailable)?;
    stores
        .channels
        .find(channel_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Channel not found".to_string()))?;
    let job = stores
        .jobs
        .latest_for_channel(channel_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No jobs for channel".to_string()))?;
    Ok(Json(job))
}
