//! Channel directory trait and its Postgres implementation.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::kernel::traits::{BaseHistorySource, SourceError};

use super::model::Channel;
use super::reference::{normalize_reference, InvalidReference};

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error(transparent)]
    InvalidReference(#[from] InvalidReference),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Register a channel by any accepted reference shape. Returns the
    /// channel and whether it was newly created; an existing channel is
    /// returned unchanged. Registration never enqueues anything itself.
    async fn register(&self, raw_reference: &str) -> Result<(Channel, bool), RegisterError>;

    async fn find(&self, channel_id: i64) -> Result<Option<Channel>>;

    async fn list(&self) -> Result<Vec<Channel>>;

    /// Remove a channel. Posts and jobs go with it (FK cascade); queued jobs
    /// for it that were already claimed finalize as no-ops.
    async fn delete(&self, channel_id: i64) -> Result<()>;

    /// Record a successful resolution: activate the channel, set `tg_id`
    /// only if not already set, keep an existing title over the new one.
    async fn mark_resolved(&self, channel_id: i64, tg_id: i64, title: &str) -> Result<()>;

    /// Channels still awaiting their first resolution, oldest first.
    async fn pending_channels(&self) -> Result<Vec<Channel>>;

    async fn active_channel_ids(&self) -> Result<Vec<i64>>;
}

/// Outcome of [`resolve_if_needed`].
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Whether a remote resolution actually happened on this call.
    pub resolved: bool,
    pub tg_id: Option<i64>,
    pub title: Option<String>,
}

/// Resolve a channel's remote identity unless it is already known, and
/// persist the result. Failures are returned to the caller undigested; what
/// to do with a rate limit or a denial depends on who is asking.
pub async fn resolve_if_needed(
    channel: &Channel,
    directory: &dyn ChannelDirectory,
    source: &dyn BaseHistorySource,
) -> Result<Resolution, SourceError> {
    if let Some(tg_id) = channel.tg_id {
        return Ok(Resolution {
            resolved: false,
            tg_id: Some(tg_id),
            title: channel.title.clone(),
        });
    }
    let identity = source.resolve(&channel.tg_url).await?;
    directory
        .mark_resolved(channel.id, identity.tg_id, &identity.title)
        .await
        .map_err(SourceError::Other)?;
    Ok(Resolution {
        resolved: true,
        tg_id: Some(identity.tg_id),
        title: Some(identity.title),
    })
}

const CHANNEL_COLUMNS: &str = "id, tg_url, tg_id, title, status, created_at";

pub struct PgChannelDirectory {
    pool: PgPool,
}

impl PgChannelDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelDirectory for PgChannelDirectory {
    async fn register(&self, raw_reference: &str) -> Result<(Channel, bool), RegisterError> {
        let tg_url = normalize_reference(raw_reference)?;
        let inserted = sqlx::query_as::<_, Channel>(&format!(
            r#"
            INSERT INTO channels (tg_url, status)
            VALUES ($1, 'pending')
            ON CONFLICT (tg_url) DO NOTHING
            RETURNING {CHANNEL_COLUMNS}
            "#
        ))
        .bind(&tg_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;
        if let Some(channel) = inserted {
            return Ok((channel, true));
        }
        let existing = sqlx::query_as::<_, Channel>(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE tg_url = $1"
        ))
        .bind(&tg_url)
        .fetch_one(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;
        Ok((existing, false))
    }

    async fn find(&self, channel_id: i64) -> Result<Option<Channel>> {
        let channel = sqlx::query_as::<_, Channel>(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = $1"
        ))
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(channel)
    }

    async fn list(&self) -> Result<Vec<Channel>> {
        let channels = sqlx::query_as::<_, Channel>(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(channels)
    }

    async fn delete(&self, channel_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM channels WHERE id = $1")
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_resolved(&self, channel_id: i64, tg_id: i64, title: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE channels
            SET tg_id = COALESCE(tg_id, $2),
                title = COALESCE(title, $3),
                status = 'active'
            WHERE id = $1
            "#,
        )
        .bind(channel_id)
        .bind(tg_id)
        .bind(title)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pending_channels(&self) -> Result<Vec<Channel>> {
        let channels = sqlx::query_as::<_, Channel>(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE status = 'pending' ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(channels)
    }

    async fn active_channel_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM channels WHERE status = 'active' ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
