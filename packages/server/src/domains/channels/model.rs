use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Channel lifecycle: `pending` until the remote identity is known, `active`
/// afterwards. Only active channels are picked up by the discovery tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "channel_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Pending,
    Active,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    /// Canonical reference, `https://t.me/<handle>`. Unique.
    pub tg_url: String,
    /// Stable remote id, set on first successful resolution and never
    /// overwritten.
    pub tg_id: Option<i64>,
    pub title: Option<String>,
    pub status: ChannelStatus,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    pub fn is_resolved(&self) -> bool {
        self.tg_id.is_some()
    }
}
