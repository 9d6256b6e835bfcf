use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    pub channel_id: i64,
    pub tg_message_id: i64,
    pub posted_at: Option<DateTime<Utc>>,
    pub text: Option<String>,
    /// Provider-native message payload. Engagement counters live here and
    /// are projected out in [`Post::view`].
    pub raw: serde_json::Value,
}

/// API projection of a post with engagement counters pulled out of `raw`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: i64,
    pub channel_id: i64,
    pub tg_message_id: i64,
    pub posted_at: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub views: Option<i64>,
    pub forwards: Option<i64>,
    pub replies: Option<i64>,
    pub reactions: Option<i64>,
}

impl Post {
    pub fn view(&self) -> PostView {
        let counter = |key: &str| self.raw.get(key).and_then(|v| v.as_i64());
        PostView {
            id: self.id,
            channel_id: self.channel_id,
            tg_message_id: self.tg_message_id,
            posted_at: self.posted_at,
            text: self.text.clone(),
            views: counter("views"),
            forwards: counter("forwards"),
            replies: counter("replies"),
            reactions: counter("reactions"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostsPage {
    pub items: Vec<PostView>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}
