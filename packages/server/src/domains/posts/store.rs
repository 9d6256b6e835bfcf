//! Post persistence: merge-upsert from fetches, paginated reads.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::kernel::traits::MessageRecord;

use super::model::{Post, PostsPage};

const POST_COLUMNS: &str = "id, channel_id, tg_message_id, posted_at, text, raw";

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Merge one fetched message into storage, keyed by
    /// `(channel_id, tg_message_id)`. On conflict the record's present
    /// fields win over stored ones and its absent fields leave stored
    /// values untouched, so repeated fetches refresh engagement without
    /// ever erasing anything.
    async fn upsert_message(&self, channel_id: i64, record: &MessageRecord) -> Result<()>;

    /// Highest stored message id for a channel, if any posts exist.
    async fn watermark(&self, channel_id: i64) -> Result<Option<i64>>;

    async fn find(&self, post_id: i64) -> Result<Option<Post>>;

    /// Newest-first page of a channel's posts, optionally filtered by a
    /// full-text query.
    async fn page(
        &self,
        channel_id: i64,
        query: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<PostsPage>;
}

pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn upsert_message(&self, channel_id: i64, record: &MessageRecord) -> Result<()> {
        // raw never contains null fields (they are skipped at serialization),
        // so the jsonb merge can only add or overwrite-with-a-value.
        sqlx::query(
            r#"
            INSERT INTO posts (channel_id, tg_message_id, posted_at, text, raw)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (channel_id, tg_message_id) DO UPDATE
            SET posted_at = COALESCE(EXCLUDED.posted_at, posts.posted_at),
                text = COALESCE(EXCLUDED.text, posts.text),
                raw = COALESCE(posts.raw, '{}'::jsonb) || EXCLUDED.raw
            "#,
        )
        .bind(channel_id)
        .bind(record.id)
        .bind(record.posted_at)
        .bind(record.text.as_deref())
        .bind(record.raw_json())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn watermark(&self, channel_id: i64) -> Result<Option<i64>> {
        let watermark = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT max(tg_message_id) FROM posts WHERE channel_id = $1",
        )
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(watermark)
    }

    async fn find(&self, post_id: i64) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn page(
        &self,
        channel_id: i64,
        query: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<PostsPage> {
        let offset = (page - 1) * page_size;
        let (rows, total) = match query {
            Some(needle) => {
                let rows = sqlx::query_as::<_, Post>(&format!(
                    r#"
                    SELECT {POST_COLUMNS} FROM posts
                    WHERE channel_id = $1
                      AND text_tsv @@ plainto_tsquery('simple', $2)
                    ORDER BY posted_at DESC NULLS LAST, tg_message_id DESC
                    LIMIT $3 OFFSET $4
                    "#
                ))
                .bind(channel_id)
                .bind(needle)
                .bind(page_size)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total = sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT count(*) FROM posts
                    WHERE channel_id = $1
                      AND text_tsv @@ plainto_tsquery('simple', $2)
                    "#,
                )
                .bind(channel_id)
                .bind(needle)
                .fetch_one(&self.pool)
                .await?;
                (rows, total)
            }
            None => {
                let rows = sqlx::query_as::<_, Post>(&format!(
                    r#"
                    SELECT {POST_COLUMNS} FROM posts
                    WHERE channel_id = $1
                    ORDER BY posted_at DESC NULLS LAST, tg_message_id DESC
                    LIMIT $2 OFFSET $3
                    "#
                ))
                .bind(channel_id)
                .bind(page_size)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total =
                    sqlx::query_scalar::<_, i64>("SELECT count(*) FROM posts WHERE channel_id = $1")
                        .bind(channel_id)
                        .fetch_one(&self.pool)
                        .await?;
                (rows, total)
            }
        };
        Ok(PostsPage {
            items: rows.iter().map(Post::view).collect(),
            page,
            page_size,
            total,
        })
    }
}
