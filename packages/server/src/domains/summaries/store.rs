use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, FromRow)]
pub struct Summary {
    pub post_id: i64,
    pub model_id: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn find(&self, post_id: i64) -> Result<Option<Summary>>;

    /// One summary per post; regenerating replaces the cached row.
    async fn upsert(&self, post_id: i64, model_id: &str, summary: &str) -> Result<()>;
}

pub struct PgSummaryStore {
    pool: PgPool,
}

impl PgSummaryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummaryStore for PgSummaryStore {
    async fn find(&self, post_id: i64) -> Result<Option<Summary>> {
        let summary = sqlx::query_as::<_, Summary>(
            "SELECT post_id, model_id, summary, created_at FROM summaries WHERE post_id = $1",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(summary)
    }

    async fn upsert(&self, post_id: i64, model_id: &str, summary: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO summaries (post_id, model_id, summary)
            VALUES ($1, $2, $3)
            ON CONFLICT (post_id) DO UPDATE
            SET summary = EXCLUDED.summary, model_id = EXCLUDED.model_id
            "#,
        )
        .bind(post_id)
        .bind(model_id)
        .bind(summary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
