//! Fetch job queue persistence.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use super::job::{FetchJob, JobStats};

const JOB_COLUMNS: &str = "id, channel_id, status, started_at, finished_at, error, stats, created_at";

#[async_trait]
pub trait FetchJobStore: Send + Sync {
    /// Queue a fetch for a channel. Duplicates are allowed on purpose: each
    /// queued job is an independent unit of work and extra ones degrade into
    /// cheap no-op fetches.
    async fn enqueue(&self, channel_id: i64) -> Result<i64>;

    /// Advisory claim: the ids of up to `limit` queued jobs, oldest first.
    /// Status is not mutated here; a claimed-but-never-started job is simply
    /// claimed again on a later tick.
    async fn claim_batch(&self, limit: i64) -> Result<Vec<i64>>;

    async fn find(&self, job_id: i64) -> Result<Option<FetchJob>>;

    async fn latest_for_channel(&self, channel_id: i64) -> Result<Option<FetchJob>>;

    async fn mark_started(&self, job_id: i64) -> Result<()>;

    async fn mark_success(&self, job_id: i64, stats: &JobStats) -> Result<()>;

    async fn mark_error(&self, job_id: i64, message: &str) -> Result<()>;

    /// Watchdog: push `running` jobs whose `started_at` is older than the
    /// threshold back to `queued`, so a crash mid-fetch cannot strand them.
    /// Returns how many were re-queued.
    async fn requeue_stale(&self, older_than_minutes: i64) -> Result<u64>;
}

pub struct PgFetchJobStore {
    pool: PgPool,
}

impl PgFetchJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FetchJobStore for PgFetchJobStore {
    async fn enqueue(&self, channel_id: i64) -> Result<i64> {
        let job_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO fetch_jobs (channel_id, status) VALUES ($1, 'queued') RETURNING id",
        )
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(job_id)
    }

    async fn claim_batch(&self, limit: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM fetch_jobs
            WHERE status = 'queued'
            ORDER BY started_at NULLS FIRST, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn find(&self, job_id: i64) -> Result<Option<FetchJob>> {
        let job = sqlx::query_as::<_, FetchJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM fetch_jobs WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn latest_for_channel(&self, channel_id: i64) -> Result<Option<FetchJob>> {
        let job = sqlx::query_as::<_, FetchJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM fetch_jobs WHERE channel_id = $1 ORDER BY id DESC LIMIT 1"
        ))
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn mark_started(&self, job_id: i64) -> Result<()> {
        sqlx::query("UPDATE fetch_jobs SET status = 'running', started_at = now() WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_success(&self, job_id: i64, stats: &JobStats) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE fetch_jobs
            SET status = 'success', finished_at = now(), stats = $2, error = NULL
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(serde_json::to_value(stats)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_error(&self, job_id: i64, message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE fetch_jobs SET status = 'error', finished_at = now(), error = $2 WHERE id = $1",
        )
        .bind(job_id)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn requeue_stale(&self, older_than_minutes: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE fetch_jobs
            SET status = 'queued', started_at = NULL
            WHERE status = 'running'
              AND started_at < now() - make_interval(mins => $1::int)
            "#,
        )
        .bind(older_than_minutes)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
