//! Fetch job execution.
//!
//! One job = one fetch of one channel's recent history:
//!
//! ```text
//!   find job ──► find channel ──► mark_started
//!                     │
//!                     ▼
//!            resolve (if pending) ──► watermark ──► newest-first stream
//!                                                        │
//!                                            upsert until the stream ends
//!                                            or the refresh window is spent
//!                     │
//!                     ▼
//!            mark_success(stats) / mark_error(message)
//! ```
//!
//! Remote failures finalize the job as `error` and are not raised further;
//! only storage failures propagate to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::domains::channels::{resolve_if_needed, Channel, ChannelDirectory};
use crate::domains::posts::PostStore;
use crate::kernel::traits::{BaseHistorySource, SourceError};

use super::job::JobStats;
use super::store::FetchJobStore;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Hard ceiling on messages pulled per job.
    pub fetch_limit: usize,
    /// How deep below the watermark a job re-touches already-stored messages
    /// to refresh their engagement counters.
    pub refresh_window: usize,
    /// Pause after this many upserts (0 disables pacing).
    pub pace_every: usize,
    pub pace_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 1000,
            refresh_window: 200,
            pace_every: 50,
            pace_delay: Duration::from_millis(500),
        }
    }
}

/// Why a fetch finalized as `error`. The message becomes the job's `error`
/// column; rate limits keep a machine-readable shape so operators can grep
/// for them.
enum JobFailure {
    RateLimited(u64),
    Denied(String),
    Other(anyhow::Error),
}

impl JobFailure {
    fn message(&self) -> String {
        match self {
            JobFailure::RateLimited(secs) => format!("RATE_LIMITED {secs}s"),
            JobFailure::Denied(reason) => reason.clone(),
            JobFailure::Other(err) => format!("{err:#}"),
        }
    }
}

impl From<SourceError> for JobFailure {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::RateLimited { retry_after_secs } => {
                JobFailure::RateLimited(retry_after_secs)
            }
            SourceError::AccessDenied(reason) => JobFailure::Denied(reason),
            SourceError::Other(err) => JobFailure::Other(err),
        }
    }
}

pub struct FetchExecutor {
    channels: Arc<dyn ChannelDirectory>,
    jobs: Arc<dyn FetchJobStore>,
    posts: Arc<dyn PostStore>,
    source: Arc<dyn BaseHistorySource>,
    config: FetchConfig,
}

impl FetchExecutor {
    pub fn new(
        channels: Arc<dyn ChannelDirectory>,
        jobs: Arc<dyn FetchJobStore>,
        posts: Arc<dyn PostStore>,
        source: Arc<dyn BaseHistorySource>,
        config: FetchConfig,
    ) -> Self {
        Self {
            channels,
            jobs,
            posts,
            source,
            config,
        }
    }

    /// Run one claimed job to a terminal state. Ok(()) means the job was
    /// finalized (or vanished); Err means a storage failure left it as-is
    /// for the stale-job watchdog to reclaim.
    pub async fn run(&self, job_id: i64) -> Result<()> {
        let Some(job) = self.jobs.find(job_id).await? else {
            warn!(job_id, "fetch job disappeared before execution");
            return Ok(());
        };
        let Some(channel) = self.channels.find(job.channel_id).await? else {
            // Channel deleted while the job sat in the queue.
            debug!(
                job_id,
                channel_id = job.channel_id,
                "channel gone, finalizing orphaned job"
            );
            self.jobs.mark_success(job_id, &JobStats::empty()).await?;
            return Ok(());
        };

        self.jobs.mark_started(job_id).await?;
        match self.fetch_channel(&channel).await {
            Ok(stats) => {
                info!(
                    job_id,
                    channel_id = channel.id,
                    inserted = stats.inserted,
                    duration_s = stats.duration_s,
                    "fetch job succeeded"
                );
                self.jobs.mark_success(job_id, &stats).await?;
            }
            Err(failure) => {
                let message = failure.message();
                warn!(
                    job_id,
                    channel_id = channel.id,
                    error = %message,
                    "fetch job failed"
                );
                self.jobs.mark_error(job_id, &message).await?;
            }
        }
        Ok(())
    }

    async fn fetch_channel(&self, channel: &Channel) -> Result<JobStats, JobFailure> {
        let started = Instant::now();

        if !channel.is_resolved() {
            match resolve_if_needed(channel, self.channels.as_ref(), self.source.as_ref()).await {
                Ok(resolution) => {
                    if resolution.resolved {
                        debug!(
                            channel_id = channel.id,
                            tg_id = resolution.tg_id,
                            "channel resolved"
                        );
                    }
                }
                // A rate limit will hit the history call too; fail fast and
                // let a later job retry.
                Err(SourceError::RateLimited { retry_after_secs }) => {
                    return Err(JobFailure::RateLimited(retry_after_secs));
                }
                Err(err) => {
                    if channel.tg_url.is_empty() {
                        return Err(JobFailure::from(err));
                    }
                    // Channel stays pending; the reference alone is still
                    // enough to fetch by.
                    warn!(
                        channel_id = channel.id,
                        error = %err,
                        "resolution failed, fetching by reference"
                    );
                }
            }
        }

        let watermark = self
            .posts
            .watermark(channel.id)
            .await
            .map_err(JobFailure::Other)?;

        let mut stream = self
            .source
            .history(channel.tg_url.clone(), self.config.fetch_limit);
        let mut processed = 0usize;
        let mut inserted = 0i64;
        while let Some(item) = stream.next().await {
            let record = item?;
            processed += 1;
            if let Some(watermark) = watermark {
                // Past the watermark and the refresh window is spent:
                // everything older is already stored.
                if record.id <= watermark && processed > self.config.refresh_window {
                    break;
                }
            }
            self.posts
                .upsert_message(channel.id, &record)
                .await
                .map_err(JobFailure::Other)?;
            inserted += 1;
            if self.config.pace_every > 0 && inserted as usize % self.config.pace_every == 0 {
                tokio::time::sleep(self.config.pace_delay).await;
            }
        }
        drop(stream);

        Ok(JobStats::new(inserted, started.elapsed().as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages() {
        assert_eq!(JobFailure::RateLimited(30).message(), "RATE_LIMITED 30s");
        assert_eq!(
            JobFailure::Denied("access denied: private".to_string()).message(),
            "access denied: private"
        );
        let chained = anyhow::anyhow!("root cause").context("outer");
        assert_eq!(
            JobFailure::Other(chained).message(),
            "outer: root cause"
        );
    }

    #[test]
    fn default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.fetch_limit, 1000);
        assert_eq!(config.refresh_window, 200);
        assert_eq!(config.pace_every, 50);
        assert_eq!(config.pace_delay, Duration::from_millis(500));
    }
}
