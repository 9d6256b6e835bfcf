//! Periodic fetch scheduling.
//!
//! Two timers: a discovery tick that enqueues a fetch job per active
//! channel, and a drain tick that claims queued jobs and runs them. The
//! scheduler is an explicitly constructed object owned by the composition
//! root; tick bodies are public so tests can drive them without timers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

use crate::domains::channels::ChannelDirectory;
use crate::domains::fetch::{FetchExecutor, FetchJobStore};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub discovery_interval: Duration,
    pub drain_interval: Duration,
    pub drain_batch_size: i64,
    pub stale_after_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            discovery_interval: Duration::from_secs(5 * 60),
            drain_interval: Duration::from_secs(15),
            drain_batch_size: 3,
            stale_after_minutes: 30,
        }
    }
}

pub struct FetchScheduler {
    channels: Arc<dyn ChannelDirectory>,
    jobs: Arc<dyn FetchJobStore>,
    executor: Arc<FetchExecutor>,
    config: SchedulerConfig,
    drain_gate: Arc<Mutex<()>>,
    inner: Option<JobScheduler>,
}

impl FetchScheduler {
    pub fn new(
        channels: Arc<dyn ChannelDirectory>,
        jobs: Arc<dyn FetchJobStore>,
        executor: Arc<FetchExecutor>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            channels,
            jobs,
            executor,
            config,
            drain_gate: Arc::new(Mutex::new(())),
            inner: None,
        }
    }

    /// Start both timers. Callable once. Pending channels get their first
    /// job here so they do not wait for the first discovery tick.
    pub async fn start(&mut self) -> Result<()> {
        if self.inner.is_some() {
            bail!("fetch scheduler already started");
        }

        if let Err(err) = self.enqueue_initial_jobs().await {
            warn!(error = %err, "Could not enqueue initial fetch jobs");
        }

        let scheduler = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;

        let channels = self.channels.clone();
        let jobs = self.jobs.clone();
        let discovery = Job::new_repeated_async(self.config.discovery_interval, move |_uuid, _lock| {
            let channels = channels.clone();
            let jobs = jobs.clone();
            Box::pin(async move {
                match discovery_tick(channels.as_ref(), jobs.as_ref()).await {
                    Ok(enqueued) if enqueued > 0 => {
                        info!(enqueued, "discovery tick enqueued fetch jobs");
                    }
                    Ok(_) => {}
                    Err(err) => error!(error = %err, "Discovery tick failed"),
                }
            })
        })
        .context("Failed to create discovery job")?;
        scheduler
            .add(discovery)
            .await
            .context("Failed to schedule discovery job")?;

        let jobs = self.jobs.clone();
        let executor = self.executor.clone();
        let gate = self.drain_gate.clone();
        let batch_size = self.config.drain_batch_size;
        let stale_after = self.config.stale_after_minutes;
        let drain = Job::new_repeated_async(self.config.drain_interval, move |_uuid, _lock| {
            let jobs = jobs.clone();
            let executor = executor.clone();
            let gate = gate.clone();
            Box::pin(async move {
                if let Err(err) =
                    drain_tick(&gate, jobs.as_ref(), &executor, batch_size, stale_after).await
                {
                    error!(error = %err, "Drain tick failed");
                }
            })
        })
        .context("Failed to create drain job")?;
        scheduler
            .add(drain)
            .await
            .context("Failed to schedule drain job")?;

        scheduler
            .start()
            .await
            .context("Failed to start job scheduler")?;
        info!(
            discovery_secs = self.config.discovery_interval.as_secs(),
            drain_secs = self.config.drain_interval.as_secs(),
            batch_size = self.config.drain_batch_size,
            "Fetch scheduler started"
        );
        self.inner = Some(scheduler);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        match self.inner.take() {
            Some(mut scheduler) => {
                scheduler
                    .shutdown()
                    .await
                    .context("Failed to stop job scheduler")?;
                info!("Fetch scheduler stopped");
                Ok(())
            }
            None => bail!("fetch scheduler is not running"),
        }
    }

    /// One job per channel still awaiting its first resolution, in
    /// registration order.
    pub async fn enqueue_initial_jobs(&self) -> Result<u64> {
        let pending = self.channels.pending_channels().await?;
        let mut enqueued = 0u64;
        for channel in pending {
            self.jobs.enqueue(channel.id).await?;
            enqueued += 1;
        }
        if enqueued > 0 {
            info!(enqueued, "enqueued initial fetch jobs for pending channels");
        }
        Ok(enqueued)
    }

    pub async fn run_discovery_tick(&self) -> Result<u64> {
        discovery_tick(self.channels.as_ref(), self.jobs.as_ref()).await
    }

    pub async fn run_drain_tick(&self) -> Result<u64> {
        drain_tick(
            &self.drain_gate,
            self.jobs.as_ref(),
            &self.executor,
            self.config.drain_batch_size,
            self.config.stale_after_minutes,
        )
        .await
    }
}

async fn discovery_tick(
    channels: &dyn ChannelDirectory,
    jobs: &dyn FetchJobStore,
) -> Result<u64> {
    let mut enqueued = 0u64;
    for channel_id in channels.active_channel_ids().await? {
        jobs.enqueue(channel_id).await?;
        enqueued += 1;
    }
    Ok(enqueued)
}

async fn drain_tick(
    gate: &Mutex<()>,
    jobs: &dyn FetchJobStore,
    executor: &FetchExecutor,
    batch_size: i64,
    stale_after_minutes: i64,
) -> Result<u64> {
    // The timer must never overlap itself; a tick that finds the gate held
    // just skips.
    let Ok(_guard) = gate.try_lock() else {
        debug!("previous drain tick still running, skipping");
        return Ok(0);
    };

    let requeued = jobs.requeue_stale(stale_after_minutes).await?;
    if requeued > 0 {
        warn!(requeued, "re-queued stale running jobs");
    }

    let claimed = jobs.claim_batch(batch_size).await?;
    let count = claimed.len() as u64;
    for job_id in claimed {
        // A failed job must not poison the rest of the batch.
        if let Err(err) = executor.run(job_id).await {
            error!(job_id, error = %err, "fetch job aborted on storage failure");
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_intervals() {
        let config = SchedulerConfig::default();
        assert_eq!(config.discovery_interval, Duration::from_secs(300));
        assert_eq!(config.drain_interval, Duration::from_secs(15));
        assert_eq!(config.drain_batch_size, 3);
        assert_eq!(config.stale_after_minutes, 30);
    }
}
