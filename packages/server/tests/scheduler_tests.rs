//! Scheduler tick behavior, driven directly without timers.

mod common;

use std::sync::Arc;

use common::{pipeline, Pipeline};
use server_core::domains::channels::ChannelDirectory;
use server_core::domains::fetch::{FetchJobStore, JobStatus};
use server_core::kernel::test_dependencies::MockHistorySource;
use server_core::kernel::{FetchScheduler, SchedulerConfig};

fn scheduler_for(pipeline: &Pipeline, config: SchedulerConfig) -> FetchScheduler {
    let channels: Arc<dyn ChannelDirectory> = pipeline.stores.channels.clone();
    let jobs: Arc<dyn FetchJobStore> = pipeline.stores.jobs.clone();
    FetchScheduler::new(channels, jobs, pipeline.executor.clone(), config)
}

#[tokio::test]
async fn startup_enqueues_one_job_per_pending_channel() {
    let pipeline = pipeline(MockHistorySource::new());
    let (first, _) = pipeline.stores.channels.register("@first").await.unwrap();
    let (second, _) = pipeline.stores.channels.register("@second").await.unwrap();
    let scheduler = scheduler_for(&pipeline, SchedulerConfig::default());

    let enqueued = scheduler.enqueue_initial_jobs().await.unwrap();

    assert_eq!(enqueued, 2);
    let channel_ids: Vec<i64> = pipeline
        .stores
        .jobs
        .all()
        .iter()
        .map(|j| j.channel_id)
        .collect();
    // Registration order.
    assert_eq!(channel_ids, vec![first.id, second.id]);
}

#[tokio::test]
async fn discovery_tick_targets_active_channels_and_allows_duplicates() {
    let pipeline = pipeline(MockHistorySource::new());
    let (active, _) = pipeline.stores.channels.register("@active").await.unwrap();
    let (pending, _) = pipeline.stores.channels.register("@pending").await.unwrap();
    pipeline
        .stores
        .channels
        .mark_resolved(active.id, 111, "Active Channel")
        .await
        .unwrap();
    let scheduler = scheduler_for(&pipeline, SchedulerConfig::default());

    assert_eq!(scheduler.run_discovery_tick().await.unwrap(), 1);
    assert_eq!(scheduler.run_discovery_tick().await.unwrap(), 1);

    let jobs = pipeline.stores.jobs.all();
    // Two ticks, two independent jobs for the same active channel; the
    // pending one is untouched.
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.channel_id == active.id));
    assert!(!jobs.iter().any(|j| j.channel_id == pending.id));
}

#[tokio::test]
async fn drain_tick_runs_at_most_one_batch() {
    let pipeline = pipeline(MockHistorySource::new());
    let (channel, _) = pipeline.stores.channels.register("@channel").await.unwrap();
    for _ in 0..5 {
        pipeline.stores.jobs.enqueue(channel.id).await.unwrap();
    }
    let scheduler = scheduler_for(
        &pipeline,
        SchedulerConfig {
            drain_batch_size: 3,
            ..SchedulerConfig::default()
        },
    );

    let drained = scheduler.run_drain_tick().await.unwrap();

    assert_eq!(drained, 3);
    let jobs = pipeline.stores.jobs.all();
    let terminal = jobs.iter().filter(|j| j.status.is_terminal()).count();
    let queued = jobs.iter().filter(|j| j.status == JobStatus::Queued).count();
    assert_eq!(terminal, 3);
    assert_eq!(queued, 2);

    // The remaining duplicates drain on the next tick.
    assert_eq!(scheduler.run_drain_tick().await.unwrap(), 2);
    assert!(pipeline
        .stores
        .jobs
        .all()
        .iter()
        .all(|j| j.status == JobStatus::Success));
}

#[tokio::test]
async fn stale_running_jobs_are_reclaimed() {
    let pipeline = pipeline(MockHistorySource::new());
    let (channel, _) = pipeline.stores.channels.register("@channel").await.unwrap();
    let job_id = pipeline.stores.jobs.enqueue(channel.id).await.unwrap();
    pipeline.stores.jobs.mark_started(job_id).await.unwrap();
    pipeline.stores.jobs.backdate_started(job_id, 45);

    let scheduler = scheduler_for(
        &pipeline,
        SchedulerConfig {
            stale_after_minutes: 30,
            ..SchedulerConfig::default()
        },
    );
    let drained = scheduler.run_drain_tick().await.unwrap();

    // Re-queued by the watchdog and immediately claimed again.
    assert_eq!(drained, 1);
    let job = pipeline.stores.jobs.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Success);
}

#[tokio::test]
async fn fresh_running_jobs_are_left_alone() {
    let pipeline = pipeline(MockHistorySource::new());
    let (channel, _) = pipeline.stores.channels.register("@channel").await.unwrap();
    let job_id = pipeline.stores.jobs.enqueue(channel.id).await.unwrap();
    pipeline.stores.jobs.mark_started(job_id).await.unwrap();

    let scheduler = scheduler_for(&pipeline, SchedulerConfig::default());
    let drained = scheduler.run_drain_tick().await.unwrap();

    assert_eq!(drained, 0);
    let job = pipeline.stores.jobs.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
}
