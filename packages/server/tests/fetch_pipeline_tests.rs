//! End-to-end executor behavior against in-memory stores.

mod common;

use common::{fast_config, pipeline, pipeline_with_config};
use server_core::domains::channels::{ChannelDirectory, ChannelStatus};
use server_core::domains::fetch::{FetchConfig, FetchJobStore, JobStatus};
use server_core::domains::posts::PostStore;
use server_core::kernel::test_dependencies::{message, MockHistorySource};
use server_core::kernel::{MessageRecord, ResolvedChannel, SourceError};

fn record(id: i64, text: Option<&str>, views: Option<i64>) -> MessageRecord {
    MessageRecord {
        id,
        posted_at: None,
        text: text.map(str::to_string),
        views,
        forwards: None,
        replies: None,
        reactions: None,
    }
}

#[tokio::test]
async fn first_fetch_resolves_channel_and_stores_history() {
    let source = MockHistorySource::new()
        .with_resolution(Ok(ResolvedChannel {
            tg_id: 777,
            title: "News Channel".to_string(),
        }))
        .with_messages(vec![message(103), message(102), message(101)]);
    let pipeline = pipeline(source);
    let (channel, job_id) = pipeline.register("@newschannel").await;

    pipeline.executor.run(job_id).await.unwrap();

    let channel = pipeline
        .stores
        .channels
        .find(channel.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(channel.status, ChannelStatus::Active);
    assert_eq!(channel.tg_id, Some(777));
    assert_eq!(channel.title.as_deref(), Some("News Channel"));

    let job = pipeline.stores.jobs.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert!(job.started_at.is_some());
    assert!(job.finished_at.is_some());
    assert!(job.error.is_none());
    assert_eq!(job.stats.as_ref().unwrap()["inserted"], 3);

    assert_eq!(pipeline.stores.posts.all().len(), 3);
    assert_eq!(
        pipeline.source.history_calls(),
        vec![("https://t.me/newschannel".to_string(), 1000)]
    );
}

#[tokio::test]
async fn rate_limited_resolution_finalizes_job_as_error() {
    let source = MockHistorySource::new().with_resolution(Err(SourceError::RateLimited {
        retry_after_secs: 30,
    }));
    let pipeline = pipeline(source);
    let (channel, job_id) = pipeline.register("@newschannel").await;

    pipeline.executor.run(job_id).await.unwrap();

    let job = pipeline.stores.jobs.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error.as_deref(), Some("RATE_LIMITED 30s"));
    assert!(job.finished_at.is_some());

    // Channel untouched, no fetch attempted.
    let channel = pipeline
        .stores
        .channels
        .find(channel.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(channel.status, ChannelStatus::Pending);
    assert!(pipeline.source.history_calls().is_empty());
    assert!(pipeline.stores.posts.all().is_empty());
}

#[tokio::test]
async fn failed_resolution_still_fetches_by_reference() {
    let source = MockHistorySource::new()
        .with_resolution(Err(SourceError::AccessDenied(
            "preview unavailable".to_string(),
        )))
        .with_messages(vec![message(5), message(4)]);
    let pipeline = pipeline(source);
    let (channel, job_id) = pipeline.register("@newschannel").await;

    pipeline.executor.run(job_id).await.unwrap();

    let job = pipeline.stores.jobs.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.stats.as_ref().unwrap()["inserted"], 2);

    // The channel stays pending until a resolution succeeds.
    let channel = pipeline
        .stores
        .channels
        .find(channel.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(channel.status, ChannelStatus::Pending);
    assert_eq!(channel.tg_id, None);
}

#[tokio::test]
async fn rate_limit_mid_stream_keeps_partial_progress() {
    let source = MockHistorySource::new().with_history(vec![
        Ok(message(9)),
        Ok(message(8)),
        Err(SourceError::RateLimited {
            retry_after_secs: 60,
        }),
    ]);
    let pipeline = pipeline(source);
    let (_, job_id) = pipeline.register("@newschannel").await;

    pipeline.executor.run(job_id).await.unwrap();

    let job = pipeline.stores.jobs.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error.as_deref(), Some("RATE_LIMITED 60s"));

    // Messages seen before the limit hit are kept.
    let stored: Vec<i64> = pipeline
        .stores
        .posts
        .all()
        .iter()
        .map(|p| p.tg_message_id)
        .collect();
    assert_eq!(stored, vec![9, 8]);
}

#[tokio::test]
async fn access_denied_mid_stream_records_the_reason() {
    let source = MockHistorySource::new().with_history(vec![Err(SourceError::AccessDenied(
        "channel went private".to_string(),
    ))]);
    let pipeline = pipeline(source);
    let (_, job_id) = pipeline.register("@newschannel").await;

    pipeline.executor.run(job_id).await.unwrap();

    let job = pipeline.stores.jobs.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error.as_deref(), Some("channel went private"));
}

#[tokio::test]
async fn refetch_merges_without_erasing_fields() {
    let source = MockHistorySource::new()
        .with_messages(vec![record(42, Some("hello world"), Some(10))])
        .with_messages(vec![record(42, None, Some(25))]);
    let pipeline = pipeline(source);
    let (channel, job_id) = pipeline.register("@newschannel").await;
    pipeline.executor.run(job_id).await.unwrap();

    let second_job = pipeline.stores.jobs.enqueue(channel.id).await.unwrap();
    pipeline.executor.run(second_job).await.unwrap();

    let posts = pipeline.stores.posts.all();
    assert_eq!(posts.len(), 1);
    let view = posts[0].view();
    // views refreshed, text kept from the first fetch.
    assert_eq!(view.views, Some(25));
    assert_eq!(view.text.as_deref(), Some("hello world"));
}

#[tokio::test]
async fn refresh_window_bounds_the_retouch_depth() {
    let newest_first: Vec<_> = (1..=10).rev().map(message).collect();
    let source = MockHistorySource::new()
        .with_messages(newest_first.clone())
        .with_messages(newest_first);
    let config = FetchConfig {
        refresh_window: 3,
        ..fast_config()
    };
    let pipeline = pipeline_with_config(source, config);
    let (channel, job_id) = pipeline.register("@newschannel").await;

    pipeline.executor.run(job_id).await.unwrap();
    let job = pipeline.stores.jobs.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.stats.as_ref().unwrap()["inserted"], 10);

    // Everything is already stored: the second run only re-touches the
    // refresh window before bailing out.
    let second_job = pipeline.stores.jobs.enqueue(channel.id).await.unwrap();
    pipeline.executor.run(second_job).await.unwrap();
    let job = pipeline
        .stores
        .jobs
        .find(second_job)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.stats.as_ref().unwrap()["inserted"], 3);
}

#[tokio::test]
async fn watermark_only_moves_forward() {
    let source = MockHistorySource::new()
        .with_messages((1..=5).rev().map(message).collect())
        .with_messages((3..=7).rev().map(message).collect());
    let pipeline = pipeline(source);
    let (channel, job_id) = pipeline.register("@newschannel").await;

    pipeline.executor.run(job_id).await.unwrap();
    assert_eq!(
        pipeline.stores.posts.watermark(channel.id).await.unwrap(),
        Some(5)
    );

    let second_job = pipeline.stores.jobs.enqueue(channel.id).await.unwrap();
    pipeline.executor.run(second_job).await.unwrap();
    assert_eq!(
        pipeline.stores.posts.watermark(channel.id).await.unwrap(),
        Some(7)
    );
    // 5 original + 2 genuinely new.
    assert_eq!(pipeline.stores.posts.all().len(), 7);
}

#[tokio::test]
async fn job_for_deleted_channel_is_a_quiet_success() {
    let pipeline = pipeline(MockHistorySource::new());
    let job_id = pipeline.stores.jobs.enqueue(999).await.unwrap();

    pipeline.executor.run(job_id).await.unwrap();

    let job = pipeline.stores.jobs.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.stats.as_ref().unwrap()["inserted"], 0);
    assert!(pipeline.source.resolve_calls().is_empty());
    assert!(pipeline.source.history_calls().is_empty());
}

#[tokio::test]
async fn missing_job_is_ignored() {
    let pipeline = pipeline(MockHistorySource::new());
    pipeline.executor.run(12345).await.unwrap();
    assert!(pipeline.stores.jobs.all().is_empty());
}
