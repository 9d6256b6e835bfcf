//! Shared wiring for pipeline tests: in-memory stores + scripted source.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use server_core::domains::channels::{Channel, ChannelDirectory};
use server_core::domains::fetch::{FetchConfig, FetchExecutor, FetchJobStore};
use server_core::domains::posts::PostStore;
use server_core::kernel::test_dependencies::{MockHistorySource, TestStores};
use server_core::kernel::BaseHistorySource;

pub struct Pipeline {
    pub stores: TestStores,
    pub source: Arc<MockHistorySource>,
    pub executor: Arc<FetchExecutor>,
}

/// No pacing pauses in tests.
pub fn fast_config() -> FetchConfig {
    FetchConfig {
        pace_every: 0,
        pace_delay: Duration::ZERO,
        ..FetchConfig::default()
    }
}

pub fn pipeline(source: MockHistorySource) -> Pipeline {
    pipeline_with_config(source, fast_config())
}

pub fn pipeline_with_config(source: MockHistorySource, config: FetchConfig) -> Pipeline {
    let stores = TestStores::new();
    let source = Arc::new(source);
    let channels: Arc<dyn ChannelDirectory> = stores.channels.clone();
    let jobs: Arc<dyn FetchJobStore> = stores.jobs.clone();
    let posts: Arc<dyn PostStore> = stores.posts.clone();
    let history: Arc<dyn BaseHistorySource> = source.clone();
    let executor = Arc::new(FetchExecutor::new(channels, jobs, posts, history, config));
    Pipeline {
        stores,
        source,
        executor,
    }
}

impl Pipeline {
    /// Register a channel and queue its first fetch job, the way the API
    /// route does.
    pub async fn register(&self, reference: &str) -> (Channel, i64) {
        let (channel, created) = self.stores.channels.register(reference).await.unwrap();
        assert!(created, "channel {reference} already registered");
        let job_id = self.stores.jobs.enqueue(channel.id).await.unwrap();
        (channel, job_id)
    }
}
