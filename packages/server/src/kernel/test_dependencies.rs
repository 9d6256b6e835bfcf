//! Mock and in-memory implementations for testing.
//!
//! Everything here runs without Postgres or network access. The in-memory
//! stores honor the same contracts as their `Pg*` counterparts (advisory
//! claims, merge-upsert, watchdog re-queue) so pipeline tests exercise real
//! executor and scheduler code against them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::{self, BoxStream, StreamExt};

use crate::domains::channels::{normalize_reference, Channel, ChannelDirectory, ChannelStatus, RegisterError};
use crate::domains::fetch::{FetchJob, FetchJobStore, JobStats, JobStatus};
use crate::domains::posts::{Post, PostStore, PostsPage};
use crate::domains::summaries::{Summary, SummaryStore};

use super::traits::{
    BaseHistorySource, BaseSummarizer, MessageRecord, ResolvedChannel, SourceError,
};

/// Convenience constructor for history fixtures.
pub fn message(id: i64) -> MessageRecord {
    MessageRecord {
        id,
        posted_at: Some(Utc::now()),
        text: Some(format!("message {id}")),
        views: None,
        forwards: None,
        replies: None,
        reactions: None,
    }
}

// ============================================================================
// MockHistorySource
// ============================================================================

/// Scripted history source. Responses are queues popped per call; when a
/// queue is empty, `resolve` falls back to a fixed identity and `history`
/// to an empty stream.
#[derive(Default)]
pub struct MockHistorySource {
    resolutions: Mutex<VecDeque<Result<ResolvedChannel, SourceError>>>,
    histories: Mutex<VecDeque<Vec<Result<MessageRecord, SourceError>>>>,
    resolve_calls: Mutex<Vec<String>>,
    history_calls: Mutex<Vec<(String, usize)>>,
}

impl MockHistorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolution(self, result: Result<ResolvedChannel, SourceError>) -> Self {
        self.resolutions.lock().unwrap().push_back(result);
        self
    }

    pub fn with_messages(self, records: Vec<MessageRecord>) -> Self {
        self.with_history(records.into_iter().map(Ok).collect())
    }

    pub fn with_history(self, items: Vec<Result<MessageRecord, SourceError>>) -> Self {
        self.histories.lock().unwrap().push_back(items);
        self
    }

    pub fn resolve_calls(&self) -> Vec<String> {
        self.resolve_calls.lock().unwrap().clone()
    }

    pub fn history_calls(&self) -> Vec<(String, usize)> {
        self.history_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseHistorySource for MockHistorySource {
    async fn resolve(&self, reference: &str) -> Result<ResolvedChannel, SourceError> {
        self.resolve_calls
            .lock()
            .unwrap()
            .push(reference.to_string());
        match self.resolutions.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(ResolvedChannel {
                tg_id: 424242,
                title: "Mock Channel".to_string(),
            }),
        }
    }

    fn history(
        &self,
        reference: String,
        limit: usize,
    ) -> BoxStream<'_, Result<MessageRecord, SourceError>> {
        self.history_calls
            .lock()
            .unwrap()
            .push((reference, limit));
        let items = self
            .histories
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        stream::iter(items).take(limit).boxed()
    }
}

// ============================================================================
// MockSummarizer
// ============================================================================

#[derive(Default)]
pub struct MockSummarizer {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, summary: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(summary.into());
        self
    }

    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseSummarizer for MockSummarizer {
    async fn summarize(&self, text: &str, model_override: Option<&str>) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), model_override.map(str::to_string)));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "mock summary".to_string()))
    }
}

// ============================================================================
// InMemoryChannelDirectory
// ============================================================================

pub struct InMemoryChannelDirectory {
    channels: Mutex<Vec<Channel>>,
    next_id: AtomicI64,
}

impl InMemoryChannelDirectory {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl ChannelDirectory for InMemoryChannelDirectory {
    async fn register(&self, raw_reference: &str) -> Result<(Channel, bool), RegisterError> {
        let tg_url = normalize_reference(raw_reference)?;
        let mut channels = self.channels.lock().unwrap();
        if let Some(existing) = channels.iter().find(|c| c.tg_url == tg_url) {
            return Ok((existing.clone(), false));
        }
        let channel = Channel {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            tg_url,
            tg_id: None,
            title: None,
            status: ChannelStatus::Pending,
            created_at: Utc::now(),
        };
        channels.push(channel.clone());
        Ok((channel, true))
    }

    async fn find(&self, channel_id: i64) -> Result<Option<Channel>> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == channel_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Channel>> {
        let mut channels = self.channels.lock().unwrap().clone();
        channels.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(channels)
    }

    async fn delete(&self, channel_id: i64) -> Result<()> {
        self.channels
            .lock()
            .unwrap()
            .retain(|c| c.id != channel_id);
        Ok(())
    }

    async fn mark_resolved(&self, channel_id: i64, tg_id: i64, title: &str) -> Result<()> {
        let mut channels = self.channels.lock().unwrap();
        if let Some(channel) = channels.iter_mut().find(|c| c.id == channel_id) {
            channel.tg_id.get_or_insert(tg_id);
            channel.title.get_or_insert_with(|| title.to_string());
            channel.status = ChannelStatus::Active;
        }
        Ok(())
    }

    async fn pending_channels(&self) -> Result<Vec<Channel>> {
        let mut pending: Vec<Channel> = self
            .channels
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.status == ChannelStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    async fn active_channel_ids(&self) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .channels
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.status == ChannelStatus::Active)
            .map(|c| c.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

// ============================================================================
// InMemoryFetchJobStore
// ============================================================================

pub struct InMemoryFetchJobStore {
    jobs: Mutex<Vec<FetchJob>>,
    next_id: AtomicI64,
}

impl InMemoryFetchJobStore {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Test hook: shift a job's `started_at` into the past to exercise the
    /// stale-job watchdog.
    pub fn backdate_started(&self, job_id: i64, minutes: i64) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
            if let Some(started_at) = job.started_at.as_mut() {
                *started_at -= ChronoDuration::minutes(minutes);
            }
        }
    }

    pub fn all(&self) -> Vec<FetchJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchJobStore for InMemoryFetchJobStore {
    async fn enqueue(&self, channel_id: i64) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().unwrap().push(FetchJob {
            id,
            channel_id,
            status: JobStatus::Queued,
            started_at: None,
            finished_at: None,
            error: None,
            stats: None,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn claim_batch(&self, limit: i64) -> Result<Vec<i64>> {
        let jobs = self.jobs.lock().unwrap();
        let mut queued: Vec<&FetchJob> = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Queued)
            .collect();
        queued.sort_by_key(|j| (j.started_at, j.id));
        Ok(queued
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|j| j.id)
            .collect())
    }

    async fn find(&self, job_id: i64) -> Result<Option<FetchJob>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == job_id)
            .cloned())
    }

    async fn latest_for_channel(&self, channel_id: i64) -> Result<Option<FetchJob>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.channel_id == channel_id)
            .max_by_key(|j| j.id)
            .cloned())
    }

    async fn mark_started(&self, job_id: i64) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_success(&self, job_id: i64, stats: &JobStats) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
            job.status = JobStatus::Success;
            job.finished_at = Some(Utc::now());
            job.stats = Some(serde_json::to_value(stats)?);
            job.error = None;
        }
        Ok(())
    }

    async fn mark_error(&self, job_id: i64, message: &str) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
            job.status = JobStatus::Error;
            job.finished_at = Some(Utc::now());
            job.error = Some(message.to_string());
        }
        Ok(())
    }

    async fn requeue_stale(&self, older_than_minutes: i64) -> Result<u64> {
        let threshold = Utc::now() - ChronoDuration::minutes(older_than_minutes);
        let mut jobs = self.jobs.lock().unwrap();
        let mut requeued = 0u64;
        for job in jobs.iter_mut() {
            if job.status == JobStatus::Running
                && job.started_at.is_some_and(|started| started < threshold)
            {
                job.status = JobStatus::Queued;
                job.started_at = None;
                requeued += 1;
            }
        }
        Ok(requeued)
    }
}

// ============================================================================
// InMemoryPostStore
// ============================================================================

pub struct InMemoryPostStore {
    posts: Mutex<Vec<Post>>,
    next_id: AtomicI64,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn all(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn upsert_message(&self, channel_id: i64, record: &MessageRecord) -> Result<()> {
        let raw = record.raw_json();
        let mut posts = self.posts.lock().unwrap();
        if let Some(post) = posts
            .iter_mut()
            .find(|p| p.channel_id == channel_id && p.tg_message_id == record.id)
        {
            if record.posted_at.is_some() {
                post.posted_at = record.posted_at;
            }
            if record.text.is_some() {
                post.text = record.text.clone();
            }
            if let (Some(target), Some(incoming)) = (post.raw.as_object_mut(), raw.as_object()) {
                for (key, value) in incoming {
                    target.insert(key.clone(), value.clone());
                }
            }
            return Ok(());
        }
        posts.push(Post {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            channel_id,
            tg_message_id: record.id,
            posted_at: record.posted_at,
            text: record.text.clone(),
            raw,
        });
        Ok(())
    }

    async fn watermark(&self, channel_id: i64) -> Result<Option<i64>> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.channel_id == channel_id)
            .map(|p| p.tg_message_id)
            .max())
    }

    async fn find(&self, post_id: i64) -> Result<Option<Post>> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == post_id)
            .cloned())
    }

    async fn page(
        &self,
        channel_id: i64,
        query: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<PostsPage> {
        let needle = query.map(str::to_lowercase);
        let mut matched: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.channel_id == channel_id)
            .filter(|p| match &needle {
                Some(needle) => p
                    .text
                    .as_deref()
                    .is_some_and(|text| text.to_lowercase().contains(needle)),
                None => true,
            })
            .cloned()
            .collect();
        // posted_at descending with nulls last, message id as tiebreaker.
        matched.sort_by(|a, b| match (a.posted_at, b.posted_at) {
            (Some(a_at), Some(b_at)) => b_at
                .cmp(&a_at)
                .then(b.tg_message_id.cmp(&a.tg_message_id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.tg_message_id.cmp(&a.tg_message_id),
        });
        let total = matched.len() as i64;
        let offset = ((page - 1) * page_size).max(0) as usize;
        let items = matched
            .into_iter()
            .skip(offset)
            .take(page_size.max(0) as usize)
            .map(|p| p.view())
            .collect();
        Ok(PostsPage {
            items,
            page,
            page_size,
            total,
        })
    }
}

// ============================================================================
// InMemorySummaryStore
// ============================================================================

#[derive(Default)]
pub struct InMemorySummaryStore {
    rows: Mutex<Vec<Summary>>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    async fn find(&self, post_id: i64) -> Result<Option<Summary>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.post_id == post_id)
            .cloned())
    }

    async fn upsert(&self, post_id: i64, model_id: &str, summary: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.iter_mut().find(|s| s.post_id == post_id) {
            existing.model_id = model_id.to_string();
            existing.summary = summary.to_string();
            return Ok(());
        }
        rows.push(Summary {
            post_id,
            model_id: model_id.to_string(),
            summary: summary.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}

// ============================================================================
// TestStores
// ============================================================================

/// The full in-memory store set plus direct handles to the concrete types,
/// for tests that need the test-only hooks.
pub struct TestStores {
    pub channels: Arc<InMemoryChannelDirectory>,
    pub jobs: Arc<InMemoryFetchJobStore>,
    pub posts: Arc<InMemoryPostStore>,
    pub summaries: Arc<InMemorySummaryStore>,
}

impl TestStores {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(InMemoryChannelDirectory::new()),
            jobs: Arc::new(InMemoryFetchJobStore::new()),
            posts: Arc::new(InMemoryPostStore::new()),
            summaries: Arc::new(InMemorySummaryStore::new()),
        }
    }
}

impl Default for TestStores {
    fn default() -> Self {
        Self::new()
    }
}
