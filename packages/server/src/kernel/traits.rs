// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - remote capabilities the domains
// depend on. Store traits live next to their domain models in domains/*.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure modes of the remote history capability.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A resolved channel identity. `tg_id` is stable for a given reference and
/// never changes across calls.
#[derive(Debug, Clone)]
pub struct ResolvedChannel {
    pub tg_id: i64,
    pub title: String,
}

/// One message from the history stream.
///
/// Serialized wholesale into `posts.raw`; absent fields are skipped so that a
/// later re-fetch with, say, no views counter can never null out a counter
/// that an earlier fetch stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    #[serde(rename = "date", skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwards: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reactions: Option<i64>,
}

impl MessageRecord {
    pub fn raw_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("MessageRecord serializes to JSON")
    }
}

/// Remote channel history, newest first.
#[async_trait]
pub trait BaseHistorySource: Send + Sync {
    /// Resolve a reference (canonical URL or handle) to a stable identity.
    async fn resolve(&self, reference: &str) -> Result<ResolvedChannel, SourceError>;

    /// Lazy newest-first message stream, at most `limit` items. Nothing is
    /// fetched until the stream is polled; dropping it abandons the fetch.
    fn history(
        &self,
        reference: String,
        limit: usize,
    ) -> BoxStream<'_, Result<MessageRecord, SourceError>>;
}

/// Text summarization capability.
#[async_trait]
pub trait BaseSummarizer: Send + Sync {
    async fn summarize(&self, text: &str, model_override: Option<&str>) -> Result<String>;
}
