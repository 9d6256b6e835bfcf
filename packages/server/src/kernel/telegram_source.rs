//! `BaseHistorySource` backed by Telegram's public channel web preview.
//!
//! Pages through `t.me/s/<handle>` lazily: each poll of the stream pulls at
//! most one more page, so a caller that stops early (refresh window hit,
//! rate limit budget spent) never pays for the rest of the history.

use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use sha2::{Digest, Sha256};
use telegram_web::{extract_handle, PreviewMessage, TelegramWebClient, TelegramWebError};

use super::traits::{BaseHistorySource, MessageRecord, ResolvedChannel, SourceError};

pub struct TelegramWebSource {
    client: TelegramWebClient,
}

impl TelegramWebSource {
    pub fn new(proxy_url: Option<&str>) -> anyhow::Result<Self> {
        let client = TelegramWebClient::new(proxy_url).map_err(anyhow::Error::new)?;
        Ok(Self { client })
    }

    pub fn with_client(client: TelegramWebClient) -> Self {
        Self { client }
    }
}

/// The preview page never exposes Telegram's internal channel id, so derive a
/// stable one from the lowercased handle instead.
fn stable_channel_id(handle: &str) -> i64 {
    let digest = Sha256::digest(handle.to_ascii_lowercase().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes) & i64::MAX
}

fn handle_for(reference: &str) -> Result<String, SourceError> {
    extract_handle(reference)
        .ok_or_else(|| SourceError::Other(anyhow!("no usable handle in reference: {reference}")))
}

fn map_source_error(err: TelegramWebError) -> SourceError {
    match err {
        TelegramWebError::RateLimited { retry_after } => SourceError::RateLimited {
            retry_after_secs: retry_after,
        },
        TelegramWebError::NotAvailable(reason) => SourceError::AccessDenied(reason),
        other => SourceError::Other(anyhow::Error::new(other)),
    }
}

fn to_record(message: PreviewMessage) -> MessageRecord {
    MessageRecord {
        id: message.id,
        posted_at: message.posted_at,
        text: message.text,
        views: message.views,
        forwards: None,
        replies: None,
        reactions: None,
    }
}

struct PageCursor {
    before: Option<i64>,
    fetched: usize,
}

#[async_trait]
impl BaseHistorySource for TelegramWebSource {
    async fn resolve(&self, reference: &str) -> Result<ResolvedChannel, SourceError> {
        let handle = handle_for(reference)?;
        let preview = self
            .client
            .channel_preview(&handle)
            .await
            .map_err(map_source_error)?;
        Ok(ResolvedChannel {
            tg_id: stable_channel_id(&handle),
            title: preview.title,
        })
    }

    fn history(
        &self,
        reference: String,
        limit: usize,
    ) -> BoxStream<'_, Result<MessageRecord, SourceError>> {
        let handle = match handle_for(&reference) {
            Ok(handle) => handle,
            Err(err) => return stream::once(async move { Err(err) }).boxed(),
        };
        let client = &self.client;
        let pages = stream::try_unfold(
            PageCursor {
                before: None,
                fetched: 0,
            },
            move |cursor| {
                let handle = handle.clone();
                async move {
                    if cursor.fetched >= limit {
                        return Ok::<_, SourceError>(None);
                    }
                    let mut page = client
                        .messages_page(&handle, cursor.before)
                        .await
                        .map_err(map_source_error)?;
                    if page.is_empty() {
                        return Ok(None);
                    }
                    // The page renders oldest first; emit newest first.
                    page.reverse();
                    let next = PageCursor {
                        before: page.last().map(|m| m.id),
                        fetched: cursor.fetched + page.len(),
                    };
                    Ok(Some((page, next)))
                }
            },
        );
        pages
            .map_ok(|page| stream::iter(page.into_iter().map(|m| Ok(to_record(m)))))
            .try_flatten()
            .take(limit)
            .boxed()
    }
}
