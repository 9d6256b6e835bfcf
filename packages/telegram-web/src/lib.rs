//! Client for Telegram's public channel web preview.
//!
//! Public channels render their recent history at `https://t.me/s/<handle>`,
//! paginated backwards with a `?before=<message_id>` query parameter. This
//! crate fetches and parses those pages. No credentials are involved; private
//! channels and bogus handles surface as [`TelegramWebError::NotAvailable`].

mod parse;

pub use parse::parse_human_count;

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://t.me";
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum TelegramWebError {
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },
    #[error("channel not available: {0}")]
    NotAvailable(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected preview page: {0}")]
    Parse(String),
}

/// Channel metadata scraped from the preview header.
#[derive(Debug, Clone)]
pub struct ChannelPreview {
    pub handle: String,
    pub title: String,
}

/// One message as rendered on the preview page.
#[derive(Debug, Clone)]
pub struct PreviewMessage {
    pub id: i64,
    pub posted_at: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub views: Option<i64>,
}

/// Extract a bare channel handle from user input.
///
/// Accepts `@handle`, a bare handle, or a `t.me` / `telegram.me` URL with or
/// without scheme. Returns `None` when no syntactically valid handle
/// (`[A-Za-z0-9_]{3,64}`) can be found.
pub fn extract_handle(reference: &str) -> Option<String> {
    let trimmed = reference.trim();
    let candidate = if let Some(stripped) = trimmed.strip_prefix('@') {
        stripped.trim_matches('/')
    } else {
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
        match without_www
            .strip_prefix("t.me/")
            .or_else(|| without_www.strip_prefix("telegram.me/"))
        {
            Some(rest) => {
                // Skip the /s/ embed prefix so preview URLs work too.
                let rest = rest.strip_prefix("s/").unwrap_or(rest);
                rest.split(['/', '?']).next().unwrap_or("")
            }
            None => trimmed,
        }
    };
    if is_valid_handle(candidate) {
        Some(candidate.to_string())
    } else {
        None
    }
}

fn is_valid_handle(candidate: &str) -> bool {
    (3..=64).contains(&candidate.len())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Canonical channel URL for a handle.
pub fn canonical_url(handle: &str) -> String {
    format!("https://t.me/{handle}")
}

#[derive(Debug, Clone)]
pub struct TelegramWebClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramWebClient {
    pub fn new(proxy_url: Option<&str>) -> Result<Self, TelegramWebError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT);
        if let Some(proxy) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different host. Used by tests against a local
    /// stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn channel_preview(&self, handle: &str) -> Result<ChannelPreview, TelegramWebError> {
        let page = self.fetch_page(handle, None).await?;
        Ok(ChannelPreview {
            handle: handle.to_string(),
            title: page.title,
        })
    }

    /// One page of history, in the ascending (oldest first) order the page
    /// renders. Pass the smallest message id seen so far as `before` to page
    /// further back.
    pub async fn messages_page(
        &self,
        handle: &str,
        before: Option<i64>,
    ) -> Result<Vec<PreviewMessage>, TelegramWebError> {
        Ok(self.fetch_page(handle, before).await?.messages)
    }

    async fn fetch_page(
        &self,
        handle: &str,
        before: Option<i64>,
    ) -> Result<parse::PreviewPage, TelegramWebError> {
        let mut url = format!("{}/s/{}", self.base_url, handle);
        if let Some(id) = before {
            url.push_str(&format!("?before={id}"));
        }
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok())
                .unwrap_or(30);
            return Err(TelegramWebError::RateLimited { retry_after });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TelegramWebError::NotAvailable(format!(
                "no such channel: {handle}"
            )));
        }
        if !status.is_success() {
            return Err(TelegramWebError::Parse(format!("HTTP {status} for {url}")));
        }
        let body = response.text().await?;
        parse::parse_preview_page(&body, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_handle_from_all_reference_shapes() {
        for reference in [
            "durov",
            "@durov",
            "  @durov/ ",
            "t.me/durov",
            "t.me/s/durov",
            "www.t.me/durov",
            "https://t.me/durov",
            "https://t.me/durov?before=100",
            "http://telegram.me/durov/123",
        ] {
            assert_eq!(
                extract_handle(reference).as_deref(),
                Some("durov"),
                "failed for {reference:?}"
            );
        }
    }

    #[test]
    fn rejects_invalid_handles() {
        for reference in ["", "ab", "@ab", "has space", "dot.ted", "https://example.com/foo"] {
            assert_eq!(extract_handle(reference), None, "accepted {reference:?}");
        }
        let too_long = "a".repeat(65);
        assert_eq!(extract_handle(&too_long), None);
    }

    #[test]
    fn canonical_url_uses_t_me() {
        assert_eq!(canonical_url("durov"), "https://t.me/durov");
    }
}
