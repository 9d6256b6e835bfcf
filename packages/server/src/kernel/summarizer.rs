//! Summarization over a simple HTTP endpoint.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;

use super::traits::BaseSummarizer;

const MAX_SUMMARY_TOKENS: u32 = 256;
const SUMMARY_LANG: &str = "ru";

pub struct HttpSummarizer {
    http: reqwest::Client,
    endpoint: Option<String>,
    model_id: Option<String>,
}

impl HttpSummarizer {
    pub fn new(endpoint: Option<String>, model_id: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            endpoint,
            model_id,
        })
    }
}

#[async_trait]
impl BaseSummarizer for HttpSummarizer {
    async fn summarize(&self, text: &str, model_override: Option<&str>) -> Result<String> {
        if text.is_empty() {
            return Ok(String::new());
        }
        let model = model_override
            .map(str::to_string)
            .or_else(|| self.model_id.clone())
            .unwrap_or_default();
        let endpoint = match self.endpoint.as_deref() {
            Some(endpoint) if !model.is_empty() => endpoint,
            // No provider configured: degrade to a bounded truncation.
            _ => return Ok(truncate(text)),
        };

        let payload = json!({
            "model": model,
            "max_tokens": MAX_SUMMARY_TOKENS,
            "lang": SUMMARY_LANG,
            "input": text,
        });
        let response = self
            .http
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .context("Summarization request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("summarization provider error: {status} {body}");
        }
        let data: serde_json::Value = response
            .json()
            .await
            .context("Invalid summarization response")?;
        Ok(data
            .get("summary")
            .or_else(|| data.get("output"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_SUMMARY_TOKENS as usize * 4).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_summarizer_truncates() {
        let summarizer = HttpSummarizer::new(None, None).unwrap();
        let long = "x".repeat(5000);
        let summary = summarizer.summarize(&long, None).await.unwrap();
        assert_eq!(summary.len(), MAX_SUMMARY_TOKENS as usize * 4);

        assert_eq!(summarizer.summarize("", None).await.unwrap(), "");
    }
}
