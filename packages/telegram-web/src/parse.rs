//! HTML parsing for the `t.me/s/<handle>` preview page.
//!
//! Parsing is fully synchronous: callers hand over the page body as a string
//! and get owned data back, so the non-`Send` DOM types never cross an await
//! point.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

use crate::{PreviewMessage, TelegramWebError};

#[derive(Debug)]
pub(crate) struct PreviewPage {
    pub title: String,
    pub messages: Vec<PreviewMessage>,
}

fn selector(css: &str) -> Result<Selector, TelegramWebError> {
    Selector::parse(css).map_err(|e| TelegramWebError::Parse(format!("bad selector {css}: {e}")))
}

pub(crate) fn parse_preview_page(
    html: &str,
    handle: &str,
) -> Result<PreviewPage, TelegramWebError> {
    let document = Html::parse_document(html);

    // Private and non-existent channels render a landing page without the
    // history section.
    let history = selector("section.tgme_channel_history")?;
    if document.select(&history).next().is_none() {
        return Err(TelegramWebError::NotAvailable(format!(
            "channel {handle} is private or does not exist"
        )));
    }

    let title_selector = selector("div.tgme_channel_info_header_title")?;
    let title = document
        .select(&title_selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| handle.to_string());

    let message_selector = selector("div.tgme_widget_message")?;
    let text_selector = selector("div.tgme_widget_message_text")?;
    let views_selector = selector("span.tgme_widget_message_views")?;
    let time_selector = selector("a.tgme_widget_message_date time")?;

    let mut messages = Vec::new();
    for element in document.select(&message_selector) {
        // data-post is "<handle>/<message_id>".
        let Some(id) = element
            .value()
            .attr("data-post")
            .and_then(|post| post.rsplit('/').next())
            .and_then(|raw| raw.parse::<i64>().ok())
        else {
            continue;
        };
        let text = element
            .select(&text_selector)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty());
        let views = element
            .select(&views_selector)
            .next()
            .and_then(|el| parse_human_count(&element_text(el)));
        let posted_at = element
            .select(&time_selector)
            .next()
            .and_then(|el| el.value().attr("datetime"))
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc));
        messages.push(PreviewMessage {
            id,
            posted_at,
            text,
            views,
        });
    }
    Ok(PreviewPage { title, messages })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parse Telegram's abbreviated counters: `"456"`, `"1.2K"`, `"3.4M"`.
pub fn parse_human_count(raw: &str) -> Option<i64> {
    let cleaned = raw.trim().replace([',', '\u{a0}', ' '], "");
    if cleaned.is_empty() {
        return None;
    }
    let (digits, multiplier) = match cleaned.chars().last()? {
        'K' | 'k' => (&cleaned[..cleaned.len() - 1], 1_000_f64),
        'M' | 'm' => (&cleaned[..cleaned.len() - 1], 1_000_000_f64),
        'B' | 'b' => (&cleaned[..cleaned.len() - 1], 1_000_000_000_f64),
        _ => (cleaned.as_str(), 1_f64),
    };
    let value: f64 = digits.parse().ok()?;
    Some((value * multiplier).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
<div class="tgme_channel_info_header_title"><span>News Channel</span></div>
<section class="tgme_channel_history js-message_history">
  <div class="tgme_widget_message_wrap">
    <div class="tgme_widget_message" data-post="newschannel/101">
      <div class="tgme_widget_message_text js-message_text">First post text</div>
      <span class="tgme_widget_message_views">987</span>
      <a class="tgme_widget_message_date" href="https://t.me/newschannel/101">
        <time datetime="2025-03-01T10:00:00+00:00">10:00</time>
      </a>
    </div>
  </div>
  <div class="tgme_widget_message_wrap">
    <div class="tgme_widget_message" data-post="newschannel/102">
      <div class="tgme_widget_message_text js-message_text">Second post</div>
      <span class="tgme_widget_message_views">1.2K</span>
      <a class="tgme_widget_message_date" href="https://t.me/newschannel/102">
        <time datetime="2025-03-01T12:30:00+00:00">12:30</time>
      </a>
    </div>
  </div>
  <div class="tgme_widget_message_wrap">
    <div class="tgme_widget_message" data-post="newschannel/103">
      <a class="tgme_widget_message_date" href="https://t.me/newschannel/103">
        <time datetime="2025-03-01T13:00:00+00:00">13:00</time>
      </a>
    </div>
  </div>
</section>
</body></html>
"#;

    #[test]
    fn parses_messages_in_page_order() {
        let page = parse_preview_page(PAGE, "newschannel").unwrap();
        assert_eq!(page.title, "News Channel");
        let ids: Vec<i64> = page.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![101, 102, 103]);

        let first = &page.messages[0];
        assert_eq!(first.text.as_deref(), Some("First post text"));
        assert_eq!(first.views, Some(987));
        assert_eq!(
            first.posted_at.map(|dt| dt.to_rfc3339()),
            Some("2025-03-01T10:00:00+00:00".to_string())
        );

        assert_eq!(page.messages[1].views, Some(1200));

        // Media-only message: no text node, no views counter.
        let third = &page.messages[2];
        assert_eq!(third.text, None);
        assert_eq!(third.views, None);
        assert!(third.posted_at.is_some());
    }

    #[test]
    fn private_channel_page_is_not_available() {
        let landing = r#"<html><body><div class="tgme_page">Preview is unavailable</div></body></html>"#;
        let err = parse_preview_page(landing, "secretchannel").unwrap_err();
        assert!(matches!(err, TelegramWebError::NotAvailable(_)));
    }

    #[test]
    fn human_counts() {
        assert_eq!(parse_human_count("456"), Some(456));
        assert_eq!(parse_human_count(" 1.2K "), Some(1200));
        assert_eq!(parse_human_count("3.4M"), Some(3_400_000));
        assert_eq!(parse_human_count("2,345"), Some(2345));
        assert_eq!(parse_human_count(""), None);
        assert_eq!(parse_human_count("n/a"), None);
    }
}
