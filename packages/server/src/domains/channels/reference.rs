//! Channel reference normalization.

use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid channel reference: {0}")]
pub struct InvalidReference(pub String);

/// Normalize user input to the canonical `https://t.me/<handle>` form.
///
/// Accepted shapes: `@handle`, bare handle, `t.me/...` and `telegram.me/...`
/// with or without scheme or `www.`. URLs pointing anywhere else are
/// rejected rather than mangled into a handle.
pub fn normalize_reference(raw: &str) -> Result<String, InvalidReference> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidReference("reference is empty".to_string()));
    }
    if trimmed.contains("://") && !is_telegram_url(trimmed) {
        return Err(InvalidReference(format!("unsupported URL: {trimmed}")));
    }
    match telegram_web::extract_handle(trimmed) {
        Some(handle) => Ok(telegram_web::canonical_url(&handle)),
        None => Err(InvalidReference(format!(
            "expected @handle or https://t.me/<handle>, got: {trimmed}"
        ))),
    }
}

fn is_telegram_url(reference: &str) -> bool {
    let rest = reference
        .strip_prefix("https://")
        .or_else(|| reference.strip_prefix("http://"))
        .unwrap_or(reference);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    rest.starts_with("t.me/") || rest.starts_with("telegram.me/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_shapes_normalize_to_the_same_url() {
        for reference in [
            "durov",
            "@durov",
            "t.me/durov",
            "www.t.me/durov",
            "https://t.me/durov",
            "http://t.me/durov",
            "https://telegram.me/durov",
            "https://t.me/s/durov",
            "  @durov  ",
        ] {
            assert_eq!(
                normalize_reference(reference).unwrap(),
                "https://t.me/durov",
                "failed for {reference:?}"
            );
        }
    }

    #[test]
    fn invalid_references_are_rejected() {
        for reference in [
            "",
            "   ",
            "@ab",
            "bad handle",
            "https://example.com/durov",
            "ftp://t.me/durov",
        ] {
            assert!(
                normalize_reference(reference).is_err(),
                "accepted {reference:?}"
            );
        }
    }
}
