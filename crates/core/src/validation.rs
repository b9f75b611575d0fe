//! Validation rules for subscription configuration.

use std::collections::BTreeMap;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const MIN_MAX_RETRIES: i32 = 0;
pub const MAX_MAX_RETRIES: i32 = 10;
pub const DEFAULT_MAX_RETRIES: i32 = 3;

pub const MIN_TIMEOUT_SECS: i32 = 5;
pub const MAX_TIMEOUT_SECS: i32 = 300;
pub const DEFAULT_TIMEOUT_SECS: i32 = 30;

pub const DEFAULT_RETRY_ENABLED: bool = true;

/// Maximum length of an endpoint URL.
pub const MAX_URL_LENGTH: usize = 2048;

/// Headers set by the delivery engine that subscribers may not override.
pub const RESERVED_HEADERS: [&str; 5] = [
    "content-type",
    "x-webhook-signature",
    "x-webhook-event-id",
    "x-webhook-event-type",
    "x-webhook-timestamp",
];

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// Validate an endpoint URL: parseable, `http`/`https`, with a host.
pub fn validate_url(url: &str) -> Result<(), CoreError> {
    if url.len() > MAX_URL_LENGTH {
        return Err(CoreError::Validation(format!(
            "url must be at most {MAX_URL_LENGTH} characters"
        )));
    }
    let parsed = url::Url::parse(url)
        .map_err(|e| CoreError::Validation(format!("url is not well-formed: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(CoreError::Validation(format!(
                "url scheme must be http or https, got '{other}'"
            )))
        }
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(CoreError::Validation("url must have a host".to_string()));
    }
    Ok(())
}

/// Trim, reject blanks, and de-duplicate subscribed event types.
///
/// The list must end up non-empty. Order of first occurrence is preserved.
pub fn normalize_events(events: &[String]) -> Result<Vec<String>, CoreError> {
    let mut normalized: Vec<String> = Vec::with_capacity(events.len());
    for (i, event) in events.iter().enumerate() {
        let trimmed = event.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation(format!(
                "events[{i}] must not be blank"
            )));
        }
        if !normalized.iter().any(|e| e == trimmed) {
            normalized.push(trimmed.to_string());
        }
    }
    if normalized.is_empty() {
        return Err(CoreError::Validation(
            "events must contain at least one event type".to_string(),
        ));
    }
    Ok(normalized)
}

/// Validate `max_retries` is within [`MIN_MAX_RETRIES`, `MAX_MAX_RETRIES`].
pub fn validate_max_retries(max_retries: i32) -> Result<(), CoreError> {
    if !(MIN_MAX_RETRIES..=MAX_MAX_RETRIES).contains(&max_retries) {
        return Err(CoreError::Validation(format!(
            "max_retries must be between {MIN_MAX_RETRIES} and {MAX_MAX_RETRIES}, got {max_retries}"
        )));
    }
    Ok(())
}

/// Validate the per-attempt timeout is within [`MIN_TIMEOUT_SECS`, `MAX_TIMEOUT_SECS`].
pub fn validate_timeout_secs(timeout_secs: i32) -> Result<(), CoreError> {
    if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout_secs) {
        return Err(CoreError::Validation(format!(
            "timeout must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS} seconds, got {timeout_secs}"
        )));
    }
    Ok(())
}

pub fn is_reserved_header(name: &str) -> bool {
    RESERVED_HEADERS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Validate subscriber-declared custom headers.
///
/// Names must be RFC 7230 tokens and may not shadow a reserved header.
/// Values must be visible ASCII (plus space and tab).
pub fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), CoreError> {
    for (name, value) in headers {
        if name.is_empty() || !name.bytes().all(is_token_byte) {
            return Err(CoreError::Validation(format!(
                "header name '{name}' is not a valid HTTP header name"
            )));
        }
        if is_reserved_header(name) {
            return Err(CoreError::Validation(format!(
                "header '{name}' is set by the delivery engine and cannot be overridden"
            )));
        }
        if !value
            .bytes()
            .all(|b| b == b'\t' || (0x20..0x7f).contains(&b))
        {
            return Err(CoreError::Validation(format!(
                "header '{name}' has an invalid value"
            )));
        }
    }
    Ok(())
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn url_accepts_http_and_https() {
        assert!(validate_url("https://hooks.example.com/in").is_ok());
        assert!(validate_url("http://127.0.0.1:8080/hook").is_ok());
    }

    #[test]
    fn url_rejects_malformed_and_other_schemes() {
        assert_matches!(validate_url("not a url"), Err(CoreError::Validation(_)));
        assert_matches!(validate_url("ftp://example.com"), Err(CoreError::Validation(_)));
        assert_matches!(validate_url(""), Err(CoreError::Validation(_)));
    }

    #[test]
    fn url_rejects_overlong() {
        let url = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert_matches!(validate_url(&url), Err(CoreError::Validation(_)));
    }

    #[test]
    fn events_must_be_non_empty() {
        assert_matches!(normalize_events(&[]), Err(CoreError::Validation(_)));
    }

    #[test]
    fn events_reject_blank_entries() {
        let events = vec!["invoice.paid".to_string(), "  ".to_string()];
        assert_matches!(normalize_events(&events), Err(CoreError::Validation(_)));
    }

    #[test]
    fn events_are_trimmed_and_deduplicated() {
        let events = vec![
            " invoice.paid".to_string(),
            "user.created".to_string(),
            "invoice.paid ".to_string(),
        ];
        assert_eq!(
            normalize_events(&events).unwrap(),
            vec!["invoice.paid".to_string(), "user.created".to_string()]
        );
    }

    #[test]
    fn max_retries_bounds() {
        assert!(validate_max_retries(0).is_ok());
        assert!(validate_max_retries(10).is_ok());
        assert!(validate_max_retries(-1).is_err());
        assert!(validate_max_retries(11).is_err());
    }

    #[test]
    fn timeout_bounds() {
        assert!(validate_timeout_secs(5).is_ok());
        assert!(validate_timeout_secs(300).is_ok());
        assert!(validate_timeout_secs(4).is_err());
        assert!(validate_timeout_secs(301).is_err());
    }

    #[test]
    fn headers_reject_reserved_names_case_insensitively() {
        let headers = BTreeMap::from([("X-Webhook-Signature".to_string(), "x".to_string())]);
        assert_matches!(validate_headers(&headers), Err(CoreError::Validation(_)));
    }

    #[test]
    fn headers_reject_invalid_names_and_values() {
        let bad_name = BTreeMap::from([("bad header".to_string(), "x".to_string())]);
        assert!(validate_headers(&bad_name).is_err());

        let bad_value = BTreeMap::from([("X-Token".to_string(), "a\r\nb".to_string())]);
        assert!(validate_headers(&bad_value).is_err());
    }

    #[test]
    fn headers_accept_custom_values() {
        let headers = BTreeMap::from([
            ("Authorization".to_string(), "Bearer abc".to_string()),
            ("X-Tenant".to_string(), "acme".to_string()),
        ]);
        assert!(validate_headers(&headers).is_ok());
    }
}
