//! Outbound request headers.

use std::collections::BTreeMap;

use hookline_core::validation::is_reserved_header;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};

use crate::envelope::EventEnvelope;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const EVENT_ID_HEADER: &str = "x-webhook-event-id";
pub const EVENT_TYPE_HEADER: &str = "x-webhook-event-type";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

/// Build the headers for one attempt.
///
/// Subscriber headers go in first and reserved names among them are
/// dropped; the engine's own headers are then inserted over the top.
pub fn build_headers(
    custom: &BTreeMap<String, String>,
    signature: &str,
    envelope: &EventEnvelope,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in custom {
        if is_reserved_header(name) {
            tracing::warn!(header = %name, "Ignoring custom header that shadows a reserved header");
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Ignoring invalid custom header"),
        }
    }

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    insert_reserved(&mut headers, SIGNATURE_HEADER, signature);
    insert_reserved(&mut headers, EVENT_ID_HEADER, &envelope.id);
    insert_reserved(&mut headers, EVENT_TYPE_HEADER, &envelope.event_type);
    insert_reserved(&mut headers, TIMESTAMP_HEADER, &envelope.timestamp);
    headers
}

fn insert_reserved(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(_) => tracing::warn!(header = name, "Reserved header value is not valid ASCII"),
    }
}
