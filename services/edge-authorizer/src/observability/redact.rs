//! Redaction of request payloads before they reach the log sink.
//!
//! Credentials and secrets are replaced with placeholders, HTML documents are
//! collapsed, JWT signatures are cut off, and oversized payloads are replaced
//! by a bounded summary.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};

/// Serialized payloads at or above this many characters are summarized.
pub const MAX_LOG_PAYLOAD_CHARS: usize = 131_072;

/// Characters of the original payload kept in a summary.
pub const TRUNCATED_PAYLOAD_CHARS: usize = 40_000;

const AUTHORIZATION_PLACEHOLDER: &str = "{AUTHORIZATION}";
const SECRET_PLACEHOLDER: &str = "{SECRET}";
const HTML_PLACEHOLDER: &str = "<HTML DOCUMENT></HTML>";
const SIGNATURE_PLACEHOLDER: &str = "<sig>";

#[allow(clippy::expect_used)]
static JWT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(eyJ[a-z0-9_-]{5,}\.eyJ[a-z0-9_-]{5,})\.[a-z0-9_-]*")
        .expect("JWT pattern is a valid regex")
});

/// Returns a copy of `value` with credentials, secrets and HTML replaced.
#[must_use]
pub fn redact(value: &Value) -> Value {
    redact_entry(None, value)
}

fn redact_entry(key: Option<&str>, value: &Value) -> Value {
    if let Some(key) = key {
        if is_authorization_key(key) {
            return Value::String(AUTHORIZATION_PLACEHOLDER.to_string());
        }
        if is_secret_key(key) && is_truthy(value) {
            return Value::String(SECRET_PLACEHOLDER.to_string());
        }
    }

    match value {
        Value::String(text) if starts_with_ignore_case(text, "bearer") => {
            Value::String(AUTHORIZATION_PLACEHOLDER.to_string())
        }
        Value::String(text) if starts_with_ignore_case(text, "<!doctype html>") => {
            Value::String(HTML_PLACEHOLDER.to_string())
        }
        Value::Array(items) => Value::Array(items.iter().map(|item| redact_entry(None, item)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_entry(Some(k), v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

/// Keys naming the credential, but not `authorizationResult`-like derivatives.
fn is_authorization_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.match_indices("authorization").any(|(at, found)| {
        let rest = &lower[at + found.len()..];
        !rest.starts_with("result") && !rest.starts_with('s')
    })
}

fn is_secret_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.contains("secret") || lower.contains("signature")
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Replaces the signature segment of JWT-looking substrings with `<sig>`.
#[must_use]
pub fn truncate_token_signatures(text: &str) -> Cow<'_, str> {
    JWT_PATTERN.replace_all(text, format!("${{1}}.{SIGNATURE_PLACEHOLDER}").as_str())
}

/// Redacted, signature-truncated JSON text of `value`, bounded in size.
#[must_use]
pub fn redact_to_string(value: &Value) -> String {
    let redacted = redact(value);
    let text = truncate_token_signatures(&redacted.to_string()).into_owned();

    if text.chars().count() < MAX_LOG_PAYLOAD_CHARS {
        return text;
    }

    let fields: Vec<&String> = redacted
        .as_object()
        .map(|map| map.keys().collect())
        .unwrap_or_default();
    let truncated: String = text.chars().take(TRUNCATED_PAYLOAD_CHARS).collect();
    json!({
        "title": "Payload too large",
        "fields": fields,
        "truncatedPayload": truncated,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_keys_redacted() {
        let redacted = redact(&json!({
            "headers": {"Authorization": "Bearer abc", "x-authorization-id": "1"},
            "authorizationResult": "kept",
            "authorizations": ["kept"],
        }));
        assert_eq!(redacted["headers"]["Authorization"], AUTHORIZATION_PLACEHOLDER);
        assert_eq!(redacted["headers"]["x-authorization-id"], AUTHORIZATION_PLACEHOLDER);
        assert_eq!(redacted["authorizationResult"], "kept");
        assert_eq!(redacted["authorizations"][0], "kept");
    }

    #[test]
    fn test_bearer_values_redacted_under_any_key() {
        let redacted = redact(&json!({"note": "BEARER xyz"}));
        assert_eq!(redacted["note"], AUTHORIZATION_PLACEHOLDER);
    }

    #[test]
    fn test_secret_keys_redacted_only_when_set() {
        let redacted = redact(&json!({"clientSecret": "s3", "signature": "", "x": 1}));
        assert_eq!(redacted["clientSecret"], SECRET_PLACEHOLDER);
        assert_eq!(redacted["signature"], "");
        assert_eq!(redacted["x"], 1);
    }

    #[test]
    fn test_html_collapsed() {
        let redacted = redact(&json!({"body": "<!DOCTYPE html><html></html>"}));
        assert_eq!(redacted["body"], HTML_PLACEHOLDER);
    }

    #[test]
    fn test_jwt_signature_truncated() {
        let text = "token eyJhbGciOi.eyJzdWIiOi.c2lnbmF0dXJl end";
        assert_eq!(
            truncate_token_signatures(text),
            "token eyJhbGciOi.eyJzdWIiOi.<sig> end"
        );
    }

    #[test]
    fn test_short_segments_untouched() {
        assert_eq!(truncate_token_signatures("eyJa.eyJb.sig"), "eyJa.eyJb.sig");
    }

    #[test]
    fn test_oversized_payload_summarized() {
        let big = "x".repeat(MAX_LOG_PAYLOAD_CHARS);
        let summary: Value = serde_json::from_str(&redact_to_string(&json!({"data": big}))).unwrap();
        assert_eq!(summary["title"], "Payload too large");
        assert_eq!(summary["fields"], json!(["data"]));
        assert_eq!(
            summary["truncatedPayload"].as_str().unwrap().chars().count(),
            TRUNCATED_PAYLOAD_CHARS
        );
    }
}
