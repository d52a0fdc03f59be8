//! CDN edge-trigger response shape.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::cors::ALLOW_ORIGIN_HEADER;
use crate::model::{CanonicalResponse, MultiValue};

use super::event::CdnHeader;

/// Marker for a base64 body.
pub const BASE64_ENCODING: &str = "base64";

/// Response returned to the CDN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeResponse {
    /// Status code as a string
    pub status: String,
    /// Lower-cased header name to entries
    pub headers: BTreeMap<String, Vec<CdnHeader>>,
    /// Base64 body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// `base64` when a body is present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_encoding: Option<String>,
}

impl EdgeResponse {
    /// Converts a handler response.
    ///
    /// Each header becomes its own list of entries; empty values are dropped.
    #[must_use]
    pub fn from_canonical(response: &CanonicalResponse) -> Self {
        let mut headers: BTreeMap<String, Vec<CdnHeader>> = BTreeMap::new();
        for (name, value) in response.headers.iter() {
            let entries = headers.entry(name.to_ascii_lowercase()).or_default();
            let values = match value {
                MultiValue::Single(v) => vec![v.as_str()],
                MultiValue::Multi(vs) => vs.iter().map(String::as_str).collect(),
            };
            entries.extend(values.into_iter().filter(|v| !v.is_empty()).map(|v| CdnHeader {
                key: Some(name.clone()),
                value: v.to_string(),
            }));
        }

        let mut edge = Self {
            status: response.status_code.to_string(),
            headers,
            body: None,
            body_encoding: None,
        };
        if let Some(body) = response.base64_body().filter(|b| !b.is_empty()) {
            edge = edge.with_base64_body(body);
        }
        edge
    }

    /// JSON response with an allowed-origin header, body base64-encoded.
    #[must_use]
    pub fn json(status: u16, allow_origin: &str, body: &Value) -> Self {
        Self {
            status: status.to_string(),
            headers: BTreeMap::new(),
            body: None,
            body_encoding: None,
        }
        .with_header("Access-Control-Allow-Origin", allow_origin)
        .with_base64_body(STANDARD.encode(body.to_string()))
    }

    /// Appends a header entry.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(CdnHeader {
                key: Some(name.to_string()),
                value: value.to_string(),
            });
        self
    }

    fn with_base64_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self.body_encoding = Some(BASE64_ENCODING.to_string());
        self
    }

    /// Values of a header in order.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|entries| entries.iter().map(|e| e.value.as_str()).collect())
            .unwrap_or_default()
    }

    /// The allowed origin, if set.
    #[must_use]
    pub fn allow_origin(&self) -> Option<&str> {
        self.header_values(ALLOW_ORIGIN_HEADER).first().copied()
    }

    /// Decoded body bytes.
    #[must_use]
    pub fn decoded_body(&self) -> Option<Vec<u8>> {
        self.body.as_ref().and_then(|b| STANDARD.decode(b).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_header_and_body_round_trip() {
        let response = CanonicalResponse::json(200, json!({"a": 1}))
            .with_header("content-type", "application/json");
        let edge = EdgeResponse::from_canonical(&response);

        assert_eq!(edge.status, "200");
        assert_eq!(edge.header_values("content-type"), vec!["application/json"]);
        assert_eq!(edge.body_encoding.as_deref(), Some(BASE64_ENCODING));
        assert_eq!(edge.decoded_body().unwrap(), br#"{"a":1}"#.to_vec());
    }

    #[test]
    fn test_multi_value_keeps_order_and_drops_empty() {
        let response = CanonicalResponse::new(204).with_header(
            "Set-Cookie",
            vec!["a=1".to_string(), String::new(), "b=2".to_string()],
        );
        let edge = EdgeResponse::from_canonical(&response);
        assert_eq!(edge.header_values("set-cookie"), vec!["a=1", "b=2"]);
        assert_eq!(edge.headers["set-cookie"][0].key.as_deref(), Some("Set-Cookie"));
        assert!(edge.body.is_none());
    }

    #[test]
    fn test_empty_single_value_becomes_empty_list() {
        let response = CanonicalResponse::new(200).with_header("x-empty", "");
        let edge = EdgeResponse::from_canonical(&response);
        assert!(edge.headers["x-empty"].is_empty());
    }

    #[test]
    fn test_serializes_wire_shape() {
        let edge = EdgeResponse::json(403, "https://app.example.com", &json!({}));
        let wire = serde_json::to_value(&edge).unwrap();
        assert_eq!(wire["status"], "403");
        assert_eq!(wire["bodyEncoding"], "base64");
        assert_eq!(
            wire["headers"]["access-control-allow-origin"][0]["value"],
            "https://app.example.com"
        );
    }
}
