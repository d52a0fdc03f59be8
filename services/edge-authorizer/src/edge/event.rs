//! CDN edge-trigger event shape.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Event delivered by the CDN for one viewer or origin request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnEvent {
    /// Records; a request event carries exactly one
    #[serde(rename = "Records", default, deserialize_with = "null_as_empty")]
    pub records: Vec<CdnRecord>,
}

/// `"Records": null` means no records, same as an absent field.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<CdnRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<CdnRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One record of a [`CdnEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnRecord {
    /// CDN sub-structure; absent when the trigger source is misconfigured
    #[serde(default)]
    pub cf: Option<CdnPayload>,
}

/// The CDN sub-structure of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnPayload {
    /// Distribution metadata
    #[serde(default)]
    pub config: Option<CdnConfig>,
    /// The viewer request
    #[serde(default)]
    pub request: Option<CdnRequest>,
}

/// Distribution metadata of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdnConfig {
    /// Request id assigned by the CDN
    #[serde(default)]
    pub request_id: Option<String>,
    /// Distribution id
    #[serde(default)]
    pub distribution_id: Option<String>,
    /// Event type (`viewer-request`, `origin-request`, ...)
    #[serde(default)]
    pub event_type: Option<String>,
}

/// A header entry; the CDN sends every header as a list of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnHeader {
    /// Header name in its original casing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Header value
    pub value: String,
}

/// Request body as delivered by the CDN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdnBody {
    /// Body data, base64 unless `encoding` says `text`
    #[serde(default)]
    pub data: Option<String>,
    /// `base64` or `text`
    #[serde(default)]
    pub encoding: Option<String>,
    /// Whether the CDN truncated the body
    #[serde(default)]
    pub input_truncated: bool,
}

impl CdnBody {
    /// Raw body bytes.
    ///
    /// Data that is not valid base64 is kept verbatim.
    #[must_use]
    pub fn decode(&self) -> Vec<u8> {
        let Some(data) = self.data.as_deref().filter(|d| !d.is_empty()) else {
            return Vec::new();
        };
        if self.encoding.as_deref() == Some("text") {
            return data.as_bytes().to_vec();
        }
        STANDARD.decode(data).unwrap_or_else(|err| {
            warn!(error = %err, "Request body is not base64, keeping it as text");
            data.as_bytes().to_vec()
        })
    }
}

/// The request embedded in a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdnRequest {
    /// HTTP method
    pub method: String,
    /// Path, including the API prefix
    pub uri: String,
    /// Raw query string without the leading `?`
    #[serde(default)]
    pub querystring: String,
    /// Lower-cased header name to entries
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<CdnHeader>>,
    /// Optional body
    #[serde(default)]
    pub body: Option<CdnBody>,
    /// Viewer address
    #[serde(default)]
    pub client_ip: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_viewer_request() {
        let event: CdnEvent = serde_json::from_value(json!({
            "Records": [{
                "cf": {
                    "config": {"distributionId": "E1", "requestId": "req-1", "eventType": "viewer-request"},
                    "request": {
                        "clientIp": "203.0.113.1",
                        "method": "GET",
                        "uri": "/api/items",
                        "querystring": "a=1",
                        "headers": {"host": [{"key": "Host", "value": "example.com"}]}
                    }
                }
            }]
        }))
        .unwrap();

        let cf = event.records[0].cf.as_ref().unwrap();
        assert_eq!(cf.config.as_ref().unwrap().request_id.as_deref(), Some("req-1"));
        let request = cf.request.as_ref().unwrap();
        assert_eq!(request.headers["host"][0].value, "example.com");
        assert!(request.body.is_none());
    }

    #[test]
    fn test_missing_records_defaults_to_empty() {
        let event: CdnEvent = serde_json::from_value(json!({})).unwrap();
        assert!(event.records.is_empty());
    }

    #[test]
    fn test_null_records_defaults_to_empty() {
        let event: CdnEvent = serde_json::from_value(json!({"Records": null})).unwrap();
        assert!(event.records.is_empty());
        assert!(serde_json::from_value::<CdnEvent>(json!({"Records": "x"})).is_err());
    }

    #[test]
    fn test_body_decoding() {
        let base64 = CdnBody {
            data: Some("eyJhIjoxfQ==".to_string()),
            ..CdnBody::default()
        };
        assert_eq!(base64.decode(), br#"{"a":1}"#.to_vec());

        let text = CdnBody {
            data: Some("plain".to_string()),
            encoding: Some("text".to_string()),
            ..CdnBody::default()
        };
        assert_eq!(text.decode(), b"plain".to_vec());

        let invalid = CdnBody {
            data: Some("not base64!".to_string()),
            ..CdnBody::default()
        };
        assert_eq!(invalid.decode(), b"not base64!".to_vec());
    }
}
