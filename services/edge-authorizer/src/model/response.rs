//! Canonical response.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;

use super::values::{Headers, MultiValue};

/// Response body produced by a handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    /// Structured value, serialized as JSON on the wire
    Json(Value),
    /// Text; base64 text when the response's encoding marker is set
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl ResponseBody {
    /// Wire bytes of the body.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Json(value) => value.to_string().into_bytes(),
            Self::Text(text) => text.as_bytes().to_vec(),
            Self::Bytes(bytes) => bytes.clone(),
        }
    }
}

/// Protocol-neutral response returned by the handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Response headers, single- or multi-valued
    pub headers: Headers,
    /// Optional body
    pub body: Option<ResponseBody>,
    /// Marks a text body that already holds base64 data
    pub is_base64_encoded: bool,
}

impl CanonicalResponse {
    /// Empty response with the given status.
    #[must_use]
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: Headers::new(),
            body: None,
            is_base64_encoded: false,
        }
    }

    /// Response with a JSON body.
    #[must_use]
    pub fn json(status_code: u16, body: Value) -> Self {
        Self::new(status_code).with_body(ResponseBody::Json(body))
    }

    /// Adds or replaces a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<MultiValue>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a body that is already base64 text.
    #[must_use]
    pub fn with_base64_body(mut self, encoded: impl Into<String>) -> Self {
        self.body = Some(ResponseBody::Text(encoded.into()));
        self.is_base64_encoded = true;
        self
    }

    /// Body as a base64 string, without double-encoding pre-encoded bodies.
    #[must_use]
    pub fn base64_body(&self) -> Option<String> {
        match &self.body {
            None => None,
            Some(ResponseBody::Text(text)) if self.is_base64_encoded => Some(text.clone()),
            Some(body) => Some(STANDARD.encode(body.to_bytes())),
        }
    }

    /// Body as wire text plus whether that text is base64.
    ///
    /// Non-UTF-8 bytes are base64-encoded; everything else goes out as text.
    #[must_use]
    pub fn text_body(&self) -> (String, bool) {
        match &self.body {
            None => (String::new(), false),
            Some(ResponseBody::Json(value)) => (value.to_string(), false),
            Some(ResponseBody::Text(text)) => (text.clone(), self.is_base64_encoded),
            Some(ResponseBody::Bytes(bytes)) => match std::str::from_utf8(bytes) {
                Ok(text) => (text.to_string(), false),
                Err(_) => (STANDARD.encode(bytes), true),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base64_body_round_trip() {
        let response = CanonicalResponse::json(200, json!({"a": 1}));
        let encoded = response.base64_body().unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), br#"{"a":1}"#.to_vec());
    }

    #[test]
    fn test_pre_encoded_body_not_double_encoded() {
        let response = CanonicalResponse::new(200).with_base64_body("aGk=");
        assert_eq!(response.base64_body().as_deref(), Some("aGk="));
        assert_eq!(response.text_body(), ("aGk=".to_string(), true));
    }

    #[test]
    fn test_text_body_for_binary() {
        let response = CanonicalResponse::new(200).with_body(ResponseBody::Bytes(vec![0xff]));
        assert_eq!(response.text_body(), ("/w==".to_string(), true));
    }

    #[test]
    fn test_no_body() {
        let response = CanonicalResponse::new(204);
        assert!(response.base64_body().is_none());
        assert_eq!(response.text_body(), (String::new(), false));
    }
}
