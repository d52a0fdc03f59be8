//! Canonical request and the caller identity attached to it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::values::{Headers, MultiValue};

/// Name of the catch-all path parameter holding the remainder of the path.
pub const CATCH_ALL_PARAM: &str = "proxy";

/// Route template every adapted request is matched against.
pub const CATCH_ALL_RESOURCE: &str = "/{proxy+}";

/// Identity established for the caller.
///
/// Created per request by the authenticator, attached to the request context
/// and dropped with the request; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResult {
    /// Identifies the caller (the token subject)
    pub principal_id: String,
    /// Free-form context; `jwt` carries the verified token for downstream calls
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
}

impl AuthorizerResult {
    /// Context key holding the verified token.
    pub const JWT_CONTEXT_KEY: &'static str = "jwt";

    /// Identity with an empty context.
    pub fn new(principal_id: impl Into<String>) -> Self {
        Self {
            principal_id: principal_id.into(),
            context: BTreeMap::new(),
        }
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// The verified token, when the authenticator recorded one.
    #[must_use]
    pub fn jwt(&self) -> Option<&str> {
        self.context.get(Self::JWT_CONTEXT_KEY).and_then(Value::as_str)
    }
}

/// Per-request context record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Request id assigned by the delivering platform
    pub request_id: Option<String>,
    /// Deployment stage label
    pub stage: Option<String>,
    /// Caller identity, present once authentication succeeded
    pub authorizer: Option<AuthorizerResult>,
}

/// Request body after decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// Body parsed as JSON
    Json(Value),
    /// UTF-8 body that is not JSON, kept verbatim
    Text(String),
    /// Body that is not UTF-8
    Binary(Vec<u8>),
}

impl RequestBody {
    /// Decodes raw bytes: JSON when it parses, text otherwise.
    ///
    /// Never fails; a body that is not JSON is simply kept as it came.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            return Self::Empty;
        }
        match String::from_utf8(bytes) {
            Ok(text) => serde_json::from_str(&text).map_or(Self::Text(text), Self::Json),
            Err(err) => Self::Binary(err.into_bytes()),
        }
    }

    /// Whether there is no body.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Protocol-neutral request handed to the handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRequest {
    /// HTTP method as received
    pub method: String,
    /// Path with the API prefix removed
    pub path: String,
    /// Route template matched
    pub resource: String,
    /// Query parameters; repeated keys keep every value in order
    pub query_parameters: BTreeMap<String, MultiValue>,
    /// Path parameters, including the catch-all remainder
    pub path_parameters: BTreeMap<String, String>,
    /// Request headers
    pub headers: Headers,
    /// Decoded body
    pub body: RequestBody,
    /// Request context
    pub request_context: RequestContext,
}

impl CanonicalRequest {
    /// Whether this is a CORS pre-flight request.
    #[must_use]
    pub fn is_preflight(&self) -> bool {
        self.method.eq_ignore_ascii_case("OPTIONS")
    }

    /// First value of a header, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_first(name)
    }

    /// Caller identity, if authenticated.
    #[must_use]
    pub const fn authorizer(&self) -> Option<&AuthorizerResult> {
        self.request_context.authorizer.as_ref()
    }

    /// Attaches the caller identity to the request context.
    pub fn attach_authorizer(&mut self, authorizer: AuthorizerResult) {
        self.request_context.authorizer = Some(authorizer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_json_parsed() {
        assert_eq!(
            RequestBody::from_bytes(br#"{"a":1}"#.to_vec()),
            RequestBody::Json(json!({"a": 1}))
        );
    }

    #[test]
    fn test_body_text_kept_verbatim() {
        assert_eq!(
            RequestBody::from_bytes(b"name=value&x".to_vec()),
            RequestBody::Text("name=value&x".to_string())
        );
    }

    #[test]
    fn test_body_binary_and_empty() {
        assert_eq!(RequestBody::from_bytes(vec![]), RequestBody::Empty);
        assert_eq!(
            RequestBody::from_bytes(vec![0xff, 0xfe]),
            RequestBody::Binary(vec![0xff, 0xfe])
        );
    }

    #[test]
    fn test_preflight_detection() {
        let request = CanonicalRequest {
            method: "options".to_string(),
            ..CanonicalRequest::default()
        };
        assert!(request.is_preflight());
    }

    #[test]
    fn test_authorizer_result_serializes_camel_case() {
        let result = AuthorizerResult::new("user-1").with_context("jwt", "abc");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"principalId": "user-1", "context": {"jwt": "abc"}})
        );
        assert_eq!(result.jwt(), Some("abc"));
    }
}
