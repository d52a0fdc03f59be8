//! API gateway proxy event and response shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Event type marking a request-authorizer invocation.
pub const AUTHORIZER_EVENT_TYPE: &str = "REQUEST";

/// Proxy or request-authorizer event from the API gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEvent {
    /// `REQUEST` for authorizer invocations
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    /// ARN of the method being authorized
    #[serde(default)]
    pub method_arn: Option<String>,
    /// HTTP method
    #[serde(default)]
    pub http_method: String,
    /// Request path
    #[serde(default)]
    pub path: String,
    /// Matched route template
    #[serde(default)]
    pub resource: Option<String>,
    /// Last value of each header
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    /// Every value of each header
    #[serde(default)]
    pub multi_value_headers: Option<BTreeMap<String, Vec<String>>>,
    /// Last value of each query parameter
    #[serde(default)]
    pub query_string_parameters: Option<BTreeMap<String, String>>,
    /// Every value of each query parameter
    #[serde(default)]
    pub multi_value_query_string_parameters: Option<BTreeMap<String, Vec<String>>>,
    /// Path parameters
    #[serde(default)]
    pub path_parameters: Option<BTreeMap<String, String>>,
    /// Body, base64 when `is_base64_encoded`
    #[serde(default)]
    pub body: Option<String>,
    /// Whether `body` is base64
    #[serde(default)]
    pub is_base64_encoded: bool,
    /// Platform request context
    #[serde(default)]
    pub request_context: Option<GatewayRequestContext>,
}

impl GatewayEvent {
    /// Whether this is a request-authorizer invocation.
    #[must_use]
    pub fn is_authorizer(&self) -> bool {
        self.event_type.as_deref() == Some(AUTHORIZER_EVENT_TYPE)
    }
}

/// Request context populated by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequestContext {
    /// Gateway request id
    #[serde(default)]
    pub request_id: Option<String>,
    /// Deployment stage
    #[serde(default)]
    pub stage: Option<String>,
    /// Authorizer output: `principalId` plus the flattened context
    #[serde(default)]
    pub authorizer: Option<Map<String, Value>>,
}

/// Proxy response returned to the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Single-valued headers
    pub headers: BTreeMap<String, String>,
    /// Multi-valued headers
    pub multi_value_headers: BTreeMap<String, Vec<String>>,
    /// Body text, base64 when `is_base64_encoded`
    pub body: String,
    /// Whether `body` is base64
    pub is_base64_encoded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_maps_accepted() {
        let event: GatewayEvent = serde_json::from_value(json!({
            "httpMethod": "GET",
            "path": "/",
            "headers": null,
            "multiValueHeaders": null,
            "queryStringParameters": null,
            "body": null,
            "isBase64Encoded": false,
            "requestContext": {"requestId": "r1", "stage": "live"}
        }))
        .unwrap();
        assert!(event.headers.is_none());
        assert!(!event.is_authorizer());
        assert_eq!(event.request_context.unwrap().stage.as_deref(), Some("live"));
    }

    #[test]
    fn test_authorizer_type() {
        let event: GatewayEvent =
            serde_json::from_value(json!({"type": "REQUEST", "methodArn": "arn"})).unwrap();
        assert!(event.is_authorizer());
    }
}
