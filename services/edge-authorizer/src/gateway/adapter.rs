//! API gateway adapter: proxy requests and request-authorizer checks.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::FutureExt;
use serde_json::{Value, json};
use tracing::{Instrument, error, info_span};

use crate::cors::{ALLOW_ORIGIN_HEADER, allowed_origin};
use crate::edge::adapter::DEFAULT_DIAGNOSTIC_MARGIN;
use crate::error::{ErrorCode, HandlerError};
use crate::handler::{InvocationContext, RequestHandler};
use crate::model::{
    AuthorizerResult, CanonicalRequest, CanonicalResponse, Headers, MultiValue, RequestBody,
    RequestContext,
};
use crate::observability::DiagnosticTimer;

use super::event::{GatewayEvent, GatewayResponse};

/// Adapts API gateway events to a [`RequestHandler`].
pub struct GatewayRequestAdapter {
    handler: Arc<dyn RequestHandler>,
    diagnostic_margin: Duration,
}

impl GatewayRequestAdapter {
    /// Adapter for `handler`.
    #[must_use]
    pub fn new(handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            handler,
            diagnostic_margin: DEFAULT_DIAGNOSTIC_MARGIN,
        }
    }

    /// Sets how long before the deadline the diagnostic log fires.
    #[must_use]
    pub const fn with_diagnostic_margin(mut self, margin: Duration) -> Self {
        self.diagnostic_margin = margin;
        self
    }

    /// Serves a proxy event. Never fails; faults become a 500.
    pub async fn on_request(
        &self,
        event: GatewayEvent,
        context: &InvocationContext,
    ) -> GatewayResponse {
        let span = info_span!("gateway_request", invocation_id = %context.invocation_id);
        self.serve(to_canonical(event), context).instrument(span).await
    }

    async fn serve(&self, request: CanonicalRequest, context: &InvocationContext) -> GatewayResponse {
        let _timer = DiagnosticTimer::arm(
            context.invocation_id,
            context.diagnostic_delay(self.diagnostic_margin),
            serde_json::to_value(&request).unwrap_or_default(),
        );

        let origin = allowed_origin(&request.headers);
        let error_id = request
            .request_context
            .request_id
            .clone()
            .unwrap_or_else(|| context.invocation_id.to_string());

        let outcome = AssertUnwindSafe(self.handler.handle(request, context))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(response)) => to_gateway_response(&response),
            Ok(Err(HandlerError {
                status_code: Some(status),
                body,
                ..
            })) => to_gateway_response(
                &CanonicalResponse::json(status, body.unwrap_or_else(|| json!({})))
                    .with_header(ALLOW_ORIGIN_HEADER, origin.as_str()),
            ),
            Ok(Err(err)) => {
                error!(error_code = %err.code, error = %err.message, "Failed to handle gateway request");
                internal_error(&origin, &error_id)
            }
            Err(_) => {
                error!(error_code = ErrorCode::Internal.as_str(), "Handler panicked on gateway request");
                internal_error(&origin, &error_id)
            }
        }
    }

    /// Runs the authorization check of a request-authorizer event.
    ///
    /// # Errors
    ///
    /// Returns the handler's rejection; panics become status-less errors.
    pub async fn on_authorize(&self, event: GatewayEvent) -> Result<AuthorizerResult, HandlerError> {
        let request = to_canonical(event);
        AssertUnwindSafe(self.handler.authorize(&request))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!(error_code = ErrorCode::Internal.as_str(), "Handler panicked during authorization");
                Err(HandlerError::unexpected(
                    ErrorCode::Internal.as_str(),
                    "handler panicked during authorization",
                ))
            })
    }
}

fn internal_error(origin: &str, error_id: &str) -> GatewayResponse {
    to_gateway_response(
        &CanonicalResponse::json(500, json!({ "title": "Unexpected error", "errorId": error_id }))
            .with_header(ALLOW_ORIGIN_HEADER, origin),
    )
}

/// Builds the canonical request from a gateway event.
///
/// Multi-value maps win over their single-value counterparts when present.
#[must_use]
pub fn to_canonical(event: GatewayEvent) -> CanonicalRequest {
    let headers: Headers = merge_multi(event.headers, event.multi_value_headers)
        .into_iter()
        .collect();
    let query_parameters = merge_multi(
        event.query_string_parameters,
        event.multi_value_query_string_parameters,
    );

    let body = event
        .body
        .map(|body| {
            if event.is_base64_encoded {
                STANDARD.decode(&body).unwrap_or_else(|_| body.into_bytes())
            } else {
                body.into_bytes()
            }
        })
        .map(RequestBody::from_bytes)
        .unwrap_or_default();

    let request_context = event.request_context.unwrap_or_default();

    CanonicalRequest {
        method: event.http_method,
        resource: event.resource.unwrap_or_else(|| event.path.clone()),
        path: event.path,
        query_parameters,
        path_parameters: event.path_parameters.unwrap_or_default(),
        headers,
        body,
        request_context: RequestContext {
            request_id: request_context.request_id,
            stage: request_context.stage,
            authorizer: request_context.authorizer.and_then(authorizer_from_block),
        },
    }
}

fn merge_multi(
    single: Option<BTreeMap<String, String>>,
    multi: Option<BTreeMap<String, Vec<String>>>,
) -> BTreeMap<String, MultiValue> {
    let mut merged: BTreeMap<String, MultiValue> = single
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, MultiValue::Single(v)))
        .collect();
    for (key, values) in multi.unwrap_or_default() {
        merged.insert(key, MultiValue::from_values(values));
    }
    merged
}

/// Reads the platform's authorizer block (`principalId` plus flattened context).
fn authorizer_from_block(mut block: serde_json::Map<String, Value>) -> Option<AuthorizerResult> {
    let principal_id = match block.remove("principalId")? {
        Value::String(id) => id,
        other => other.to_string(),
    };
    Some(AuthorizerResult {
        principal_id,
        context: block.into_iter().collect(),
    })
}

/// Converts a handler response to the gateway proxy shape.
#[must_use]
pub fn to_gateway_response(response: &CanonicalResponse) -> GatewayResponse {
    let mut headers = BTreeMap::new();
    let mut multi_value_headers = BTreeMap::new();
    for (name, value) in response.headers.iter() {
        match value {
            MultiValue::Single(v) => {
                headers.insert(name.clone(), v.clone());
            }
            MultiValue::Multi(vs) => {
                multi_value_headers.insert(name.clone(), vs.clone());
            }
        }
    }

    let (body, is_base64_encoded) = response.text_body();
    GatewayResponse {
        status_code: response.status_code,
        headers,
        multi_value_headers,
        body,
        is_base64_encoded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResponseBody;
    use serde_json::json;

    fn event(value: Value) -> GatewayEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_to_canonical_prefers_multi_values() {
        let request = to_canonical(event(json!({
            "httpMethod": "GET",
            "path": "/accounts/a/documents/x",
            "resource": "/accounts/{accountId}/documents/{documentUri+}",
            "headers": {"Accept": "text/plain", "X-Multi": "2"},
            "multiValueHeaders": {"X-Multi": ["1", "2"]},
            "queryStringParameters": {"q": "b"},
            "multiValueQueryStringParameters": {"q": ["a", "b"]},
            "pathParameters": {"accountId": "a", "documentUri": "x"},
            "body": "eyJhIjoxfQ==",
            "isBase64Encoded": true,
            "requestContext": {
                "requestId": "r1",
                "authorizer": {"principalId": "user-1", "jwt": "t"}
            }
        })));

        assert_eq!(request.header("accept"), Some("text/plain"));
        assert_eq!(
            request.headers.get("x-multi"),
            Some(&MultiValue::Multi(vec!["1".to_string(), "2".to_string()]))
        );
        assert_eq!(
            request.query_parameters["q"],
            MultiValue::Multi(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(request.body, RequestBody::Json(json!({"a": 1})));
        let authorizer = request.authorizer().unwrap();
        assert_eq!(authorizer.principal_id, "user-1");
        assert_eq!(authorizer.jwt(), Some("t"));
    }

    #[test]
    fn test_authorizer_block_without_principal_ignored() {
        let request = to_canonical(event(json!({
            "httpMethod": "GET",
            "path": "/",
            "requestContext": {"authorizer": {"claims": {}}}
        })));
        assert!(request.authorizer().is_none());
    }

    #[test]
    fn test_gateway_response_splits_headers() {
        let response = CanonicalResponse::new(200)
            .with_header("content-type", "text/plain")
            .with_header("Set-Cookie", vec!["a=1".to_string(), "b=2".to_string()])
            .with_body(ResponseBody::Text("hello".to_string()));

        let wire = to_gateway_response(&response);
        assert_eq!(wire.headers["content-type"], "text/plain");
        assert_eq!(wire.multi_value_headers["Set-Cookie"], vec!["a=1", "b=2"]);
        assert_eq!(wire.body, "hello");
        assert!(!wire.is_base64_encoded);
    }
}
