//! Edge request adapter.
//!
//! Makes one CDN edge-trigger invocation behave like a normal HTTP request
//! against a [`RequestHandler`]:
//!
//! ```text
//! Received -> validated | EventShape error
//!          -> preflight | authenticating
//!          -> authenticated | rejected (status) | rejected (500)
//!          -> handling -> responding -> done
//! ```
//!
//! Once the event is validated nothing the handler does, including panics,
//! escapes as anything other than an edge response.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::json;
use tracing::{Instrument, error, info_span, warn};

use crate::cors::allowed_origin;
use crate::error::{EdgeAuthError, ErrorCode, HandlerError, sanitize_message};
use crate::handler::{InvocationContext, RequestHandler};
use crate::model::{
    AuthorizerResult, CATCH_ALL_PARAM, CATCH_ALL_RESOURCE, CanonicalRequest, Headers, MultiValue,
    RequestBody, RequestContext, parse_query,
};
use crate::observability::DiagnosticTimer;

use super::event::{CdnEvent, CdnRequest};
use super::response::EdgeResponse;

/// Default margin before the runtime deadline for the diagnostic log.
pub const DEFAULT_DIAGNOSTIC_MARGIN: Duration = Duration::from_secs(5);

/// Adapts CDN edge-trigger events to a [`RequestHandler`].
pub struct EdgeRequestAdapter {
    handler: Arc<dyn RequestHandler>,
    api_path_prefix: String,
    diagnostic_margin: Duration,
}

impl EdgeRequestAdapter {
    /// Adapter stripping `api_path_prefix` from request paths.
    pub fn new(handler: Arc<dyn RequestHandler>, api_path_prefix: impl Into<String>) -> Self {
        Self {
            handler,
            api_path_prefix: api_path_prefix.into(),
            diagnostic_margin: DEFAULT_DIAGNOSTIC_MARGIN,
        }
    }

    /// Sets how long before the deadline the diagnostic log fires.
    #[must_use]
    pub const fn with_diagnostic_margin(mut self, margin: Duration) -> Self {
        self.diagnostic_margin = margin;
        self
    }

    /// Handles one edge event.
    ///
    /// Returns `Ok(None)` for an event without records.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::EventShape`] when a record lacks the CDN
    /// request structure. Every other failure becomes an edge response.
    pub async fn on_event(
        &self,
        event: CdnEvent,
        context: &InvocationContext,
    ) -> Result<Option<EdgeResponse>, EdgeAuthError> {
        let span = info_span!("edge_event", invocation_id = %context.invocation_id);
        self.process(event, context).instrument(span).await
    }

    async fn process(
        &self,
        event: CdnEvent,
        context: &InvocationContext,
    ) -> Result<Option<EdgeResponse>, EdgeAuthError> {
        let Some(record) = event.records.into_iter().next() else {
            warn!("Triggered work with no records or source");
            return Ok(None);
        };

        let Some(payload) = record.cf else {
            error!("Missing CDN data in request record");
            return Err(EdgeAuthError::event_shape("record has no cf structure"));
        };
        let request_id = payload.config.and_then(|config| config.request_id);
        let Some(cdn_request) = payload.request else {
            error!(request_id = ?request_id, "Missing CDN request in record");
            return Err(EdgeAuthError::event_shape("cf structure has no request"));
        };

        let mut request = to_canonical(cdn_request, request_id, &self.api_path_prefix);

        let _timer = DiagnosticTimer::arm(
            context.invocation_id,
            context.diagnostic_delay(self.diagnostic_margin),
            serde_json::to_value(&request).unwrap_or_default(),
        );

        if !request.is_preflight() {
            match self.authorize(&request).await {
                Ok(identity) => request.attach_authorizer(identity),
                Err(err) => return Ok(Some(reject(&request, err, context))),
            }
        }

        Ok(Some(self.respond(request, context).await))
    }

    async fn authorize(
        &self,
        request: &CanonicalRequest,
    ) -> Result<AuthorizerResult, HandlerError> {
        AssertUnwindSafe(self.handler.authorize(request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(HandlerError::unexpected(
                    ErrorCode::Internal.as_str(),
                    panic_message(panic.as_ref()),
                ))
            })
    }

    async fn respond(&self, request: CanonicalRequest, context: &InvocationContext) -> EdgeResponse {
        let origin = allowed_origin(&request.headers);
        let error_id = error_id(&request, context);
        let method = request.method.clone();
        let path = request.path.clone();

        let outcome = AssertUnwindSafe(async {
            let response = self.handler.handle(request, context).await?;
            Ok::<_, HandlerError>(EdgeResponse::from_canonical(&response))
        })
        .catch_unwind()
        .await;

        let failure = match outcome {
            Ok(Ok(response)) => return response,
            Ok(Err(err)) => err,
            Err(panic) => HandlerError::unexpected(
                ErrorCode::Internal.as_str(),
                panic_message(panic.as_ref()),
            ),
        };

        error!(
            error_id = %error_id,
            method = %method,
            path = %path,
            error_code = %failure.code,
            error = %failure.message,
            "Failed to handle CDN request, and it should have been caught"
        );
        EdgeResponse::json(
            500,
            &origin,
            &json!({
                "title": "Unexpected error with CDN",
                "errorId": error_id,
                "error": {
                    "code": failure.code,
                    "message": sanitize_message(&failure.message),
                }
            }),
        )
    }
}

/// Correlates a client-visible 500 with its log line.
fn error_id(request: &CanonicalRequest, context: &InvocationContext) -> String {
    request
        .request_context
        .request_id
        .clone()
        .unwrap_or_else(|| context.invocation_id.to_string())
}

/// Edge response for a failed authorization pre-step.
fn reject(
    request: &CanonicalRequest,
    err: HandlerError,
    context: &InvocationContext,
) -> EdgeResponse {
    let origin = allowed_origin(&request.headers);
    if let Some(status) = err.status_code {
        return EdgeResponse::json(status, &origin, &err.body.unwrap_or_else(|| json!({})));
    }

    let error_id = error_id(request, context);
    error!(
        error_id = %error_id,
        method = %request.method,
        path = %request.path,
        error_code = %err.code,
        error = %err.message,
        "Failed to handle authorize CDN request"
    );
    EdgeResponse::json(
        500,
        &origin,
        &json!({ "title": "Unexpected error in authorization", "errorId": error_id }),
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .map_or_else(|| "handler panicked".to_string(), |msg| format!("handler panicked: {msg}"))
}

/// Builds the canonical request from the CDN request.
#[must_use]
pub fn to_canonical(
    request: CdnRequest,
    request_id: Option<String>,
    api_path_prefix: &str,
) -> CanonicalRequest {
    let path = strip_path_prefix(&request.uri, api_path_prefix);
    let proxy = path.strip_prefix('/').unwrap_or(&path).to_string();

    let headers: Headers = request
        .headers
        .into_iter()
        .map(|(name, entries)| {
            let values: Vec<String> = entries.into_iter().map(|entry| entry.value).collect();
            (name, MultiValue::from_values(values))
        })
        .collect();

    let body = request
        .body
        .map(|body| RequestBody::from_bytes(body.decode()))
        .unwrap_or_default();

    CanonicalRequest {
        method: request.method,
        path,
        resource: CATCH_ALL_RESOURCE.to_string(),
        query_parameters: parse_query(&request.querystring),
        path_parameters: BTreeMap::from([(CATCH_ALL_PARAM.to_string(), proxy)]),
        headers,
        body,
        request_context: RequestContext {
            request_id,
            stage: None,
            authorizer: None,
        },
    }
}

/// Removes `prefix` from `uri` when it ends at a segment boundary.
///
/// `/api` and `/api/x` lose the prefix, `/apiary` does not; an empty result
/// becomes `/`.
#[must_use]
pub fn strip_path_prefix(uri: &str, prefix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let stripped = match uri.strip_prefix(prefix) {
        Some(rest) if !prefix.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => uri,
    };
    if stripped.is_empty() {
        "/".to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::event::{CdnBody, CdnHeader};
    use serde_json::json;

    fn header(value: &str) -> CdnHeader {
        CdnHeader {
            key: None,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_strip_prefix_at_segment_boundary() {
        assert_eq!(strip_path_prefix("/api/items/1", "/api"), "/items/1");
        assert_eq!(strip_path_prefix("/api", "/api"), "/");
        assert_eq!(strip_path_prefix("/api/", "/api/"), "/");
        assert_eq!(strip_path_prefix("/apiary", "/api"), "/apiary");
        assert_eq!(strip_path_prefix("/other", "/api"), "/other");
        assert_eq!(strip_path_prefix("/x", "/"), "/x");
    }

    #[test]
    fn test_to_canonical() {
        let request = CdnRequest {
            method: "POST".to_string(),
            uri: "/api/accounts/a/documents/x/y".to_string(),
            querystring: "q=1&q=2".to_string(),
            headers: BTreeMap::from([
                ("accept".to_string(), vec![header("application/json")]),
                ("x-multi".to_string(), vec![header("1"), header("2")]),
            ]),
            body: Some(CdnBody {
                data: Some("bm90IGpzb24=".to_string()),
                ..CdnBody::default()
            }),
            client_ip: None,
        };

        let canonical = to_canonical(request, Some("req-1".to_string()), "/api");
        assert_eq!(canonical.path, "/accounts/a/documents/x/y");
        assert_eq!(canonical.resource, CATCH_ALL_RESOURCE);
        assert_eq!(canonical.path_parameters[CATCH_ALL_PARAM], "accounts/a/documents/x/y");
        assert_eq!(canonical.header("Accept"), Some("application/json"));
        assert_eq!(
            canonical.headers.get("x-multi"),
            Some(&MultiValue::Multi(vec!["1".to_string(), "2".to_string()]))
        );
        assert_eq!(canonical.body, RequestBody::Text("not json".to_string()));
        assert_eq!(
            canonical.query_parameters["q"],
            MultiValue::Multi(vec!["1".to_string(), "2".to_string()])
        );
        assert_eq!(canonical.request_context.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_json_body_parsed() {
        let request = CdnRequest {
            method: "PUT".to_string(),
            uri: "/api".to_string(),
            body: Some(CdnBody {
                data: Some("eyJhIjoxfQ==".to_string()),
                ..CdnBody::default()
            }),
            ..CdnRequest::default()
        };
        let canonical = to_canonical(request, None, "/api");
        assert_eq!(canonical.body, RequestBody::Json(json!({"a": 1})));
        assert_eq!(canonical.path, "/");
        assert_eq!(canonical.path_parameters[CATCH_ALL_PARAM], "");
    }

    #[test]
    fn test_reject_without_status_carries_error_id() {
        let request = CanonicalRequest {
            request_context: RequestContext {
                request_id: Some("req-42".to_string()),
                ..RequestContext::default()
            },
            ..CanonicalRequest::default()
        };
        let context = InvocationContext::new(Duration::from_secs(60));

        let response = reject(&request, HandlerError::unexpected("BOOM", "db down"), &context);
        assert_eq!(response.status, "500");
        let body: serde_json::Value = serde_json::from_slice(&response.decoded_body().unwrap()).unwrap();
        assert_eq!(body["errorId"], "req-42");
        assert_eq!(body["title"], "Unexpected error in authorization");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "handler panicked: boom");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "handler panicked");
    }
}
