//! Response and error middleware of the default API handler.

use serde_json::json;
use tracing::{error, info};

use crate::cors::allowed_origin;
use crate::error::HandlerError;
use crate::handler::InvocationContext;
use crate::model::{CanonicalRequest, CanonicalResponse};
use crate::observability::redact_to_string;

/// HSTS policy sent with every response.
pub const STRICT_TRANSPORT_SECURITY: &str = "max-age=31556926; includeSubDomains;";

/// Adds the standard headers without overriding what the route set, then
/// logs the request.
#[must_use]
pub fn on_response(
    mut response: CanonicalResponse,
    request: &CanonicalRequest,
    context: &InvocationContext,
) -> CanonicalResponse {
    let request_id = context.invocation_id.to_string();
    response
        .headers
        .insert_if_absent("Access-Control-Allow-Origin", allowed_origin(&request.headers));
    response.headers.insert_if_absent("x-request-id", request_id);
    response
        .headers
        .insert_if_absent("strict-transport-security", STRICT_TRANSPORT_SECURITY);
    response.headers.insert_if_absent("vary", "Origin, Host");

    let request_log = redact_to_string(&serde_json::to_value(request).unwrap_or_default());
    if response.status_code >= 400 {
        let response_log = redact_to_string(&serde_json::to_value(&response).unwrap_or_default());
        info!(status = response.status_code, request = %request_log, response = %response_log, "RequestLogger");
    } else {
        info!(status = response.status_code, request = %request_log, "RequestLogger");
    }
    response
}

/// Replaces a failed route's outcome with a generic 500.
#[must_use]
pub fn on_error(
    err: &HandlerError,
    request: &CanonicalRequest,
    context: &InvocationContext,
) -> CanonicalResponse {
    let error_id = request
        .request_context
        .request_id
        .clone()
        .unwrap_or_else(|| context.invocation_id.to_string());

    error!(
        error_id = %error_id,
        error_code = %err.code,
        error = %err.message,
        request = %redact_to_string(&serde_json::to_value(request).unwrap_or_default()),
        "RequestLogger"
    );

    CanonicalResponse::json(500, json!({ "title": "Unexpected error", "errorId": error_id }))
        .with_header("Access-Control-Allow-Origin", allowed_origin(&request.headers))
        .with_header("x-request-id", context.invocation_id.to_string())
        .with_header("strict-transport-security", STRICT_TRANSPORT_SECURITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Headers, RequestContext};
    use std::time::Duration;

    fn request(headers: &[(&str, &str)]) -> CanonicalRequest {
        CanonicalRequest {
            method: "GET".to_string(),
            path: "/".to_string(),
            headers: headers.iter().copied().collect::<Headers>(),
            ..CanonicalRequest::default()
        }
    }

    #[test]
    fn test_standard_headers_added() {
        let context = InvocationContext::new(Duration::from_secs(60));
        let response = on_response(
            CanonicalResponse::new(200),
            &request(&[("origin", "https://app.example.com")]),
            &context,
        );
        assert_eq!(
            response.headers.get_first("access-control-allow-origin"),
            Some("https://app.example.com")
        );
        assert_eq!(
            response.headers.get_first("x-request-id"),
            Some(context.invocation_id.to_string().as_str())
        );
        assert_eq!(
            response.headers.get_first("strict-transport-security"),
            Some(STRICT_TRANSPORT_SECURITY)
        );
        assert_eq!(response.headers.get_first("vary"), Some("Origin, Host"));
    }

    #[test]
    fn test_route_headers_not_overridden() {
        let context = InvocationContext::new(Duration::from_secs(60));
        let response = on_response(
            CanonicalResponse::new(200).with_header("access-control-allow-origin", "https://fixed"),
            &request(&[("origin", "https://app.example.com")]),
            &context,
        );
        assert_eq!(
            response.headers.get_first("Access-Control-Allow-Origin"),
            Some("https://fixed")
        );
    }

    #[test]
    fn test_error_body_uses_request_id() {
        let context = InvocationContext::new(Duration::from_secs(60));
        let mut failing = request(&[]);
        failing.request_context = RequestContext {
            request_id: Some("req-9".to_string()),
            ..RequestContext::default()
        };
        let response = on_error(&HandlerError::unexpected("BOOM", "boom"), &failing, &context);
        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.body,
            Some(crate::model::ResponseBody::Json(
                json!({"title": "Unexpected error", "errorId": "req-9"})
            ))
        );
        assert_eq!(response.headers.get_first("Access-Control-Allow-Origin"), Some("*"));
    }
}
