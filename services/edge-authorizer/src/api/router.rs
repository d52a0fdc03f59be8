//! Method and path routing for the default API handler.

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::error::HandlerError;
use crate::model::{CanonicalRequest, CanonicalResponse};

/// Route body: a synchronous function of the request.
pub type RouteFn =
    Arc<dyn Fn(&CanonicalRequest) -> Result<CanonicalResponse, HandlerError> + Send + Sync>;

/// Path pattern matching every path.
pub const ANY_PATH: &str = "*";

/// Headers a browser may send on cross-origin calls.
pub const ALLOWED_REQUEST_HEADERS: &str = "Content-Type,X-Amz-Date,Authorization,X-Api-Key,\
X-Powered-By,If-Unmodified-Since,Origin,Referer,Accept,Accept-Language,Accept-Encoding,\
User-Agent,Content-Length,Cache-Control,Pragma,Sec-Fetch-Dest,Sec-Fetch-Mode,Sec-Fetch-Site,sec-gpc";

/// Methods offered to cross-origin callers.
pub const ALLOWED_METHODS: &str = "DELETE,GET,HEAD,OPTIONS,PATCH,POST,PUT";

struct Route {
    method: String,
    path: String,
    handler: RouteFn,
}

impl Route {
    fn matches(&self, request: &CanonicalRequest) -> bool {
        self.method.eq_ignore_ascii_case(&request.method)
            && (self.path == ANY_PATH || self.path == request.path)
    }
}

/// First-match router; unmatched requests get a 404.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Router with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with the service's built-in routes: the root and OpenAPI
    /// documents, and the CORS pre-flight answer for every path.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .route("GET", "/", |_| Ok(CanonicalResponse::json(200, json!({}))))
            .route("GET", "/.well-known/openapi", |_| {
                Ok(CanonicalResponse::json(200, json!({})))
            })
            .route("OPTIONS", ANY_PATH, |_| Ok(preflight_response()))
    }

    /// Registers a route; earlier registrations win.
    #[must_use]
    pub fn route<F>(mut self, method: &str, path: &str, handler: F) -> Self
    where
        F: Fn(&CanonicalRequest) -> Result<CanonicalResponse, HandlerError> + Send + Sync + 'static,
    {
        self.routes.push(Route {
            method: method.to_string(),
            path: path.to_string(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Runs the first matching route.
    ///
    /// # Errors
    ///
    /// Propagates the route's failure.
    pub fn dispatch(&self, request: &CanonicalRequest) -> Result<CanonicalResponse, HandlerError> {
        match self.routes.iter().find(|route| route.matches(request)) {
            Some(route) => (route.handler)(request),
            None => {
                warn!(method = %request.method, path = %request.path, "404 Path Not Found");
                Ok(CanonicalResponse::new(404))
            }
        }
    }
}

fn preflight_response() -> CanonicalResponse {
    CanonicalResponse::new(200)
        .with_header("Access-Control-Allow-Headers", ALLOWED_REQUEST_HEADERS)
        .with_header("Access-Control-Allow-Methods", ALLOWED_METHODS)
        .with_header("Cache-Control", "public, max-age=3600")
}
