//! Default API handler served behind both trigger adapters.

pub mod middleware;
pub mod router;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::handler::{InvocationContext, RequestHandler};
use crate::jwt::TokenAuthenticator;
use crate::model::{AuthorizerResult, CanonicalRequest, CanonicalResponse};

pub use router::{ANY_PATH, RouteFn, Router};

/// Authenticates with a [`TokenAuthenticator`] and serves the routes of a
/// [`Router`] wrapped in the response and error middleware.
pub struct ApiHandler {
    authenticator: Arc<TokenAuthenticator>,
    router: Router,
}

impl ApiHandler {
    /// Handler with the built-in routes.
    #[must_use]
    pub fn new(authenticator: Arc<TokenAuthenticator>) -> Self {
        Self::with_router(authenticator, Router::with_defaults())
    }

    /// Handler with a custom router.
    #[must_use]
    pub const fn with_router(authenticator: Arc<TokenAuthenticator>, router: Router) -> Self {
        Self {
            authenticator,
            router,
        }
    }
}

#[async_trait]
impl RequestHandler for ApiHandler {
    async fn authorize(&self, request: &CanonicalRequest) -> Result<AuthorizerResult, HandlerError> {
        self.authenticator
            .authenticate(request)
            .await
            .map_err(HandlerError::from)
    }

    async fn handle(
        &self,
        request: CanonicalRequest,
        context: &InvocationContext,
    ) -> Result<CanonicalResponse, HandlerError> {
        let response = match self.router.dispatch(&request) {
            Ok(response) => middleware::on_response(response, &request, context),
            Err(err) => middleware::on_error(&err, &request, context),
        };
        Ok(response)
    }
}
