//! The downstream handler seam shared by every adapter.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::HandlerError;
use crate::model::{AuthorizerResult, CanonicalRequest, CanonicalResponse};

/// Facts about the current invocation, passed explicitly to the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    /// Unique id of this invocation, used as the request id in responses
    pub invocation_id: Uuid,
    /// Deployed function version, when the runtime reports one
    pub function_version: Option<String>,
    /// Time the runtime allows this invocation
    pub time_budget: Duration,
}

impl InvocationContext {
    /// A fresh invocation with the given time budget.
    #[must_use]
    pub fn new(time_budget: Duration) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            function_version: None,
            time_budget,
        }
    }

    /// Records the function version.
    #[must_use]
    pub fn with_function_version(mut self, version: impl Into<String>) -> Self {
        self.function_version = Some(version.into());
        self
    }

    /// Delay before the diagnostic log fires, `margin` ahead of the deadline.
    #[must_use]
    pub const fn diagnostic_delay(&self, margin: Duration) -> Duration {
        self.time_budget.saturating_sub(margin)
    }
}

/// Request handler invoked by the trigger adapters.
///
/// Authorization is a separate operation rather than a marked-up request, so
/// an adapter can never confuse an authorization check with a normal call.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Establishes the caller identity for `request`.
    ///
    /// # Errors
    ///
    /// A [`HandlerError`] with a status code is a deliberate rejection (401,
    /// 403, ...); one without is an unexpected fault.
    async fn authorize(&self, request: &CanonicalRequest) -> Result<AuthorizerResult, HandlerError>;

    /// Serves `request`, whose context already carries the identity.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the request cannot be served.
    async fn handle(
        &self,
        request: CanonicalRequest,
        context: &InvocationContext,
    ) -> Result<CanonicalResponse, HandlerError>;
}
