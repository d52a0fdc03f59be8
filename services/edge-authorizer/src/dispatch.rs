//! Inbound event variants and their dispatch to one adapter each.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use crate::config::{Config, TriggerMode};
use crate::edge::{CdnEvent, EdgeRequestAdapter, EdgeResponse};
use crate::error::EdgeAuthError;
use crate::gateway::{GatewayEvent, GatewayRequestAdapter, GatewayResponse};
use crate::handler::{InvocationContext, RequestHandler};
use crate::model::AuthorizerResult;

/// An inbound event, by the shape it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// CDN edge trigger
    Edge(CdnEvent),
    /// API gateway proxy request
    Gateway(GatewayEvent),
    /// API gateway request-authorizer check
    GatewayAuthorizer(GatewayEvent),
}

impl InboundEvent {
    /// Reads `raw` as the variant the deployment expects.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::EventShape`] when `raw` is not that shape.
    pub fn parse(mode: TriggerMode, raw: Value) -> Result<Self, EdgeAuthError> {
        match mode {
            TriggerMode::Edge => serde_json::from_value(raw)
                .map(Self::Edge)
                .map_err(|err| EdgeAuthError::event_shape(format!("not a CDN event: {err}"))),
            TriggerMode::Gateway => {
                let event: GatewayEvent = serde_json::from_value(raw).map_err(|err| {
                    EdgeAuthError::event_shape(format!("not a gateway event: {err}"))
                })?;
                Ok(if event.is_authorizer() {
                    Self::GatewayAuthorizer(event)
                } else {
                    Self::Gateway(event)
                })
            }
        }
    }
}

/// What an adapter produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutput {
    /// Edge response; `None` for an event without records
    Edge(Option<EdgeResponse>),
    /// Gateway proxy response
    Gateway(GatewayResponse),
    /// Identity from an authorizer check
    Authorizer(AuthorizerResult),
}

impl DispatchOutput {
    /// Wire JSON of the output; an empty edge result is `{}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let value = match self {
            Self::Edge(None) => return json!({}),
            Self::Edge(Some(response)) => serde_json::to_value(response),
            Self::Gateway(response) => serde_json::to_value(response),
            Self::Authorizer(result) => serde_json::to_value(result),
        };
        value.unwrap_or_else(|_| json!({}))
    }
}

/// Routes each [`InboundEvent`] variant to its adapter.
pub struct Dispatcher {
    edge: EdgeRequestAdapter,
    gateway: GatewayRequestAdapter,
}

impl Dispatcher {
    /// Adapters for `handler`, configured from `config`.
    #[must_use]
    pub fn new(handler: Arc<dyn RequestHandler>, config: &Config) -> Self {
        let margin = Duration::from_secs(config.diagnostic_margin_secs);
        Self {
            edge: EdgeRequestAdapter::new(handler.clone(), config.api_path_prefix.clone())
                .with_diagnostic_margin(margin),
            gateway: GatewayRequestAdapter::new(handler).with_diagnostic_margin(margin),
        }
    }

    /// Handles one event.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::EventShape`] for a malformed edge event and
    /// [`EdgeAuthError::Handler`] when an authorizer check rejects.
    pub async fn dispatch(
        &self,
        event: InboundEvent,
        context: &InvocationContext,
    ) -> Result<DispatchOutput, EdgeAuthError> {
        match event {
            InboundEvent::Edge(event) => self.edge.on_event(event, context).await.map(DispatchOutput::Edge),
            InboundEvent::Gateway(event) => Ok(DispatchOutput::Gateway(
                self.gateway.on_request(event, context).await,
            )),
            InboundEvent::GatewayAuthorizer(event) => self
                .gateway
                .on_authorize(event)
                .await
                .map(DispatchOutput::Authorizer)
                .map_err(EdgeAuthError::Handler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_by_mode() {
        assert!(matches!(
            InboundEvent::parse(TriggerMode::Edge, json!({"Records": []})).unwrap(),
            InboundEvent::Edge(_)
        ));
        assert!(matches!(
            InboundEvent::parse(TriggerMode::Gateway, json!({"httpMethod": "GET", "path": "/"}))
                .unwrap(),
            InboundEvent::Gateway(_)
        ));
        assert!(matches!(
            InboundEvent::parse(TriggerMode::Gateway, json!({"type": "REQUEST"})).unwrap(),
            InboundEvent::GatewayAuthorizer(_)
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        let err = InboundEvent::parse(TriggerMode::Edge, json!({"Records": "nope"})).unwrap_err();
        assert!(matches!(err, EdgeAuthError::EventShape { .. }));
    }

    #[test]
    fn test_empty_edge_output_is_empty_object() {
        assert_eq!(DispatchOutput::Edge(None).to_json(), json!({}));
    }
}
