//! API gateway support: proxy and request-authorizer events.

pub mod adapter;
pub mod event;

pub use adapter::{GatewayRequestAdapter, to_canonical, to_gateway_response};
pub use event::{AUTHORIZER_EVENT_TYPE, GatewayEvent, GatewayRequestContext, GatewayResponse};
