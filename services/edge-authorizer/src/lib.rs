//! Edge Authorizer - bearer-token authentication and trigger adaptation.
//!
//! This crate verifies bearer tokens against keys discovered from the token
//! issuer, and adapts CDN edge-trigger and API gateway events to one
//! protocol-neutral request handler.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod cors;
pub mod dispatch;
pub mod edge;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod jwt;
pub mod model;
pub mod observability;

pub use config::{Config, TriggerMode};
pub use dispatch::{DispatchOutput, Dispatcher, InboundEvent};
pub use error::{EdgeAuthError, ErrorCode, ErrorResponse, HandlerError};
pub use handler::{InvocationContext, RequestHandler};
