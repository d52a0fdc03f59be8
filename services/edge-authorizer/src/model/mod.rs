//! Canonical, protocol-neutral request/response model.
//!
//! Both trigger shapes (CDN edge and API gateway) normalize into these types,
//! so the handler never sees which one delivered the request.

pub mod request;
pub mod response;
pub mod values;

pub use request::{
    AuthorizerResult, CATCH_ALL_PARAM, CATCH_ALL_RESOURCE, CanonicalRequest, RequestBody,
    RequestContext,
};
pub use response::{CanonicalResponse, ResponseBody};
pub use values::{Headers, MultiValue, parse_query};
