//! CDN edge-trigger support: event and response shapes plus the adapter.

pub mod adapter;
pub mod event;
pub mod response;

pub use adapter::{EdgeRequestAdapter, strip_path_prefix, to_canonical};
pub use event::{CdnBody, CdnConfig, CdnEvent, CdnHeader, CdnPayload, CdnRecord, CdnRequest};
pub use response::EdgeResponse;
