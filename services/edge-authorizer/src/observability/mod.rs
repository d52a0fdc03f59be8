//! Log redaction and per-invocation diagnostics.

pub mod invocation;
pub mod redact;

pub use invocation::DiagnosticTimer;
pub use redact::{redact, redact_to_string, truncate_token_signatures};
