//! Issuer discovery: issuer normalization and the well-known document URL.

use serde::Deserialize;

/// Path of the discovery document below the issuer origin.
pub const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

/// The parts of a discovery document we read.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
    /// Location of the issuer's key set
    pub jwks_uri: String,
    /// Issuer as advertised by the document
    #[serde(default)]
    pub issuer: Option<String>,
}

/// Qualifies a scheme-less issuer with `https://`.
///
/// Issuers already carrying `http://` or `https://` are returned unchanged.
#[must_use]
pub fn normalize_issuer(issuer: &str) -> String {
    let issuer = issuer.trim();
    let lower = issuer.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") {
        issuer.to_string()
    } else {
        format!("https://{}", issuer.trim_start_matches('/'))
    }
}

/// Discovery document URL for `issuer`, joined with exactly one slash.
#[must_use]
pub fn discovery_url(issuer: &str) -> String {
    format!("{}/{WELL_KNOWN_PATH}", normalize_issuer(issuer).trim_end_matches('/'))
}
