//! JWT claims.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Registered claims this service reads, plus everything else verbatim.
///
/// All registered claims are optional so a token can be peeked before it is
/// known to be well-formed; presence is enforced by the authenticator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiry, seconds since the epoch. NumericDate may be fractional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<f64>,
    /// Not valid before, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<f64>,
    /// Issued at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<f64>,
    /// Every other claim
    #[serde(flatten)]
    pub custom: HashMap<String, Value>,
}

impl Claims {
    /// Issuer, ignoring empty strings.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.iss.as_deref().filter(|s| !s.is_empty())
    }

    /// Subject, ignoring empty strings.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref().filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claims_accept_missing_registered_claims() {
        let claims: Claims = serde_json::from_value(json!({"scope": "read"})).unwrap();
        assert!(claims.issuer().is_none());
        assert!(claims.subject().is_none());
        assert_eq!(claims.custom.get("scope"), Some(&json!("read")));
    }

    #[test]
    fn test_fractional_numeric_dates() {
        let claims: Claims =
            serde_json::from_value(json!({"exp": 4_102_444_800.5, "nbf": 1, "iat": 1.25})).unwrap();
        assert_eq!(claims.exp, Some(4_102_444_800.5));
        assert_eq!(claims.nbf, Some(1.0));
        assert_eq!(claims.iat, Some(1.25));
    }

    #[test]
    fn test_empty_strings_count_as_missing() {
        let claims: Claims = serde_json::from_value(json!({"iss": "", "sub": ""})).unwrap();
        assert!(claims.issuer().is_none());
        assert!(claims.subject().is_none());
    }
}
