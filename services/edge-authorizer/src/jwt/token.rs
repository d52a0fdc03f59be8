//! Type-State JWT Token with compile-time validation guarantees
//!
//! A token is first *peeked* (header and payload decoded, signature not
//! checked) to learn which key verifies it, then *verified* against that key.
//! Claims that can be trusted are only reachable on a verified token.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, Validation, decode};
use serde::Deserialize;

use crate::error::EdgeAuthError;
use crate::jwt::claims::Claims;
use crate::jwt::key_cache::ResolvedKey;

/// Signature algorithms accepted for verification.
///
/// ES512 (P-521) is absent because `jsonwebtoken` cannot verify it; a token
/// naming it is rejected like any other unlisted algorithm.
pub const ALLOWED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::EdDSA,
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
];

// ============================================================================
// Sealed Trait Pattern for Token States
// ============================================================================

mod private {
    /// Sealed trait to prevent external implementations
    pub trait Sealed {}
}

/// Marker trait for token validation states
pub trait TokenState: private::Sealed {
    /// Human-readable state name for debugging
    fn state_name() -> &'static str;
}

/// Decoded without any signature check
#[derive(Debug)]
pub struct Peeked;
impl private::Sealed for Peeked {}
impl TokenState for Peeked {
    fn state_name() -> &'static str {
        "Peeked"
    }
}

/// Signature, issuer, algorithm and time claims verified
#[derive(Debug)]
pub struct Verified;
impl private::Sealed for Verified {}
impl TokenState for Verified {
    fn state_name() -> &'static str {
        "Verified"
    }
}

/// JOSE header fields read before verification.
///
/// `alg` stays a string here so that unknown algorithms surface as a
/// rejection during verification rather than as an undecodable token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeekedHeader {
    pub alg: Option<String>,
    pub kid: Option<String>,
    pub typ: Option<String>,
}

// ============================================================================
// Type-State Token Wrapper
// ============================================================================

/// Type-state token wrapper that enforces verification at compile time
#[derive(Debug)]
pub struct Token<State: TokenState> {
    raw: String,
    header: PeekedHeader,
    claims: Claims,
    _state: PhantomData<State>,
}

impl Token<Peeked> {
    /// Decodes header and payload without verifying the signature.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::Unauthorized`] when the input is not a
    /// three-segment JWS with base64url JSON header and payload.
    pub fn peek(raw: &str) -> Result<Self, EdgeAuthError> {
        let mut segments = raw.split('.');
        let (Some(header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(EdgeAuthError::unauthorized("token is not a compact JWS"));
        };

        Ok(Self {
            raw: raw.to_string(),
            header: decode_segment(header, "header")?,
            claims: decode_segment(payload, "payload")?,
            _state: PhantomData,
        })
    }

    /// Key id from the header.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref().filter(|s| !s.is_empty())
    }

    /// Unverified issuer claim.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.claims.issuer()
    }

    /// Algorithm named in the header.
    #[must_use]
    pub fn algorithm_name(&self) -> Option<&str> {
        self.header.alg.as_deref()
    }

    /// Unverified claims, for diagnostics only.
    #[must_use]
    pub const fn unverified_claims(&self) -> &Claims {
        &self.claims
    }

    /// Verifies the signature against `key` and checks the standard claims.
    ///
    /// The issuer claim must equal the peeked issuer exactly, the algorithm
    /// must be on [`ALLOWED_ALGORITHMS`] (and match the key's declared `alg`,
    /// if any), and `exp`/`nbf` are enforced when present.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::Unauthorized`] on any mismatch or failure.
    pub fn verify(self, key: &ResolvedKey) -> Result<Token<Verified>, EdgeAuthError> {
        let algorithm = self.allowed_algorithm()?;

        if let Some(key_alg) = key.jwk.alg.as_deref() {
            if !key_alg.eq_ignore_ascii_case(self.header.alg.as_deref().unwrap_or_default()) {
                return Err(EdgeAuthError::unauthorized(format!(
                    "token algorithm does not match key algorithm {key_alg}"
                )));
            }
        }

        let issuer = self
            .issuer()
            .ok_or_else(|| EdgeAuthError::unauthorized("issuer not in token"))?;

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[issuer]);
        validation.validate_aud = false;
        validation.validate_nbf = true;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::new();

        let data = decode::<Claims>(&self.raw, &key.decoding_key, &validation)?;

        Ok(Token {
            raw: self.raw,
            header: self.header,
            claims: data.claims,
            _state: PhantomData,
        })
    }

    fn allowed_algorithm(&self) -> Result<Algorithm, EdgeAuthError> {
        let name = self
            .header
            .alg
            .as_deref()
            .ok_or_else(|| EdgeAuthError::unauthorized("algorithm not in token header"))?;
        Algorithm::from_str(name)
            .ok()
            .filter(|alg| ALLOWED_ALGORITHMS.contains(alg))
            .ok_or_else(|| EdgeAuthError::unauthorized(format!("algorithm {name} not accepted")))
    }
}

impl Token<Verified> {
    /// Verified claims.
    #[must_use]
    pub const fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Verified subject.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.claims.subject()
    }

    /// Verified issuer.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.claims.issuer()
    }

    /// The token as presented.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Consumes the token, returning the raw string.
    #[must_use]
    pub fn into_raw(self) -> String {
        self.raw
    }
}

// Common methods for all states
impl<S: TokenState> Token<S> {
    /// Get the current state name
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        S::state_name()
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(
    segment: &str,
    part: &str,
) -> Result<T, EdgeAuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|_| EdgeAuthError::unauthorized(format!("token {part} is not base64url")))?;
    serde_json::from_slice(&bytes)
        .map_err(|_| EdgeAuthError::unauthorized(format!("token {part} is not a JSON object")))
}
