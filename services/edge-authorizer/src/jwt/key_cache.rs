//! Verification Key Cache with Per-Key Single-Flight Population
//!
//! Implements the process-wide key cache that:
//! - Maps `(issuer, kid)` to immutable verification key material
//! - Expires entries after a TTL so rotated keys are eventually refetched
//! - Lets concurrent misses on the same pair share one upstream fetch

use crate::error::EdgeAuthError;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// JSON Web Key structure.
///
/// Deserialized leniently: unknown members are ignored and `kid` may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (RSA, EC, OKP)
    pub kty: String,
    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use", default)]
    pub key_use: Option<String>,
    /// Algorithm
    #[serde(default)]
    pub alg: Option<String>,
    /// RSA modulus
    #[serde(default)]
    pub n: Option<String>,
    /// RSA exponent
    #[serde(default)]
    pub e: Option<String>,
    /// EC / OKP x coordinate
    #[serde(default)]
    pub x: Option<String>,
    /// EC y coordinate
    #[serde(default)]
    pub y: Option<String>,
    /// EC / OKP curve
    #[serde(default)]
    pub crv: Option<String>,
}

/// JSON Web Key Set structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    /// List of keys
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// The entry whose `kid` equals `kid`.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|jwk| jwk.kid.as_deref() == Some(kid))
    }
}

/// Key material ready for signature verification.
#[derive(Clone)]
pub struct ResolvedKey {
    /// The key as published by the issuer
    pub jwk: Jwk,
    /// Verification key derived from it
    pub decoding_key: DecodingKey,
}

impl std::fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("jwk", &self.jwk)
            .finish_non_exhaustive()
    }
}

impl ResolvedKey {
    /// Converts a published key into verification material.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::InternalServiceError`] for unsupported key
    /// types, weak keys or missing components.
    pub fn from_jwk(jwk: Jwk) -> Result<Self, EdgeAuthError> {
        let decoding_key = jwk_to_decoding_key(&jwk).ok_or_else(|| {
            EdgeAuthError::key_infrastructure(format!(
                "key {} cannot be used for verification",
                jwk.kid.as_deref().unwrap_or("<none>")
            ))
        })?;
        Ok(Self { jwk, decoding_key })
    }
}

/// Converts a JWK to a `DecodingKey`.
fn jwk_to_decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
    let kid = jwk.kid.as_deref().unwrap_or("<none>");
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_ref()?;
            let e = jwk.e.as_ref()?;

            // 2048-bit modulus is 342 base64url characters
            if n.trim_end_matches('=').len() < 342 {
                warn!(kid = %kid, "RSA key too small, rejecting");
                return None;
            }

            DecodingKey::from_rsa_components(n, e).ok()
        }
        "EC" => {
            let x = jwk.x.as_ref()?;
            let y = jwk.y.as_ref()?;
            let crv = jwk.crv.as_deref().unwrap_or("P-256");

            if !matches!(crv, "P-256" | "P-384") {
                warn!(kid = %kid, crv = %crv, "Unsupported EC curve, rejecting");
                return None;
            }

            DecodingKey::from_ec_components(x, y).ok()
        }
        "OKP" => {
            let x = jwk.x.as_ref()?;
            if jwk.crv.as_deref() != Some("Ed25519") {
                warn!(kid = %kid, crv = ?jwk.crv, "Unsupported OKP curve, rejecting");
                return None;
            }
            DecodingKey::from_ed_components(x).ok()
        }
        _ => {
            warn!(kty = %jwk.kty, kid = %kid, "Unsupported key type");
            None
        }
    }
}

/// Cache key: `(issuer, kid)`.
type CacheKey = (String, String);

/// Shared result of one upstream fetch. The error is the failure reason.
type InflightFuture = Shared<BoxFuture<'static, Result<Arc<ResolvedKey>, String>>>;

struct CacheEntry {
    key: Arc<ResolvedKey>,
    fetched_at: Instant,
}

/// Process-wide `(issuer, kid)` → key cache.
pub struct KeyCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    inflight: Mutex<HashMap<CacheKey, InflightFuture>>,
    ttl: Duration,
}

impl KeyCache {
    /// Creates an empty cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Cached key for the pair, if present and fresh.
    #[must_use]
    pub fn get(&self, issuer: &str, kid: &str) -> Option<Arc<ResolvedKey>> {
        let entries = self.entries.read();
        entries
            .get(&(issuer.to_string(), kid.to_string()))
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.key.clone())
    }

    /// Stores a key for the pair, replacing any previous entry.
    pub fn insert(&self, issuer: &str, kid: &str, key: Arc<ResolvedKey>) {
        self.entries.write().insert(
            (issuer.to_string(), kid.to_string()),
            CacheEntry {
                key,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Returns the cached key or runs `fetch` to populate it.
    ///
    /// Concurrent callers missing on the same pair await a single shared
    /// fetch. Failures are returned to every waiter and not cached.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::InternalServiceError`] when the fetch fails.
    pub async fn get_or_fetch<F>(
        &self,
        issuer: &str,
        kid: &str,
        fetch: F,
    ) -> Result<Arc<ResolvedKey>, EdgeAuthError>
    where
        F: Future<Output = Result<ResolvedKey, EdgeAuthError>> + Send + 'static,
    {
        if let Some(key) = self.get(issuer, kid) {
            return Ok(key);
        }

        let cache_key = (issuer.to_string(), kid.to_string());
        let shared = {
            let mut inflight = self.inflight.lock().await;

            // Another caller may have finished while we waited for the lock
            if let Some(key) = self.get(issuer, kid) {
                return Ok(key);
            }

            if let Some(fut) = inflight.get(&cache_key) {
                debug!(issuer = %issuer, kid = %kid, "Joining in-flight key fetch");
                fut.clone()
            } else {
                let fut: InflightFuture = fetch
                    .map(|result| result.map(Arc::new).map_err(failure_reason))
                    .boxed()
                    .shared();
                inflight.insert(cache_key.clone(), fut.clone());
                fut
            }
        };

        let result = shared.clone().await;

        if let Ok(ref key) = result {
            self.insert(issuer, kid, key.clone());
        }
        {
            let mut inflight = self.inflight.lock().await;
            if inflight
                .get(&cache_key)
                .is_some_and(|current| current.ptr_eq(&shared))
            {
                inflight.remove(&cache_key);
            }
        }

        result.map_err(EdgeAuthError::key_infrastructure)
    }

    /// Drops every cached key of `issuer` (for rotation hooks).
    pub fn invalidate(&self, issuer: &str) {
        self.entries.write().retain(|(cached_issuer, _), _| cached_issuer != issuer);
    }

    /// Drops every cached key.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of cached entries, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn failure_reason(err: EdgeAuthError) -> String {
    match err {
        EdgeAuthError::InternalServiceError { reason } => reason,
        other => other.to_string(),
    }
}
