//! Key resolution: `(issuer, kid)` to verification key via OIDC discovery.
//!
//! A cache hit answers without touching the network. A miss normalizes the
//! issuer, fetches its discovery document, then its key set, and selects the
//! entry with the requested `kid`. Both fetches present the caller's token as
//! a bearer credential since some issuers gate discovery behind it.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use rust_common::{RetryPolicy, build_http_client, get_json};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{EdgeAuthError, ErrorCode};
use crate::jwt::discovery::{DiscoveryDocument, discovery_url, normalize_issuer};
use crate::jwt::key_cache::{JwkSet, KeyCache, ResolvedKey};

/// Resolves verification keys for token signatures.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Key material for `kid` as published by `issuer`.
    ///
    /// `raw_token`, when present, is sent as a bearer credential upstream.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::InternalServiceError`] when the key cannot be
    /// fetched, parsed or found.
    async fn resolve_key(
        &self,
        issuer: &str,
        kid: &str,
        raw_token: Option<&str>,
    ) -> Result<Arc<ResolvedKey>, EdgeAuthError>;
}

/// [`KeyResolver`] backed by OIDC discovery and a process-wide cache.
pub struct OidcKeyResolver {
    client: Client,
    retry: RetryPolicy,
    cache: Arc<KeyCache>,
}

impl OidcKeyResolver {
    /// Builds the resolver from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, EdgeAuthError> {
        let client = build_http_client(&config.http_config())
            .map_err(|err| EdgeAuthError::Internal(err.into()))?;
        Ok(Self::with_parts(
            client,
            RetryPolicy::new(config.retry_config()),
            Arc::new(KeyCache::new(config.key_cache_ttl())),
        ))
    }

    /// Assembles the resolver from ready-made parts.
    #[must_use]
    pub const fn with_parts(client: Client, retry: RetryPolicy, cache: Arc<KeyCache>) -> Self {
        Self {
            client,
            retry,
            cache,
        }
    }

    /// The shared key cache, for invalidation hooks.
    #[must_use]
    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    /// Drops every cached key of `issuer`.
    pub fn invalidate(&self, issuer: &str) {
        let issuer = normalize_issuer(issuer);
        info!(issuer = %issuer, "Invalidating cached keys");
        self.cache.invalidate(&issuer);
    }

    /// Number of cached keys.
    #[must_use]
    pub fn cached_key_count(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl KeyResolver for OidcKeyResolver {
    async fn resolve_key(
        &self,
        issuer: &str,
        kid: &str,
        raw_token: Option<&str>,
    ) -> Result<Arc<ResolvedKey>, EdgeAuthError> {
        let issuer = normalize_issuer(issuer);

        if let Some(key) = self.cache.get(&issuer, kid) {
            debug!(issuer = %issuer, kid = %kid, "Key cache hit");
            return Ok(key);
        }

        let fetch = fetch_key(
            self.client.clone(),
            self.retry.clone(),
            issuer.clone(),
            kid.to_string(),
            raw_token.map(ToString::to_string),
        );

        self.cache
            .get_or_fetch(&issuer, kid, fetch)
            .await
            .inspect_err(|err| {
                warn!(
                    issuer = %issuer,
                    kid = %kid,
                    error_code = ErrorCode::KeyInfrastructure.as_str(),
                    error = %err,
                    "Verification key resolution failed"
                );
            })
    }
}

async fn fetch_key(
    client: Client,
    retry: RetryPolicy,
    issuer: String,
    kid: String,
    bearer: Option<String>,
) -> Result<ResolvedKey, EdgeAuthError> {
    let bearer = bearer.as_deref();
    let url = discovery_url(&issuer);
    let discovery_endpoint = url.as_str();

    let document: DiscoveryDocument = retry
        .execute("fetch_discovery_document", || {
            get_json(&client, discovery_endpoint, bearer)
        })
        .await?;

    let jwks_endpoint = document.jwks_uri.as_str();
    let key_set: JwkSet = retry
        .execute("fetch_key_set", || get_json(&client, jwks_endpoint, bearer))
        .await?;

    let jwk = key_set.find(&kid).cloned().ok_or_else(|| {
        EdgeAuthError::key_infrastructure(format!(
            "kid {kid} not in key set of {issuer} ({} keys)",
            key_set.keys.len()
        ))
    })?;

    let key = ResolvedKey::from_jwk(jwk)?;
    info!(issuer = %issuer, kid = %kid, kty = %key.jwk.kty, "Fetched verification key");
    Ok(key)
}
