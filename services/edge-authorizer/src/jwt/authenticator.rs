//! Bearer-token authentication.
//!
//! Flow for one request:
//! 1. Locate the credential (`Authorization: Bearer` header, else the
//!    `authorization` cookie)
//! 2. Peek the token for `kid` and `iss`, exchanging an opaque credential
//!    once when an exchange is configured
//! 3. Resolve the verification key
//! 4. Verify signature, issuer, algorithm and time claims
//! 5. Return the subject as principal with the token in the context
//!
//! Every exit is either an identity or a typed failure; nothing else escapes.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::Config;
use crate::error::{EdgeAuthError, ErrorCode};
use crate::jwt::discovery::normalize_issuer;
use crate::jwt::exchange::{CredentialExchange, TokenEndpointExchange};
use crate::jwt::key_resolver::{KeyResolver, OidcKeyResolver};
use crate::jwt::token::{Peeked, Token};
use crate::model::{AuthorizerResult, CanonicalRequest, Headers};

/// Name of the header (and fallback cookie) carrying the credential.
pub const AUTHORIZATION: &str = "authorization";

/// Produces a verified caller identity from a request, or fails closed.
pub struct TokenAuthenticator {
    resolver: Arc<dyn KeyResolver>,
    exchange: Option<Arc<dyn CredentialExchange>>,
    allowed_issuers: Vec<String>,
}

impl TokenAuthenticator {
    /// Authenticator accepting any issuer, without credential exchange.
    #[must_use]
    pub fn new(resolver: Arc<dyn KeyResolver>) -> Self {
        Self {
            resolver,
            exchange: None,
            allowed_issuers: Vec::new(),
        }
    }

    /// Builds the production chain: OIDC resolver plus optional exchange.
    ///
    /// # Errors
    ///
    /// Returns an error when an HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, EdgeAuthError> {
        let resolver = Arc::new(OidcKeyResolver::new(config)?);
        let mut authenticator =
            Self::new(resolver).with_allowed_issuers(config.allowed_issuers.clone());

        if let Some(url) = &config.credential_exchange_url {
            let client = rust_common::build_http_client(&config.http_config())
                .map_err(|err| EdgeAuthError::Internal(err.into()))?;
            authenticator =
                authenticator.with_exchange(Arc::new(TokenEndpointExchange::new(client, url.clone())));
        }
        Ok(authenticator)
    }

    /// Enables the opaque-credential fallback.
    #[must_use]
    pub fn with_exchange(mut self, exchange: Arc<dyn CredentialExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Restricts accepted issuers; empty accepts any.
    #[must_use]
    pub fn with_allowed_issuers(mut self, issuers: Vec<String>) -> Self {
        self.allowed_issuers = issuers.iter().map(|i| normalize_issuer(i)).collect();
        self
    }

    /// Authenticates the caller of `request`.
    ///
    /// # Errors
    ///
    /// [`EdgeAuthError::Unauthorized`] for any credential problem,
    /// [`EdgeAuthError::InternalServiceError`] when keys cannot be resolved.
    pub async fn authenticate(
        &self,
        request: &CanonicalRequest,
    ) -> Result<AuthorizerResult, EdgeAuthError> {
        let Some(credential) = extract_bearer_token(&request.headers) else {
            info!(
                method = %request.method,
                path = %request.path,
                error_code = ErrorCode::Unauthorized.as_str(),
                "Unauthorized: no token specified"
            );
            return Err(EdgeAuthError::unauthorized("no token specified"));
        };

        self.authenticate_credential(&credential)
            .await
            .inspect_err(|err| log_failure(err, request))
    }

    /// Authenticates a bare credential.
    ///
    /// # Errors
    ///
    /// Same as [`TokenAuthenticator::authenticate`].
    pub async fn authenticate_credential(
        &self,
        credential: &str,
    ) -> Result<AuthorizerResult, EdgeAuthError> {
        let (raw, token) = self.peek_or_exchange(credential).await?;

        let kid = token
            .kid()
            .ok_or_else(|| EdgeAuthError::unauthorized("kid not in token"))?
            .to_string();
        let issuer = token
            .issuer()
            .ok_or_else(|| EdgeAuthError::unauthorized("issuer not in token"))?
            .to_string();

        if !self.issuer_allowed(&issuer) {
            return Err(EdgeAuthError::unauthorized(format!("issuer {issuer} not accepted")));
        }

        let key = self.resolver.resolve_key(&issuer, &kid, Some(&raw)).await?;
        let verified = token.verify(&key)?;

        let principal_id = verified
            .subject()
            .ok_or_else(|| EdgeAuthError::unauthorized("subject not in token"))?
            .to_string();

        Ok(AuthorizerResult::new(principal_id)
            .with_context(AuthorizerResult::JWT_CONTEXT_KEY, verified.into_raw()))
    }

    async fn peek_or_exchange(
        &self,
        credential: &str,
    ) -> Result<(String, Token<Peeked>), EdgeAuthError> {
        let first_error = match Token::peek(credential) {
            Ok(token) => return Ok((credential.to_string(), token)),
            Err(err) => err,
        };

        let Some(exchange) = &self.exchange else {
            return Err(first_error);
        };

        let replacement = exchange.exchange(credential).await?;
        let token = Token::peek(&replacement)?;
        Ok((replacement, token))
    }

    fn issuer_allowed(&self, issuer: &str) -> bool {
        self.allowed_issuers.is_empty()
            || self
                .allowed_issuers
                .iter()
                .any(|allowed| *allowed == normalize_issuer(issuer))
    }
}

fn log_failure(err: &EdgeAuthError, request: &CanonicalRequest) {
    match err {
        EdgeAuthError::InternalServiceError { reason } => error!(
            method = %request.method,
            path = %request.path,
            error_code = err.code().as_str(),
            reason = %reason,
            "Unauthorized: verification keys unavailable"
        ),
        _ => info!(
            method = %request.method,
            path = %request.path,
            error_code = err.code().as_str(),
            reason = %err,
            "Unauthorized: invalid token"
        ),
    }
}

/// Credential presented by the caller, if any.
///
/// Reads `Authorization: Bearer <token>` (name and scheme case-insensitive),
/// then falls back to the percent-decoded `authorization` cookie.
#[must_use]
pub fn extract_bearer_token(headers: &Headers) -> Option<String> {
    headers
        .get_first(AUTHORIZATION)
        .and_then(bearer_from_header)
        .or_else(|| {
            headers
                .get(COOKIE)
                .and_then(|cookies| cookies.values().into_iter().find_map(cookie_credential))
        })
}

const COOKIE: &str = "cookie";

fn bearer_from_header(value: &str) -> Option<String> {
    let (scheme, token) = value.trim().split_once(char::is_whitespace)?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

fn cookie_credential(cookie_header: &str) -> Option<String> {
    cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name.trim() != AUTHORIZATION {
            return None;
        }
        let value = value.trim().trim_matches('"');
        let decoded = urlencoding::decode(value).map_or_else(|_| value.to_string(), |v| v.into_owned());
        (!decoded.is_empty()).then_some(decoded)
    })
}
