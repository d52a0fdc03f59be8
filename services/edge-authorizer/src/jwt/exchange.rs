//! Opaque credential exchange.
//!
//! Some callers present a client secret instead of a token. When an exchange
//! is configured the authenticator trades such a credential for a verifiable
//! token once before giving up.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::EdgeAuthError;

/// Capability: exchange an opaque credential for a verifiable token.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    /// Returns a token standing in for `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeAuthError::Unauthorized`] when the credential is refused
    /// or the exchange cannot be completed.
    async fn exchange(&self, credential: &str) -> Result<String, EdgeAuthError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OAuth2 `client_credentials` exchange against a token endpoint.
pub struct TokenEndpointExchange {
    client: Client,
    token_url: Url,
}

impl TokenEndpointExchange {
    /// Creates an exchange posting to `token_url`.
    #[must_use]
    pub const fn new(client: Client, token_url: Url) -> Self {
        Self { client, token_url }
    }
}

#[async_trait]
impl CredentialExchange for TokenEndpointExchange {
    async fn exchange(&self, credential: &str) -> Result<String, EdgeAuthError> {
        let response = self
            .client
            .post(self.token_url.clone())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_secret", credential),
            ])
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "Credential exchange request failed");
                EdgeAuthError::unauthorized("credential exchange unavailable")
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Credential exchange refused");
            return Err(EdgeAuthError::unauthorized(format!(
                "credential exchange refused with {status}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|_| EdgeAuthError::unauthorized("credential exchange response malformed"))?;

        if body.access_token.is_empty() {
            return Err(EdgeAuthError::unauthorized("credential exchange returned no token"));
        }
        Ok(body.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn exchange_for(server: &MockServer) -> TokenEndpointExchange {
        let url = Url::parse(&format!("{}/oauth/token", server.uri())).unwrap();
        TokenEndpointExchange::new(Client::new(), url)
    }

    #[tokio::test]
    async fn test_exchange_returns_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_secret=sc_opaque"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "a.b.c",
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let token = exchange_for(&server).exchange("sc_opaque").await.unwrap();
        assert_eq!(token, "a.b.c");
    }

    #[tokio::test]
    async fn test_refusal_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let err = exchange_for(&server).exchange("bad").await.unwrap_err();
        assert!(matches!(err, EdgeAuthError::Unauthorized { .. }));
    }
}
