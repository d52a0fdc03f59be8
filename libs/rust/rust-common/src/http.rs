//! Outbound HTTP to identity providers.
//!
//! Upstream documents (discovery documents, key sets, token responses) are
//! small JSON payloads fetched over TLS. Connections are kept warm between
//! invocations of the same process.

use crate::PlatformError;
use reqwest::{Client, ClientBuilder, header};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Outbound client settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request deadline
    pub timeout: Duration,
    /// Deadline for establishing the connection alone
    pub connect_timeout: Duration,
    /// Sent as `User-Agent`
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            user_agent: concat!("edge-authorizer/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    /// Sets the whole-request deadline. The connect deadline never exceeds it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.connect_timeout = self.connect_timeout.min(timeout);
        self
    }
}

/// Builds the shared client.
///
/// # Errors
///
/// Fails when the TLS backend cannot be initialised.
///
/// # Examples
///
/// ```
/// use rust_common::{HttpConfig, build_http_client};
/// use std::time::Duration;
///
/// let config = HttpConfig::default().with_timeout(Duration::from_secs(3));
/// assert!(build_http_client(&config).is_ok());
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(Duration::from_secs(60))
        .user_agent(config.user_agent.as_str())
        .use_rustls_tls()
        .build()
}

/// GET a JSON document, optionally presenting a bearer credential.
///
/// # Errors
///
/// Returns [`PlatformError::Transport`] on transport failure,
/// [`PlatformError::Status`] on a non-success status and
/// [`PlatformError::Decode`] when the body is not the expected JSON.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    bearer: Option<&str>,
) -> Result<T, PlatformError> {
    let mut request = client.get(url).header(header::ACCEPT, "application/json");
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(PlatformError::from_status(status.as_u16(), url));
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| PlatformError::decode(url, err))
}
