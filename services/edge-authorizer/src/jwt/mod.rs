//! Bearer-token verification and the issuer keys behind it.

pub mod authenticator;
pub mod claims;
pub mod discovery;
pub mod exchange;
pub mod key_cache;
pub mod key_resolver;
pub mod token;

pub use authenticator::{TokenAuthenticator, extract_bearer_token};
pub use claims::Claims;
pub use exchange::{CredentialExchange, TokenEndpointExchange};
pub use key_cache::{Jwk, JwkSet, KeyCache, ResolvedKey};
pub use key_resolver::{KeyResolver, OidcKeyResolver};
pub use token::{ALLOWED_ALGORITHMS, Peeked, Token, TokenState, Verified};
