//! OAuth2 token acquisition and per-session caching for Open Banking clients
//!
//! This library obtains access tokens from an Open Banking authorization server
//! and remembers them per browser session, so that a web front end can start an
//! interactive login, exchange the returned authorization code, and reuse the
//! resulting token for the rest of the session.
//!
//! # General Flow (Authorization Code)
//!
//! On application start-up, load the configuration, build the transport (which
//! loads any mutual TLS material) and construct a single [`TokenCache`] around
//! the grant strategy. The cache is then shared with request handlers.
//!
//! The login handler redirects the user to the URL of a fresh
//! [`AuthorizationRequest`]. The callback handler generates a [`SessionKey`],
//! exchanges the code through the cache, and hands the key to the browser.
//! Later handlers look the token up by session key.
//!
//! ```no_run
//! use obauth::grants::{AuthorizationCodeGrant, AuthorizationCodeParams};
//! use obauth::{AuthorizationCode, AuthorizationRequest, ObConfig, SessionKey, TokenCache, Transport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ObConfig::from_env()?;
//! let transport = Transport::from_config(&config).await?;
//! let cache = TokenCache::new(AuthorizationCodeGrant::from_config(&config, transport));
//!
//! // Login: send the browser to the authority
//! let login = AuthorizationRequest::new(&config);
//! tracing::info!(url = %login.url(), "redirecting to authority");
//!
//! // Callback: exchange the code and remember the token for this session
//! let session = SessionKey::generate();
//! let code = AuthorizationCode::from_static("code-from-callback");
//! let record = cache
//!     .get_or_retrieve(&session, AuthorizationCodeParams::new(code))
//!     .await?;
//!
//! // Later requests: look the token up again
//! let same = cache.get(&session).await;
//! assert_eq!(same.map(|r| r.expires_at()), Some(record.expires_at()));
//! # Ok(())
//! # }
//! ```
//!
//! # Expiry
//!
//! By default the cache returns a session's token even after it has expired;
//! see [`ExpiryPolicy`] for opting in to reacquisition, and
//! [`TokenCache::refresh()`] for refreshing with a refresh token.
//!
//! # Features
//!
//! * `consent` (default): Provides [`consent::ConsentClient`] for registering
//!   account-access consents with the account management API.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod authorize;
mod braids;
pub mod cache;
pub mod clock;
pub mod config;
#[cfg(feature = "consent")]
#[cfg_attr(docsrs, doc(cfg(feature = "consent")))]
pub mod consent;
pub mod grants;
mod tokens;
pub mod transport;

#[cfg(test)]
mod test_util;

pub use authorize::{random_string, AuthorizationRequest};
pub use braids::*;
pub use cache::{ExpiryPolicy, TokenCache};
pub use config::{ConfigError, ObConfig};
pub use tokens::{TokenRecord, TokenResponse, DEFAULT_TOKEN_LIFETIME};
pub use transport::{AuthError, Transport};
