//! Grant strategies for obtaining tokens from the authority

use std::error;

use async_trait::async_trait;

use crate::TokenResponse;

mod authorization_code;
mod client_credentials;
mod refresh_token;

pub use authorization_code::{AuthorizationCodeGrant, AuthorizationCodeParams};
pub use client_credentials::{basic_authorization, ClientCredentialsGrant, ClientCredentialsParams};
pub use refresh_token::{RefreshTokenGrant, RefreshTokenParams};

/// A way of obtaining a token from an authority
///
/// Each call to [`exchange()`][Self::exchange()] performs exactly one request
/// against the authority. Strategies do not retry, and every failure is
/// returned to the caller.
#[async_trait]
pub trait GrantStrategy: Send + Sync {
    /// Grant-specific inputs supplied by the caller
    type Params: Send + 'static;

    /// The error type returned in the event that the exchange fails
    type Error: error::Error + Send + Sync + 'static;

    /// The OAuth2 `grant_type` this strategy performs
    fn grant_type(&self) -> &'static str;

    /// Exchanges `params` for a token
    async fn exchange(&self, params: Self::Params) -> Result<TokenResponse, Self::Error>;
}
