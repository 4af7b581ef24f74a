use serde::{Deserialize, Serialize};

use crate::clock::{Clock, DurationSecs, System, UnixTime};
use crate::{AccessToken, AccessTokenRef, IdToken, RefreshToken, RefreshTokenRef, Scope, TokenType};

/// Lifetime assumed for a token when the authority does not report `expires_in`
pub const DEFAULT_TOKEN_LIFETIME: DurationSecs = DurationSecs(3600);

/// A token response as returned by the authority's token endpoint
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    /// The issued access token
    pub access_token: AccessToken,
    /// The type of token issued, usually `Bearer`
    pub token_type: TokenType,
    /// The number of seconds the access token is valid for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<DurationSecs>,
    /// The scope granted, if it differs from the one requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    /// A refresh token, if the authority issued one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<RefreshToken>,
    /// An OpenID Connect ID token, if the authority issued one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<IdToken>,
}

/// A token held by the token cache, along with the time at which it expires
///
/// Records are never mutated once created. A refreshed token replaces the
/// record wholesale.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenRecord {
    access_token: AccessToken,
    token_type: TokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_in: Option<DurationSecs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<RefreshToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<IdToken>,
    expires_at: UnixTime,
}

impl TokenRecord {
    /// Builds a record from a token response received at `issued`
    ///
    /// If the response does not carry `expires_in`, the token is assumed to be
    /// valid for [`DEFAULT_TOKEN_LIFETIME`].
    pub fn from_response(response: TokenResponse, issued: UnixTime) -> Self {
        let lifetime = response.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME);
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            scope: response.scope,
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            expires_at: issued + lifetime,
        }
    }

    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the token type
    #[inline]
    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }

    /// Gets the lifetime reported by the authority, if any
    #[inline]
    pub fn expires_in(&self) -> Option<DurationSecs> {
        self.expires_in
    }

    /// Gets the granted scope, if reported
    #[inline]
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    /// Gets the refresh token, if one was issued
    #[inline]
    pub fn refresh_token(&self) -> Option<&RefreshTokenRef> {
        self.refresh_token.as_deref()
    }

    /// Gets the ID token, if one was issued
    #[inline]
    pub fn id_token(&self) -> Option<&IdToken> {
        self.id_token.as_ref()
    }

    /// Gets the time at which the token expires
    #[inline]
    pub fn expires_at(&self) -> UnixTime {
        self.expires_at
    }

    /// Whether the token has expired according to the system clock
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_clock(&System)
    }

    /// Whether the token has expired according to the provided clock
    #[inline]
    pub fn is_expired_with_clock<C: Clock>(&self, clock: &C) -> bool {
        self.is_expired_at(clock.now())
    }

    /// Whether the token would be expired as of the provided time
    #[inline]
    pub fn is_expired_at(&self, time: UnixTime) -> bool {
        time >= self.expires_at
    }

    /// Gets a duration for how much longer the token would be valid as of the
    /// provided time
    #[inline]
    pub fn until_expired_at(&self, time: UnixTime) -> DurationSecs {
        if time < self.expires_at {
            self.expires_at - time
        } else {
            DurationSecs(0)
        }
    }
}
