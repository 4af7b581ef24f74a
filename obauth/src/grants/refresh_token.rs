use async_trait::async_trait;
use serde::{Serialize, Serializer};
use url::Url;

use super::GrantStrategy;
use crate::transport::{AuthError, Authorization, FormBody, TlsMode, Transport};
use crate::{ClientId, ClientSecret, RefreshToken, TokenResponse};

/// Parameters for a refresh token exchange
///
/// Unlike the other grants, all inputs including the token endpoint are
/// supplied by the caller. Client credentials are sent in the request body.
#[derive(Debug)]
pub struct RefreshTokenParams {
    /// The refresh token being exchanged
    pub refresh_token: RefreshToken,

    /// The client ID
    pub client_id: ClientId,

    /// The client secret, if required
    pub client_secret: Option<ClientSecret>,

    /// The authority's token endpoint
    pub token_endpoint: Url,
}

impl Serialize for RefreshTokenParams {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut ser = serializer.serialize_struct("RefreshTokenParams", 4)?;
        ser.serialize_field("grant_type", "refresh_token")?;
        ser.serialize_field("refresh_token", &self.refresh_token)?;
        ser.serialize_field("client_id", &self.client_id)?;
        if let Some(secret) = &self.client_secret {
            ser.serialize_field("client_secret", secret)?;
        } else {
            ser.skip_field("client_secret")?;
        }
        ser.end()
    }
}

/// Exchanges a refresh token for a new access token
#[derive(Clone, Debug, Default)]
pub struct RefreshTokenGrant {
    transport: Transport,
}

impl RefreshTokenGrant {
    /// Constructs a new refresh token grant
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl GrantStrategy for RefreshTokenGrant {
    type Params = RefreshTokenParams;
    type Error = AuthError;

    fn grant_type(&self) -> &'static str {
        "refresh_token"
    }

    #[tracing::instrument(
        err,
        skip_all,
        fields(
            token_url = %params.token_endpoint,
            credentials.grant_type = self.grant_type(),
            credentials.client_id = %params.client_id,
        ),
    )]
    async fn exchange(&self, params: Self::Params) -> Result<TokenResponse, Self::Error> {
        let resp: TokenResponse = self
            .transport
            .post::<FormBody, _, _>(
                &params.token_endpoint,
                Authorization::None,
                &params,
                TlsMode::Standard,
            )
            .await?;

        if resp.refresh_token.is_some() {
            tracing::info!("received new refresh token");
        }

        Ok(resp)
    }
}
