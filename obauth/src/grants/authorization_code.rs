use async_trait::async_trait;
use url::Url;

use super::{ClientCredentialsGrant, GrantStrategy};
use crate::transport::{AuthError, Transport};
use crate::{AuthorizationCode, ObConfig, TokenResponse};

/// Parameters for an authorization code exchange
#[derive(Debug)]
pub struct AuthorizationCodeParams {
    /// The code delivered to the redirect URI
    pub code: AuthorizationCode,
}

impl AuthorizationCodeParams {
    /// Constructs parameters for exchanging `code`
    pub fn new(code: AuthorizationCode) -> Self {
        Self { code }
    }
}

impl From<AuthorizationCode> for AuthorizationCodeParams {
    fn from(code: AuthorizationCode) -> Self {
        Self::new(code)
    }
}

/// Exchanges an authorization code for tokens
///
/// Client authentication, the token endpoint and the TLS mode all come from
/// the wrapped [`ClientCredentialsGrant`]; only the request body differs.
#[derive(Clone, Debug)]
pub struct AuthorizationCodeGrant {
    client_credentials: ClientCredentialsGrant,
    redirect_uri: Url,
}

impl AuthorizationCodeGrant {
    /// Constructs a grant on top of an existing client credentials grant
    pub fn new(client_credentials: ClientCredentialsGrant, redirect_uri: Url) -> Self {
        Self {
            client_credentials,
            redirect_uri,
        }
    }

    /// Constructs a grant using the configured credentials and redirect URI
    pub fn from_config(config: &ObConfig, transport: Transport) -> Self {
        Self::new(
            ClientCredentialsGrant::new(config, transport),
            config.redirect_uri().clone(),
        )
    }

    /// The client credentials grant used to send requests
    pub fn client_credentials(&self) -> &ClientCredentialsGrant {
        &self.client_credentials
    }

    /// The redirect URI sent with each exchange
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }
}

#[async_trait]
impl GrantStrategy for AuthorizationCodeGrant {
    type Params = AuthorizationCodeParams;
    type Error = AuthError;

    fn grant_type(&self) -> &'static str {
        "authorization_code"
    }

    async fn exchange(&self, params: Self::Params) -> Result<TokenResponse, Self::Error> {
        let extra = [
            ("code", params.code.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        self.client_credentials
            .post_token_request(self.grant_type(), None, &extra)
            .await
    }
}
