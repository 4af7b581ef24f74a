use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::HeaderValue;
use url::Url;

use super::GrantStrategy;
use crate::transport::{AuthError, Authorization, FormBody, TlsMode, Transport};
use crate::{ClientIdRef, ClientSecretRef, ObConfig, Scope, ScopeRef, TokenResponse};

/// Builds an HTTP Basic `Authorization` header value from client credentials
pub fn basic_authorization(client_id: &ClientIdRef, client_secret: &ClientSecretRef) -> HeaderValue {
    let encoded = STANDARD.encode(format!("{}:{}", client_id.as_str(), client_secret.as_str()));
    let mut value = HeaderValue::try_from(format!("Basic {encoded}"))
        .expect("base64 output is always a valid header value");
    value.set_sensitive(true);
    value
}

/// Parameters for a client credentials exchange
#[derive(Debug, Default)]
pub struct ClientCredentialsParams {
    /// Overrides the configured scope for this request
    pub scope: Option<Scope>,
}

/// Obtains tokens with the client credentials grant
///
/// The client authenticates with HTTP Basic credentials. When the transport
/// has a client identity configured, requests are made over mutual TLS.
#[derive(Clone, Debug)]
pub struct ClientCredentialsGrant {
    transport: Transport,
    token_endpoint: Url,
    scope: Scope,
    authorization: HeaderValue,
    tls: TlsMode,
}

impl ClientCredentialsGrant {
    /// Constructs a new client credentials grant
    pub fn new(config: &ObConfig, transport: Transport) -> Self {
        let tls = if transport.has_mutual_tls() {
            TlsMode::Mutual
        } else {
            TlsMode::Standard
        };

        Self {
            transport,
            token_endpoint: config.token_endpoint().clone(),
            scope: config.scope().clone(),
            authorization: basic_authorization(config.client_id(), config.client_secret()),
            tls,
        }
    }

    /// Overrides whether requests are sent over mutual TLS
    pub fn with_tls_mode(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    /// The `Authorization` header value sent with each request
    pub fn authorization(&self) -> &HeaderValue {
        &self.authorization
    }

    /// The TLS mode used for requests
    pub fn tls_mode(&self) -> TlsMode {
        self.tls
    }

    /// The transport used for requests
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Posts a token request using this grant's credentials and endpoint
    ///
    /// The form always carries `grant_type` and the scope; `extra` fields are
    /// appended. Other grants built on top of client authentication use this to
    /// send their own body with the same credentials.
    #[tracing::instrument(
        err,
        skip_all,
        fields(
            token_url = %self.token_endpoint,
            credentials.grant_type = grant_type,
        ),
    )]
    pub(crate) async fn post_token_request(
        &self,
        grant_type: &str,
        scope: Option<&ScopeRef>,
        extra: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        let scope = scope.unwrap_or(&*self.scope);

        let mut form = Vec::with_capacity(extra.len() + 2);
        form.push(("grant_type", grant_type));
        form.push(("scope", scope.as_str()));
        form.extend_from_slice(extra);

        let resp: TokenResponse = self
            .transport
            .post::<FormBody, _, _>(
                &self.token_endpoint,
                Authorization::Header(&self.authorization),
                &form,
                self.tls,
            )
            .await?;

        tracing::info!(
            has_id_token = resp.id_token.is_some(),
            has_refresh_token = resp.refresh_token.is_some(),
            expires_in = resp.expires_in.map(|d| d.0),
            "received new tokens"
        );

        Ok(resp)
    }
}

#[async_trait]
impl GrantStrategy for ClientCredentialsGrant {
    type Params = ClientCredentialsParams;
    type Error = AuthError;

    fn grant_type(&self) -> &'static str {
        "client_credentials"
    }

    async fn exchange(&self, params: Self::Params) -> Result<TokenResponse, Self::Error> {
        self.post_token_request(self.grant_type(), params.scope.as_deref(), &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::test_util::{config_for, static_config};

    #[test]
    fn basic_header_is_base64_of_id_and_secret() {
        let value = basic_authorization(
            ClientIdRef::from_str("id"),
            ClientSecretRef::from_str("secret"),
        );

        assert_eq!(value.to_str().unwrap(), "Basic aWQ6c2VjcmV0");
        assert!(value.is_sensitive());
    }

    #[tokio::test]
    async fn posts_form_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(header("authorization", "Basic aWQ6c2VjcmV0"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("grant_type=client_credentials&scope=accounts+openid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "cc-token",
                "token_type": "Bearer",
                "expires_in": 600,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = ClientCredentialsGrant::new(&config_for(&server), Transport::default());
        let resp = grant
            .exchange(ClientCredentialsParams::default())
            .await
            .unwrap();

        assert_eq!(resp.access_token.as_str(), "cc-token");
        assert_eq!(resp.expires_in.map(|d| d.0), Some(600));
    }

    #[tokio::test]
    async fn scope_can_be_overridden_per_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string("grant_type=client_credentials&scope=payments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "cc-token",
                "token_type": "Bearer",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = ClientCredentialsGrant::new(&config_for(&server), Transport::default());
        grant
            .exchange(ClientCredentialsParams {
                scope: Some(Scope::from_static("payments")),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejection_is_surfaced_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .expect(1)
            .mount(&server)
            .await;

        let grant = ClientCredentialsGrant::new(&config_for(&server), Transport::default());
        let err = grant
            .exchange(ClientCredentialsParams::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AuthError::Status { status, ref body } if status.as_u16() == 401 && body == "invalid_client"
        ));
    }

    #[test]
    fn plain_transport_uses_standard_tls() {
        let config = static_config();
        let grant = ClientCredentialsGrant::new(&config, Transport::default());
        assert_eq!(grant.tls_mode(), TlsMode::Standard);

        let grant = ClientCredentialsGrant::new(
            &config,
            Transport::default().with_mutual_tls_client(reqwest::Client::new()),
        );
        assert_eq!(grant.tls_mode(), TlsMode::Mutual);
    }
}
