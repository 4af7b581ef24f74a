//! HTTP transport for requests sent to the authority
//!
//! All requests are POSTs. Each call chooses whether it needs to be sent over
//! mutual TLS; the transport holds a separate client carrying the configured
//! client identity for those calls.

use std::{path::Path, time::Duration};

use reqwest::{header, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::{ConfigError, MutualTlsConfig, ObConfig};
use crate::AccessTokenRef;

/// An error while sending a request to the authority or reading its response
#[derive(Debug, Error)]
pub enum AuthError {
    /// The authority responded with a non-success status
    #[error("authority responded with {status}: {body}")]
    Status {
        /// The response status
        status: StatusCode,
        /// The body of the response
        body: String,
    },
    /// Unable to send the request, including connection and TLS failures
    #[error("error sending request to authority")]
    Send(#[source] reqwest::Error),
    /// Unable to read the response
    #[error("error reading response body")]
    BodyRead(#[source] reqwest::Error),
    /// Unable to deserialize the response body
    #[error("error deserializing response body from authority")]
    Deserialize(#[from] serde_json::Error),
    /// Mutual TLS was requested, but no client identity is configured
    #[error("mutual TLS requested but no client identity is configured")]
    MutualTlsUnavailable,
}

/// Whether a request must present the client's transport certificate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsMode {
    /// Ordinary server-authenticated TLS, or plain HTTP
    Standard,
    /// TLS presenting the configured client identity
    Mutual,
}

/// Authorization attached to an outgoing request
#[derive(Clone, Copy, Debug)]
pub enum Authorization<'a> {
    /// No `Authorization` header
    None,
    /// A pre-computed header value, such as HTTP Basic credentials
    Header(&'a header::HeaderValue),
    /// A bearer access token
    Bearer(&'a AccessTokenRef),
}

impl Authorization<'_> {
    fn apply(self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::None => request,
            Self::Header(value) => request.header(header::AUTHORIZATION, value.clone()),
            Self::Bearer(token) => request.bearer_auth(token.as_str()),
        }
    }
}

/// A manner of attaching a serializable payload to a request
pub trait RequestType {
    /// Attaches the serializable payload to the request body
    fn attach_payload<S: Serialize + ?Sized>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder;
}

/// Attaches the payload to the request body as JSON
#[derive(Debug)]
pub struct JsonBody;

/// Attaches the payload to the request body as URL-encoded form data
#[derive(Debug)]
pub struct FormBody;

impl RequestType for JsonBody {
    fn attach_payload<S: Serialize + ?Sized>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder {
        request.json(payload)
    }
}

impl RequestType for FormBody {
    fn attach_payload<S: Serialize + ?Sized>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder {
        request.form(payload)
    }
}

/// HTTP clients used to talk to the authority
#[derive(Clone, Debug)]
pub struct Transport {
    client: reqwest::Client,
    mutual_tls_client: Option<reqwest::Client>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl Transport {
    /// Constructs a transport without mutual TLS support
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            mutual_tls_client: None,
        }
    }

    /// Adds a client presenting a client identity, used for mutual TLS calls
    pub fn with_mutual_tls_client(mut self, client: reqwest::Client) -> Self {
        self.mutual_tls_client = Some(client);
        self
    }

    /// Starts building a transport
    pub fn builder() -> TransportBuilder {
        TransportBuilder::default()
    }

    /// Builds a transport from configuration, loading any mutual TLS material
    pub async fn from_config(config: &ObConfig) -> Result<Self, ConfigError> {
        Self::builder().build(config).await
    }

    /// Whether this transport is able to make mutual TLS calls
    pub fn has_mutual_tls(&self) -> bool {
        self.mutual_tls_client.is_some()
    }

    fn client_for(&self, tls: TlsMode) -> Result<&reqwest::Client, AuthError> {
        match tls {
            TlsMode::Standard => Ok(&self.client),
            TlsMode::Mutual => self
                .mutual_tls_client
                .as_ref()
                .ok_or(AuthError::MutualTlsUnavailable),
        }
    }

    /// Sends `payload` to `url` and decodes a JSON response
    ///
    /// Exactly one request is made. Any failure to send, a non-success
    /// status, or an undecodable body is returned as an error.
    #[tracing::instrument(
        err,
        skip(self, authorization, payload),
        fields(url = %url, tls = ?tls),
    )]
    pub async fn post<T, S, R>(
        &self,
        url: &Url,
        authorization: Authorization<'_>,
        payload: &S,
        tls: TlsMode,
    ) -> Result<R, AuthError>
    where
        T: RequestType,
        S: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let client = self.client_for(tls)?;

        tracing::trace!("sending request to authority");

        let req = T::attach_payload(authorization.apply(client.post(url.clone())), payload);
        let resp = req.send().await.map_err(AuthError::Send)?;

        let status = resp.status();
        tracing::debug!(
            response.status = status.as_u16(),
            "received response from authority"
        );

        if !status.is_success() {
            let body = resp.text().await.map_err(AuthError::BodyRead)?;
            return Err(AuthError::Status { status, body });
        }

        let body = resp.bytes().await.map_err(AuthError::BodyRead)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Builder for a [`Transport`]
#[derive(Debug, Default)]
pub struct TransportBuilder {
    timeout: Option<Duration>,
}

impl TransportBuilder {
    /// Sets a total timeout applied to each request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn client_builder(&self) -> reqwest::ClientBuilder {
        let builder = reqwest::Client::builder().use_rustls_tls();
        match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    /// Builds the transport, loading mutual TLS material named in `config`
    pub async fn build(self, config: &ObConfig) -> Result<Transport, ConfigError> {
        let client = self
            .client_builder()
            .build()
            .map_err(ConfigError::HttpClient)?;

        let mut transport = Transport::new(client);
        if let Some(mtls) = config.mutual_tls() {
            transport = transport.with_mutual_tls_client(self.mutual_tls_client(mtls).await?);
        }

        Ok(transport)
    }

    async fn mutual_tls_client(
        &self,
        mtls: &MutualTlsConfig,
    ) -> Result<reqwest::Client, ConfigError> {
        let mut identity = read_pem(&mtls.client_cert).await?;
        identity.push(b'\n');
        identity.extend(read_pem(&mtls.client_key).await?);
        let identity =
            reqwest::Identity::from_pem(&identity).map_err(ConfigError::InvalidCertificate)?;

        let server_ca = read_pem(&mtls.server_ca).await?;
        let server_ca =
            reqwest::Certificate::from_pem(&server_ca).map_err(ConfigError::InvalidCertificate)?;

        tracing::debug!(
            client_cert = %mtls.client_cert.display(),
            server_ca = %mtls.server_ca.display(),
            "loaded mutual TLS material"
        );

        self.client_builder()
            .tls_built_in_root_certs(false)
            .add_root_certificate(server_ca)
            .identity(identity)
            .build()
            .map_err(ConfigError::HttpClient)
    }
}

async fn read_pem(path: &Path) -> Result<Vec<u8>, ConfigError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| ConfigError::ReadCertificate {
            path: path.to_owned(),
            source,
        })
}
