//! Client configuration
//!
//! Configuration is read once at start-up. Every required value is checked up
//! front so that a missing client ID or endpoint is reported immediately rather
//! than surfacing as a malformed request to the authority.

use std::{env, path::PathBuf};

use thiserror::Error;
use url::Url;

use crate::{ClientId, ClientSecret, Scope};

/// Environment variable holding the authorization server's base URL
pub const ENV_ISSUER: &str = "OB_SERVER_IAM_URL";
/// Environment variable holding the client ID
pub const ENV_CLIENT_ID: &str = "OB_CLIENT_ID";
/// Environment variable holding the client secret
pub const ENV_CLIENT_SECRET: &str = "OB_CLIENT_SECRET";
/// Environment variable holding the space-delimited scopes to request
pub const ENV_SCOPES: &str = "OB_CLIENT_SCOPES";
/// Environment variable holding the client application's public base URL
pub const ENV_BASE_URL: &str = "OB_CLIENT_BASE_URL";
/// Environment variable overriding the redirect URI used in code exchanges
pub const ENV_REDIRECT_URI: &str = "OB_CLIENT_REDIRECT_URI";
/// Environment variable holding the account management API base URL
pub const ENV_ACCOUNT_MANAGEMENT_URL: &str = "OB_SERVER_AM_URL";
/// Environment variable holding the path to the client transport certificate
pub const ENV_TRANSPORT_CERT: &str = "OB_CLIENT_TRANSPORT_CERT";
/// Environment variable holding the path to the client transport key
pub const ENV_TRANSPORT_KEY: &str = "OB_CLIENT_TRANSPORT_KEY";
/// Environment variable holding the path to the server's CA certificate
pub const ENV_SERVER_CA: &str = "OB_SERVER_TRANSPORT_CERT";

const CALLBACK_PATH: &str = "/auth/callback";

/// An error in the client configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not provided
    #[error("missing required configuration value `{var}`")]
    Missing {
        /// The name of the missing setting
        var: &'static str,
    },
    /// A setting that should hold a URL could not be parsed
    #[error("configuration value `{var}` is not a valid URL")]
    InvalidUrl {
        /// The name of the offending setting
        var: &'static str,
        /// The underlying parse error
        source: url::ParseError,
    },
    /// Only some of the mutual TLS settings were provided
    #[error("mutual TLS requires the transport certificate, transport key and server CA to all be set")]
    IncompleteMutualTls,
    /// A certificate or key file could not be read
    #[error("unable to read `{}`", .path.display())]
    ReadCertificate {
        /// The file that could not be read
        path: PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },
    /// A certificate or key was not valid PEM
    #[error("invalid certificate or key material")]
    InvalidCertificate(#[source] reqwest::Error),
    /// The HTTP client could not be constructed
    #[error("unable to construct HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

/// Paths to the PEM files used for mutual TLS with the authority
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutualTlsConfig {
    /// Path to the client's transport certificate
    pub client_cert: PathBuf,
    /// Path to the private key for the client's transport certificate
    pub client_key: PathBuf,
    /// Path to the CA certificate used to validate the server
    pub server_ca: PathBuf,
}

/// Settings describing this client and the authority it talks to
#[derive(Clone, Debug)]
pub struct ObConfig {
    client_id: ClientId,
    client_secret: ClientSecret,
    scope: Scope,
    token_endpoint: Url,
    authorize_endpoint: Url,
    redirect_uri: Url,
    account_management_url: Option<Url>,
    mutual_tls: Option<MutualTlsConfig>,
}

impl ObConfig {
    /// Constructs a configuration from explicit values
    ///
    /// The token and authorization endpoints are derived from `issuer` as
    /// `{issuer}/oauth2/token` and `{issuer}/oauth2/authorize`.
    pub fn new(
        issuer: &str,
        client_id: ClientId,
        client_secret: ClientSecret,
        scope: Scope,
        redirect_uri: &str,
    ) -> Result<Self, ConfigError> {
        let issuer = issuer.trim_end_matches('/');
        Ok(Self {
            client_id,
            client_secret,
            scope,
            token_endpoint: parse_url(ENV_ISSUER, &format!("{issuer}/oauth2/token"))?,
            authorize_endpoint: parse_url(ENV_ISSUER, &format!("{issuer}/oauth2/authorize"))?,
            redirect_uri: parse_url(ENV_REDIRECT_URI, redirect_uri)?,
            account_management_url: None,
            mutual_tls: None,
        })
    }

    /// Reads the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Reads the configuration using `lookup` to resolve each setting
    ///
    /// Empty values are treated as absent. The redirect URI defaults to the
    /// client's base URL with `/auth/callback` appended.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let get = |var: &'static str| lookup(var).filter(|v: &String| !v.is_empty());
        let require = |var: &'static str| get(var).ok_or(ConfigError::Missing { var });

        let issuer = require(ENV_ISSUER)?;
        let client_id = ClientId::new(require(ENV_CLIENT_ID)?);
        let client_secret = ClientSecret::new(require(ENV_CLIENT_SECRET)?);
        let scope = Scope::new(get(ENV_SCOPES).unwrap_or_default());

        let redirect_uri = match get(ENV_REDIRECT_URI) {
            Some(uri) => uri,
            None => {
                let base = require(ENV_BASE_URL)?;
                format!("{}{CALLBACK_PATH}", base.trim_end_matches('/'))
            }
        };

        let mut config = Self::new(&issuer, client_id, client_secret, scope, &redirect_uri)?;

        if let Some(am) = get(ENV_ACCOUNT_MANAGEMENT_URL) {
            config.account_management_url = Some(parse_url(ENV_ACCOUNT_MANAGEMENT_URL, &am)?);
        }

        config.mutual_tls = match (
            get(ENV_TRANSPORT_CERT),
            get(ENV_TRANSPORT_KEY),
            get(ENV_SERVER_CA),
        ) {
            (Some(cert), Some(key), Some(ca)) => Some(MutualTlsConfig {
                client_cert: cert.into(),
                client_key: key.into(),
                server_ca: ca.into(),
            }),
            (None, None, None) => None,
            _ => return Err(ConfigError::IncompleteMutualTls),
        };

        tracing::debug!(
            client_id = %config.client_id,
            token_endpoint = %config.token_endpoint,
            redirect_uri = %config.redirect_uri,
            mutual_tls = config.mutual_tls.is_some(),
            "loaded client configuration"
        );

        Ok(config)
    }

    /// Sets the account management API base URL
    pub fn with_account_management_url(mut self, url: Url) -> Self {
        self.account_management_url = Some(url);
        self
    }

    /// Sets the files used for mutual TLS
    pub fn with_mutual_tls(mut self, mutual_tls: MutualTlsConfig) -> Self {
        self.mutual_tls = Some(mutual_tls);
        self
    }

    /// The client ID
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// The client secret
    pub fn client_secret(&self) -> &ClientSecret {
        &self.client_secret
    }

    /// The scope requested in token and authorization requests
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The authority's token endpoint
    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    /// The authority's authorization endpoint
    pub fn authorize_endpoint(&self) -> &Url {
        &self.authorize_endpoint
    }

    /// The redirect URI registered for this client
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// The account management API base URL, if configured
    pub fn account_management_url(&self) -> Option<&Url> {
        self.account_management_url.as_ref()
    }

    /// The mutual TLS files, if configured
    pub fn mutual_tls(&self) -> Option<&MutualTlsConfig> {
        self.mutual_tls.as_ref()
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { var, source })
}
