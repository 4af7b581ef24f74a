use wiremock::MockServer;

use crate::{ClientId, ClientSecret, ObConfig, Scope};

pub(crate) const REDIRECT_URI: &str = "https://chat.example.com/auth/callback";

/// A configuration whose issuer is the mock server
pub(crate) fn config_for(server: &MockServer) -> ObConfig {
    ObConfig::new(
        &server.uri(),
        ClientId::from_static("id"),
        ClientSecret::from_static("secret"),
        Scope::from_static("accounts openid"),
        REDIRECT_URI,
    )
    .unwrap()
}

/// A configuration pointing at a fixed, unreachable issuer
pub(crate) fn static_config() -> ObConfig {
    ObConfig::new(
        "https://iam.example.com",
        ClientId::from_static("id"),
        ClientSecret::from_static("secret"),
        Scope::from_static("accounts openid"),
        REDIRECT_URI,
    )
    .unwrap()
}
