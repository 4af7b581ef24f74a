//! Authorization request construction
//!
//! The interactive login starts by redirecting the user's browser to the
//! authority's authorization endpoint. Each request carries a fresh `state`
//! and `nonce` which the caller should remember for the callback.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use url::Url;

use crate::{Nonce, NonceRef, ObConfig, State, StateRef};

const RANDOM_BYTES: usize = 16;

/// Generates `len` random bytes encoded as unpadded base64url
pub fn random_string(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A request to the authority's authorization endpoint
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
    url: Url,
    state: State,
    nonce: Nonce,
}

impl AuthorizationRequest {
    /// Builds an authorization request with freshly generated `state` and `nonce`
    pub fn new(config: &ObConfig) -> Self {
        Self::with_values(
            config,
            State::new(random_string(RANDOM_BYTES)),
            Nonce::new(random_string(RANDOM_BYTES)),
        )
    }

    /// Builds an authorization request with the given `state` and `nonce`
    pub fn with_values(config: &ObConfig, state: State, nonce: Nonce) -> Self {
        let mut url = config.authorize_endpoint().clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", config.client_id().as_str())
            .append_pair("redirect_uri", config.redirect_uri().as_str())
            .append_pair("scope", config.scope().as_str())
            .append_pair("state", state.as_str())
            .append_pair("nonce", nonce.as_str())
            .append_pair("prompt", "login");

        tracing::debug!(authorization_url = %url, "built authorization URL");

        Self { url, state, nonce }
    }

    /// The URL to redirect the user's browser to
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The anti-forgery value embedded in the request
    pub fn state(&self) -> &StateRef {
        &self.state
    }

    /// The replay-protection value embedded in the request
    pub fn nonce(&self) -> &NonceRef {
        &self.nonce
    }

    /// Consumes the request, returning the URL
    pub fn into_url(self) -> Url {
        self.url
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_util::{static_config, REDIRECT_URI};

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn random_strings_are_unpadded_base64url() {
        let s = random_string(16);

        assert_eq!(s.len(), 22);
        assert!(s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn url_carries_all_parameters() {
        let request = AuthorizationRequest::with_values(
            &static_config(),
            State::from_static("st"),
            Nonce::from_static("nn"),
        );

        assert_eq!(
            request.url().as_str(),
            "https://iam.example.com/oauth2/authorize?response_type=code&client_id=id\
             &redirect_uri=https%3A%2F%2Fchat.example.com%2Fauth%2Fcallback\
             &scope=accounts+openid&state=st&nonce=nn&prompt=login"
        );
    }

    #[test]
    fn each_request_gets_fresh_state_and_nonce() {
        let config = static_config();
        let first = AuthorizationRequest::new(&config);
        let second = AuthorizationRequest::new(&config);

        assert_ne!(first.state(), second.state());
        assert_ne!(first.nonce(), second.nonce());

        let mut a = query(first.url());
        let mut b = query(second.url());
        assert_eq!(a.remove("state").as_deref(), Some(first.state().as_str()));
        assert_eq!(b.remove("nonce").as_deref(), Some(second.nonce().as_str()));
        a.remove("nonce");
        b.remove("state");
        assert_eq!(a, b);
        assert_eq!(a.get("redirect_uri").map(String::as_str), Some(REDIRECT_URI));
    }
}
