use aliri_braid::braid;
use std::fmt;

/// Implements `Debug` and `Display` for a secret borrowed braid
///
/// Plain formatting prints only a `***LABEL***` placeholder. The alternate
/// form (`{:#?}`) reveals at most the given number of characters, or the
/// formatter's width when one is set.
macro_rules! limited_reveal {
    ($ty:ty: $hidden:literal, $default:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str("\"")?;
                    limited_reveal(&self.0, &mut *f, $default)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    limited_reveal(&self.0, &mut *f, usize::MAX)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }
    };
}

/// Writes at most `default_len` characters of a secret, ending with `…` when
/// the value was cut short
fn limited_reveal(unprotected: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        f.write_str("…")
    } else if max_len > unprotected.len() {
        f.write_str(unprotected)
    } else {
        match unprotected.char_indices().nth(max_len - 2) {
            Some((idx, c)) if idx + c.len_utf8() < unprotected.len() => {
                f.write_str(&unprotected[0..idx + c.len_utf8()])?;
                f.write_str("…")
            }
            _ => f.write_str(unprotected),
        }
    }
}

/// A client ID registered with the authorization server
#[braid(serde)]
pub struct ClientId;

/// A client secret
#[braid(serde, debug = "owned", display = "owned")]
pub struct ClientSecret;

limited_reveal!(ClientSecretRef: "CLIENT SECRET", 5);

/// An OAuth2 authorization code, as delivered to the redirect URI
#[braid(serde, debug = "owned", display = "owned")]
pub struct AuthorizationCode;

limited_reveal!(AuthorizationCodeRef: "AUTHORIZATION CODE", 5);

/// An access token
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

limited_reveal!(AccessTokenRef: "ACCESS TOKEN", 15);

/// A refresh token
#[braid(serde, debug = "owned", display = "owned")]
pub struct RefreshToken;

limited_reveal!(RefreshTokenRef: "REFRESH TOKEN", 5);

/// An OpenID Connect ID token
#[braid(serde)]
pub struct IdToken;

/// The token type reported by the authority, usually `Bearer`
#[braid(serde)]
pub struct TokenType;

/// A space-delimited OAuth2 scope string
#[braid(serde)]
pub struct Scope;

/// An opaque key correlating a browser session with a cached token
///
/// Session keys are generated outside of this crate and must be treated
/// as untrusted input.
#[braid(serde)]
pub struct SessionKey;

impl SessionKey {
    /// Generates a fresh random session key in the form of a v4 UUID
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

/// An anti-forgery value round-tripped through the authorization server
#[braid(serde)]
pub struct State;

/// A replay-protection value bound into the issued ID token
#[braid(serde)]
pub struct Nonce;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_hidden_by_default() {
        let secret = ClientSecret::from_static("super-secret-value");
        assert_eq!(format!("{}", secret), "***CLIENT SECRET***");
        assert_eq!(format!("{:?}", secret), "***CLIENT SECRET***");
    }

    #[test]
    fn alternate_debug_reveals_a_prefix() {
        let token = RefreshToken::from_static("abcdefghijkl");
        assert_eq!(format!("{:#?}", token), "\"abcd…\"");
    }

    #[test]
    fn alternate_display_reveals_everything() {
        let token = AccessToken::from_static("abcdefghijkl");
        assert_eq!(format!("{:#}", token), "abcdefghijkl");
    }

    #[test]
    fn generated_session_keys_are_unique() {
        let a = SessionKey::generate();
        let b = SessionKey::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }
}
