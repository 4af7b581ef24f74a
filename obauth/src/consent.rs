//! Account-access consent initiation
//!
//! Before a user can grant access to their accounts, the client registers an
//! account-access consent with the bank's account management API using a
//! client credentials token.

use aliri_braid::braid;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::grants::{ClientCredentialsGrant, ClientCredentialsParams, GrantStrategy};
use crate::transport::{AuthError, Authorization, JsonBody};
use crate::ObConfig;

/// An account-access consent identifier issued by the bank
#[braid(serde)]
pub struct ConsentId;

/// An error while initiating an account-access consent
#[derive(Debug, Error)]
pub enum ConsentError {
    /// No account management API URL is configured
    #[error("account management URL is not configured")]
    MissingAccountManagementUrl,
    /// The consent endpoint URL could not be derived
    #[error("invalid consent endpoint URL")]
    InvalidUrl(#[from] url::ParseError),
    /// The client credentials token could not be obtained
    #[error("error obtaining client credentials token")]
    Token(#[source] AuthError),
    /// The consent request failed
    #[error("error requesting account-access consent")]
    Request(#[source] AuthError),
}

/// A permission requested in an account-access consent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    /// Read account details
    ReadAccountsDetail,
    /// Read transaction details
    ReadTransactionsDetail,
    /// Read balances
    ReadBalances,
}

/// The permissions requested by the assistant
pub const ACCOUNT_PERMISSIONS: [Permission; 3] = [
    Permission::ReadAccountsDetail,
    Permission::ReadTransactionsDetail,
    Permission::ReadBalances,
];

/// An account-access consent request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountAccessConsentRequest {
    data: ConsentRequestData,
    risk: Risk,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConsentRequestData {
    permissions: Vec<Permission>,
    expiration_date_time: String,
    transaction_from_date_time: String,
    transaction_to_date_time: String,
}

#[derive(Debug, Serialize)]
struct Risk {}

impl AccountAccessConsentRequest {
    /// A request for [`ACCOUNT_PERMISSIONS`] valid for one day from `now`
    ///
    /// Transactions are requested from `now` until the consent expires.
    pub fn for_accounts(now: DateTime<Utc>) -> Self {
        let expiry = iso_timestamp(now + Duration::days(1));
        Self {
            data: ConsentRequestData {
                permissions: ACCOUNT_PERMISSIONS.to_vec(),
                expiration_date_time: expiry.clone(),
                transaction_from_date_time: iso_timestamp(now),
                transaction_to_date_time: expiry,
            },
            risk: Risk {},
        }
    }
}

fn iso_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The bank's response to a consent request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsentResponse {
    /// The consent details
    pub data: ConsentResponseData,
}

/// The details of a registered consent
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsentResponseData {
    /// The identifier to reference in the authorization request
    pub consent_id: ConsentId,
    /// The consent's status, such as `AwaitingAuthorisation`
    pub status: String,
    /// The permissions the bank recorded
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Registers account-access consents with the account management API
#[derive(Clone, Debug)]
pub struct ConsentClient {
    client_credentials: ClientCredentialsGrant,
    consents_url: Url,
}

impl ConsentClient {
    /// Constructs a consent client
    ///
    /// Fails if the configuration has no account management URL.
    pub fn new(
        config: &ObConfig,
        client_credentials: ClientCredentialsGrant,
    ) -> Result<Self, ConsentError> {
        let base = config
            .account_management_url()
            .ok_or(ConsentError::MissingAccountManagementUrl)?;
        let consents_url = Url::parse(&format!(
            "{}/account-access-consents",
            base.as_str().trim_end_matches('/')
        ))?;

        Ok(Self {
            client_credentials,
            consents_url,
        })
    }

    /// The endpoint consents are posted to
    pub fn consents_url(&self) -> &Url {
        &self.consents_url
    }

    /// Obtains a client credentials token and registers an account-access consent
    #[tracing::instrument(err, skip_all, fields(consents_url = %self.consents_url))]
    pub async fn initiate_accounts_consent(&self) -> Result<ConsentResponse, ConsentError> {
        let token = self
            .client_credentials
            .exchange(ClientCredentialsParams::default())
            .await
            .map_err(ConsentError::Token)?;

        let payload = AccountAccessConsentRequest::for_accounts(Utc::now());

        let resp: ConsentResponse = self
            .client_credentials
            .transport()
            .post::<JsonBody, _, _>(
                &self.consents_url,
                Authorization::Bearer(&token.access_token),
                &payload,
                self.client_credentials.tls_mode(),
            )
            .await
            .map_err(ConsentError::Request)?;

        tracing::info!(
            consent_id = %resp.data.consent_id,
            status = %resp.data.status,
            "registered account-access consent"
        );

        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::test_util::{config_for, static_config};
    use crate::transport::Transport;

    #[test]
    fn request_body_matches_the_open_banking_shape() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        let body = serde_json::to_value(AccountAccessConsentRequest::for_accounts(now)).unwrap();

        assert_eq!(
            body,
            json!({
                "Data": {
                    "Permissions": ["ReadAccountsDetail", "ReadTransactionsDetail", "ReadBalances"],
                    "ExpirationDateTime": "2026-10-20T08:30:00Z",
                    "TransactionFromDateTime": "2026-10-19T08:30:00Z",
                    "TransactionToDateTime": "2026-10-20T08:30:00Z",
                },
                "Risk": {},
            })
        );
    }

    #[test]
    fn requires_an_account_management_url() {
        let config = static_config();
        let grant = ClientCredentialsGrant::new(&config, Transport::default());

        let err = ConsentClient::new(&config, grant).unwrap_err();

        assert!(matches!(err, ConsentError::MissingAccountManagementUrl));
    }

    #[tokio::test]
    async fn posts_consent_with_client_credentials_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "cc-token",
                "token_type": "Bearer",
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/am/account-access-consents"))
            .and(header("authorization", "Bearer cc-token"))
            .and(body_partial_json(json!({
                "Data": { "Permissions": ["ReadAccountsDetail", "ReadTransactionsDetail", "ReadBalances"] },
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "Data": {
                    "ConsentId": "urn-consent-1",
                    "Status": "AwaitingAuthorisation",
                    "Permissions": ["ReadBalances"],
                },
                "Risk": {},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server)
            .with_account_management_url(Url::parse(&format!("{}/am/", server.uri())).unwrap());
        let grant = ClientCredentialsGrant::new(&config, Transport::default());
        let client = ConsentClient::new(&config, grant).unwrap();

        let resp = client.initiate_accounts_consent().await.unwrap();

        assert_eq!(resp.data.consent_id.as_str(), "urn-consent-1");
        assert_eq!(resp.data.status, "AwaitingAuthorisation");
        assert_eq!(resp.data.permissions, vec![Permission::ReadBalances]);
    }

    #[tokio::test]
    async fn token_failure_skips_the_consent_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/am/account-access-consents"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let config = config_for(&server)
            .with_account_management_url(Url::parse(&format!("{}/am", server.uri())).unwrap());
        let grant = ClientCredentialsGrant::new(&config, Transport::default());
        let client = ConsentClient::new(&config, grant).unwrap();

        let err = client.initiate_accounts_consent().await.unwrap_err();

        assert!(matches!(err, ConsentError::Token(AuthError::Status { .. })));
    }
}
