//! Per-session token caching
//!
//! A [`TokenCache`] remembers one [`TokenRecord`] per [`SessionKey`] so that
//! requests within a session reuse the token obtained when the session was
//! established instead of performing another exchange.
//!
//! By default the cache never looks at a record's expiry: once a session has a
//! token, that token is returned until it is removed. Callers that want expired
//! tokens to be reacquired opt in with [`ExpiryPolicy::Reacquire`], or refresh
//! explicitly with [`TokenCache::refresh()`].
//!
//! Concurrent first requests for the same session are coalesced, so only one
//! of them performs the exchange.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard, RwLock};
use url::Url;

use crate::clock::{Clock, DurationSecs, System};
use crate::grants::{GrantStrategy, RefreshTokenGrant, RefreshTokenParams};
use crate::transport::AuthError;
use crate::{ClientId, ClientSecret, SessionKey, SessionKeyRef, TokenRecord, TokenResponse};

/// How the cache treats records that have expired
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// Records are returned regardless of expiry
    #[default]
    Ignore,
    /// Records expiring within `min_validity` are treated as absent and a new
    /// token is obtained with the parameters of the current request
    Reacquire {
        /// How long a cached record must remain valid to be returned
        min_validity: DurationSecs,
    },
}

/// An error while refreshing a cached token
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The session has no cached token
    #[error("no token is cached for this session")]
    NotCached,
    /// The cached token was issued without a refresh token
    #[error("cached token has no refresh token")]
    NoRefreshToken,
    /// The refresh exchange failed
    #[error("error refreshing token")]
    Exchange(#[from] AuthError),
}

type Flights = Mutex<HashMap<SessionKey, FlightEntry>>;

#[derive(Default)]
struct FlightEntry {
    guard: Arc<AsyncMutex<()>>,
    members: usize,
}

/// Membership in the single-flight group of one session key
///
/// The key's entry is removed once its last member is dropped, including when
/// the future holding the member is cancelled.
struct Flight<'a> {
    flights: &'a Flights,
    key: &'a SessionKeyRef,
    guard: Arc<AsyncMutex<()>>,
}

impl<'a> Flight<'a> {
    fn join(flights: &'a Flights, key: &'a SessionKeyRef) -> Self {
        let mut map = flights.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(key.to_owned()).or_default();
        entry.members += 1;

        Self {
            flights,
            key,
            guard: Arc::clone(&entry.guard),
        }
    }

    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().await
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut map = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = map.get_mut(self.key).map_or(false, |entry| {
            entry.members = entry.members.saturating_sub(1);
            entry.members == 0
        });
        if idle {
            map.remove(self.key);
        }
    }
}

/// A per-session token cache backed by a grant strategy
pub struct TokenCache<G, C = System> {
    strategy: G,
    records: RwLock<HashMap<SessionKey, Arc<TokenRecord>>>,
    flights: Flights,
    expiry_policy: ExpiryPolicy,
    clock: C,
}

impl<G> TokenCache<G, System> {
    /// Constructs an empty cache that obtains tokens with `strategy`
    pub fn new(strategy: G) -> Self {
        Self {
            strategy,
            records: RwLock::default(),
            flights: Mutex::default(),
            expiry_policy: ExpiryPolicy::default(),
            clock: System,
        }
    }
}

impl<G, C> TokenCache<G, C> {
    /// Sets how records past their expiry are treated
    pub fn with_expiry_policy(mut self, expiry_policy: ExpiryPolicy) -> Self {
        self.expiry_policy = expiry_policy;
        self
    }

    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenCache<G, D> {
        TokenCache {
            strategy: self.strategy,
            records: self.records,
            flights: self.flights,
            expiry_policy: self.expiry_policy,
            clock,
        }
    }

    /// The strategy used to obtain new tokens
    pub fn strategy(&self) -> &G {
        &self.strategy
    }

    /// The active expiry policy
    pub fn expiry_policy(&self) -> ExpiryPolicy {
        self.expiry_policy
    }

    /// Looks up the record cached for `key` without contacting the authority
    ///
    /// The expiry policy is not applied.
    pub async fn get(&self, key: &SessionKeyRef) -> Option<Arc<TokenRecord>> {
        self.records.read().await.get(key).cloned()
    }

    /// Removes the record cached for `key`, returning it
    pub async fn remove(&self, key: &SessionKeyRef) -> Option<Arc<TokenRecord>> {
        self.records.write().await.remove(key)
    }

    /// The number of sessions with a cached record
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the cache holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

}

impl<G, C: Clock> TokenCache<G, C> {
    async fn usable(&self, key: &SessionKeyRef) -> Option<Arc<TokenRecord>> {
        let record = self.get(key).await?;

        match self.expiry_policy {
            ExpiryPolicy::Ignore => Some(record),
            ExpiryPolicy::Reacquire { min_validity } => {
                let must_be_valid_until = self.clock.now() + min_validity;
                if record.is_expired_at(must_be_valid_until) {
                    tracing::debug!(
                        must_be_valid_until = must_be_valid_until.0,
                        token_expiry = record.expires_at().0,
                        "cached token does not meet minimum validity, reacquiring"
                    );
                    None
                } else {
                    Some(record)
                }
            }
        }
    }

    /// Stores a token response for `key`, replacing any existing record
    pub async fn insert(&self, key: SessionKey, response: TokenResponse) -> Arc<TokenRecord> {
        let record = Arc::new(TokenRecord::from_response(response, self.clock.now()));
        self.records.write().await.insert(key, Arc::clone(&record));
        record
    }

    /// Removes every record that has expired, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        let purged = before - records.len();

        if purged > 0 {
            tracing::debug!(purged, remaining = records.len(), "purged expired tokens");
        }

        purged
    }

    /// Replaces the record for `key` using its refresh token
    ///
    /// If the authority does not rotate the refresh token, the previous one is
    /// carried over to the new record.
    pub async fn refresh(
        &self,
        key: &SessionKeyRef,
        grant: &RefreshTokenGrant,
        client_id: ClientId,
        client_secret: Option<ClientSecret>,
        token_endpoint: Url,
    ) -> Result<Arc<TokenRecord>, RefreshError> {
        let flight = Flight::join(&self.flights, key);
        let _singleflight = flight.lock().await;
        self.refresh_locked(key, grant, client_id, client_secret, token_endpoint)
            .await
    }

    async fn refresh_locked(
        &self,
        key: &SessionKeyRef,
        grant: &RefreshTokenGrant,
        client_id: ClientId,
        client_secret: Option<ClientSecret>,
        token_endpoint: Url,
    ) -> Result<Arc<TokenRecord>, RefreshError> {
        let current = self.get(key).await.ok_or(RefreshError::NotCached)?;
        let refresh_token = current
            .refresh_token()
            .ok_or(RefreshError::NoRefreshToken)?
            .to_owned();

        let mut response = grant
            .exchange(RefreshTokenParams {
                refresh_token: refresh_token.clone(),
                client_id,
                client_secret,
                token_endpoint,
            })
            .await?;

        if response.refresh_token.is_none() {
            response.refresh_token = Some(refresh_token);
        }

        let record = self.insert(key.to_owned(), response).await;
        tracing::info!(token_expiry = record.expires_at().0, "refreshed cached token");
        Ok(record)
    }
}

impl<G, C> TokenCache<G, C>
where
    G: GrantStrategy,
    C: Clock + Send + Sync,
{
    /// Returns the record cached for `key`, obtaining one with `params` if needed
    ///
    /// With [`ExpiryPolicy::Ignore`], a session that already has a record gets
    /// that record back unchanged and `params` are unused. A failed exchange
    /// leaves the cache untouched.
    #[tracing::instrument(
        err,
        skip_all,
        fields(credentials.grant_type = self.strategy.grant_type()),
    )]
    pub async fn get_or_retrieve(
        &self,
        key: &SessionKeyRef,
        params: G::Params,
    ) -> Result<Arc<TokenRecord>, G::Error> {
        if let Some(record) = self.usable(key).await {
            tracing::trace!("using cached token");
            return Ok(record);
        }

        let flight = Flight::join(&self.flights, key);
        let _singleflight = flight.lock().await;
        match self.usable(key).await {
            Some(record) => {
                tracing::trace!("token cached by concurrent request");
                Ok(record)
            }
            None => self.retrieve(key, params).await,
        }
    }

    async fn retrieve(
        &self,
        key: &SessionKeyRef,
        params: G::Params,
    ) -> Result<Arc<TokenRecord>, G::Error> {
        tracing::debug!("no usable cached token, performing exchange");

        let response = self.strategy.exchange(params).await?;
        let record = self.insert(key.to_owned(), response).await;

        tracing::info!(
            token_expiry = record.expires_at().0,
            has_refresh_token = record.refresh_token().is_some(),
            "cached new token for session"
        );

        Ok(record)
    }
}

impl<G, C> fmt::Debug for TokenCache<G, C>
where
    G: fmt::Debug,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("strategy", &self.strategy)
            .field("expiry_policy", &self.expiry_policy)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
