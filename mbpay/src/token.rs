//! Single-slot cache for the partner OAuth bearer token.
//!
//! The partner API hands out bearer tokens with a server-side expiry that
//! is not reported to clients, so the cache tracks no TTL. Staleness is
//! detected reactively: when a dependent call observes a 401 it calls
//! [`TokenCache::clear`], and the next caller fetches a fresh token.
//!
//! Cache lifecycle: Empty → Valid on a successful fetch, Valid → Empty on
//! an observed 401, Valid → Valid on a successful dependent call.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::error::PartnerError;

/// An opaque OAuth bearer token for the partner API.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wraps a raw token string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token value, for the `Authorization` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    // The token is a credential; never log its value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BearerToken").field(&"<redacted>").finish()
    }
}

/// Produces a fresh bearer token.
///
/// The seam between the cache and the identity endpoint; tests substitute
/// a stub here. Implementations perform a single fetch with no retry —
/// retries are the caller's responsibility.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetches a fresh token from the identity provider.
    ///
    /// # Errors
    ///
    /// Returns [`PartnerError`] on transport failure, a non-2xx response,
    /// or a response body missing the token field.
    async fn fetch(&self) -> Result<BearerToken, PartnerError>;
}

/// Process-wide single-slot cache for the partner bearer token.
///
/// The slot is guarded by an `RwLock` so readers never wait on a fetch
/// that has already completed; a separate refresh mutex serializes the
/// check-fetch-populate sequence so concurrent callers that observe an
/// empty slot collapse into one underlying fetch. The network call is
/// never made while the slot lock is held.
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: RwLock<Option<BearerToken>>,
    refresh: Mutex<()>,
}

impl TokenCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token, if any.
    pub async fn get(&self) -> Option<BearerToken> {
        self.slot.read().await.clone()
    }

    /// Replaces the cached token.
    pub async fn set(&self, token: BearerToken) {
        *self.slot.write().await = Some(token);
    }

    /// Drops the cached token. Called when a dependent call reports 401.
    pub async fn clear(&self) {
        *self.slot.write().await = None;
    }

    /// Returns the cached token, fetching one through `source` if the
    /// slot is empty.
    ///
    /// Single-flight: a caller that finds the slot empty takes the
    /// refresh mutex, re-checks the slot (another caller may have
    /// populated it while we waited), and only then fetches.
    ///
    /// # Errors
    ///
    /// Propagates the [`PartnerError`] from `source`; the slot stays
    /// empty on failure.
    pub async fn get_or_fetch(&self, source: &dyn TokenSource) -> Result<BearerToken, PartnerError> {
        if let Some(token) = self.get().await {
            return Ok(token);
        }

        let _refresh = self.refresh.lock().await;
        if let Some(token) = self.get().await {
            return Ok(token);
        }

        let token = source.fetch().await?;
        self.set(token.clone()).await;
        Ok(token)
    }
}
