//! Initialize-client caller for the partner API.
//!
//! [`InitClient`] obtains a gateway client token for a payment method
//! type. It reads the bearer token through the shared [`TokenCache`]
//! (fetching one only when the slot is empty) and translates a 401 from
//! the partner into a cache invalidation: the stale token is dropped and
//! the error is surfaced, so the next call starts from a fresh fetch.
//! There is no automatic in-call retry after a 401.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::PartnerError;
use crate::identity::DEFAULT_TIMEOUT;
use crate::method::PaymentMethodType;
use crate::token::{TokenCache, TokenSource};

/// Configuration for [`InitClient`].
#[derive(Debug, Clone)]
pub struct InitConfig {
    /// The partner initialize-client endpoint URL.
    pub initialize_url: Url,
    /// The business partner configuration id sent with every request.
    pub business_partner_config_id: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl InitConfig {
    /// Creates a config with the default timeout.
    #[must_use]
    pub fn new(initialize_url: Url, business_partner_config_id: impl Into<String>) -> Self {
        Self {
            initialize_url,
            business_partner_config_id: business_partner_config_id.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Wire format of the initialize-client request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitializeRequest<'a> {
    business_partner_config_id: &'a str,
    payment_method_type: PaymentMethodType,
}

/// Wire format of a successful initialize-client response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResponse {
    client_token: String,
}

/// Caller for the partner initialize-client endpoint.
pub struct InitClient {
    config: InitConfig,
    cache: Arc<TokenCache>,
    tokens: Arc<dyn TokenSource>,
    client: reqwest::Client,
}

impl InitClient {
    /// Creates a new client sharing the given token cache and source.
    #[must_use]
    pub fn new(config: InitConfig, cache: Arc<TokenCache>, tokens: Arc<dyn TokenSource>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build reqwest::Client");

        Self {
            config,
            cache,
            tokens,
            client,
        }
    }

    /// Returns the shared token cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    /// Obtains a gateway client token for `payment_method`.
    ///
    /// The method string is validated before any network call is made.
    ///
    /// # Errors
    ///
    /// - [`PartnerError::InvalidPaymentMethod`] for an unsupported method,
    /// - [`PartnerError::Auth`] on a 401 (the cached token is cleared),
    /// - [`PartnerError::Transport`] / [`PartnerError::Status`] when the
    ///   endpoint is unreachable or answers with another non-2xx status
    ///   (the cache is left unchanged),
    /// - [`PartnerError::MalformedResponse`] when the body misses the
    ///   token field.
    pub async fn initialize(&self, payment_method: &str) -> Result<String, PartnerError> {
        let method: PaymentMethodType = payment_method.parse()?;
        self.initialize_method(method).await
    }

    /// Like [`Self::initialize`], for an already-validated method type.
    ///
    /// # Errors
    ///
    /// Same as [`Self::initialize`], minus the validation failure.
    pub async fn initialize_method(
        &self,
        method: PaymentMethodType,
    ) -> Result<String, PartnerError> {
        const CONTEXT: &str = "POST partner initializeClient";

        let token = self.cache.get_or_fetch(self.tokens.as_ref()).await?;

        let request = InitializeRequest {
            business_partner_config_id: &self.config.business_partner_config_id,
            payment_method_type: method,
        };

        let response = self
            .client
            .post(self.config.initialize_url.clone())
            .bearer_auth(token.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| PartnerError::Transport {
                context: CONTEXT,
                source: e,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| PartnerError::Transport {
            context: "read initializeClient response body",
            source: e,
        })?;

        if status == StatusCode::UNAUTHORIZED {
            // The cached token is stale; drop it so the next caller
            // starts from a fresh fetch.
            self.cache.clear().await;
            return Err(PartnerError::Auth {
                context: CONTEXT,
                status,
                body,
            });
        }
        if !status.is_success() {
            return Err(PartnerError::Status {
                context: CONTEXT,
                status,
                body,
            });
        }

        let parsed: InitializeResponse =
            serde_json::from_str(&body).map_err(|e| PartnerError::MalformedResponse {
                context: CONTEXT,
                detail: e.to_string(),
            })?;

        Ok(parsed.client_token)
    }
}

impl fmt::Debug for InitClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitClient")
            .field("initialize_url", &self.config.initialize_url)
            .field(
                "business_partner_config_id",
                &self.config.business_partner_config_id,
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::identity::{IdentityClient, IdentityConfig};
    use crate::token::BearerToken;

    struct StubSource {
        token: &'static str,
        fetches: AtomicUsize,
    }

    impl StubSource {
        fn new(token: &'static str) -> Arc<Self> {
            Arc::new(Self {
                token,
                fetches: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenSource for StubSource {
        async fn fetch(&self) -> Result<BearerToken, PartnerError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(BearerToken::new(self.token))
        }
    }

    fn init_client_for(
        server: &MockServer,
        cache: Arc<TokenCache>,
        tokens: Arc<dyn TokenSource>,
    ) -> InitClient {
        let url = format!("{}/initializeClient", server.uri()).parse().unwrap();
        InitClient::new(InitConfig::new(url, "3023"), cache, tokens)
    }

    #[tokio::test]
    async fn unsupported_method_is_rejected_before_any_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/initializeClient"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let source = StubSource::new("t");
        let client = init_client_for(&server, Arc::new(TokenCache::new()), source.clone());

        let err = client.initialize("sofort").await.unwrap_err();
        assert!(matches!(err, PartnerError::InvalidPaymentMethod(_)));
        assert_eq!(source.count(), 0);
    }

    #[tokio::test]
    async fn cached_token_is_used_without_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/initializeClient"))
            .and(header("authorization", "Bearer cached-token"))
            .and(body_json(serde_json::json!({
                "businessPartnerConfigId": "3023",
                "paymentMethodType": "creditcard",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"clientToken": "abc"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let source = StubSource::new("unused");
        let cache = Arc::new(TokenCache::new());
        cache.set(BearerToken::new("cached-token")).await;

        let client = init_client_for(&server, cache, source.clone());
        let token = client.initialize("creditcard").await.unwrap();

        assert_eq!(token, "abc");
        assert_eq!(source.count(), 0);
    }

    #[tokio::test]
    async fn a_401_clears_the_cache_and_the_next_call_refetches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/initializeClient"))
            .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/initializeClient"))
            .and(header("authorization", "Bearer fresh-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"clientToken": "tok-2"})),
            )
            .mount(&server)
            .await;

        let source = StubSource::new("fresh-token");
        let cache = Arc::new(TokenCache::new());
        cache.set(BearerToken::new("stale-token")).await;

        let client = init_client_for(&server, cache.clone(), source.clone());

        let err = client.initialize("paypal").await.unwrap_err();
        assert!(err.is_auth());
        assert!(cache.get().await.is_none());

        // No automatic retry happened: the source was not consulted yet.
        assert_eq!(source.count(), 0);

        let token = client.initialize("paypal").await.unwrap();
        assert_eq!(token, "tok-2");
        assert_eq!(source.count(), 1);
    }

    #[tokio::test]
    async fn a_500_leaves_the_cache_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/initializeClient"))
            .respond_with(ResponseTemplate::new(500).set_body_string("downstream outage"))
            .mount(&server)
            .await;

        let source = StubSource::new("unused");
        let cache = Arc::new(TokenCache::new());
        cache.set(BearerToken::new("good-token")).await;

        let client = init_client_for(&server, cache.clone(), source.clone());
        let err = client.initialize("applepay").await.unwrap_err();

        assert!(matches!(
            err,
            PartnerError::Status { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert_eq!(
            cache.get().await.as_ref().map(BearerToken::as_str),
            Some("good-token")
        );
        assert_eq!(source.count(), 0);
    }

    #[tokio::test]
    async fn missing_client_token_field_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/initializeClient"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let cache = Arc::new(TokenCache::new());
        cache.set(BearerToken::new("t")).await;
        let client = init_client_for(&server, cache, StubSource::new("t"));

        let err = client.initialize("creditcard").await.unwrap_err();
        assert!(matches!(err, PartnerError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn round_trip_through_identity_and_partner() {
        let identity_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "mps-token"})),
            )
            .expect(1)
            .mount(&identity_server)
            .await;

        let partner_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/initializeClient"))
            .and(header("authorization", "Bearer mps-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"clientToken": "tok-123"})),
            )
            .expect(1)
            .mount(&partner_server)
            .await;

        let identity = IdentityClient::new(IdentityConfig::new(
            format!("{}/oauth", identity_server.uri()).parse().unwrap(),
            "client-1",
            "s3cret",
            "T00X7T70",
        ));
        let client = init_client_for(&partner_server, Arc::new(TokenCache::new()), Arc::new(identity));

        let token = client.initialize("googlepay").await.unwrap();
        assert_eq!(token, "tok-123");
    }
}
