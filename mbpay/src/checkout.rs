//! Reserve calls against the partner checkout API.
//!
//! [`CheckoutClient`] covers the three checkout operations the facade
//! exposes: a one-time direct reserve, a recurring mandate reserve, and
//! starting a recurring PayPal session. All three authenticate with the
//! same bearer token as the initialize call and share its cache, so a
//! 401 observed here also invalidates the token for everyone else.
//!
//! Checkout responses are business payloads the facade does not
//! interpret; they pass through as raw JSON.

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

/// Configuration for [`CheckoutClient`].
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Base URL of the checkout API (e.g. `https://host/pbs-checkout-api`).
    pub base_url: Url,
    /// The business partner configuration id sent with every request.
    pub business_partner_config_id: String,
    /// The settlement configuration id sent with every request.
    pub settlement_configuration_id: String,
    /// ISO currency code, e.g. `EUR`.
    pub currency: String,
    /// Locale for customer-facing texts, e.g. `de_DE`.
    pub locale: String,
    /// Description shown on the mandate/receipt.
    pub description: String,
    /// URL the hosted checkout redirects back to.
    pub return_url: String,
    /// Tax rate applied to the line item, in percent.
    pub tax_rate: u8,
    /// Provider suffix appended to the payment method name on the wire.
    pub gateway_provider: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl CheckoutConfig {
    /// Creates a config with the default timeout, 19% tax rate, and the
    /// `braintree` provider suffix.
    #[must_use]
    pub fn new(
        base_url: Url,
        business_partner_config_id: impl Into<String>,
        settlement_configuration_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url,
            business_partner_config_id: business_partner_config_id.into(),
            settlement_configuration_id: settlement_configuration_id.into(),
            currency: "EUR".to_owned(),
            locale: "de_DE".to_owned(),
            description: "Payment mandate".to_owned(),
            return_url: "https://localhost/".to_owned(),
            tax_rate: 19,
            gateway_provider: "braintree".to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A client request to reserve a payment.
#[derive(Debug, Clone, Deserialize)]
pub struct ReserveRequest {
    /// Gross amount as a decimal string, e.g. `"15.00"`.
    pub amount: String,
    /// Payment method name for recurring reserves.
    #[serde(default)]
    pub payment_method_token: Option<String>,
    /// Single-use nonce obtained by the client-side SDK.
    #[serde(default)]
    pub payment_method_nonce: Option<String>,
    /// Optional merchant order id.
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutPayload<'a> {
    payment_method: String,
    business_partner_config_id: &'a str,
    currency: &'a str,
    locale: &'a str,
    description: &'a str,
    return_url: &'a str,
    line_items: [LineItem<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_service_data: Option<PaymentServiceData<'a>>,
    settlement_data: SettlementData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LineItem<'a> {
    name: &'a str,
    description: &'a str,
    gross_amount: &'a str,
    tax_rate: u8,
    quantity: u8,
    ui_details: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct PaymentServiceData<'a> {
    nonce: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettlementData<'a> {
    settlement_configuration_id: &'a str,
}

/// Client for the partner checkout API reserve endpoints.
pub struct CheckoutClient {
    config: CheckoutConfig,
    direct_reserve_url: Url,
    recurring_reserve_url: Url,
    recurring_payment_url: Url,
    cache: Arc<TokenCache>,
    tokens: Arc<dyn TokenSource>,
    client: reqwest::Client,
}

impl CheckoutClient {
    /// Creates a new client sharing the given token cache and source.
    ///
    /// # Errors
    ///
    /// Returns [`PartnerError::UrlParse`] if an endpoint URL cannot be
    /// derived from the base URL.
    pub fn try_new(
        config: CheckoutConfig,
        cache: Arc<TokenCache>,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, PartnerError> {
        let base = config.base_url.as_str().trim_end_matches('/');
        let direct_reserve_url = parse_endpoint(base, "direct/reserve")?;
        let recurring_reserve_url = parse_endpoint(base, "recurring/payment/direct/reserve")?;
        let recurring_payment_url = parse_endpoint(base, "recurring/payment")?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build reqwest::Client");

        Ok(Self {
            config,
            direct_reserve_url,
            recurring_reserve_url,
            recurring_payment_url,
            cache,
            tokens,
            client,
        })
    }

    /// Reserves a one-time transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PartnerError`] on auth, transport, or status failures;
    /// a 401 clears the shared token cache.
    pub async fn reserve(
        &self,
        request: &ReserveRequest,
    ) -> Result<serde_json::Value, PartnerError> {
        // One-time reserves always run through the card rails.
        let payload = self.payload(PaymentMethodType::CreditCard, request, true);
        self.post_checkout(&self.direct_reserve_url, "POST checkout direct/reserve", &payload)
            .await
    }

    /// Reserves a recurring mandate-based transaction.
    ///
    /// The payment method named in `payment_method_token` is validated
    /// against the supported set before any network call.
    ///
    /// # Errors
    ///
    /// Returns [`PartnerError::InvalidPaymentMethod`] for an unsupported
    /// method, otherwise as [`Self::reserve`].
    pub async fn reserve_recurring(
        &self,
        request: &ReserveRequest,
    ) -> Result<serde_json::Value, PartnerError> {
        let named = request.payment_method_token.as_deref().unwrap_or_default();
        let method: PaymentMethodType = named.parse()?;
        let payload = self.payload(method, request, true);
        self.post_checkout(
            &self.recurring_reserve_url,
            "POST checkout recurring/payment/direct/reserve",
            &payload,
        )
        .await
    }

    /// Starts a recurring PayPal checkout session.
    ///
    /// # Errors
    ///
    /// As [`Self::reserve`].
    pub async fn start_recurring_paypal(
        &self,
        request: &ReserveRequest,
    ) -> Result<serde_json::Value, PartnerError> {
        // The hosted PayPal flow produces its own nonce later.
        let payload = self.payload(PaymentMethodType::PayPal, request, false);
        self.post_checkout(
            &self.recurring_payment_url,
            "POST checkout recurring/payment",
            &payload,
        )
        .await
    }

    fn payload<'a>(
        &'a self,
        method: PaymentMethodType,
        request: &'a ReserveRequest,
        with_nonce: bool,
    ) -> CheckoutPayload<'a> {
        let payment_service_data = if with_nonce {
            request
                .payment_method_nonce
                .as_deref()
                .map(|nonce| PaymentServiceData { nonce })
        } else {
            None
        };

        CheckoutPayload {
            payment_method: format!("{}_{}", method, self.config.gateway_provider),
            business_partner_config_id: &self.config.business_partner_config_id,
            currency: &self.config.currency,
            locale: &self.config.locale,
            description: &self.config.description,
            return_url: &self.config.return_url,
            line_items: [LineItem {
                name: &self.config.description,
                description: &self.config.description,
                gross_amount: &request.amount,
                tax_rate: self.config.tax_rate,
                quantity: 1,
                ui_details: serde_json::json!({}),
            }],
            payment_service_data,
            settlement_data: SettlementData {
                settlement_configuration_id: &self.config.settlement_configuration_id,
            },
        }
    }

    async fn post_checkout(
        &self,
        url: &Url,
        context: &'static str,
        payload: &CheckoutPayload<'_>,
    ) -> Result<serde_json::Value, PartnerError> {
        let token = self.cache.get_or_fetch(self.tokens.as_ref()).await?;

        let response = self
            .client
            .post(url.clone())
            .bearer_auth(token.as_str())
            .json(payload)
            .send()
            .await
            .map_err(|e| PartnerError::Transport { context, source: e })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| PartnerError::Transport {
            context: "read checkout response body",
            source: e,
        })?;

        if status == StatusCode::UNAUTHORIZED {
            self.cache.clear().await;
            return Err(PartnerError::Auth {
                context,
                status,
                body,
            });
        }
        if !status.is_success() {
            return Err(PartnerError::Status {
                context,
                status,
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| PartnerError::MalformedResponse {
            context,
            detail: e.to_string(),
        })
    }
}

fn parse_endpoint(base: &str, rel: &str) -> Result<Url, PartnerError> {
    format!("{base}/{rel}")
        .parse()
        .map_err(|e| PartnerError::UrlParse {
            context: "derive checkout endpoint URL",
            source: e,
        })
}

impl fmt::Debug for CheckoutClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutClient")
            .field("base_url", &self.config.base_url)
            .field(
                "business_partner_config_id",
                &self.config.business_partner_config_id,
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::token::BearerToken;

    struct StubSource;

    #[async_trait]
    impl TokenSource for StubSource {
        async fn fetch(&self) -> Result<BearerToken, PartnerError> {
            Ok(BearerToken::new("checkout-token"))
        }
    }

    fn client_for(server: &MockServer, cache: Arc<TokenCache>) -> CheckoutClient {
        let config = CheckoutConfig::new(server.uri().parse().unwrap(), "3023", "32727");
        CheckoutClient::try_new(config, cache, Arc::new(StubSource)).unwrap()
    }

    #[tokio::test]
    async fn reserve_posts_camel_case_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/direct/reserve"))
            .and(header("authorization", "Bearer checkout-token"))
            .and(body_partial_json(serde_json::json!({
                "paymentMethod": "creditcard_braintree",
                "businessPartnerConfigId": "3023",
                "currency": "EUR",
                "paymentServiceData": {"nonce": "nonce-1"},
                "settlementData": {"settlementConfigurationId": "32727"},
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"reservationId": "r-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(TokenCache::new()));
        let request = ReserveRequest {
            amount: "15.00".to_owned(),
            payment_method_token: None,
            payment_method_nonce: Some("nonce-1".to_owned()),
            order_id: None,
        };

        let body = client.reserve(&request).await.unwrap();
        assert_eq!(body["reservationId"], "r-1");
    }

    #[tokio::test]
    async fn recurring_reserve_validates_the_method_name() {
        let server = MockServer::start().await;
        let client = client_for(&server, Arc::new(TokenCache::new()));

        let request = ReserveRequest {
            amount: "10.00".to_owned(),
            payment_method_token: Some("wire".to_owned()),
            payment_method_nonce: None,
            order_id: None,
        };

        let err = client.reserve_recurring(&request).await.unwrap_err();
        assert!(matches!(err, PartnerError::InvalidPaymentMethod(_)));
    }

    #[tokio::test]
    async fn recurring_paypal_omits_the_nonce() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/recurring/payment"))
            .and(body_partial_json(serde_json::json!({
                "paymentMethod": "paypal_braintree",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(TokenCache::new()));
        let request = ReserveRequest {
            amount: "5.00".to_owned(),
            payment_method_token: None,
            payment_method_nonce: Some("ignored".to_owned()),
            order_id: None,
        };

        let body = client.start_recurring_paypal(&request).await.unwrap();
        assert_eq!(body["ok"], true);
        // The hosted flow supplies the instrument; no nonce goes out.
        let received = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(sent.get("paymentServiceData").is_none());
    }

    #[tokio::test]
    async fn a_401_clears_the_shared_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/direct/reserve"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let cache = Arc::new(TokenCache::new());
        cache.set(BearerToken::new("stale")).await;
        let client = client_for(&server, cache.clone());

        let request = ReserveRequest {
            amount: "1.00".to_owned(),
            payment_method_token: None,
            payment_method_nonce: Some("n".to_owned()),
            order_id: None,
        };

        let err = client.reserve(&request).await.unwrap_err();
        assert!(err.is_auth());
        assert!(cache.get().await.is_none());
    }
}
