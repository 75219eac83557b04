//! Facade over the payment-gateway provider API.
//!
//! The gateway owns client-token generation for the browser SDK, sale
//! transactions, settlement, voiding, and webhook parsing. The facade
//! stays a pass-through: vaulting semantics, settlement business rules,
//! and webhook signature internals live on the provider side.
//!
//! [`Gateway`] is the seam the REST layer depends on; [`HttpGateway`] is
//! the production implementation against the provider's REST relay.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

/// Errors raised by the gateway facade.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No transaction exists under the given id.
    #[error("transaction not found: {0}")]
    NotFound(String),

    /// The gateway could not be reached.
    #[error("gateway unreachable: {context}: {source}")]
    Transport {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The gateway answered with a non-2xx status.
    #[error("gateway returned {status}: {context}: {body}")]
    Status {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },

    /// The response body was not the JSON shape we expected.
    #[error("malformed gateway response: {context}: {detail}")]
    MalformedResponse {
        /// Human-readable context.
        context: &'static str,
        /// What was wrong with the body.
        detail: String,
    },

    /// An endpoint URL could not be constructed.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
}

/// Request to create a sale transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRequest {
    /// Gross amount as a decimal string, e.g. `"15.00"`.
    pub amount: String,
    /// Vaulted payment method token, if charging a stored instrument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_token: Option<String>,
    /// Single-use nonce, if charging a freshly tokenized instrument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_nonce: Option<String>,
    /// Whether to submit the sale for settlement immediately.
    #[serde(default)]
    pub submit_for_settlement: bool,
    /// Optional merchant order id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

/// A gateway transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Gateway transaction id.
    pub id: String,
    /// Gateway status, e.g. `authorized`, `settled`, `voided`.
    pub status: String,
    /// Gross amount as a decimal string.
    pub amount: String,
    /// Merchant order id, if one was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Creation timestamp as reported by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Outcome of a gateway mutation (sale, settlement, void).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
    /// Whether the gateway accepted the operation.
    pub success: bool,
    /// The affected transaction, when the gateway returns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
    /// Gateway message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A parsed webhook notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookNotification {
    /// Notification kind, e.g. `subscription_charged_successfully`.
    pub kind: String,
    /// Timestamp as reported by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Kind-specific payload; passed through to downstream consumers.
    #[serde(default)]
    pub subject: serde_json::Value,
}

/// The payment-gateway operations the REST layer depends on.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Generates a client token for the browser/mobile SDK.
    async fn generate_client_token(
        &self,
        customer_id: Option<&str>,
    ) -> Result<String, GatewayError>;

    /// Creates a sale transaction.
    async fn create_sale(&self, sale: &SaleRequest) -> Result<TransactionResult, GatewayError>;

    /// Looks up a transaction by id.
    async fn find_transaction(&self, id: &str) -> Result<Transaction, GatewayError>;

    /// Submits an authorized transaction for settlement.
    async fn submit_for_settlement(&self, id: &str) -> Result<TransactionResult, GatewayError>;

    /// Voids an authorized transaction.
    async fn void_transaction(&self, id: &str) -> Result<TransactionResult, GatewayError>;

    /// Parses and verifies a webhook notification.
    async fn parse_webhook(
        &self,
        signature: &str,
        payload: &str,
    ) -> Result<WebhookNotification, GatewayError>;
}

/// Configuration for [`HttpGateway`].
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway REST relay.
    pub base_url: Url,
    /// API public key (Basic-auth user).
    pub public_key: String,
    /// API private key (Basic-auth password).
    pub private_key: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Creates a config with a 10 second timeout.
    #[must_use]
    pub fn new(
        base_url: Url,
        public_key: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url,
            public_key: public_key.into(),
            private_key: private_key.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientTokenRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientTokenResponse {
    client_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParseWebhookRequest<'a> {
    signature: &'a str,
    payload: &'a str,
}

/// HTTP implementation of [`Gateway`] against the provider REST relay.
pub struct HttpGateway {
    base_url: Url,
    public_key: String,
    private_key: String,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Creates a new gateway client.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build reqwest::Client");

        Self {
            base_url: config.base_url,
            public_key: config.public_key,
            private_key: config.private_key,
            client,
        }
    }

    fn endpoint(&self, rel: &str) -> Result<Url, GatewayError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/{rel}")
            .parse()
            .map_err(|e| GatewayError::UrlParse {
                context: "derive gateway endpoint URL",
                source: e,
            })
    }

    async fn send_json<T, R>(
        &self,
        request: reqwest::RequestBuilder,
        context: &'static str,
        payload: Option<&T>,
    ) -> Result<R, GatewayError>
    where
        T: Serialize + Sync + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let mut request = request.basic_auth(&self.public_key, Some(&self.private_key));
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport { context, source: e })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| GatewayError::Transport {
            context: "read gateway response body",
            source: e,
        })?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                context,
                status,
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::MalformedResponse {
            context,
            detail: e.to_string(),
        })
    }
}

impl fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn generate_client_token(
        &self,
        customer_id: Option<&str>,
    ) -> Result<String, GatewayError> {
        const CONTEXT: &str = "POST gateway client-token";
        let url = self.endpoint("client-token")?;
        let body = ClientTokenRequest { customer_id };
        let response: ClientTokenResponse = self
            .send_json(self.client.post(url), CONTEXT, Some(&body))
            .await?;
        Ok(response.client_token)
    }

    async fn create_sale(&self, sale: &SaleRequest) -> Result<TransactionResult, GatewayError> {
        let url = self.endpoint("transactions")?;
        self.send_json(self.client.post(url), "POST gateway transactions", Some(sale))
            .await
    }

    async fn find_transaction(&self, id: &str) -> Result<Transaction, GatewayError> {
        const CONTEXT: &str = "GET gateway transaction";
        let url = self.endpoint(&format!("transactions/{id}"))?;
        let result: Result<Transaction, GatewayError> = self
            .send_json::<(), _>(self.client.get(url), CONTEXT, None)
            .await;

        match result {
            Err(GatewayError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                Err(GatewayError::NotFound(id.to_owned()))
            }
            other => other,
        }
    }

    async fn submit_for_settlement(&self, id: &str) -> Result<TransactionResult, GatewayError> {
        let url = self.endpoint(&format!("transactions/{id}/submit-for-settlement"))?;
        self.send_json::<(), _>(self.client.put(url), "PUT gateway submit-for-settlement", None)
            .await
    }

    async fn void_transaction(&self, id: &str) -> Result<TransactionResult, GatewayError> {
        let url = self.endpoint(&format!("transactions/{id}/void"))?;
        self.send_json::<(), _>(self.client.put(url), "PUT gateway void", None)
            .await
    }

    async fn parse_webhook(
        &self,
        signature: &str,
        payload: &str,
    ) -> Result<WebhookNotification, GatewayError> {
        let url = self.endpoint("webhooks/parse")?;
        let body = ParseWebhookRequest { signature, payload };
        self.send_json(self.client.post(url), "POST gateway webhooks/parse", Some(&body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn gateway_for(server: &MockServer) -> HttpGateway {
        HttpGateway::new(GatewayConfig::new(
            server.uri().parse().unwrap(),
            "pub-key",
            "priv-key",
        ))
    }

    #[tokio::test]
    async fn client_token_is_generated_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/client-token"))
            .and(header_exists("authorization"))
            .and(body_partial_json(serde_json::json!({"customerId": "cust-1"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"clientToken": "gw-tok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let token = gateway_for(&server)
            .generate_client_token(Some("cust-1"))
            .await
            .unwrap();
        assert_eq!(token, "gw-tok");
    }

    #[tokio::test]
    async fn create_sale_round_trips_the_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transactions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "transaction": {"id": "txn-1", "status": "authorized", "amount": "15.00"},
            })))
            .mount(&server)
            .await;

        let sale = SaleRequest {
            amount: "15.00".to_owned(),
            payment_method_token: None,
            payment_method_nonce: Some("nonce".to_owned()),
            submit_for_settlement: true,
            order_id: None,
        };

        let result = gateway_for(&server).create_sale(&sale).await.unwrap();
        assert!(result.success);
        assert_eq!(result.transaction.unwrap().id, "txn-1");
    }

    #[tokio::test]
    async fn missing_transaction_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transactions/txn-404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such transaction"))
            .mount(&server)
            .await;

        let err = gateway_for(&server)
            .find_transaction("txn-404")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(id) if id == "txn-404"));
    }

    #[tokio::test]
    async fn void_hits_the_void_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/transactions/txn-9/void"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "transaction": {"id": "txn-9", "status": "voided", "amount": "5.00"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = gateway_for(&server).void_transaction("txn-9").await.unwrap();
        assert_eq!(result.transaction.unwrap().status, "voided");
    }

    #[tokio::test]
    async fn webhook_parse_is_a_pass_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhooks/parse"))
            .and(body_partial_json(serde_json::json!({
                "signature": "sig", "payload": "payload",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "subscription_charged_successfully",
                "subject": {"subscriptionId": "sub-1"},
            })))
            .mount(&server)
            .await;

        let notification = gateway_for(&server)
            .parse_webhook("sig", "payload")
            .await
            .unwrap();
        assert_eq!(notification.kind, "subscription_charged_successfully");
        assert_eq!(notification.subject["subscriptionId"], "sub-1");
    }
}
