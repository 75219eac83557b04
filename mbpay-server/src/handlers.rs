//! Axum route handlers for the payments facade.
//!
//! Each handler is a thin translation between the REST surface and the
//! core clients; error mapping lives in [`crate::error`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{Html, Response};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use mbpay::checkout::{CheckoutClient, ReserveRequest};
use mbpay::gateway::{Gateway, SaleRequest, Transaction, TransactionResult, WebhookNotification};
use mbpay::partner::InitClient;

use crate::error::ApiError;
use crate::pages;

/// Shared application state for the facade.
pub struct AppState {
    /// Partner initialize-client caller.
    pub init: Arc<InitClient>,
    /// Partner checkout client.
    pub checkout: Arc<CheckoutClient>,
    /// Payment gateway facade.
    pub gateway: Arc<dyn Gateway>,
    /// Directory the demo pages are served from.
    pub pages_dir: PathBuf,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("init", &self.init)
            .field("checkout", &self.checkout)
            .field("pages_dir", &self.pages_dir)
            .finish_non_exhaustive()
    }
}

/// `Arc`-wrapped [`AppState`] used as the router state.
pub type SharedState = Arc<AppState>;

/// Response carrying a client token for the browser/mobile SDK.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTokenResponse {
    /// The token the client-side SDK initializes with.
    pub client_token: String,
}

/// Request body for gateway client-token generation.
#[derive(Debug, Deserialize, Default)]
pub struct ClientTokenRequest {
    /// Optional customer to scope the token to.
    #[serde(default)]
    pub customer_id: Option<String>,
}

/// Form body of an inbound gateway webhook.
#[derive(Debug, Deserialize)]
pub struct WebhookForm {
    /// Webhook signature header value.
    pub bt_signature: String,
    /// Webhook payload.
    pub bt_payload: String,
}

/// `GET /health` — liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /` — index of demo pages.
pub async fn index() -> Html<&'static str> {
    Html(pages::INDEX_HTML)
}

/// `GET /pages/{filename}` — serves a demo page.
///
/// # Errors
///
/// Returns 400 for unacceptable names, 404 for missing files.
pub async fn serve_page(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    pages::serve_page(&state.pages_dir, &filename).await
}

/// `POST /client-token/{payment_method}` — obtains a client token from
/// the partner initialize endpoint.
///
/// # Errors
///
/// Returns 400 for an unsupported method (before any upstream call),
/// 502/503 on upstream failures.
pub async fn create_client_token(
    State(state): State<SharedState>,
    Path(payment_method): Path<String>,
) -> Result<Json<ClientTokenResponse>, ApiError> {
    let client_token = state.init.initialize(&payment_method).await?;
    Ok(Json(ClientTokenResponse { client_token }))
}

/// `POST /reserve` — reserves a one-time transaction.
///
/// # Errors
///
/// Returns 502/503 on upstream failures.
pub async fn reserve(
    State(state): State<SharedState>,
    Json(request): Json<ReserveRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.checkout.reserve(&request).await?))
}

/// `POST /recurring/payment/reserve` — reserves a recurring mandate.
///
/// # Errors
///
/// Returns 400 for an unsupported method name, 502/503 upstream.
pub async fn reserve_recurring(
    State(state): State<SharedState>,
    Json(request): Json<ReserveRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.checkout.reserve_recurring(&request).await?))
}

/// `POST /recurring/paypal` — starts a recurring PayPal session.
///
/// # Errors
///
/// Returns 502/503 on upstream failures.
pub async fn recurring_paypal(
    State(state): State<SharedState>,
    Json(request): Json<ReserveRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.checkout.start_recurring_paypal(&request).await?))
}

/// `POST /gateway/client-token` — client token straight from the gateway.
///
/// # Errors
///
/// Returns 502/503 on gateway failures.
pub async fn gateway_client_token(
    State(state): State<SharedState>,
    Json(request): Json<ClientTokenRequest>,
) -> Result<Json<ClientTokenResponse>, ApiError> {
    let client_token = state
        .gateway
        .generate_client_token(request.customer_id.as_deref())
        .await?;
    Ok(Json(ClientTokenResponse { client_token }))
}

/// `POST /transactions` — creates a sale transaction.
///
/// # Errors
///
/// Returns 502/503 on gateway failures.
pub async fn create_sale(
    State(state): State<SharedState>,
    Json(sale): Json<SaleRequest>,
) -> Result<Json<TransactionResult>, ApiError> {
    Ok(Json(state.gateway.create_sale(&sale).await?))
}

/// `GET /transactions/{id}` — looks up a transaction.
///
/// # Errors
///
/// Returns 404 when the transaction does not exist.
pub async fn get_transaction(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(state.gateway.find_transaction(&id).await?))
}

/// `PUT /transactions/{id}/submit-for-settlement` — submits a sale for
/// settlement.
///
/// # Errors
///
/// Returns 502/503 on gateway failures.
pub async fn settle_transaction(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TransactionResult>, ApiError> {
    Ok(Json(state.gateway.submit_for_settlement(&id).await?))
}

/// `PUT /transactions/{id}/void` — voids an authorized transaction.
///
/// # Errors
///
/// Returns 502/503 on gateway failures.
pub async fn void_transaction(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TransactionResult>, ApiError> {
    Ok(Json(state.gateway.void_transaction(&id).await?))
}

/// `POST /webhooks` — parses a gateway webhook notification.
///
/// # Errors
///
/// Returns 502/503 on gateway failures.
pub async fn post_webhook(
    State(state): State<SharedState>,
    Form(form): Form<WebhookForm>,
) -> Result<Json<WebhookNotification>, ApiError> {
    let notification = state
        .gateway
        .parse_webhook(&form.bt_signature, &form.bt_payload)
        .await?;
    Ok(Json(notification))
}

/// Creates the facade [`Router`] with all endpoints.
pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(index))
        .route("/pages/{filename}", get(serve_page))
        .route("/client-token/{payment_method}", post(create_client_token))
        .route("/reserve", post(reserve))
        .route("/recurring/payment/reserve", post(reserve_recurring))
        .route("/recurring/paypal", post(recurring_paypal))
        .route("/gateway/client-token", post(gateway_client_token))
        .route("/transactions", post(create_sale))
        .route("/transactions/{id}", get(get_transaction))
        .route(
            "/transactions/{id}/submit-for-settlement",
            put(settle_transaction),
        )
        .route("/transactions/{id}/void", put(void_transaction))
        .route("/webhooks", post(post_webhook))
        .with_state(state)
}
