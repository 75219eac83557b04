//! Payments facade HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p mbpay-server --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p mbpay-server
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p mbpay-server
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to TOML configuration file (default: `config.toml`)
//! - `HOST` / `PORT` — Override bind address and port
//! - `RUST_LOG` — Log level filter (default: `info`)
//! - Secrets referenced via `$VAR` in the config file

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mbpay::checkout::{CheckoutClient, CheckoutConfig};
use mbpay::gateway::{GatewayConfig, HttpGateway};
use mbpay::identity::{IdentityClient, IdentityConfig};
use mbpay::partner::{InitClient, InitConfig};
use mbpay::token::{TokenCache, TokenSource};

use mbpay_server::config::ServerConfig;
use mbpay_server::handlers::{AppState, api_router};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Server failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        identity = %config.identity.url,
        partner = %config.partner.initialize_url,
        "Loaded configuration"
    );

    let cache = Arc::new(TokenCache::new());
    let tokens: Arc<dyn TokenSource> = Arc::new(IdentityClient::new(IdentityConfig::new(
        config.identity.url.clone(),
        config.identity.client_id.clone(),
        config.identity.client_secret.clone(),
        config.identity.scope.clone(),
    )));

    let init = InitClient::new(
        InitConfig::new(
            config.partner.initialize_url.clone(),
            config.partner.business_partner_config_id.clone(),
        ),
        Arc::clone(&cache),
        Arc::clone(&tokens),
    );

    let checkout = CheckoutClient::try_new(
        CheckoutConfig {
            currency: config.checkout.currency.clone(),
            locale: config.checkout.locale.clone(),
            description: config.checkout.description.clone(),
            return_url: config.checkout.return_url.clone(),
            tax_rate: config.checkout.tax_rate,
            ..CheckoutConfig::new(
                config.checkout.base_url.clone(),
                config.partner.business_partner_config_id.clone(),
                config.checkout.settlement_configuration_id.clone(),
            )
        },
        Arc::clone(&cache),
        tokens,
    )?;

    let gateway = HttpGateway::new(GatewayConfig::new(
        config.gateway.base_url.clone(),
        config.gateway.public_key.clone(),
        config.gateway.private_key.clone(),
    ));

    let state = Arc::new(AppState {
        init: Arc::new(init),
        checkout: Arc::new(checkout),
        gateway: Arc::new(gateway),
        pages_dir: config.pages_dir.clone(),
    });

    let app = api_router(state)
        .layer(cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Payments facade listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Payments facade shut down gracefully");
    Ok(())
}

/// Builds the CORS layer: an explicit origin list when configured,
/// otherwise any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT];
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods(methods)
            .allow_headers(cors::Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(cors::AllowOrigin::list(parsed))
        .allow_methods(methods)
        .allow_headers(cors::Any)
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}
