//! REST facade server for the multibrand payments backend.
//!
//! Translates a small REST surface into calls against the partner
//! initialize/checkout APIs and the payment-gateway facade from the
//! [`mbpay`] crate.
//!
//! # Modules
//!
//! - [`config`] — TOML configuration with environment variable expansion
//! - [`error`] — mapping from core errors to HTTP responses
//! - [`handlers`] — Axum route handlers and router builder
//! - [`pages`] — static demo-page serving

pub mod config;
pub mod error;
pub mod handlers;
pub mod pages;

pub use handlers::{AppState, SharedState, api_router};
