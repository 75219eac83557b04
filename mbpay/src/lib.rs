//! Client core for the multibrand payments facade.
//!
//! This crate holds the pieces the REST layer delegates to: the partner
//! OAuth token lifecycle, the initialize-client caller, the checkout API
//! clients, and the facade over the payment-gateway provider.
//!
//! # Overview
//!
//! Calls against the partner checkout platform are authenticated with a
//! bearer token obtained via an OAuth client-credentials grant. The token
//! has a server-side expiry that is not reported to us, so staleness is
//! detected reactively: a dependent call that comes back `401` invalidates
//! the cached token, and the next caller fetches a fresh one. The cache is
//! single-flight — concurrent callers that observe an empty slot collapse
//! into one underlying fetch.
//!
//! # Modules
//!
//! - [`token`] — single-slot bearer-token cache and the [`token::TokenSource`] seam
//! - [`identity`] — OAuth client-credentials exchange against the identity endpoint
//! - [`partner`] — initialize-client caller with 401-driven invalidation
//! - [`checkout`] — direct and recurring reserve calls against the checkout API
//! - [`gateway`] — facade over the payment-gateway provider API
//! - [`method`] — the supported payment method types
//! - [`error`] — error taxonomy shared by the partner-side clients

pub mod checkout;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod method;
pub mod partner;
pub mod token;

pub use error::PartnerError;
pub use method::PaymentMethodType;
pub use token::{BearerToken, TokenCache, TokenSource};
