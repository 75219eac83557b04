//! Error taxonomy for the identity, partner, and checkout clients.
//!
//! Every failure is translated into one of these variants at the point
//! where it is observed; nothing is swallowed. The HTTP layer decides
//! which status code each category maps to.

use http::StatusCode;

/// Errors raised by the partner-side clients.
#[derive(Debug, thiserror::Error)]
pub enum PartnerError {
    /// The caller asked for a payment method type we do not support.
    #[error("unsupported payment method type: {0}")]
    InvalidPaymentMethod(String),

    /// The identity or partner endpoint rejected our authorization (401).
    ///
    /// Observing this on a dependent call invalidates the cached token.
    #[error("upstream rejected authorization: {context}: {body}")]
    Auth {
        /// Human-readable context (e.g. `"POST /initializeClient"`).
        context: &'static str,
        /// The HTTP status code (always 401).
        status: StatusCode,
        /// The response body.
        body: String,
    },

    /// The upstream endpoint could not be reached.
    #[error("upstream unreachable: {context}: {source}")]
    Transport {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The upstream endpoint answered with a non-401 non-2xx status.
    #[error("upstream returned {status}: {context}: {body}")]
    Status {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },

    /// The response body was not the JSON shape we expected.
    #[error("malformed upstream response: {context}: {detail}")]
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

impl PartnerError {
    /// Whether this error came from a 401 on an upstream call.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}
