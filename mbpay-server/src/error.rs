//! Mapping from core errors to HTTP responses.
//!
//! Caller mistakes surface as 4xx, upstream failures as 5xx. Transport
//! failures get 503 so load balancers can distinguish "partner is down"
//! from "partner answered badly" (502).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mbpay::PartnerError;
use mbpay::gateway::GatewayError;

/// Errors a route handler can surface.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A partner-side client failed.
    #[error("{0}")]
    Partner(#[from] PartnerError),

    /// The gateway facade failed.
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    /// The requested demo page name is not acceptable.
    #[error("invalid page path")]
    InvalidPagePath,

    /// The requested demo page does not exist.
    #[error("page not found")]
    PageNotFound,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Partner(PartnerError::InvalidPaymentMethod(_)) | Self::InvalidPagePath => {
                StatusCode::BAD_REQUEST
            }
            Self::Partner(PartnerError::Transport { .. })
            | Self::Gateway(GatewayError::Transport { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Gateway(GatewayError::NotFound(_)) | Self::PageNotFound => StatusCode::NOT_FOUND,
            Self::Partner(_) | Self::Gateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_method_is_a_client_error() {
        let err = ApiError::Partner(PartnerError::InvalidPaymentMethod("sofort".to_owned()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_auth_failure_is_a_bad_gateway() {
        let err = ApiError::Partner(PartnerError::Auth {
            context: "test",
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn missing_transaction_is_not_found() {
        let err = ApiError::Gateway(GatewayError::NotFound("txn-1".to_owned()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn error_body_is_json() {
        let response = ApiError::PageNotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
