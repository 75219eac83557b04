//! Static demo-page serving.
//!
//! The demo pages exercise the hosted checkout flows from a browser.
//! Filenames are restricted to plain `.html` names inside the configured
//! pages directory; anything with a path separator is rejected before it
//! reaches the filesystem.

use std::path::Path;

use axum::http::header;
use axum::response::{Html, IntoResponse, Response};

use crate::error::ApiError;

/// Index page linking the demo flows.
pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>mbpay demo pages</title>
</head>
<body>
    <ul>
        <li><a href="/pages/recurring_reserve_creditcard.html">Recurring reserve: credit card</a></li>
        <li><a href="/pages/recurring_reserve_googlepay.html">Recurring reserve: Google Pay</a></li>
        <li><a href="/pages/recurring_reserve_paypal.html">Recurring reserve: PayPal</a></li>
        <li><a href="/pages/reserve.html">One-time reserve</a></li>
    </ul>
</body>
</html>
"#;

/// Whether `filename` is a plain `.html` name without path traversal.
#[must_use]
pub fn is_safe_page_name(filename: &str) -> bool {
    !filename.is_empty()
        && filename.ends_with(".html")
        && !filename.contains(['/', '\\'])
        && !filename.contains("..")
}

/// Reads and serves a demo page from `dir`.
///
/// # Errors
///
/// Returns [`ApiError::InvalidPagePath`] for unacceptable names and
/// [`ApiError::PageNotFound`] when the file does not exist.
pub async fn serve_page(dir: &Path, filename: &str) -> Result<Response, ApiError> {
    if !is_safe_page_name(filename) {
        return Err(ApiError::InvalidPagePath);
    }

    let content = tokio::fs::read_to_string(dir.join(filename))
        .await
        .map_err(|_| ApiError::PageNotFound)?;

    Ok(([(header::CACHE_CONTROL, "no-cache")], Html(content)).into_response())
}
