//! OAuth client-credentials exchange against the identity endpoint.
//!
//! [`IdentityClient`] is the production [`TokenSource`]: a single
//! form-encoded POST with a Basic-auth header, returning the
//! `access_token` field of the JSON response. It performs no retry of
//! its own; the cache layer decides when to call it again.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use http::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::error::PartnerError;
use crate::token::{BearerToken, TokenSource};

/// Default timeout for identity and partner calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`IdentityClient`].
#[derive(Clone)]
pub struct IdentityConfig {
    /// The token endpoint URL.
    pub url: Url,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// The scope requested in the client-credentials grant.
    pub scope: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl IdentityConfig {
    /// Creates a config with the default timeout.
    #[must_use]
    pub fn new(
        url: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("url", &self.url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Wire format of a successful token grant response.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
}

/// Client for the identity endpoint's client-credentials grant.
pub struct IdentityClient {
    url: Url,
    basic_credential: String,
    scope: String,
    client: reqwest::Client,
}

impl IdentityClient {
    /// Creates a new client from the given configuration.
    #[must_use]
    pub fn new(config: IdentityConfig) -> Self {
        let basic_credential = format!(
            "Basic {}",
            BASE64_STANDARD.encode(format!("{}:{}", config.client_id, config.client_secret))
        );
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build reqwest::Client");

        Self {
            url: config.url,
            basic_credential,
            scope: config.scope,
            client,
        }
    }

    /// Returns the token endpoint URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityClient")
            .field("url", &self.url)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for IdentityClient {
    async fn fetch(&self) -> Result<BearerToken, PartnerError> {
        const CONTEXT: &str = "POST identity token endpoint";

        let response = self
            .client
            .post(self.url.clone())
            .header(http::header::AUTHORIZATION, self.basic_credential.as_str())
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PartnerError::Transport {
                context: CONTEXT,
                source: e,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| PartnerError::Transport {
            context: "read identity response body",
            source: e,
        })?;

        if status == StatusCode::UNAUTHORIZED {
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

        let grant: TokenGrant =
            serde_json::from_str(&body).map_err(|e| PartnerError::MalformedResponse {
                context: CONTEXT,
                detail: e.to_string(),
            })?;

        Ok(BearerToken::new(grant.access_token))
    }
}
