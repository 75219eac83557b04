//! Server configuration.
//!
//! Loaded from a TOML file with `$VAR` / `${VAR}` expansion from the
//! process environment. Secrets are never given defaults: startup fails
//! if the identity client secret or the gateway private key is missing
//! or still an unresolved variable reference.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 8402
//! cors_allowed_origins = ["http://localhost:5500"]
//!
//! [identity]
//! url = "https://identity.example/oauth"
//! client_id = "mbpay"
//! client_secret = "$MBPAY_IDENTITY_SECRET"
//! scope = "T00X7T70"
//!
//! [partner]
//! initialize_url = "https://partner.example/mapi-adapter/initializeClient"
//! business_partner_config_id = "3023"
//!
//! [checkout]
//! base_url = "https://partner.example/checkout-api"
//! settlement_configuration_id = "32727"
//! return_url = "https://shop.example/return"
//! description = "Payment mandate"
//!
//! [gateway]
//! base_url = "https://gateway.example/api"
//! public_key = "pub"
//! private_key = "$MBPAY_GATEWAY_KEY"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to configuration file (default: `config.toml`)
//! - `HOST` / `PORT` — Override server bind address and port
//! - Any variable referenced via `$VAR` in the file

use std::net::IpAddr;
use std::path::PathBuf;

use serde::Deserialize;
use url::Url;

/// Errors raised while loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// The path that was attempted.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML.
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required secret is unset or still an unresolved `$VAR`.
    #[error("required secret `{0}` is unset; refusing to start with a default credential")]
    MissingSecret(&'static str),
}

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `8402`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS; empty means any origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    /// Directory the demo pages are served from (default: `pages`).
    #[serde(default = "default_pages_dir")]
    pub pages_dir: PathBuf,

    /// Identity endpoint settings.
    pub identity: IdentitySettings,

    /// Partner initialize endpoint settings.
    pub partner: PartnerSettings,

    /// Checkout API settings.
    pub checkout: CheckoutSettings,

    /// Payment gateway settings.
    pub gateway: GatewaySettings,
}

/// OAuth identity endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySettings {
    /// Token endpoint URL.
    pub url: Url,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret. Supports `$VAR` expansion; never defaulted.
    pub client_secret: String,
    /// Scope requested in the client-credentials grant.
    pub scope: String,
}

/// Partner initialize endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PartnerSettings {
    /// The initialize-client endpoint URL.
    pub initialize_url: Url,
    /// Business partner configuration id, shared with the checkout API.
    pub business_partner_config_id: String,
}

/// Checkout API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSettings {
    /// Base URL of the checkout API.
    pub base_url: Url,
    /// Settlement configuration id sent with every reserve.
    pub settlement_configuration_id: String,
    /// ISO currency code (default: `EUR`).
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Locale for customer-facing texts (default: `de_DE`).
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Description shown on the mandate/receipt.
    pub description: String,
    /// URL the hosted checkout redirects back to.
    pub return_url: String,
    /// Tax rate in percent (default: 19).
    #[serde(default = "default_tax_rate")]
    pub tax_rate: u8,
}

/// Payment gateway settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Base URL of the gateway REST relay.
    pub base_url: Url,
    /// API public key.
    pub public_key: String,
    /// API private key. Supports `$VAR` expansion; never defaulted.
    pub private_key: String,
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

fn default_port() -> u16 {
    8402
}

fn default_pages_dir() -> PathBuf {
    PathBuf::from("pages")
}

fn default_currency() -> String {
    "EUR".to_owned()
}

fn default_locale() -> String {
    "de_DE".to_owned()
}

fn default_tax_rate() -> u8 {
    19
}

impl ServerConfig {
    /// Loads configuration from the path given by the `CONFIG` environment
    /// variable, falling back to `config.toml` in the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or
    /// if a required secret is unresolved.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// As [`Self::load`].
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_owned(),
            source: e,
        })?;
        let mut config = Self::parse(&raw)?;

        if let Ok(host) = std::env::var("HOST")
            && let Ok(addr) = host.parse()
        {
            config.host = addr;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses a raw TOML string, expanding `$VAR` references from the
    /// process environment. Does not validate secrets.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let expanded = expand_vars_with(raw, |name| std::env::var(name).ok());
        Ok(toml::from_str(&expanded)?)
    }

    /// Rejects configurations that would run with an unset secret.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSecret`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if secret_unresolved(&self.identity.client_secret) {
            return Err(ConfigError::MissingSecret("identity.client_secret"));
        }
        if secret_unresolved(&self.gateway.private_key) {
            return Err(ConfigError::MissingSecret("gateway.private_key"));
        }
        Ok(())
    }
}

fn secret_unresolved(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.starts_with('$')
}

/// Expands `$VAR` and `${VAR}` references using `lookup`.
///
/// Unresolved references are left in place so validation can flag them.
fn expand_vars_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];

        let (name, consumed, braced) = if let Some(stripped) = rest.strip_prefix('{') {
            match stripped.find('}') {
                Some(end) => (&stripped[..end], end + 2, true),
                None => ("", 0, true),
            }
        } else {
            let end = rest
                .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(rest.len());
            (&rest[..end], end, false)
        };

        if name.is_empty() {
            out.push('$');
            continue;
        }

        match lookup(name) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('$');
                if braced {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                } else {
                    out.push_str(name);
                }
            }
        }
        rest = &rest[consumed..];
    }

    out.push_str(rest);
    out
}
