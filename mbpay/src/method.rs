//! The payment method types accepted by the partner API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PartnerError;

/// A payment method type supported by the partner initialize endpoint.
///
/// Anything outside this set is rejected before a network call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodType {
    /// Credit and debit cards.
    CreditCard,
    /// Apple Pay.
    ApplePay,
    /// Google Pay.
    GooglePay,
    /// PayPal.
    PayPal,
}

impl PaymentMethodType {
    /// All supported method types.
    pub const ALL: [Self; 4] = [Self::CreditCard, Self::ApplePay, Self::GooglePay, Self::PayPal];

    /// The wire name used in request payloads and URL segments.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreditCard => "creditcard",
            Self::ApplePay => "applepay",
            Self::GooglePay => "googlepay",
            Self::PayPal => "paypal",
        }
    }
}

impl fmt::Display for PaymentMethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethodType {
    type Err = PartnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creditcard" => Ok(Self::CreditCard),
            "applepay" => Ok(Self::ApplePay),
            "googlepay" => Ok(Self::GooglePay),
            "paypal" => Ok(Self::PayPal),
            other => Err(PartnerError::InvalidPaymentMethod(other.to_owned())),
        }
    }
}
