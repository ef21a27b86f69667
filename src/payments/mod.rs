use async_trait::async_trait;
use thiserror::Error;

pub mod client;
pub mod events;
pub mod webhook;

pub use client::StripeClient;

/// Placeholder the gateway substitutes with the real session id in the
/// success redirect.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected request ({status}): {message}")]
    Gateway { status: u16, message: String },

    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

/// Convert a major-unit price to the gateway's minor units (cents).
pub fn to_minor_units(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

/// What the application sends when opening a hosted checkout. Redirect
/// URLs are derived from configuration by the client itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutParams {
    pub event_id: String,
    pub user_id: String,
    pub product_name: String,
    pub unit_amount: i64,
}

/// The slice of the gateway's session object the application keeps.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Hosted-checkout gateway. Two operations total: session creation here,
/// callback verification in [`webhook`]. Errors pass through unaltered and
/// nothing is retried.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        params: CheckoutParams,
    ) -> Result<CheckoutSession, PaymentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_unit_conversion() {
        assert_eq!(to_minor_units(24.99), 2499);
        assert_eq!(to_minor_units(10.0), 1000);
        assert_eq!(to_minor_units(0.0), 0);
        assert_eq!(to_minor_units(15.0), 1500);
        // float representation of .1 still rounds to the right cent
        assert_eq!(to_minor_units(0.1), 10);
        assert_eq!(to_minor_units(19.999), 2000);
    }
}
