use async_trait::async_trait;
use serde::Deserialize;

use crate::config::PaymentConfig;
use crate::payments::{
    CheckoutParams, CheckoutSession, PaymentError, PaymentGateway, SESSION_ID_PLACEHOLDER,
};

const DEFAULT_API_BASE: &str = "https://api.stripe.com";
const CURRENCY: &str = "usd";

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Thin adapter over the gateway's REST API. Holds configuration only; one
/// network call per operation, no retries, errors surfaced to the caller.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    config: PaymentConfig,
}

impl StripeClient {
    pub fn new(config: PaymentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            config,
        }
    }

    /// Point the client at a different API host. Used by tests.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn publishable_key(&self) -> &str {
        &self.config.publishable_key
    }

    fn success_url(&self) -> String {
        format!(
            "{}/payment/success?session_id={SESSION_ID_PLACEHOLDER}",
            self.config.base_url
        )
    }

    fn cancel_url(&self) -> String {
        format!("{}/payment/error", self.config.base_url)
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        params: CheckoutParams,
    ) -> Result<CheckoutSession, PaymentError> {
        let unit_amount = params.unit_amount.to_string();
        let success_url = self.success_url();
        let cancel_url = self.cancel_url();

        let form: Vec<(&str, &str)> = vec![
            ("payment_method_types[0]", "card"),
            ("line_items[0][price_data][currency]", CURRENCY),
            (
                "line_items[0][price_data][product_data][name]",
                &params.product_name,
            ),
            ("line_items[0][price_data][unit_amount]", &unit_amount),
            ("line_items[0][quantity]", "1"),
            ("mode", "payment"),
            ("success_url", &success_url),
            ("cancel_url", &cancel_url),
            ("metadata[eventId]", &params.event_id),
            ("metadata[userId]", &params.user_id),
        ];

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| "unknown gateway error".to_string());
            return Err(PaymentError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Malformed(e.to_string()))?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }
}
