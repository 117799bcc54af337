//! Payment provider abstraction and its HTTP implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ShopError;
use crate::models::PaymentStatus;

/// A created payment: the provider-side id plus where to send the user.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub payment_id: String,
    pub redirect_url: String,
}

/// External payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment for `amount_cents`. The idempotency key makes
    /// retried requests safe: one checkout can never produce two charges.
    async fn create_payment(
        &self,
        amount_cents: i64,
        currency: &str,
        description: &str,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, ShopError>;

    async fn get_status(&self, payment_id: &str) -> Result<PaymentStatus, ShopError>;
}

#[derive(Serialize)]
struct CreatePaymentRequest<'a> {
    amount: Amount<'a>,
    description: &'a str,
}

#[derive(Serialize)]
struct Amount<'a> {
    value: String,
    currency: &'a str,
}

#[derive(Deserialize)]
struct CreatePaymentResponse {
    id: String,
    confirmation_url: String,
}

#[derive(Deserialize)]
struct PaymentStatusResponse {
    status: String,
}

/// JSON-over-HTTP gateway client.
pub struct HttpPaymentGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }
}

fn gateway_err(e: reqwest::Error) -> ShopError {
    ShopError::Payment(e.to_string())
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment(
        &self,
        amount_cents: i64,
        currency: &str,
        description: &str,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, ShopError> {
        let body = CreatePaymentRequest {
            amount: Amount {
                value: crate::models::format_cents(amount_cents),
                currency,
            },
            description,
        };

        let response = self
            .http
            .post(format!("{}/payments", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Idempotence-Key", idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(gateway_err)?;

        if !response.status().is_success() {
            return Err(ShopError::Payment(format!(
                "create payment returned {}",
                response.status()
            )));
        }

        let created: CreatePaymentResponse = response.json().await.map_err(gateway_err)?;
        debug!(payment_id = %created.id, "Payment created");

        Ok(PaymentIntent {
            payment_id: created.id,
            redirect_url: created.confirmation_url,
        })
    }

    async fn get_status(&self, payment_id: &str) -> Result<PaymentStatus, ShopError> {
        let response = self
            .http
            .get(format!("{}/payments/{}", self.base_url, payment_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(gateway_err)?;

        if !response.status().is_success() {
            return Err(ShopError::Payment(format!(
                "payment status returned {}",
                response.status()
            )));
        }

        let parsed: PaymentStatusResponse = response.json().await.map_err(gateway_err)?;
        PaymentStatus::parse(&parsed.status)
            .ok_or_else(|| ShopError::Payment(format!("unknown payment status {}", parsed.status)))
    }
}
