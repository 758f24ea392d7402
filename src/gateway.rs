//! Payment gateway client and signature verification.
//!
//! Two distinct signing schemes exist side by side:
//!
//! - Webhook deliveries: HMAC-SHA256 over the raw request body, keyed by the
//!   receiving creator's webhook secret. The bytes that reach
//!   [`verify_webhook_signature`] must be exactly the bytes on the wire --
//!   re-serializing the JSON first would change key order or whitespace and
//!   break the comparison.
//! - Client-submitted verification: HMAC-SHA256 over `"{order_id}|{payment_id}"`,
//!   keyed by the gateway API key secret shared with this service.

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Upper bound on a gateway round trip. A timed-out order creation leaves
/// nothing persisted and is safe for the client to retry.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

/// Order created at the gateway; `id` becomes our `gateway_order_id`.
#[derive(Debug, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, key_id: &str, key_secret: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(GATEWAY_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        }
    }

    /// Open an order at the gateway. `amount` is in minor units; `receipt`
    /// is our internal payment id, echoed back in gateway dashboards.
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder> {
        let request = CreateOrderRequest {
            amount,
            currency,
            receipt,
        };

        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Order creation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "Order creation returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse order response: {}", e)))
    }

    /// Verify a client-submitted payment confirmation: the gateway signs
    /// `"{order_id}|{payment_id}"` with the API key secret.
    pub fn verify_payment_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool> {
        let signed_text = format!("{}|{}", order_id, payment_id);
        verify_hmac_hex(signed_text.as_bytes(), signature, &self.key_secret)
    }
}

/// Verify an HMAC-SHA256 hex signature over `payload`.
///
/// Comparison is constant-time; the length check is not, but signature
/// length is not secret (always 64 hex chars for SHA-256).
pub fn verify_hmac_hex(payload: &[u8], signature: &str, secret: &str) -> Result<bool> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    let expected_bytes = expected.as_bytes();
    let provided_bytes = signature.as_bytes();

    if expected_bytes.len() != provided_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(provided_bytes).into())
}

/// Verify a webhook delivery against the raw body bytes.
pub fn verify_webhook_signature(raw_body: &[u8], signature: &str, secret: &str) -> Result<bool> {
    verify_hmac_hex(raw_body, signature, secret)
}
