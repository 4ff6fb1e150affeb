use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result, msg};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
    url: String,
}

/// Stripe list envelope (`{"object": "list", "data": [...]}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

/// One-off checkout for a local payment row. Prices are sent inline as `price_data`.
pub struct CheckoutRequest<'a> {
    pub payment_id: &'a str,
    pub user_id: &'a str,
    pub customer_id: Option<&'a str>,
    pub customer_email: &'a str,
    pub product_name: &'a str,
    pub amount_cents: i64,
    pub currency: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.to_string(),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Create a checkout session, returning `(session_id, checkout_url)`.
    pub async fn create_checkout_session(&self, request: &CheckoutRequest<'_>) -> Result<(String, String)> {
        let amount = request.amount_cents.to_string();
        let mut form = vec![
            ("mode", "payment"),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            ("client_reference_id", request.payment_id),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", request.currency),
            ("line_items[0][price_data][unit_amount]", amount.as_str()),
            ("line_items[0][price_data][product_data][name]", request.product_name),
            ("metadata[payment_id]", request.payment_id),
            ("metadata[user_id]", request.user_id),
            ("payment_intent_data[metadata][payment_id]", request.payment_id),
        ];
        match request.customer_id {
            Some(customer) => form.push(("customer", customer)),
            None => {
                form.push(("customer_email", request.customer_email));
                form.push(("customer_creation", "always"));
            }
        }

        let response = self
            .client
            .post(format!("{}/checkout/sessions", STRIPE_API_BASE))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("Stripe API error: {}", error_text)));
        }

        let session: CreateCheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Stripe response: {}", e)))?;

        Ok((session.id, session.url))
    }

    pub async fn list_subscriptions(&self, customer_id: &str) -> Result<Vec<StripeSubscription>> {
        self.list("subscriptions", customer_id).await
    }

    pub async fn list_invoices(&self, customer_id: &str) -> Result<Vec<StripeInvoice>> {
        self.list("invoices", customer_id).await
    }

    async fn list<T: serde::de::DeserializeOwned>(&self, resource: &str, customer_id: &str) -> Result<Vec<T>> {
        let response = self
            .client
            .get(format!("{}/{}", STRIPE_API_BASE, resource))
            .basic_auth(&self.secret_key, None::<&str>)
            .query(&[("customer", customer_id), ("limit", "100")])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("Stripe API error: {}", error_text)));
        }

        let list: StripeList<T> = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Stripe response: {}", e)))?;
        Ok(list.data)
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        // Stripe signature format: t=timestamp,v1=signature[,v1=...]
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in signature.split(',') {
            let part = part.trim();
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                signatures.push(s);
            }
        }

        let timestamp_str =
            timestamp.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
        if signatures.is_empty() {
            return Err(AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()));
        }

        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

        let age = chrono::Utc::now().timestamp() - timestamp;
        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }
        // Clock skew tolerance: 60 seconds
        if age < -60 {
            tracing::warn!("Stripe webhook rejected: timestamp in the future (age={}s)", age);
            return Ok(false);
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
        mac.update(timestamp_str.as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());
        let expected_bytes = expected.as_bytes();

        // Signature length is not secret (always 64 hex chars), only the content is compared in constant time.
        Ok(signatures.iter().any(|provided| {
            let provided_bytes = provided.as_bytes();
            expected_bytes.len() == provided_bytes.len()
                && bool::from(expected_bytes.ct_eq(provided_bytes))
        }))
    }
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ============ checkout.session.completed ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: String,
    pub customer: Option<String>,
    pub customer_email: Option<String>,
    pub payment_intent: Option<String>,
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StripeMetadata {
    pub payment_id: Option<String>,
    pub user_id: Option<String>,
}

// ============ payment_intent.payment_failed ============

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    #[serde(default)]
    pub metadata: StripeMetadata,
    pub last_payment_error: Option<StripePaymentError>,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentError {
    pub message: Option<String>,
}

// ============ customer.subscription.* ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Option<String>,
    pub status: String, // "active", "past_due", "canceled", etc.
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub metadata: StripeMetadata,
    pub items: Option<StripeList<StripeSubscriptionItem>>,
}

impl StripeSubscription {
    pub fn price_id(&self) -> Option<&str> {
        self.items
            .as_ref()
            .and_then(|items| items.data.first())
            .map(|item| item.price.id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscriptionItem {
    pub price: StripePrice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

// ============ invoices (listing) ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub number: Option<String>,
    pub status: Option<String>,
    pub amount_due: i64,
    pub amount_paid: i64,
    pub currency: String,
    pub created: i64,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_accepted() {
        let client = StripeClient::new("sk_test", "whsec_test");
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign("whsec_test", chrono::Utc::now().timestamp(), payload);
        assert!(client.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn wrong_secret_or_tampered_payload_rejected() {
        let client = StripeClient::new("sk_test", "whsec_test");
        let now = chrono::Utc::now().timestamp();
        let header = sign("whsec_other", now, b"{}");
        assert!(!client.verify_webhook_signature(b"{}", &header).unwrap());

        let header = sign("whsec_test", now, b"{}");
        assert!(!client.verify_webhook_signature(b"{ }", &header).unwrap());
    }

    #[test]
    fn stale_timestamp_rejected() {
        let client = StripeClient::new("sk_test", "whsec_test");
        let old = chrono::Utc::now().timestamp() - 301;
        let header = sign("whsec_test", old, b"{}");
        assert!(!client.verify_webhook_signature(b"{}", &header).unwrap());
    }

    #[test]
    fn malformed_header_is_bad_request() {
        let client = StripeClient::new("sk_test", "whsec_test");
        assert!(matches!(
            client.verify_webhook_signature(b"{}", "v1=abc"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            client.verify_webhook_signature(b"{}", "t=notanumber,v1=abc"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn subscription_price_id_from_items() {
        let sub: StripeSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "current_period_end": 1700000000,
            "items": {"data": [{"price": {"id": "price_1"}}]}
        }))
        .unwrap();
        assert_eq!(sub.price_id(), Some("price_1"));
        assert!(!sub.cancel_at_period_end);
    }
}
