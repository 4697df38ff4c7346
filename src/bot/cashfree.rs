//! Cashfree Payment Gateway client (orders, UPI links, status, webhooks).

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};

use crate::config::{Config, GatewayMode};

const API_VERSION: &str = "2023-08-01";
const ORDER_EXPIRY_MINUTES: i64 = 30;

pub struct CashfreeClient {
    base_url: String,
    client_id: String,
    client_secret: String,
    upi_id: String,
    http: reqwest::Client,
}

/// A created order, enough to point the user at a payment.
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    pub order_id: String,
    pub payment_session_id: Option<String>,
    pub status: String,
}

/// How the user is asked to pay.
#[derive(Debug, Clone)]
pub enum UpiPayment {
    /// Gateway-hosted payment link.
    Link(String),
    /// Gateway could not issue a link; pay the configured UPI handle
    /// directly with the order id in the remark.
    Manual { upi_id: String },
}

#[derive(Serialize)]
struct CreateOrderRequest {
    order_id: String,
    order_amount: f64,
    order_currency: &'static str,
    customer_details: CustomerDetails,
    order_expiry_time: String,
    order_note: &'static str,
}

#[derive(Serialize)]
struct CustomerDetails {
    customer_id: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
}

#[derive(Deserialize)]
struct OrderResponse {
    order_id: String,
    #[serde(default)]
    payment_session_id: Option<String>,
    #[serde(default)]
    order_status: Option<String>,
}

#[derive(Serialize)]
struct UpiLinkRequest {
    payment_method: UpiMethod,
}

#[derive(Serialize)]
struct UpiMethod {
    upi: UpiChannel,
}

#[derive(Serialize)]
struct UpiChannel {
    channel: &'static str,
}

#[derive(Deserialize)]
struct UpiLinkResponse {
    #[serde(default)]
    data: Option<UpiLinkData>,
}

#[derive(Deserialize)]
struct UpiLinkData {
    #[serde(default)]
    payment_url: Option<String>,
}

#[derive(Serialize)]
struct RefundRequest {
    refund_id: String,
    refund_amount: f64,
    refund_note: String,
}

impl CashfreeClient {
    pub fn new(config: &Config) -> Self {
        let base_url = match config.gateway_mode {
            GatewayMode::Production => "https://api.cashfree.com/pg".to_string(),
            GatewayMode::Sandbox => "https://sandbox.cashfree.com/pg".to_string(),
        };
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            base_url,
            client_id: config.cashfree_client_id.clone(),
            client_secret: config.cashfree_client_secret.clone(),
            upi_id: config.upi_id.clone(),
            http,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-client-id", &self.client_id)
            .header("x-client-secret", &self.client_secret)
            .header("x-api-version", API_VERSION)
    }

    /// Create a payment order for a fixed amount in INR.
    pub async fn create_order(
        &self,
        telegram_id: i64,
        order_id: &str,
        amount: u32,
    ) -> Result<PaymentOrder, String> {
        let expiry = chrono::Utc::now() + chrono::Duration::minutes(ORDER_EXPIRY_MINUTES);
        let request = CreateOrderRequest {
            order_id: order_id.to_string(),
            order_amount: amount as f64,
            order_currency: "INR",
            customer_details: CustomerDetails {
                customer_id: telegram_id.to_string(),
                customer_name: format!("User_{telegram_id}"),
                customer_email: format!("user_{telegram_id}@atsresume.invalid"),
                // Gateway requires a phone; Telegram does not provide one.
                customer_phone: "9999999999".to_string(),
            },
            order_expiry_time: expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            order_note: "ATS Resume Optimization Payment",
        };

        let response = self
            .request(reqwest::Method::POST, "/orders")
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("order creation failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("order creation failed ({status}): {body}"));
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| format!("order creation returned bad JSON: {e}"))?;

        info!("Payment order created: {}", order.order_id);
        Ok(PaymentOrder {
            order_id: order.order_id,
            payment_session_id: order.payment_session_id,
            status: order.order_status.unwrap_or_else(|| "ACTIVE".to_string()),
        })
    }

    /// Ask the gateway for a UPI payment link for an existing order. Any
    /// gateway failure degrades to manual UPI instructions instead of an
    /// error; the order can still be paid and verified.
    pub async fn create_upi_link(&self, order_id: &str) -> UpiPayment {
        let request = UpiLinkRequest {
            payment_method: UpiMethod { upi: UpiChannel { channel: "link" } },
        };

        let result = self
            .request(reqwest::Method::POST, &format!("/orders/{order_id}/payments"))
            .json(&request)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<UpiLinkResponse>().await {
                    Ok(body) => match body.data.and_then(|d| d.payment_url) {
                        Some(url) => UpiPayment::Link(url),
                        None => UpiPayment::Manual { upi_id: self.upi_id.clone() },
                    },
                    Err(e) => {
                        warn!("UPI link response parse failed: {e}");
                        UpiPayment::Manual { upi_id: self.upi_id.clone() }
                    }
                }
            }
            Ok(response) => {
                warn!("UPI link request rejected ({})", response.status());
                UpiPayment::Manual { upi_id: self.upi_id.clone() }
            }
            Err(e) => {
                warn!("UPI link request failed: {e}");
                UpiPayment::Manual { upi_id: self.upi_id.clone() }
            }
        }
    }

    /// Fetch the current order status. `"PAID"` gates delivery.
    pub async fn order_status(&self, order_id: &str) -> Result<String, String> {
        let response = self
            .request(reqwest::Method::GET, &format!("/orders/{order_id}"))
            .send()
            .await
            .map_err(|e| format!("status check failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(format!("status check failed ({status})"));
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| format!("status check returned bad JSON: {e}"))?;

        let status = order.order_status.unwrap_or_else(|| "UNKNOWN".to_string());
        info!("Order {} status: {}", order_id, status);
        Ok(status)
    }

    /// Refund a paid order.
    pub async fn refund(&self, order_id: &str, amount: u32, note: &str) -> Result<(), String> {
        let refund_id = format!("refund_{}_{}", order_id, chrono::Utc::now().timestamp());
        let request = RefundRequest {
            refund_id,
            refund_amount: amount as f64,
            refund_note: note.to_string(),
        };

        let response = self
            .request(reqwest::Method::POST, &format!("/orders/{order_id}/refunds"))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("refund failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("refund failed ({status}): {body}"));
        }
        Ok(())
    }

    /// Verify a webhook signature: hex HMAC-SHA256 of `"{timestamp}.{payload}"`
    /// keyed with the client secret.
    pub fn verify_webhook_signature(
        &self,
        payload: &str,
        signature: &str,
        timestamp: &str,
    ) -> bool {
        verify_signature(&self.client_secret, payload, signature, timestamp)
    }
}

fn verify_signature(secret: &str, payload: &str, signature: &str, timestamp: &str) -> bool {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());

    let expected: Vec<u8> = match hex_decode(signature) {
        Some(bytes) => bytes,
        None => return false,
    };
    // verify_slice is constant-time
    mac.verify_slice(&expected).is_ok()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Build the order id used for a user's payment attempt.
pub fn new_order_id(telegram_id: i64) -> String {
    format!("ATS_{}_{}", telegram_id, chrono::Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &str, timestamp: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    #[test]
    fn test_signature_accepts_valid() {
        let sig = sign("secret", r#"{"order_id":"ATS_1_2"}"#, "1700000000");
        assert!(verify_signature("secret", r#"{"order_id":"ATS_1_2"}"#, &sig, "1700000000"));
    }

    #[test]
    fn test_signature_rejects_tampered_payload() {
        let sig = sign("secret", r#"{"order_id":"ATS_1_2"}"#, "1700000000");
        assert!(!verify_signature("secret", r#"{"order_id":"ATS_1_3"}"#, &sig, "1700000000"));
    }

    #[test]
    fn test_signature_rejects_wrong_secret() {
        let sig = sign("secret", "payload", "1700000000");
        assert!(!verify_signature("other", "payload", &sig, "1700000000"));
    }

    #[test]
    fn test_signature_rejects_shifted_timestamp() {
        let sig = sign("secret", "payload", "1700000000");
        assert!(!verify_signature("secret", "payload", &sig, "1700000001"));
    }

    #[test]
    fn test_signature_rejects_garbage_hex() {
        assert!(!verify_signature("secret", "payload", "not-hex", "1700000000"));
        assert!(!verify_signature("secret", "payload", "abc", "1700000000"));
    }

    #[test]
    fn test_hex_decode() {
        assert_eq!(hex_decode("00ff10"), Some(vec![0x00, 0xff, 0x10]));
        assert_eq!(hex_decode("0g"), None);
        assert_eq!(hex_decode("abc"), None);
    }

    #[test]
    fn test_order_id_shape() {
        let order_id = new_order_id(42);
        assert!(order_id.starts_with("ATS_42_"));
        let ts: i64 = order_id.rsplit('_').next().unwrap().parse().unwrap();
        assert!(ts > 1_600_000_000);
    }
}
