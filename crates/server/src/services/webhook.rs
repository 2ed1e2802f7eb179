//! Merchant order webhook (Google Sheets export).
//!
//! Delivery is fire-and-forget: the POST runs on a detached task with its own
//! timeout and a failure only produces a log line.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{Instrument, info_span, warn};

/// Request timeout for a single webhook delivery.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Body posted to the merchant's webhook URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWebhookPayload {
    pub order_id: Option<String>,
    pub customer: WebhookCustomer,
    /// One `"<title> x <quantity>"` entry per cart line.
    pub products: Vec<String>,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookCustomer {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub country: String,
}

/// Posts order payloads to merchant webhooks.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    /// Create the client.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .connect_timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// POST `payload` to `url` and report the outcome.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` on transport failure or a non-success status.
    pub async fn deliver(&self, url: &str, payload: &OrderWebhookPayload) -> Result<(), reqwest::Error> {
        self.client
            .post(url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Deliver on a detached task. Never fails the caller.
    pub fn spawn_delivery(&self, url: String, payload: OrderWebhookPayload) {
        let client = self.clone();
        let span = info_span!("order_webhook", order_id = ?payload.order_id);
        tokio::spawn(
            async move {
                if let Err(e) = client.deliver(&url, &payload).await {
                    warn!(error = %e, "Order webhook delivery failed");
                }
            }
            .instrument(span),
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::sync::mpsc;

    fn payload() -> OrderWebhookPayload {
        OrderWebhookPayload {
            order_id: Some("1001".to_string()),
            customer: WebhookCustomer {
                name: "Ali Khan".to_string(),
                phone: "+923001234567".to_string(),
                address: "House 1, Street 2".to_string(),
                city: "Lahore".to_string(),
                country: "Pakistan".to_string(),
            },
            products: vec!["Kurta x 2".to_string()],
            total: Decimal::new(215_000, 2),
        }
    }

    #[test]
    fn test_payload_shape() {
        let json = serde_json::to_value(payload()).unwrap();
        assert_eq!(json["orderId"], "1001");
        assert_eq!(json["customer"]["city"], "Lahore");
        assert_eq!(json["products"][0], "Kurta x 2");
        assert_eq!(json["total"], "2150.00");
    }

    #[tokio::test]
    async fn test_spawned_delivery_reaches_receiver() {
        let (tx, mut rx) = mpsc::channel::<serde_json::Value>(1);
        let app = Router::new().route(
            "/hook",
            post(move |Json(body): Json<serde_json::Value>| {
                let tx = tx.clone();
                async move {
                    tx.send(body).await.unwrap();
                    "ok"
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        WebhookClient::new()
            .unwrap()
            .spawn_delivery(format!("http://{addr}/hook"), payload());

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received["customer"]["name"], "Ali Khan");
    }

    #[tokio::test]
    async fn test_delivery_error_is_reported() {
        let client = WebhookClient::new().unwrap();
        assert!(client.deliver("http://127.0.0.1:9/hook", &payload()).await.is_err());
    }
}
