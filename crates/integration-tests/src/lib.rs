//! Shared helpers for COD Form integration tests.
//!
//! Tests run the real router and clients against in-process fake upstreams
//! (Shopify, geo-IP) bound to ephemeral ports. Nothing here needs a running
//! database: the pool is lazy and the routes under test never query it.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cod-form-integration-tests
//! ```

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use cod_form_core::{CurrencyCode, Money};
use cod_form_server::config::{AppConfig, GeoIpConfig, ShopifyAppConfig};
use cod_form_server::shopify::signature;
use rust_decimal::Decimal;
use secrecy::SecretString;

/// Shopify app secret used to sign test requests.
pub const API_SECRET: &str = "integration_secret_5f0c9a";

/// Shop every test request comes from.
pub const SHOP: &str = "demo.myshopify.com";

/// Configuration pointing outbound calls at `geoip_base_url`.
#[must_use]
pub fn test_config(geoip_base_url: &str) -> AppConfig {
    AppConfig {
        database_url: SecretString::from("postgres://localhost/cod_form_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("k3J9x!mQ2@vL7#pR5$tW8^yB4&nC6*zD"),
        shopify: ShopifyAppConfig {
            api_key: "integration_api_key".to_string(),
            api_secret: SecretString::from(API_SECRET),
            api_version: "2025-01".to_string(),
            scopes: "write_draft_orders,write_orders,read_products".to_string(),
        },
        fallback_shipping_rate: Money::new(Decimal::new(250, 0), CurrencyCode::pkr()),
        geoip: GeoIpConfig {
            base_url: geoip_base_url.to_string(),
            default_country: "Pakistan".to_string(),
        },
        http_timeout: Duration::from_secs(5),
        json_logs: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A pool that never connects unless a query runs.
#[must_use]
pub fn lazy_pool() -> sqlx::PgPool {
    sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://localhost/cod_form_test")
        .unwrap()
}

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Query string signed the way Shopify signs App Proxy requests.
#[must_use]
pub fn signed_proxy_query(params: &[(&str, &str)]) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_unstable();
    let message: String = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect();
    let sig = signature::sign(&SecretString::from(API_SECRET), &message);

    let mut pairs: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.push(format!("signature={sig}"));
    pairs.join("&")
}
