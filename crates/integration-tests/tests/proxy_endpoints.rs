//! App Proxy endpoints through the full router.
//!
//! Requests go over TCP to the real application with a fake geo-IP upstream.
//! Only endpoints that never reach the database are exercised here.

#![allow(clippy::unwrap_used)]

use axum::extract::Path;
use axum::routing::get;
use axum::{Json, Router};
use cod_form_integration_tests::{SHOP, lazy_pool, signed_proxy_query, spawn, test_config};
use cod_form_server::build_app;
use cod_form_server::state::AppState;
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn fake_geoip() -> String {
    let app = Router::new().route(
        "/json/{ip}",
        get(|Path(ip): Path<String>| async move {
            let country = if ip == "94.200.0.1" {
                "United Arab Emirates"
            } else {
                ""
            };
            Json(json!({ "country": country }))
        }),
    );
    format!("{}/json", spawn(app).await)
}

async fn start() -> String {
    let config = test_config(&fake_geoip().await);
    let state = AppState::new(config, lazy_pool()).unwrap();
    spawn(build_app(state)).await
}

fn proxy_params() -> Vec<(&'static str, &'static str)> {
    vec![
        ("shop", SHOP),
        ("logged_in_customer_id", ""),
        ("path_prefix", "/apps/cod"),
        ("timestamp", "1700000000"),
    ]
}

#[tokio::test]
async fn test_country_by_ip_uses_geoip_lookup() {
    let base = start().await;
    let query = signed_proxy_query(&proxy_params());

    let response = reqwest::Client::new()
        .get(format!("{base}/proxy/get-country-by-ip?{query}"))
        .header("x-forwarded-for", "94.200.0.1, 10.0.0.1")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["country"], "United Arab Emirates");
}

#[tokio::test]
async fn test_country_by_ip_falls_back_to_default() {
    let base = start().await;
    let query = signed_proxy_query(&proxy_params());

    let response = reqwest::Client::new()
        .get(format!("{base}/proxy/get-country-by-ip?{query}"))
        .header("x-forwarded-for", "198.51.100.20")
        .send()
        .await
        .unwrap();

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["country"], "Pakistan");
}

#[tokio::test]
async fn test_unsigned_and_tampered_requests_are_rejected() {
    let base = start().await;
    let client = reqwest::Client::new();

    let unsigned = client
        .get(format!("{base}/proxy/get-settings?shop={SHOP}"))
        .header("x-forwarded-for", "198.51.100.21")
        .send()
        .await
        .unwrap();
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);
    let body: Value = unsigned.json().await.unwrap();
    assert_eq!(body["success"], false);

    let tampered = signed_proxy_query(&proxy_params()).replace(SHOP, "other.myshopify.com");
    let response = client
        .get(format!("{base}/proxy/get-settings?{tampered}"))
        .header("x-forwarded-for", "198.51.100.21")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signed_request_for_non_shopify_domain_is_bad_request() {
    let base = start().await;
    let query = signed_proxy_query(&[("shop", "evil.example.com"), ("timestamp", "1")]);

    let response = reqwest::Client::new()
        .get(format!("{base}/proxy/get-pixels?{query}"))
        .header("x-forwarded-for", "198.51.100.22")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_endpoint_is_rate_limited_per_ip() {
    let base = start().await;
    let client = reqwest::Client::new();

    let mut statuses = Vec::new();
    for _ in 0..6 {
        let response = client
            .post(format!("{base}/proxy/create-order?shop={SHOP}"))
            .header("x-forwarded-for", "198.51.100.23")
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        statuses.push(response.status());
    }

    // Burst of five reaches the signature check, the sixth is throttled.
    assert!(statuses[..5].iter().all(|s| *s == StatusCode::UNAUTHORIZED));
    assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);

    // Another client is unaffected.
    let other = client
        .post(format!("{base}/proxy/create-order?shop={SHOP}"))
        .header("x-forwarded-for", "198.51.100.24")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_responses_carry_security_headers() {
    let base = start().await;
    let response = reqwest::get(format!("{base}/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(
        headers["content-security-policy"]
            .to_str()
            .unwrap()
            .contains("frame-ancestors https://admin.shopify.com")
    );
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_malformed_bodies_get_json_errors() {
    let base = start().await;
    let client = reqwest::Client::new();
    let query = signed_proxy_query(&proxy_params());

    let line = |extra: Value| {
        let mut item = json!({"productId": "1", "variantId": "2", "quantity": 1, "price": "100"});
        if let (Some(item), Some(extra)) = (item.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                if v.is_null() {
                    item.remove(k);
                } else {
                    item.insert(k.clone(), v.clone());
                }
            }
        }
        json!({
            "cartItems": [item],
            "customer": {"name": "Ali", "phone": "03001234567", "address": "House 1"},
            "shipping": {"country": "Pakistan", "city": "Lahore"}
        })
        .to_string()
    };

    let bodies = [
        line(json!({"price": null})),
        line(json!({"quantity": -2})),
        "not json".to_string(),
    ];

    for body in bodies {
        let response = client
            .post(format!("{base}/proxy/create-order?{query}"))
            .header("x-forwarded-for", "198.51.100.25")
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(
            response.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("application/json")
        );
        let json: Value = response.json().await.unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Missing cart, customer or shipping data.");
    }

    let response = client
        .post(format!("{base}/proxy/send-otp?{query}"))
        .header("x-forwarded-for", "198.51.100.26")
        .body("phone=0300")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["error"], "Phone number required.");
}
