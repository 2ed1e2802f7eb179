//! COD Form server library.
//!
//! Cash on Delivery checkout for Shopify storefronts. The storefront widget
//! talks to the App Proxy endpoints under `/proxy`; merchants configure the
//! app through the embedded admin pages under `/app`.
//!
//! # Security
//!
//! - App Proxy requests are authenticated by Shopify's HMAC signature
//! - Merchant pages require a shop signed in through OAuth
//! - Each installed shop's offline Admin API token is stored in `PostgreSQL`

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
pub mod twilio;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use middleware::{create_session_layer, request_id_middleware, security_headers_middleware};
use state::AppState;

/// Build the application router with sessions, tracing and response headers.
///
/// Sentry layers are added by the binary so tests run without a client.
pub fn build_app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.pool(), state.config());

    routes::routes()
        .layer(session_layer)
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let app = build_app(state::test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(
            response.headers()["x-content-type-options"],
            "nosniff"
        );
    }

    #[tokio::test]
    async fn test_login_page_renders() {
        let app = build_app(state::test_state());
        let response = app
            .oneshot(
                Request::get("/auth/login?error=invalid_shop")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("valid shop domain"));
    }

    #[tokio::test]
    async fn test_invalid_shop_goes_back_to_login() {
        let app = build_app(state::test_state());
        let response = app
            .oneshot(
                Request::get("/auth?shop=not%20a%20shop")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login?error=invalid_shop"
        );
    }

    #[tokio::test]
    async fn test_admin_pages_require_signed_in_shop() {
        for path in ["/app", "/app/settings", "/app/form-builder"] {
            let response = build_app(state::test_state())
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
            assert_eq!(response.headers()[header::LOCATION], "/auth/login");
        }
    }

    #[tokio::test]
    async fn test_proxy_requires_signature() {
        let app = build_app(state::test_state());
        let response = app
            .oneshot(
                Request::get("/proxy/get-pixels?shop=demo.myshopify.com")
                    .header("x-forwarded-for", "203.0.113.9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
