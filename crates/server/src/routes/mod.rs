//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Liveness check
//! GET  /health/ready            - Readiness check (database)
//!
//! # OAuth and merchant sessions
//! GET  /                        - Entry point opened by Shopify admin
//! GET  /auth?shop=              - Start install / sign-in
//! GET  /auth/callback           - OAuth callback
//! GET  /auth/login              - Shop domain form
//! POST /auth/logout             - Sign out
//!
//! # Merchant admin (signed-in shop)
//! GET  /app                     - Dashboard
//! GET  /app/shipping            - Shipping rates      POST: add_rate, delete_rate
//! GET  /app/offers              - Quantity offers     POST: save_offer, delete_offer
//! GET  /app/ip-blocking         - Blocked IPs         POST: add_ip, delete_ip
//! GET  /app/settings            - Settings            POST: update
//! GET  /app/form-designer       - Form colors/text    POST: update
//! GET  /app/form-builder        - Custom fields       POST: save_field, delete_field
//! GET  /app/gsheets-guide       - Google Sheets setup guide
//!
//! # App Proxy (signed by Shopify, JSON)
//! POST /proxy/send-otp
//! POST /proxy/create-order
//! GET  /proxy/get-rates
//! GET  /proxy/get-locations
//! POST /proxy/get-offers
//! GET  /proxy/get-pixels
//! GET  /proxy/get-settings
//! GET  /proxy/get-country-by-ip
//! ```

pub mod admin;
pub mod auth;
pub mod proxy;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::state::AppState;

/// Build every application route.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/", get(auth::index))
        .route("/auth", get(auth::begin))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/login", get(auth::login_page))
        .route("/auth/logout", post(auth::logout))
        .merge(admin::routes())
        .merge(proxy::routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
