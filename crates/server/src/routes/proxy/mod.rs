//! Storefront endpoints reached through the Shopify App Proxy.
//!
//! Every handler takes the [`AppProxy`](crate::middleware::AppProxy)
//! extractor, so an unsigned request never reaches it. Failures answer with
//! `{"success": false, "error": "..."}`.

mod catalog;
mod geo;
mod orders;
mod otp;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::middleware::{order_rate_limiter, proxy_rate_limiter};
use crate::services::{CheckoutError, OtpError};
use crate::state::AppState;

/// Build the `/proxy` routes.
pub fn routes() -> Router<AppState> {
    let strict = Router::new()
        .route("/send-otp", post(otp::send))
        .route("/create-order", post(orders::create))
        .layer(order_rate_limiter());

    let relaxed = Router::new()
        .route("/get-rates", get(catalog::rates))
        .route("/get-locations", get(catalog::locations))
        .route("/get-offers", post(catalog::offers))
        .route("/get-pixels", get(catalog::pixels))
        .route("/get-settings", get(catalog::settings))
        .route("/get-country-by-ip", get(geo::country_by_ip))
        .layer(proxy_rate_limiter());

    Router::new().nest("/proxy", strict.merge(relaxed))
}

/// Error body for storefront endpoints.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error(transparent)]
    Database(#[from] RepositoryError),

    /// The shop has no stored Admin API token.
    #[error("App is not installed for this shop.")]
    NotInstalled,
}

impl ProxyError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Checkout(e) => e.status_code(),
            Self::Otp(e) => e.status_code(),
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotInstalled => StatusCode::UNAUTHORIZED,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Checkout(e) => e.public_message(),
            Self::Otp(e) => e.public_message(),
            Self::Database(_) => crate::services::checkout::MSG_INTERNAL.to_string(),
            Self::NotInstalled => self.to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Proxy request error"
            );
        }

        (
            status,
            Json(json!({ "success": false, "error": self.public_message() })),
        )
            .into_response()
    }
}
