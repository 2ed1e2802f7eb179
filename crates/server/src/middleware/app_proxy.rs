//! Shopify App Proxy request authentication.
//!
//! Storefront requests arrive through `https://{shop}/apps/...` and Shopify
//! forwards them here with a signed query string.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use cod_form_core::ShopDomain;
use serde_json::json;

use crate::shopify::signature;
use crate::state::AppState;

/// Extractor for a verified App Proxy request.
///
/// Yields the shop the request was made on.
#[derive(Debug, Clone)]
pub struct AppProxy {
    pub shop: ShopDomain,
}

/// Why an App Proxy request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppProxyRejection {
    /// Missing or wrong `signature`.
    InvalidSignature,
    /// Signed, but `shop` is not a `*.myshopify.com` domain.
    InvalidShop,
}

impl IntoResponse for AppProxyRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidSignature => (StatusCode::UNAUTHORIZED, "Invalid request signature."),
            Self::InvalidShop => (StatusCode::BAD_REQUEST, "Invalid shop."),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

/// Verify a raw query string against the app secret and return the shop.
///
/// # Errors
///
/// Returns the matching [`AppProxyRejection`] when the signature does not
/// verify or the shop is invalid.
pub fn verify_query(
    query: &str,
    secret: &secrecy::SecretString,
) -> Result<ShopDomain, AppProxyRejection> {
    let pairs = signature::parse_query(query);
    if !signature::verify_app_proxy(&pairs, secret) {
        return Err(AppProxyRejection::InvalidSignature);
    }

    pairs
        .iter()
        .find(|(k, _)| k == "shop")
        .and_then(|(_, v)| ShopDomain::parse(v).ok())
        .ok_or(AppProxyRejection::InvalidShop)
}

impl FromRequestParts<AppState> for AppProxy {
    type Rejection = AppProxyRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or_default();
        let shop = verify_query(query, &state.config().shopify.api_secret).inspect_err(|e| {
            tracing::debug!(rejection = ?e, path = %parts.uri.path(), "App Proxy request rejected");
        })?;

        sentry::configure_scope(|scope| {
            scope.set_tag("shop", shop.as_str());
        });

        Ok(Self { shop })
    }
}
