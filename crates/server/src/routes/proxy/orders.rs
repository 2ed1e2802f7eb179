//! `POST /proxy/create-order`.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::{debug, instrument};

use super::ProxyError;
use crate::db::ShopSessionRepository;
use crate::middleware::{AppProxy, ClientIp};
use crate::services::checkout::MSG_MISSING_DATA;
use crate::services::{
    Checkout, CheckoutError, CheckoutRequest, PgStore, PlacedOrder, TwilioVerifier,
};
use crate::state::AppState;

/// Place a COD order from the storefront form.
#[instrument(skip_all, fields(shop = %proxy.shop))]
pub async fn create(
    proxy: AppProxy,
    client_ip: ClientIp,
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<PlacedOrder>, ProxyError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(error = %rejection.body_text(), "Malformed order body");
        CheckoutError::MissingField(MSG_MISSING_DATA.to_string())
    })?;

    let session = ShopSessionRepository::new(state.pool())
        .get(&proxy.shop)
        .await?
        .ok_or(ProxyError::NotInstalled)?;

    let store = PgStore::new(state.pool().clone());
    let platform = state.shopify().shop(&proxy.shop, &session.access_token);
    let verifier = TwilioVerifier::new(state.verify().clone());

    let checkout = Checkout {
        store: &store,
        platform: &platform,
        verifier: &verifier,
        exporter: state.webhooks(),
        fallback_rate: &state.config().fallback_shipping_rate,
    };

    let ip = client_ip.0.map(|ip| ip.to_string());
    let placed = checkout
        .place_order(&proxy.shop, request, ip.as_deref())
        .await?;

    Ok(Json(placed))
}
