//! Read-only storefront data: rates, locations, offers, pixels and form
//! settings.

use std::collections::BTreeMap;

use axum::{Json, body::Bytes, extract::State};
use cod_form_core::pricing::location_key;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use super::ProxyError;
use crate::db::{
    FormDesign, FormField, FormFieldRepository, Pixels, QuantityOffer, QuantityOfferRepository,
    SettingsRepository, ShippingRate, ShippingRateRepository,
};
use crate::middleware::AppProxy;
use crate::state::AppState;

/// Key used for the country default row in [`Location::rates`].
const DEFAULT_RATE_KEY: &str = "default";

#[derive(Debug, Serialize)]
pub struct RatesResponse {
    pub rates: BTreeMap<String, Decimal>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct LocationRate {
    pub rate: Decimal,
    pub currency: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Location {
    pub name: String,
    pub cities: Vec<String>,
    pub rates: BTreeMap<String, LocationRate>,
}

#[derive(Debug, Serialize)]
pub struct LocationsResponse {
    pub locations: BTreeMap<String, Location>,
}

#[derive(Debug, Serialize)]
pub struct OffersResponse {
    pub offers: Vec<QuantityOffer>,
}

#[derive(Debug, Serialize)]
pub struct PixelsResponse {
    pub pixels: Pixels,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub otp_enabled: bool,
    pub design: FormDesign,
    pub fields: Vec<FormField>,
}

/// Flat `city -> rate` map. The country default appears under `""`.
#[instrument(skip_all, fields(shop = %proxy.shop))]
pub async fn rates(
    proxy: AppProxy,
    State(state): State<AppState>,
) -> Result<Json<RatesResponse>, ProxyError> {
    let rows = ShippingRateRepository::new(state.pool())
        .list(&proxy.shop)
        .await?;

    let rates = rows
        .into_iter()
        .map(|r| (location_key(&r.city), r.rate))
        .collect();

    Ok(Json(RatesResponse { rates }))
}

/// Rates grouped by country, with city lists for the form's dropdowns.
#[instrument(skip_all, fields(shop = %proxy.shop))]
pub async fn locations(
    proxy: AppProxy,
    State(state): State<AppState>,
) -> Result<Json<LocationsResponse>, ProxyError> {
    let rows = ShippingRateRepository::new(state.pool())
        .list(&proxy.shop)
        .await?;

    Ok(Json(LocationsResponse {
        locations: group_locations(rows),
    }))
}

fn group_locations(rows: Vec<ShippingRate>) -> BTreeMap<String, Location> {
    let mut locations: BTreeMap<String, Location> = BTreeMap::new();

    for row in rows {
        let location = locations
            .entry(row.country.clone())
            .or_insert_with(|| Location {
                name: row.country.clone(),
                cities: Vec::new(),
                rates: BTreeMap::new(),
            });

        let rate = LocationRate {
            rate: row.rate,
            currency: row.currency,
        };

        if row.city.is_empty() {
            location.rates.insert(DEFAULT_RATE_KEY.to_string(), rate);
        } else {
            location.rates.insert(location_key(&row.city), rate);
            location.cities.push(row.city);
        }
    }

    locations
}

/// Offers for the products on the page.
///
/// The body is `{"productIds": [...]}`. Anything else yields no offers.
#[instrument(skip_all, fields(shop = %proxy.shop))]
pub async fn offers(
    proxy: AppProxy,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<OffersResponse>, ProxyError> {
    let Some(product_ids) = product_ids(&body) else {
        return Ok(Json(OffersResponse { offers: Vec::new() }));
    };

    let offers = QuantityOfferRepository::new(state.pool())
        .for_products(&proxy.shop, &product_ids)
        .await?;

    Ok(Json(OffersResponse { offers }))
}

/// Product ids from an offers request. Numbers and strings are both accepted.
fn product_ids(body: &[u8]) -> Option<Vec<String>> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let ids = value.get("productIds")?.as_array()?;
    Some(
        ids.iter()
            .filter_map(|id| match id {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|id| !id.is_empty())
            .collect(),
    )
}

/// Tracking pixel IDs.
#[instrument(skip_all, fields(shop = %proxy.shop))]
pub async fn pixels(
    proxy: AppProxy,
    State(state): State<AppState>,
) -> Result<Json<PixelsResponse>, ProxyError> {
    let settings = SettingsRepository::new(state.pool())
        .get_or_default(&proxy.shop)
        .await?;

    Ok(Json(PixelsResponse {
        pixels: settings.pixels(),
    }))
}

/// Everything the widget needs to render the form.
#[instrument(skip_all, fields(shop = %proxy.shop))]
pub async fn settings(
    proxy: AppProxy,
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, ProxyError> {
    let settings = SettingsRepository::new(state.pool())
        .get_or_default(&proxy.shop)
        .await?;
    let fields = FormFieldRepository::new(state.pool())
        .list(&proxy.shop)
        .await?;

    Ok(Json(SettingsResponse {
        otp_enabled: settings.general.otp_enabled,
        design: settings.design,
        fields,
    }))
}
