//! Shipping rates page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use cod_form_core::{CurrencyCode, ShippingRateId};
use serde::Deserialize;
use tracing::instrument;

use super::{NoticeQuery, parse_decimal, parse_i32, redirect_error, redirect_success, text};
use crate::db::{ShippingRate, ShippingRateRepository};
use crate::error::AppError;
use crate::middleware::RequireShop;
use crate::state::AppState;

const PATH: &str = "/app/shipping";

#[derive(Template, WebTemplate)]
#[template(path = "admin/shipping.html")]
pub struct ShippingTemplate {
    pub shop: String,
    pub current_path: &'static str,
    pub notice: NoticeQuery,
    pub rates: Vec<ShippingRate>,
    pub default_currency: String,
}

/// Shipping page form. `_action` is `add_rate` or `delete_rate`.
#[derive(Debug, Deserialize)]
pub struct ShippingForm {
    #[serde(rename = "_action")]
    pub action: String,
    pub id: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub rate: Option<String>,
    pub currency: Option<String>,
}

#[instrument(skip_all, fields(shop = %current.shop))]
pub async fn index(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
    Query(notice): Query<NoticeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rates = ShippingRateRepository::new(state.pool())
        .list(&current.shop)
        .await?;

    Ok(ShippingTemplate {
        shop: current.shop.to_string(),
        current_path: PATH,
        notice,
        rates,
        default_currency: state
            .config()
            .fallback_shipping_rate
            .currency
            .as_str()
            .to_string(),
    })
}

#[instrument(skip_all, fields(shop = %current.shop, action = %form.action))]
pub async fn action(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
    Form(form): Form<ShippingForm>,
) -> Result<Redirect, AppError> {
    let repo = ShippingRateRepository::new(state.pool());

    match form.action.as_str() {
        "add_rate" => {
            let Some(country) = text(form.country.as_deref()) else {
                return Ok(redirect_error(PATH, "Country is required."));
            };
            let city = text(form.city.as_deref()).unwrap_or_default();
            let Some(rate) = parse_decimal(form.rate.as_deref()).filter(|r| !r.is_sign_negative())
            else {
                return Ok(redirect_error(PATH, "Rate must be a non-negative number."));
            };
            let currency = match text(form.currency.as_deref()) {
                Some(code) => match CurrencyCode::parse(&code) {
                    Ok(currency) => currency,
                    Err(_) => return Ok(redirect_error(PATH, "Currency must be a 3-letter code.")),
                },
                None => state.config().fallback_shipping_rate.currency.clone(),
            };

            repo.upsert(&current.shop, &country, &city, rate, &currency)
                .await?;
            tracing::info!(country = %country, city = %city, rate = %rate, "Shipping rate saved");
            Ok(redirect_success(PATH, "Rate saved."))
        }
        "delete_rate" => {
            let Some(id) = parse_i32(form.id.as_deref()) else {
                return Err(AppError::BadRequest("Missing rate id".to_string()));
            };
            if !repo.delete(&current.shop, ShippingRateId::new(id)).await? {
                return Err(AppError::NotFound(format!("shipping rate {id}")));
            }
            Ok(redirect_success(PATH, "Rate deleted."))
        }
        other => Err(AppError::BadRequest(format!("Unknown action: {other}"))),
    }
}
