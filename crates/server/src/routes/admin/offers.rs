//! Quantity offers page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use cod_form_core::{DiscountType, QuantityOfferId};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use super::{NoticeQuery, parse_decimal, parse_i32, redirect_error, redirect_success, text};
use crate::db::{QuantityOffer, QuantityOfferInput, QuantityOfferRepository};
use crate::error::AppError;
use crate::middleware::RequireShop;
use crate::state::AppState;

const PATH: &str = "/app/offers";

#[derive(Template, WebTemplate)]
#[template(path = "admin/offers.html")]
pub struct OffersTemplate {
    pub shop: String,
    pub current_path: &'static str,
    pub notice: NoticeQuery,
    pub offers: Vec<QuantityOffer>,
}

/// Offers page form. `_action` is `save_offer` or `delete_offer`.
#[derive(Debug, Deserialize)]
pub struct OfferForm {
    #[serde(rename = "_action")]
    pub action: String,
    pub id: Option<String>,
    pub product_id: Option<String>,
    pub min_quantity: Option<String>,
    pub discount_type: Option<String>,
    pub discount_value: Option<String>,
}

impl OfferForm {
    fn to_input(&self) -> Result<QuantityOfferInput, &'static str> {
        let product_id = text(self.product_id.as_deref()).ok_or("Product ID is required.")?;
        let min_quantity = parse_i32(self.min_quantity.as_deref())
            .filter(|q| *q >= 1)
            .ok_or("Minimum quantity must be at least 1.")?;
        let discount_type = self
            .discount_type
            .as_deref()
            .unwrap_or_default()
            .parse::<DiscountType>()
            .map_err(|_| "Unknown discount type.")?;
        let discount_value = parse_decimal(self.discount_value.as_deref())
            .filter(|v| !v.is_sign_negative())
            .ok_or("Discount must be a non-negative number.")?;
        if discount_type == DiscountType::Percentage && discount_value > Decimal::ONE_HUNDRED {
            return Err("A percentage discount cannot exceed 100.");
        }

        Ok(QuantityOfferInput {
            product_id,
            min_quantity,
            discount_type,
            discount_value,
        })
    }
}

#[instrument(skip_all, fields(shop = %current.shop))]
pub async fn index(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
    Query(notice): Query<NoticeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let offers = QuantityOfferRepository::new(state.pool())
        .list(&current.shop)
        .await?;

    Ok(OffersTemplate {
        shop: current.shop.to_string(),
        current_path: PATH,
        notice,
        offers,
    })
}

#[instrument(skip_all, fields(shop = %current.shop, action = %form.action))]
pub async fn action(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
    Form(form): Form<OfferForm>,
) -> Result<Redirect, AppError> {
    let repo = QuantityOfferRepository::new(state.pool());

    match form.action.as_str() {
        "save_offer" => {
            let input = match form.to_input() {
                Ok(input) => input,
                Err(message) => return Ok(redirect_error(PATH, message)),
            };
            repo.upsert(&current.shop, &input).await?;
            tracing::info!(product_id = %input.product_id, min_quantity = input.min_quantity, "Offer saved");
            Ok(redirect_success(PATH, "Offer saved."))
        }
        "delete_offer" => {
            let Some(id) = parse_i32(form.id.as_deref()) else {
                return Err(AppError::BadRequest("Missing offer id".to_string()));
            };
            if !repo.delete(&current.shop, QuantityOfferId::new(id)).await? {
                return Err(AppError::NotFound(format!("offer {id}")));
            }
            Ok(redirect_success(PATH, "Offer deleted."))
        }
        other => Err(AppError::BadRequest(format!("Unknown action: {other}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(min: &str, kind: &str, value: &str) -> OfferForm {
        OfferForm {
            action: "save_offer".to_string(),
            id: None,
            product_id: Some(" 8123 ".to_string()),
            min_quantity: Some(min.to_string()),
            discount_type: Some(kind.to_string()),
            discount_value: Some(value.to_string()),
        }
    }

    #[test]
    fn test_valid_offer() {
        let input = form("3", "percentage", "10").to_input().unwrap();
        assert_eq!(input.product_id, "8123");
        assert_eq!(input.min_quantity, 3);
        assert_eq!(input.discount_type, DiscountType::Percentage);
    }

    #[test]
    fn test_invalid_offers() {
        assert!(form("0", "fixed", "10").to_input().is_err());
        assert!(form("2", "bogus", "10").to_input().is_err());
        assert!(form("2", "fixed", "-1").to_input().is_err());
        assert!(form("2", "percentage", "150").to_input().is_err());
        assert!(form("2", "fixed", "150").to_input().is_ok());
    }
}
