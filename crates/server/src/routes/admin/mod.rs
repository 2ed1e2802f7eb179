//! Merchant admin pages.
//!
//! Every page requires a signed-in shop ([`RequireShop`]). Mutating forms
//! POST back to the page with an `_action` field and are answered with a
//! redirect carrying a `success` or `error` notice.
//!
//! [`RequireShop`]: crate::middleware::RequireShop

mod dashboard;
mod form_builder;
mod form_designer;
mod gsheets;
mod ip_blocking;
mod offers;
mod settings;
mod shipping;

use axum::{Router, response::Redirect, routing::get};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::state::AppState;

/// Build the `/app` routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/app", get(dashboard::index))
        .route("/app/shipping", get(shipping::index).post(shipping::action))
        .route("/app/offers", get(offers::index).post(offers::action))
        .route(
            "/app/ip-blocking",
            get(ip_blocking::index).post(ip_blocking::action),
        )
        .route("/app/settings", get(settings::index).post(settings::update))
        .route(
            "/app/form-designer",
            get(form_designer::index).post(form_designer::update),
        )
        .route(
            "/app/form-builder",
            get(form_builder::index).post(form_builder::action),
        )
        .route("/app/gsheets-guide", get(gsheets::index))
}

/// Notice shown at the top of a page after a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub success: Option<String>,
    pub error: Option<String>,
}

/// Redirect back to `path` with a success notice.
fn redirect_success(path: &str, message: &str) -> Redirect {
    Redirect::to(&format!("{path}?success={}", urlencoding::encode(message)))
}

/// Redirect back to `path` with an error notice.
fn redirect_error(path: &str, message: &str) -> Redirect {
    Redirect::to(&format!("{path}?error={}", urlencoding::encode(message)))
}

/// Trimmed, non-empty form value.
fn text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn parse_i32(value: Option<&str>) -> Option<i32> {
    value.and_then(|v| v.trim().parse().ok())
}

fn parse_decimal(value: Option<&str>) -> Option<Decimal> {
    value.and_then(|v| v.trim().parse().ok())
}

/// HTML checkboxes are only sent when ticked.
fn checkbox(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("on" | "true" | "1"))
}
