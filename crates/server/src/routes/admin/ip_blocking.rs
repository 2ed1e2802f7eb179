//! IP block list page.

use std::net::IpAddr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use cod_form_core::BlockedIpId;
use serde::Deserialize;
use tracing::instrument;

use super::{parse_i32, redirect_error, redirect_success, text};
use crate::db::{BlockedIpPage, BlockedIpRepository};
use crate::error::AppError;
use crate::middleware::RequireShop;
use crate::state::AppState;

const PATH: &str = "/app/ip-blocking";

/// Entries per page, newest first.
pub const PAGE_SIZE: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct IpBlockingQuery {
    pub page: Option<i64>,
    pub success: Option<String>,
    pub error: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/ip_blocking.html")]
pub struct IpBlockingTemplate {
    pub shop: String,
    pub current_path: &'static str,
    pub notice: super::NoticeQuery,
    pub blocked: BlockedIpPage,
}

/// IP blocking form. `_action` is `add_ip` or `delete_ip`.
#[derive(Debug, Deserialize)]
pub struct IpBlockingForm {
    #[serde(rename = "_action")]
    pub action: String,
    pub id: Option<String>,
    pub ip_address: Option<String>,
}

#[instrument(skip_all, fields(shop = %current.shop))]
pub async fn index(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
    Query(query): Query<IpBlockingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let blocked = BlockedIpRepository::new(state.pool())
        .page(&current.shop, query.page.unwrap_or(1), PAGE_SIZE)
        .await?;

    Ok(IpBlockingTemplate {
        shop: current.shop.to_string(),
        current_path: PATH,
        notice: super::NoticeQuery {
            success: query.success,
            error: query.error,
        },
        blocked,
    })
}

#[instrument(skip_all, fields(shop = %current.shop, action = %form.action))]
pub async fn action(
    RequireShop(current): RequireShop,
    State(state): State<AppState>,
    Form(form): Form<IpBlockingForm>,
) -> Result<Redirect, AppError> {
    let repo = BlockedIpRepository::new(state.pool());

    match form.action.as_str() {
        "add_ip" => {
            let Some(ip) = text(form.ip_address.as_deref()).and_then(|ip| ip.parse::<IpAddr>().ok())
            else {
                return Ok(redirect_error(PATH, "Enter a valid IPv4 or IPv6 address."));
            };
            repo.add(&current.shop, &ip.to_string()).await?;
            tracing::info!(ip = %ip, "IP blocked by merchant");
            Ok(redirect_success(PATH, "IP address blocked."))
        }
        "delete_ip" => {
            let Some(id) = parse_i32(form.id.as_deref()) else {
                return Err(AppError::BadRequest("Missing entry id".to_string()));
            };
            if !repo.delete(&current.shop, BlockedIpId::new(id)).await? {
                return Err(AppError::NotFound(format!("blocked ip {id}")));
            }
            Ok(redirect_success(PATH, "IP address unblocked."))
        }
        other => Err(AppError::BadRequest(format!("Unknown action: {other}"))),
    }
}
