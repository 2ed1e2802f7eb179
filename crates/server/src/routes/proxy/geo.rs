//! `GET /proxy/get-country-by-ip`.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::middleware::{AppProxy, ClientIp};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CountryResponse {
    pub country: String,
}

/// Country of the requesting client, or the configured default.
pub async fn country_by_ip(
    _proxy: AppProxy,
    client_ip: ClientIp,
    State(state): State<AppState>,
) -> Json<CountryResponse> {
    let country = match client_ip.0 {
        Some(ip) => state.geoip().country_for(&ip.to_string()).await,
        None => state.config().geoip.default_country.clone(),
    };
    Json(CountryResponse { country })
}
