//! `POST /proxy/send-otp`.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::{debug, instrument};

use super::ProxyError;
use crate::middleware::AppProxy;
use crate::services::{OtpError, OtpSent, PgStore, SendOtpRequest, send_otp};
use crate::state::AppState;

/// Send a verification code to the customer's phone.
#[instrument(skip_all, fields(shop = %proxy.shop))]
pub async fn send(
    proxy: AppProxy,
    State(state): State<AppState>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<Json<OtpSent>, ProxyError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(error = %rejection.body_text(), "Malformed OTP body");
        OtpError::MissingPhone
    })?;
    let store = PgStore::new(state.pool().clone());
    let sent = send_otp(&store, state.verify(), &proxy.shop, request).await?;
    Ok(Json(sent))
}
