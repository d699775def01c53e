//! External QR login flow endpoints.
//!
//! The linking handshake:
//! 1. GET /gen_qrcode → platform issues a QR payload (passthrough)
//! 2. Client renders the QR; user scans it in the platform's app
//! 3. GET /qrcode_status → client polls scan state (passthrough)
//! 4. POST /qrcode_login → exchange token submitted; cookies captured,
//!    profile fetched, linked account upserted

use super::{current_user_soft, not_logged_in, AppError, MessageResponse};
use crate::external::ShopClient;
use crate::linked::{LinkOutcome, LinkedAccountStore};
use crate::token::TokenSigner;
use crate::users::UserStore;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared application state for the link API
#[derive(Clone)]
pub struct LinkAppState {
    pub users: Arc<UserStore>,
    pub signer: Arc<TokenSigner>,
    pub linked: Arc<LinkedAccountStore>,
    pub shop: Arc<ShopClient>,
}

/// Query parameters for GET /qrcode_status
#[derive(Deserialize)]
pub struct QrcodeStatusParams {
    pub qrcode_id: String,
}

/// JSON body for POST /qrcode_login
#[derive(Deserialize)]
pub struct QrcodeLoginRequest {
    pub qrcode_token: String,
}

/// Create the link API router
pub fn create_link_router(state: LinkAppState) -> Router {
    Router::new()
        .route("/gen_qrcode", get(gen_qrcode))
        .route("/qrcode_status", get(qrcode_status))
        .route("/qrcode_login", post(qrcode_login))
        .with_state(Arc::new(state))
}

/// GET /gen_qrcode — request a fresh QR payload from the platform.
///
/// Soft-authenticated passthrough; no local state changes.
async fn gen_qrcode(
    State(state): State<Arc<LinkAppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if current_user_soft(&headers, &state.signer, &state.users).is_none() {
        return Ok(not_logged_in());
    }

    let payload = state.shop.gen_qrcode().await.map_err(|e| {
        error!(error = %e, "QR issuance failed");
        AppError::BadGateway(format!("QR issuance failed: {}", e))
    })?;

    Ok(Json(payload).into_response())
}

/// GET /qrcode_status?qrcode_id= — poll scan status.
///
/// Unauthenticated passthrough; the QR id alone is not a credential.
async fn qrcode_status(
    State(state): State<Arc<LinkAppState>>,
    Query(params): Query<QrcodeStatusParams>,
) -> Result<Response, AppError> {
    let payload = state.shop.qrcode_status(&params.qrcode_id).await.map_err(|e| {
        error!(error = %e, "QR status poll failed");
        AppError::BadGateway(format!("QR status poll failed: {}", e))
    })?;

    Ok(Json(payload).into_response())
}

/// POST /qrcode_login — complete the link with a scanned QR's
/// exchange token.
///
/// Submits the token to the platform, captures the session cookies it
/// sets, fetches the profile those cookies belong to, resolves the
/// source IP (best-effort), then upserts the linked account. External
/// failures surface as 502 with no retry.
async fn qrcode_login(
    State(state): State<Arc<LinkAppState>>,
    headers: HeaderMap,
    Json(request): Json<QrcodeLoginRequest>,
) -> Result<Response, AppError> {
    let Some(user) = current_user_soft(&headers, &state.signer, &state.users) else {
        return Ok(not_logged_in());
    };

    debug!(username = %user.username, "QR login completion started");

    let ip = state.shop.lookup_source_ip().await;

    let cookies = state
        .shop
        .submit_qrcode_login(&request.qrcode_token, &user.username)
        .await
        .map_err(|e| {
            error!(username = %user.username, error = %e, "QR login submission failed");
            AppError::BadGateway(format!("QR login failed: {}", e))
        })?;

    let profile = state.shop.fetch_profile(&cookies).await.map_err(|e| {
        error!(username = %user.username, error = %e, "Profile fetch failed");
        AppError::BadGateway(format!("Profile fetch failed: {}", e))
    })?;

    let outcome = state
        .linked
        .upsert_login(
            &user.username,
            profile.userid,
            &profile.username,
            &profile.portrait,
            &cookies,
            &ip,
        )
        .map_err(|e| AppError::ServerError(format!("Failed to store linked account: {}", e)))?;

    info!(
        username = %user.username,
        userid = profile.userid,
        outcome = ?outcome,
        "QR login completed"
    );

    let message = match outcome {
        LinkOutcome::Linked => "Account linked",
        LinkOutcome::Refreshed => "Account refreshed",
    };

    Ok(Json(MessageResponse {
        message: message.to_string(),
    })
    .into_response())
}
