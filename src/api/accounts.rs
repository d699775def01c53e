//! Linked-account listing and status-update endpoints.

use super::{current_user_soft, not_logged_in, AppError, MessageResponse};
use crate::linked::LinkedAccountStore;
use crate::token::TokenSigner;
use crate::users::UserStore;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Shared application state for the accounts API
#[derive(Clone)]
pub struct AccountsAppState {
    pub users: Arc<UserStore>,
    pub signer: Arc<TokenSigner>,
    pub linked: Arc<LinkedAccountStore>,
}

/// JSON body for POST /update_status_nexday
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub userid: i64,
    pub status_nexday: bool,
}

/// Create the accounts API router
pub fn create_accounts_router(state: AccountsAppState) -> Router {
    Router::new()
        .route("/get_accounts", get(get_accounts))
        .route("/update_status_nexday", post(update_status_nexday))
        .with_state(Arc::new(state))
}

/// GET /get_accounts — list the caller's linked accounts.
///
/// Soft-authenticated: an unauthenticated caller gets a 200 with the
/// uniform not-logged-in message. The summary type carries no cookie,
/// ip, or owner fields.
async fn get_accounts(
    State(state): State<Arc<AccountsAppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let Some(user) = current_user_soft(&headers, &state.signer, &state.users) else {
        return Ok(not_logged_in());
    };

    let accounts = state
        .linked
        .list_for_owner(&user.username)
        .map_err(|e| AppError::ServerError(format!("Failed to list accounts: {}", e)))?;

    debug!(username = %user.username, count = accounts.len(), "Listed linked accounts");

    Ok(Json(accounts).into_response())
}

/// POST /update_status_nexday — set the next-day flag on one of the
/// caller's linked accounts.
///
/// The update is scoped to the caller's own records. A userid that
/// matches nothing is a no-op that still reports success.
async fn update_status_nexday(
    State(state): State<Arc<AccountsAppState>>,
    headers: HeaderMap,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Response, AppError> {
    let Some(user) = current_user_soft(&headers, &state.signer, &state.users) else {
        return Ok(not_logged_in());
    };

    let changed = state
        .linked
        .set_next_day_status(&user.username, request.userid, request.status_nexday)
        .map_err(|e| AppError::ServerError(format!("Failed to update status: {}", e)))?;

    debug!(
        username = %user.username,
        userid = request.userid,
        changed,
        "Next-day status update"
    );

    Ok(Json(MessageResponse {
        message: "Status updated".to_string(),
    })
    .into_response())
}
