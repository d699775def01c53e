//! HTTP API surface.
//!
//! Three routers, merged in `main`:
//! - `auth`: registration, login, current-user lookup
//! - `accounts`: linked-account listing and status updates
//! - `link`: the external QR login flow (issue → poll → complete)

pub mod accounts;
pub mod auth_routes;
pub mod link;

pub use accounts::{create_accounts_router, AccountsAppState};
pub use auth_routes::{create_auth_router, AuthAppState};
pub use link::{create_link_router, LinkAppState};

use crate::auth::extract_bearer_token;
use crate::token::TokenSigner;
use crate::users::{User, UserStore};
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// Uniform body returned by soft-authenticated endpoints when the
/// caller presents no usable token.
pub const NOT_LOGGED_IN: &str = "Not logged in";

/// Error response
#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

/// Confirmation response used by message-only endpoints
#[derive(Serialize)]
pub(crate) struct MessageResponse {
    pub message: String,
}

/// Application error types shared by the API routers
pub(crate) enum AppError {
    BadRequest(String),
    Unauthorized(String),
    ServerError(String),
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

/// Resolve the bearer token to a user, hard-failing on any problem.
///
/// Used by endpoints that must return 401 when unauthenticated.
pub(crate) fn current_user(
    headers: &HeaderMap,
    signer: &TokenSigner,
    users: &UserStore,
) -> Result<User, AppError> {
    let token = extract_bearer_token(headers)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    let claims = signer
        .verify(&token)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    users
        .find(&claims.sub)
        .map_err(|e| AppError::ServerError(format!("Failed to load user: {}", e)))?
        .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))
}

/// Soft variant of [`current_user`]: any failure — missing header,
/// bad signature, expired token, unknown user — collapses to `None`,
/// letting handlers answer with a uniform "not logged in" message
/// instead of an error status.
pub(crate) fn current_user_soft(
    headers: &HeaderMap,
    signer: &TokenSigner,
    users: &UserStore,
) -> Option<User> {
    let token = extract_bearer_token(headers).ok()?;
    let claims = signer.verify(&token).ok()?;
    users.find(&claims.sub).ok().flatten()
}

/// 200 response carrying the uniform not-logged-in message.
pub(crate) fn not_logged_in() -> Response {
    Json(MessageResponse {
        message: NOT_LOGGED_IN.to_string(),
    })
    .into_response()
}
