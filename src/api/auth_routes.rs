//! Registration, login, and current-user endpoints.

use super::{current_user, AppError, MessageResponse};
use crate::token::TokenSigner;
use crate::users::{UserStore, UserStoreError};
use axum::{
    extract::State,
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared application state for the auth API
#[derive(Clone)]
pub struct AuthAppState {
    pub users: Arc<UserStore>,
    pub signer: Arc<TokenSigner>,
}

/// Form body for POST /login (OAuth2 password-style form)
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Response for POST /login
#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

/// JSON body for POST /register
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// Response for GET /me
#[derive(Serialize)]
pub struct MeResponse {
    pub username: String,
    pub name: String,
}

/// Create the auth API router
pub fn create_auth_router(state: AuthAppState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(me))
        .with_state(Arc::new(state))
}

/// POST /login — verify credentials and issue a bearer token.
///
/// A session audit row is recorded for every issued token. Bad
/// credentials answer 400 with a message that does not reveal whether
/// the username exists.
async fn login(
    State(state): State<Arc<AuthAppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<LoginResponse>, AppError> {
    debug!(username = %form.username, "Login attempt");

    let user = state
        .users
        .verify_login(&form.username, &form.password)
        .map_err(|e| match e {
            UserStoreError::InvalidCredentials => {
                warn!(username = %form.username, "Login rejected");
                AppError::BadRequest("Invalid username or password".to_string())
            }
            other => AppError::ServerError(format!("Login failed: {}", other)),
        })?;

    let token = state.signer.mint(&user.username);

    state
        .users
        .record_session(&user.username, &token)
        .map_err(|e| AppError::ServerError(format!("Failed to record session: {}", e)))?;

    info!(username = %user.username, "Token issued");

    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

/// POST /register — create a new user.
///
/// Answers 400 when the username is already taken.
async fn register(
    State(state): State<Arc<AuthAppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = state
        .users
        .register(&request.username, &request.password)
        .map_err(|e| match e {
            UserStoreError::UsernameTaken => {
                debug!(username = %request.username, "Duplicate registration rejected");
                AppError::BadRequest("Username is already taken".to_string())
            }
            other => AppError::ServerError(format!("Registration failed: {}", other)),
        })?;

    info!(username = %user.username, "User registered");

    Ok(Json(MessageResponse {
        message: "Registration successful".to_string(),
    }))
}

/// GET /me — resolve the bearer token to the caller's profile.
///
/// Hard-fails with 401 on a missing, invalid, or expired token.
async fn me(
    State(state): State<Arc<AuthAppState>>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, AppError> {
    let user = current_user(&headers, &state.signer, &state.users)?;

    Ok(Json(MeResponse {
        username: user.username,
        name: user.name,
    }))
}
