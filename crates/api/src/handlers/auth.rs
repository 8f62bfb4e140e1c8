//! Handlers for the `/auth` resource (registration, login, logout, refresh).

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::TokenPair;
use crate::auth::service::{RegisteredUser, Registration};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::refresh::{cleared_refresh_cookie, refresh_cookie, RefreshCredential};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/registration`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[validate(length(min = 1, message = "fullName must not be empty"))]
    pub full_name: String,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 4, max = 18, message = "password must be 4 to 18 characters"))]
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 4, max = 18, message = "password must be 4 to 18 characters"))]
    pub password: String,
}

/// Body returned by `POST /auth/logout`.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /auth/registration
///
/// Create an account and return its profile together with the first token pair.
pub async fn registration(
    State(state): State<AppState>,
    Json(input): Json<RegistrationRequest>,
) -> AppResult<(StatusCode, Json<RegisteredUser>)> {
    input.validate()?;

    let registered = state
        .auth
        .register(Registration {
            email: input.email,
            password: input.password,
            full_name: input.full_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(registered)))
}

/// POST /auth/login
///
/// Authenticate with email + password. The refresh token is also set as the
/// `auth-cookie` cookie.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let tokens = state.auth.login(&input.email, &input.password).await?;
    with_refresh_cookie(&state, tokens)
}

/// POST /auth/logout
///
/// Revoke the caller's refresh token and clear the cookie.
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    state.auth.logout(auth_user.user_id).await?;

    let cookie = cleared_refresh_cookie(state.config.cookie_secure)?;
    Ok((
        [(SET_COOKIE, cookie)],
        Json(LogoutResponse { message: "success" }),
    ))
}

/// POST /auth/refresh
///
/// Exchange the refresh token in `auth-cookie` for a new pair. The old token
/// stops working immediately.
pub async fn refresh(
    State(state): State<AppState>,
    credential: RefreshCredential,
) -> AppResult<impl IntoResponse> {
    let tokens = state
        .auth
        .refresh(credential.user_id, &credential.token)
        .await?;
    with_refresh_cookie(&state, tokens)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn with_refresh_cookie(state: &AppState, tokens: TokenPair) -> AppResult<impl IntoResponse> {
    let cookie = refresh_cookie(
        &tokens.refresh_token,
        state.auth.issuer().refresh_expires_in(),
        state.config.cookie_secure,
    )?;
    Ok(([(SET_COOKIE, cookie)], Json(tokens)))
}
