//! Refresh-token cookie: extraction and `Set-Cookie` values.

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use turnstile_core::error::CoreError;
use turnstile_core::types::DbId;

use crate::error::AppError;
use crate::state::AppState;

/// Name of the HttpOnly cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "auth-cookie";

/// A refresh token from the `auth-cookie` cookie whose signature and expiry
/// have been checked. Whether it is still the session's current token is up
/// to [`AuthService::refresh`](crate::auth::service::AuthService::refresh).
#[derive(Debug, Clone)]
pub struct RefreshCredential {
    pub user_id: DbId,
    pub token: String,
}

impl FromRequestParts<AppState> for RefreshCredential {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parse_cookie(&parts.headers, REFRESH_COOKIE).ok_or_else(|| {
            AppError::Core(CoreError::NotAuthenticated(
                "Missing refresh token cookie".into(),
            ))
        })?;

        let claims = state.auth.issuer().validate_refresh(&token).map_err(|e| {
            tracing::warn!(error = %e, "Refresh cookie failed validation");
            AppError::Core(CoreError::NotAuthenticated(
                "Invalid or expired refresh token".into(),
            ))
        })?;

        Ok(RefreshCredential {
            user_id: claims.sub,
            token,
        })
    }
}

/// Find cookie `name` in the request's `Cookie` headers.
fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
}

/// `Set-Cookie` value storing `token` for `max_age_secs`.
pub fn refresh_cookie(token: &str, max_age_secs: i64, secure: bool) -> Result<HeaderValue, AppError> {
    cookie_value(token, max_age_secs, secure)
}

/// `Set-Cookie` value that makes the browser drop the refresh cookie.
pub fn cleared_refresh_cookie(secure: bool) -> Result<HeaderValue, AppError> {
    cookie_value("", 0, secure)
}

fn cookie_value(value: &str, max_age_secs: i64, secure: bool) -> Result<HeaderValue, AppError> {
    let secure = if secure { "; Secure" } else { "" };
    let cookie = format!(
        "{REFRESH_COOKIE}={value}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age_secs}{secure}"
    );
    HeaderValue::from_str(&cookie).map_err(|e| {
        AppError::Core(CoreError::Internal(format!("Invalid cookie value: {e}")))
    })
}
