//! Route definitions for the `/auth` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /registration  -> registration
/// POST /login         -> login
/// POST /logout        -> logout (requires bearer)
/// POST /refresh       -> refresh (requires auth-cookie)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/registration", post(auth::registration))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/refresh", post(auth::refresh))
}
