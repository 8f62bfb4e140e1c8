pub mod auth;
pub mod health;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the route tree (mounted at the root).
///
/// ```text
/// /auth/registration           register (public)
/// /auth/login                  login (public)
/// /auth/logout                 logout (bearer)
/// /auth/refresh                refresh (auth-cookie)
///
/// /users                       list (bearer)
/// /users/{id}                  get, update, delete (bearer)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
}
