use axum::routing::get;
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Routes mounted at `/users`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(users::list_users)).route(
        "/{id}",
        get(users::get_user)
            .patch(users::update_user)
            .delete(users::delete_user),
    )
}
