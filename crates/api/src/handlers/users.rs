//! Handlers for the `/users` resource. Every route requires a bearer access token.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use turnstile_core::directory::{UserProfile, UserUpdate};
use turnstile_core::types::DbId;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Request body for `PATCH /users/{id}`. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "fullName must not be empty"))]
    pub full_name: Option<String>,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<Vec<UserProfile>>> {
    Ok(Json(state.auth.list_users().await?))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<UserProfile>> {
    Ok(Json(state.auth.find_user(id).await?))
}

/// PATCH /users/{id}
///
/// Changing the email to one another account holds fails with 400.
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateUserRequest>,
) -> AppResult<Json<UserProfile>> {
    input.validate()?;
    if input.full_name.is_none() && input.email.is_none() {
        return Err(AppError::BadRequest(
            "At least one of fullName or email must be provided".into(),
        ));
    }

    let profile = state
        .auth
        .update_user(
            id,
            UserUpdate {
                email: input.email,
                full_name: input.full_name,
            },
        )
        .await?;

    tracing::info!(user_id = id, updated_by = auth.user_id, "Updated user");
    Ok(Json(profile))
}

/// DELETE /users/{id}
///
/// Removes the user and their session row; returns the deleted profile.
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<UserProfile>> {
    let profile = state.auth.remove_user(id).await?;
    tracing::info!(user_id = id, deleted_by = auth.user_id, "User removed via API");
    Ok(Json(profile))
}
