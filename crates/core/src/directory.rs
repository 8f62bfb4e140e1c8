//! User entity and the [`UserDirectory`] contract.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreResult;
use crate::types::{DbId, Timestamp};

/// Full user record.
///
/// Contains the password hash -- NEVER serialize this to API responses directly.
/// Use [`UserProfile`] for external-facing output.
#[derive(Debug, Clone)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Public user fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: DbId,
    pub full_name: String,
    pub email: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Input for creating a user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
}

/// Profile patch. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

/// Storage of user records, owning email uniqueness.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<User>>;

    /// Exact (case-sensitive) email match.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Insert a user. Fails with `StoreError::Duplicate("email")` if the email is taken.
    async fn create(&self, input: NewUser) -> StoreResult<User>;

    /// All users, oldest first.
    async fn list(&self) -> StoreResult<Vec<User>>;

    /// Apply a patch. Returns `None` if no user has this id.
    async fn update(&self, id: DbId, input: UserUpdate) -> StoreResult<Option<User>>;

    /// Remove a user. Returns `false` if no user has this id.
    async fn delete(&self, id: DbId) -> StoreResult<bool>;
}
