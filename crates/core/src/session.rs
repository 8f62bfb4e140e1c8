//! Session row model and the [`SessionStore`] contract.
//!
//! A session row maps one user to the digest of their single currently-valid
//! refresh token. Rows are created lazily on the first login or registration
//! and a `None` digest means the session was revoked by logout.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{DbId, Timestamp};

/// One row per user. `refresh_token_hash` is unique across rows when set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: DbId,
    /// SHA-256 hex digest of the current refresh token, `None` after logout.
    pub refresh_token_hash: Option<String>,
    pub updated_at: Timestamp,
}

impl Session {
    /// `true` when the session holds a token whose digest equals `hash`.
    pub fn holds(&self, hash: &str) -> bool {
        self.refresh_token_hash.as_deref() == Some(hash)
    }
}

/// Durable mapping from user id to the current refresh token digest.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the session row for a user.
    async fn get(&self, user_id: DbId) -> StoreResult<Option<Session>>;

    /// Create the row with `token_hash`, or overwrite the existing digest.
    ///
    /// Fails with [`StoreError::TokenCollision`](crate::error::StoreError::TokenCollision)
    /// if another user's row already holds the same digest.
    async fn upsert_refresh_token(&self, user_id: DbId, token_hash: &str) -> StoreResult<()>;

    /// Replace `expected_hash` with `new_hash` only if the row still holds
    /// `expected_hash`. Returns `false` when the row changed underneath the
    /// caller (or does not exist) and nothing was written.
    async fn rotate_refresh_token(
        &self,
        user_id: DbId,
        expected_hash: &str,
        new_hash: &str,
    ) -> StoreResult<bool>;

    /// Null out the digest. Idempotent, and a no-op when no row exists.
    async fn clear_refresh_token(&self, user_id: DbId) -> StoreResult<()>;

    /// Drop the row. Only called when the owning user is deleted.
    async fn delete_for_user(&self, user_id: DbId) -> StoreResult<()>;

    /// Cheap liveness probe used by the health endpoint.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
