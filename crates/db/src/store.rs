//! PostgreSQL-backed implementations of the core store traits.
//!
//! Both adapters are thin: they delegate to the zero-sized repositories and
//! translate sqlx errors through [`classify_sqlx_error`].

use async_trait::async_trait;
use turnstile_core::directory::{NewUser, User, UserDirectory, UserUpdate};
use turnstile_core::error::StoreResult;
use turnstile_core::session::{Session, SessionStore};
use turnstile_core::types::DbId;

use crate::repositories::{SessionRepo, UserRepo};
use crate::{classify_sqlx_error, DbPool};

/// [`SessionStore`] over the `user_sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, user_id: DbId) -> StoreResult<Option<Session>> {
        let row = SessionRepo::find_by_user(&self.pool, user_id)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(row.map(Session::from))
    }

    async fn upsert_refresh_token(&self, user_id: DbId, token_hash: &str) -> StoreResult<()> {
        SessionRepo::upsert_refresh_token(&self.pool, user_id, token_hash)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        user_id: DbId,
        expected_hash: &str,
        new_hash: &str,
    ) -> StoreResult<bool> {
        SessionRepo::rotate_refresh_token(&self.pool, user_id, expected_hash, new_hash)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn clear_refresh_token(&self, user_id: DbId) -> StoreResult<()> {
        let cleared = SessionRepo::clear_refresh_token(&self.pool, user_id)
            .await
            .map_err(classify_sqlx_error)?;
        tracing::debug!(user_id, cleared, "Cleared refresh token");
        Ok(())
    }

    async fn delete_for_user(&self, user_id: DbId) -> StoreResult<()> {
        SessionRepo::delete_for_user(&self.pool, user_id)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        crate::health_check(&self.pool)
            .await
            .map_err(classify_sqlx_error)
    }
}

/// [`UserDirectory`] over the `users` table.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: DbPool,
}

impl PgUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<User>> {
        let row = UserRepo::find_by_id(&self.pool, id)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = UserRepo::find_by_email(&self.pool, email)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(row.map(User::from))
    }

    async fn create(&self, input: NewUser) -> StoreResult<User> {
        let row = UserRepo::create(
            &self.pool,
            &input.email,
            &input.full_name,
            &input.password_hash,
        )
        .await
        .map_err(classify_sqlx_error)?;
        Ok(row.into())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let rows = UserRepo::list(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn update(&self, id: DbId, input: UserUpdate) -> StoreResult<Option<User>> {
        let row = UserRepo::update(
            &self.pool,
            id,
            input.email.as_deref(),
            input.full_name.as_deref(),
        )
        .await
        .map_err(classify_sqlx_error)?;
        Ok(row.map(User::from))
    }

    async fn delete(&self, id: DbId) -> StoreResult<bool> {
        UserRepo::delete(&self.pool, id)
            .await
            .map_err(classify_sqlx_error)
    }
}
