//! Repository for the `user_sessions` table.

use sqlx::PgPool;
use turnstile_core::types::DbId;

use crate::models::session::SessionRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, refresh_token_hash, created_at, updated_at";

/// Provides the rotation primitives for per-user sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Find the session row for a user.
    pub async fn find_by_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<SessionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_sessions WHERE user_id = $1");
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert the row for `user_id`, or overwrite its digest if it exists.
    pub async fn upsert_refresh_token(
        pool: &PgPool,
        user_id: DbId,
        token_hash: &str,
    ) -> Result<SessionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_sessions (user_id, refresh_token_hash)
             VALUES ($1, $2)
             ON CONFLICT ON CONSTRAINT uq_user_sessions_user_id
             DO UPDATE SET refresh_token_hash = EXCLUDED.refresh_token_hash
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(user_id)
            .bind(token_hash)
            .fetch_one(pool)
            .await
    }

    /// Conditional rotation: overwrite the digest only if it still equals
    /// `expected_hash`. Returns `true` if the row was updated.
    pub async fn rotate_refresh_token(
        pool: &PgPool,
        user_id: DbId,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET refresh_token_hash = $3
             WHERE user_id = $1 AND refresh_token_hash = $2",
        )
        .bind(user_id)
        .bind(expected_hash)
        .bind(new_hash)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Null out the digest for a user. Returns `true` if a live token was cleared.
    pub async fn clear_refresh_token(pool: &PgPool, user_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET refresh_token_hash = NULL
             WHERE user_id = $1 AND refresh_token_hash IS NOT NULL",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete the row for a user.
    pub async fn delete_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
