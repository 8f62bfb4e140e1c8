//! PostgreSQL persistence for users and sessions.
//!
//! - [`models`] -- `FromRow` row structs.
//! - [`repositories`] -- zero-sized repositories over `&PgPool`.
//! - [`store`] -- adapters implementing the `turnstile_core` store traits.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use turnstile_core::error::StoreError;

pub mod models;
pub mod repositories;
pub mod store;

pub use store::{PgSessionStore, PgUserDirectory};

pub type DbPool = sqlx::PgPool;

/// Embedded migrations from `crates/db/migrations`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Create a connection pool from a database URL.
///
/// `acquire_timeout` bounds how long a request waits for a free connection.
pub async fn create_pool(
    database_url: &str,
    acquire_timeout: Duration,
) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Translate a sqlx error into the store-level taxonomy.
///
/// - Unique violations (SQLSTATE 23505) on the email constraint map to
///   [`StoreError::Duplicate`].
/// - Unique violations on the refresh-token constraint map to
///   [`StoreError::TokenCollision`].
/// - Pool acquisition timeouts map to [`StoreError::Timeout`].
/// - Everything else is a backend error.
pub fn classify_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            match db_err.constraint() {
                Some("uq_users_email") => StoreError::Duplicate("email"),
                Some("uq_user_sessions_refresh_token_hash") => StoreError::TokenCollision,
                _ => StoreError::Backend(err.to_string()),
            }
        }
        sqlx::Error::PoolTimedOut => StoreError::Timeout,
        _ => StoreError::Backend(err.to_string()),
    }
}
