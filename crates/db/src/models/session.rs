//! User session row model.

use sqlx::FromRow;
use turnstile_core::session::Session;
use turnstile_core::types::{DbId, Timestamp};

/// A row from the `user_sessions` table.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: DbId,
    pub user_id: DbId,
    pub refresh_token_hash: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            user_id: row.user_id,
            refresh_token_hash: row.refresh_token_hash,
            updated_at: row.updated_at,
        }
    }
}
