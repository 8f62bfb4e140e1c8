use crate::types::DbId;

/// Domain error taxonomy shared by every crate in the workspace.
///
/// Store implementations report [`StoreError`]; the auth orchestrator turns
/// every failure into one of these kinds before it reaches the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A uniqueness conflict the caller can fix (e.g. an email that is already registered).
    #[error("{0}")]
    AlreadyExists(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unknown email or wrong password. The two cases are intentionally
    /// indistinguishable.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors reported by [`SessionStore`](crate::session::SessionStore) and
/// [`UserDirectory`](crate::directory::UserDirectory) implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique column (named by the payload) already holds this value.
    #[error("duplicate value for {0}")]
    Duplicate(&'static str),

    /// Two sessions would hold the same refresh token digest.
    #[error("refresh token collides with another session")]
    TokenCollision,

    #[error("storage operation timed out")]
    Timeout,

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(field) => {
                CoreError::AlreadyExists(format!("A user with this {field} already exists"))
            }
            StoreError::TokenCollision => {
                CoreError::Conflict("Refresh token collides with another session".into())
            }
            StoreError::Timeout => CoreError::Internal("Storage operation timed out".into()),
            StoreError::Backend(msg) => CoreError::Internal(msg),
        }
    }
}
