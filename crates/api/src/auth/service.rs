//! Registration, login, logout, and refresh-token rotation.
//!
//! [`AuthService`] sequences the credential verifier, the token issuer, the
//! session store, and the user directory. Session state is implicit in the
//! session row:
//!
//! ```text
//! NO_SESSION --register/login--> ACTIVE --logout--> REVOKED --login--> ACTIVE
//!                                  |  ^
//!                                  +--+ refresh (new token identity)
//! ```
//!
//! Every failure leaves this module as a [`CoreError`] kind; nothing below it
//! decides HTTP outcomes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use turnstile_core::directory::{NewUser, User, UserDirectory, UserProfile, UserUpdate};
use turnstile_core::error::{CoreError, StoreError, StoreResult};
use turnstile_core::session::SessionStore;
use turnstile_core::types::DbId;

use super::jwt::{hash_refresh_token, TokenIssuer, TokenPair, TokenSubject};
use super::password::CredentialVerifier;

/// Message shared by every refresh rejection so callers cannot tell a revoked
/// session from a rotated token.
const STALE_REFRESH_MSG: &str = "Invalid or expired refresh token";

/// Input for [`AuthService::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// A newly created user merged with their first token pair.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredUser {
    #[serde(flatten)]
    pub user: UserProfile,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// The auth orchestrator. Cheap to share behind an `Arc`.
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    issuer: TokenIssuer,
    verifier: CredentialVerifier,
    store_timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        issuer: TokenIssuer,
        verifier: CredentialVerifier,
        store_timeout: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            issuer,
            verifier,
            store_timeout,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Create an account and open its first session.
    pub async fn register(&self, input: Registration) -> Result<RegisteredUser, CoreError> {
        if self.bounded(self.users.find_by_email(&input.email)).await?.is_some() {
            return Err(duplicate_email(&input.email));
        }

        let password_hash = self.hash_password(input.password).await?;
        let created = tokio::time::timeout(
            self.store_timeout,
            self.users.create(NewUser {
                email: input.email.clone(),
                full_name: input.full_name,
                password_hash,
            }),
        )
        .await
        .unwrap_or(Err(StoreError::Timeout));
        let user = match created {
            Ok(user) => user,
            Err(StoreError::Duplicate(_)) => return Err(duplicate_email(&input.email)),
            Err(other) => return Err(other.into()),
        };

        let tokens = self.open_session(&user).await?;
        tracing::info!(user_id = user.id, "Registered user");

        Ok(RegisteredUser {
            user: UserProfile::from(&user),
            tokens,
        })
    }

    /// Check credentials and replace the user's session with a fresh pair.
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, CoreError> {
        let user = self.bounded(self.users.find_by_email(email)).await?;

        let Some(user) = user else {
            self.check_password(password.to_string(), None).await?;
            tracing::warn!("Login rejected: unknown account");
            return Err(CoreError::InvalidCredentials);
        };

        let matches = self
            .check_password(password.to_string(), Some(user.password_hash.clone()))
            .await?;
        if !matches {
            tracing::warn!(user_id = user.id, "Login rejected: wrong password");
            return Err(CoreError::InvalidCredentials);
        }

        let tokens = self.open_session(&user).await?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok(tokens)
    }

    /// Revoke the user's refresh token. Succeeds even without a session.
    pub async fn logout(&self, user_id: DbId) -> Result<(), CoreError> {
        if self.bounded(self.sessions.get(user_id)).await?.is_some() {
            self.bounded(self.sessions.clear_refresh_token(user_id))
                .await?;
            tracing::info!(user_id, "User logged out");
        } else {
            tracing::debug!(user_id, "Logout without a session");
        }
        Ok(())
    }

    /// Exchange the current refresh token for a new pair, invalidating it.
    ///
    /// If two refreshes with the same token race, exactly one rotates; the
    /// other fails with [`CoreError::Conflict`] and its freshly minted pair is
    /// discarded.
    pub async fn refresh(&self, user_id: DbId, presented: &str) -> Result<TokenPair, CoreError> {
        let user = self
            .bounded(self.users.find_by_id(user_id))
            .await?
            .ok_or_else(|| CoreError::NotAuthenticated(STALE_REFRESH_MSG.into()))?;

        let presented_hash = hash_refresh_token(presented);
        let session = self.bounded(self.sessions.get(user_id)).await?;
        let is_current = session
            .as_ref()
            .is_some_and(|session| session.holds(&presented_hash));
        if !is_current {
            tracing::warn!(
                user_id,
                has_session = session.is_some(),
                "Refresh rejected: token revoked or superseded"
            );
            return Err(CoreError::NotAuthenticated(STALE_REFRESH_MSG.into()));
        }

        let tokens = self.issuer.issue_pair(&subject(&user))?;
        let new_hash = hash_refresh_token(&tokens.refresh_token);
        let rotated = self
            .bounded(
                self.sessions
                    .rotate_refresh_token(user_id, &presented_hash, &new_hash),
            )
            .await
            .inspect_err(|e| log_session_write_failure(user_id, e))?;
        if !rotated {
            tracing::warn!(user_id, "Refresh lost a concurrent rotation");
            return Err(CoreError::Conflict(
                "Refresh token was rotated by a concurrent request".into(),
            ));
        }

        tracing::info!(user_id, "Rotated refresh token");
        Ok(tokens)
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, CoreError> {
        let users = self.bounded(self.users.list()).await?;
        Ok(users.iter().map(UserProfile::from).collect())
    }

    pub async fn find_user(&self, id: DbId) -> Result<UserProfile, CoreError> {
        self.bounded(self.users.find_by_id(id))
            .await?
            .map(|user| UserProfile::from(&user))
            .ok_or(CoreError::NotFound { entity: "User", id })
    }

    /// Apply a partial update. A taken email surfaces as `AlreadyExists`.
    pub async fn update_user(&self, id: DbId, input: UserUpdate) -> Result<UserProfile, CoreError> {
        self.bounded(self.users.update(id, input))
            .await?
            .map(|user| UserProfile::from(&user))
            .ok_or(CoreError::NotFound { entity: "User", id })
    }

    /// Delete a user together with their session row.
    pub async fn remove_user(&self, id: DbId) -> Result<UserProfile, CoreError> {
        let user = self
            .bounded(self.users.find_by_id(id))
            .await?
            .ok_or(CoreError::NotFound { entity: "User", id })?;

        self.bounded(self.sessions.delete_for_user(id)).await?;
        if !self.bounded(self.users.delete(id)).await? {
            return Err(CoreError::NotFound { entity: "User", id });
        }

        tracing::info!(user_id = id, "Deleted user");
        Ok(UserProfile::from(&user))
    }

    /// Mint a pair and record its refresh token as the user's only valid one.
    async fn open_session(&self, user: &User) -> Result<TokenPair, CoreError> {
        let tokens = self.issuer.issue_pair(&subject(user))?;
        let hash = hash_refresh_token(&tokens.refresh_token);
        self.bounded(self.sessions.upsert_refresh_token(user.id, &hash))
            .await
            .inspect_err(|e| log_session_write_failure(user.id, e))?;
        Ok(tokens)
    }

    async fn hash_password(&self, password: String) -> Result<String, CoreError> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| CoreError::Internal(format!("Password hashing task failed: {e}")))?
    }

    /// Verify off the async runtime. `None` runs the dummy comparison.
    async fn check_password(
        &self,
        password: String,
        hash: Option<String>,
    ) -> Result<bool, CoreError> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => verifier.verify(&password, &hash),
            None => verifier.verify_absent(&password),
        })
        .await
        .map_err(|e| CoreError::Internal(format!("Password verification task failed: {e}")))
    }

    /// Run a store call under the request-scoped storage timeout.
    async fn bounded<T>(
        &self,
        operation: impl Future<Output = StoreResult<T>>,
    ) -> Result<T, CoreError> {
        match tokio::time::timeout(self.store_timeout, operation).await {
            Ok(result) => result.map_err(CoreError::from),
            Err(_) => Err(StoreError::Timeout.into()),
        }
    }
}

fn subject(user: &User) -> TokenSubject {
    TokenSubject {
        user_id: user.id,
        email: user.email.clone(),
        full_name: user.full_name.clone(),
    }
}

fn duplicate_email(email: &str) -> CoreError {
    CoreError::AlreadyExists(format!("User with email {email} already exists"))
}

fn log_session_write_failure(user_id: DbId, err: &CoreError) {
    if matches!(err, CoreError::Conflict(_)) {
        tracing::error!(user_id, "Refresh token digest collided with another session");
    }
}
