//! In-process implementations of [`SessionStore`] and [`UserDirectory`].
//!
//! Used by the `memory` storage backend and by tests. Each store keeps its
//! maps behind a single `RwLock`, so uniqueness checks and writes happen
//! under the same guard.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::directory::{NewUser, User, UserDirectory, UserUpdate};
use crate::error::{StoreError, StoreResult};
use crate::session::{Session, SessionStore};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SessionMaps {
    by_user: HashMap<DbId, Session>,
    /// Reverse index enforcing uniqueness of non-null digests.
    by_token: HashMap<String, DbId>,
}

impl SessionMaps {
    /// Point `user_id` at `new_hash`, keeping the token index in step.
    fn set_token(&mut self, user_id: DbId, new_hash: &str) -> StoreResult<()> {
        if let Some(owner) = self.by_token.get(new_hash) {
            if *owner != user_id {
                return Err(StoreError::TokenCollision);
            }
        }

        let now = Utc::now();
        let session = self.by_user.entry(user_id).or_insert_with(|| Session {
            user_id,
            refresh_token_hash: None,
            updated_at: now,
        });
        if let Some(old) = session.refresh_token_hash.take() {
            self.by_token.remove(&old);
        }
        session.refresh_token_hash = Some(new_hash.to_string());
        session.updated_at = now;
        self.by_token.insert(new_hash.to_string(), user_id);
        Ok(())
    }
}

/// [`SessionStore`] backed by a `HashMap`.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<SessionMaps>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of session rows, revoked ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_user.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user_id: DbId) -> StoreResult<Option<Session>> {
        Ok(self.inner.read().await.by_user.get(&user_id).cloned())
    }

    async fn upsert_refresh_token(&self, user_id: DbId, token_hash: &str) -> StoreResult<()> {
        self.inner.write().await.set_token(user_id, token_hash)
    }

    async fn rotate_refresh_token(
        &self,
        user_id: DbId,
        expected_hash: &str,
        new_hash: &str,
    ) -> StoreResult<bool> {
        let mut maps = self.inner.write().await;
        let current = maps
            .by_user
            .get(&user_id)
            .is_some_and(|session| session.holds(expected_hash));
        if !current {
            return Ok(false);
        }
        maps.set_token(user_id, new_hash)?;
        Ok(true)
    }

    async fn clear_refresh_token(&self, user_id: DbId) -> StoreResult<()> {
        let mut maps = self.inner.write().await;
        let SessionMaps { by_user, by_token } = &mut *maps;
        if let Some(session) = by_user.get_mut(&user_id) {
            if let Some(old) = session.refresh_token_hash.take() {
                by_token.remove(&old);
            }
            session.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_for_user(&self, user_id: DbId) -> StoreResult<()> {
        let mut maps = self.inner.write().await;
        if let Some(session) = maps.by_user.remove(&user_id) {
            if let Some(old) = session.refresh_token_hash {
                maps.by_token.remove(&old);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Default)]
struct UserMaps {
    next_id: DbId,
    by_id: HashMap<DbId, User>,
    by_email: HashMap<String, DbId>,
}

/// [`UserDirectory`] backed by a `HashMap`, with sequential ids starting at 1.
#[derive(Default)]
pub struct MemoryUserDirectory {
    inner: RwLock<UserMaps>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let maps = self.inner.read().await;
        Ok(maps
            .by_email
            .get(email)
            .and_then(|id| maps.by_id.get(id))
            .cloned())
    }

    async fn create(&self, input: NewUser) -> StoreResult<User> {
        let mut maps = self.inner.write().await;
        if maps.by_email.contains_key(&input.email) {
            return Err(StoreError::Duplicate("email"));
        }

        maps.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: maps.next_id,
            email: input.email,
            full_name: input.full_name,
            password_hash: input.password_hash,
            created_at: now,
            updated_at: now,
        };
        maps.by_email.insert(user.email.clone(), user.id);
        maps.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let maps = self.inner.read().await;
        let mut users: Vec<User> = maps.by_id.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn update(&self, id: DbId, input: UserUpdate) -> StoreResult<Option<User>> {
        let mut maps = self.inner.write().await;
        let UserMaps { by_id, by_email, .. } = &mut *maps;

        let Some(user) = by_id.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(email) = input.email {
            if email != user.email {
                if by_email.contains_key(&email) {
                    return Err(StoreError::Duplicate("email"));
                }
                by_email.remove(&user.email);
                by_email.insert(email.clone(), id);
                user.email = email;
            }
        }
        if let Some(full_name) = input.full_name {
            user.full_name = full_name;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: DbId) -> StoreResult<bool> {
        let mut maps = self.inner.write().await;
        match maps.by_id.remove(&id) {
            Some(user) => {
                maps.by_email.remove(&user.email);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
