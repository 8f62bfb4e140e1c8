//! Orchestrator-level tests for session lifecycle properties.

mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use turnstile_api::auth::jwt::hash_refresh_token;
use turnstile_api::auth::service::Registration;
use turnstile_core::directory::{NewUser, User, UserDirectory, UserUpdate};
use turnstile_core::error::{CoreError, StoreResult};
use turnstile_core::memory::{MemorySessionStore, MemoryUserDirectory};
use turnstile_core::session::{Session, SessionStore};
use turnstile_core::types::DbId;

fn registration(email: &str) -> Registration {
    Registration {
        email: email.to_string(),
        password: "1234".to_string(),
        full_name: "A B".to_string(),
    }
}

#[tokio::test]
async fn refresh_token_works_exactly_once() {
    let (service, _) = common::build_test_service();
    let registered = service.register(registration("a@x.com")).await.unwrap();
    let user_id = registered.user.id;

    let rotated = service
        .refresh(user_id, &registered.tokens.refresh_token)
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, registered.tokens.refresh_token);
    assert_ne!(rotated.access_token, registered.tokens.access_token);

    let replay = service
        .refresh(user_id, &registered.tokens.refresh_token)
        .await;
    assert_matches!(replay, Err(CoreError::NotAuthenticated(_)));

    // The rotated token is now the current one.
    service.refresh(user_id, &rotated.refresh_token).await.unwrap();
}

#[tokio::test]
async fn at_most_one_session_row_per_user() {
    let (service, stores) = common::build_test_service();
    let registered = service.register(registration("a@x.com")).await.unwrap();
    let user_id = registered.user.id;

    let mut current = registered.tokens.refresh_token;
    for _ in 0..3 {
        current = service.refresh(user_id, &current).await.unwrap().refresh_token;
        current = service.login("a@x.com", "1234").await.unwrap().refresh_token;
    }
    service.logout(user_id).await.unwrap();

    assert_eq!(stores.sessions.len().await, 1);
    let session = stores.sessions.get(user_id).await.unwrap().unwrap();
    assert_eq!(session.refresh_token_hash, None);
    assert_matches!(
        service.refresh(user_id, &current).await,
        Err(CoreError::NotAuthenticated(_))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_yield_distinct_tokens() {
    let (service, stores) = common::build_test_service();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .register(registration(&format!("user{i}@x.com")))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut refresh_tokens = HashSet::new();
    let mut ids = HashSet::new();
    for handle in handles {
        let registered = handle.await.unwrap();
        assert!(refresh_tokens.insert(registered.tokens.refresh_token));
        assert!(ids.insert(registered.user.id));
    }

    assert_eq!(refresh_tokens.len(), 16);
    assert_eq!(stores.sessions.len().await, 16);
    assert_eq!(stores.users.list().await.unwrap().len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refreshes_with_one_token_have_one_winner() {
    let (service, _) = common::build_test_service();
    let registered = service.register(registration("a@x.com")).await.unwrap();
    let user_id = registered.user.id;
    let token = registered.tokens.refresh_token;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            let token = token.clone();
            tokio::spawn(async move { service.refresh(user_id, &token).await })
        })
        .collect();

    // Losers either read the row after the winner rotated it (stale) or read
    // it before and then lost the compare-and-swap (conflict).
    let mut winners = Vec::new();
    let (mut conflicts, mut stale) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            Ok(pair) => winners.push(pair),
            Err(CoreError::Conflict(_)) => conflicts += 1,
            Err(CoreError::NotAuthenticated(_)) => stale += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one refresh may rotate the token");
    assert_eq!(conflicts + stale, 7, "conflicts={conflicts} stale={stale}");
    service
        .refresh(user_id, &winners[0].refresh_token)
        .await
        .expect("the winner's token is current");
}

#[tokio::test]
async fn duplicate_email_is_already_exists() {
    let (service, _) = common::build_test_service();
    service.register(registration("a@x.com")).await.unwrap();

    let result = service.register(registration("a@x.com")).await;
    assert_matches!(result, Err(CoreError::AlreadyExists(msg)) if msg.contains("a@x.com"));
}

#[tokio::test]
async fn login_failures_are_identical() {
    let (service, _) = common::build_test_service();
    service.register(registration("a@x.com")).await.unwrap();

    let wrong = service.login("a@x.com", "nope").await.unwrap_err();
    let unknown = service.login("ghost@x.com", "1234").await.unwrap_err();

    assert_matches!(wrong, CoreError::InvalidCredentials);
    assert_matches!(unknown, CoreError::InvalidCredentials);
    assert_eq!(wrong.to_string(), unknown.to_string());
}

#[tokio::test]
async fn logout_without_session_succeeds() {
    let (service, stores) = common::build_test_service();
    service.logout(999).await.unwrap();
    assert!(stores.sessions.is_empty().await);
}

#[tokio::test]
async fn refresh_for_unknown_user_is_not_authenticated() {
    let (service, _) = common::build_test_service();
    let registered = service.register(registration("a@x.com")).await.unwrap();

    let result = service
        .refresh(registered.user.id + 1, &registered.tokens.refresh_token)
        .await;
    assert_matches!(result, Err(CoreError::NotAuthenticated(_)));
}

#[tokio::test]
async fn remove_user_drops_session() {
    let (service, stores) = common::build_test_service();
    let registered = service.register(registration("a@x.com")).await.unwrap();
    let user_id = registered.user.id;

    let profile = service.remove_user(user_id).await.unwrap();
    assert_eq!(profile.email, "a@x.com");
    assert!(stores.sessions.get(user_id).await.unwrap().is_none());
    assert_matches!(
        service.remove_user(user_id).await,
        Err(CoreError::NotFound { entity: "User", .. })
    );
}

/// Session store that serves reads from memory but loses every rotation, as if
/// another request always swapped the digest first.
struct LosingRotation(Arc<MemorySessionStore>);

#[async_trait]
impl SessionStore for LosingRotation {
    async fn get(&self, user_id: DbId) -> StoreResult<Option<Session>> {
        self.0.get(user_id).await
    }

    async fn upsert_refresh_token(&self, user_id: DbId, token_hash: &str) -> StoreResult<()> {
        self.0.upsert_refresh_token(user_id, token_hash).await
    }

    async fn rotate_refresh_token(&self, _: DbId, _: &str, _: &str) -> StoreResult<bool> {
        Ok(false)
    }

    async fn clear_refresh_token(&self, user_id: DbId) -> StoreResult<()> {
        self.0.clear_refresh_token(user_id).await
    }

    async fn delete_for_user(&self, user_id: DbId) -> StoreResult<()> {
        self.0.delete_for_user(user_id).await
    }
}

#[tokio::test]
async fn refresh_that_loses_rotation_is_conflict() {
    let sessions = Arc::new(MemorySessionStore::new());
    let service = common::build_service_over(
        Arc::new(MemoryUserDirectory::new()),
        Arc::new(LosingRotation(sessions.clone())),
        Duration::from_secs(5),
    );
    let registered = service.register(registration("a@x.com")).await.unwrap();
    let user_id = registered.user.id;

    let result = service
        .refresh(user_id, &registered.tokens.refresh_token)
        .await;
    assert_matches!(result, Err(CoreError::Conflict(_)));

    let session = sessions.get(user_id).await.unwrap().unwrap();
    assert_eq!(
        session.refresh_token_hash,
        Some(hash_refresh_token(&registered.tokens.refresh_token)),
        "the losing refresh must not touch the stored digest"
    );
}

/// Session store that hangs forever once `stalled` is set.
struct StallingSessions {
    inner: Arc<MemorySessionStore>,
    stalled: AtomicBool,
}

impl StallingSessions {
    fn new(inner: Arc<MemorySessionStore>) -> Self {
        Self {
            inner,
            stalled: AtomicBool::new(false),
        }
    }

    async fn gate(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl SessionStore for StallingSessions {
    async fn get(&self, user_id: DbId) -> StoreResult<Option<Session>> {
        self.gate().await;
        self.inner.get(user_id).await
    }

    async fn upsert_refresh_token(&self, user_id: DbId, token_hash: &str) -> StoreResult<()> {
        self.gate().await;
        self.inner.upsert_refresh_token(user_id, token_hash).await
    }

    async fn rotate_refresh_token(
        &self,
        user_id: DbId,
        expected_hash: &str,
        new_hash: &str,
    ) -> StoreResult<bool> {
        self.gate().await;
        self.inner
            .rotate_refresh_token(user_id, expected_hash, new_hash)
            .await
    }

    async fn clear_refresh_token(&self, user_id: DbId) -> StoreResult<()> {
        self.gate().await;
        self.inner.clear_refresh_token(user_id).await
    }

    async fn delete_for_user(&self, user_id: DbId) -> StoreResult<()> {
        self.gate().await;
        self.inner.delete_for_user(user_id).await
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_session_store_times_out_as_internal() {
    let inner = Arc::new(MemorySessionStore::new());
    let sessions = Arc::new(StallingSessions::new(inner.clone()));
    let service = common::build_service_over(
        Arc::new(MemoryUserDirectory::new()),
        sessions.clone(),
        Duration::from_millis(50),
    );
    let registered = service.register(registration("a@x.com")).await.unwrap();
    let user_id = registered.user.id;
    let token = registered.tokens.refresh_token;

    sessions.stalled.store(true, Ordering::SeqCst);

    assert_matches!(
        service.login("a@x.com", "1234").await,
        Err(CoreError::Internal(_))
    );
    assert_matches!(
        service.refresh(user_id, &token).await,
        Err(CoreError::Internal(_))
    );
    assert_matches!(service.logout(user_id).await, Err(CoreError::Internal(_)));

    let late = service.register(registration("b@x.com")).await;
    assert_matches!(late, Err(CoreError::Internal(_)));
    assert_eq!(inner.len().await, 1, "a timed-out registration opens no session");

    // Nothing above reached the store, so the first token is still current.
    sessions.stalled.store(false, Ordering::SeqCst);
    service.refresh(user_id, &token).await.unwrap();
}

/// User directory whose every call hangs forever.
struct StalledDirectory;

#[async_trait]
impl UserDirectory for StalledDirectory {
    async fn find_by_id(&self, _: DbId) -> StoreResult<Option<User>> {
        std::future::pending().await
    }

    async fn find_by_email(&self, _: &str) -> StoreResult<Option<User>> {
        std::future::pending().await
    }

    async fn create(&self, _: NewUser) -> StoreResult<User> {
        std::future::pending().await
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        std::future::pending().await
    }

    async fn update(&self, _: DbId, _: UserUpdate) -> StoreResult<Option<User>> {
        std::future::pending().await
    }

    async fn delete(&self, _: DbId) -> StoreResult<bool> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_directory_times_out_as_internal() {
    let sessions = Arc::new(MemorySessionStore::new());
    let service = common::build_service_over(
        Arc::new(StalledDirectory),
        sessions.clone(),
        Duration::from_millis(50),
    );

    assert_matches!(
        service.register(registration("a@x.com")).await,
        Err(CoreError::Internal(_))
    );
    assert_matches!(
        service.login("a@x.com", "1234").await,
        Err(CoreError::Internal(_))
    );
    assert_matches!(
        service.refresh(1, "any-token").await,
        Err(CoreError::Internal(_))
    );
    assert_matches!(service.list_users().await, Err(CoreError::Internal(_)));
    assert_matches!(service.find_user(1).await, Err(CoreError::Internal(_)));
    assert_matches!(
        service
            .update_user(
                1,
                UserUpdate {
                    email: None,
                    full_name: Some("C D".to_string()),
                },
            )
            .await,
        Err(CoreError::Internal(_))
    );
    assert_matches!(service.remove_user(1).await, Err(CoreError::Internal(_)));
    assert!(sessions.is_empty().await);
}
