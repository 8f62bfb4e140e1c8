#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use argon2::{Algorithm, Argon2, Params, Version};
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use turnstile_api::auth::jwt::{JwtConfig, TokenIssuer};
use turnstile_api::auth::password::CredentialVerifier;
use turnstile_api::auth::service::AuthService;
use turnstile_api::config::{LogFormat, ServerConfig, StorageBackend};
use turnstile_api::router::build_app_router;
use turnstile_api::state::AppState;
use turnstile_core::directory::UserDirectory;
use turnstile_core::memory::{MemorySessionStore, MemoryUserDirectory};
use turnstile_core::session::SessionStore;

/// Build a test `ServerConfig` with safe defaults and in-memory storage.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        store_timeout_secs: 5,
        storage: StorageBackend::Memory,
        cookie_secure: false,
        log_format: LogFormat::Pretty,
        jwt: JwtConfig {
            access_secret: "test-access-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
    }
}

/// Argon2id with minimal cost so hashing does not dominate test time.
pub fn cheap_verifier() -> CredentialVerifier {
    let params = Params::new(8, 1, 1, None).expect("valid argon2 params");
    CredentialVerifier::with_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
        .expect("verifier")
}

/// Handles to the in-memory stores behind a test service.
pub struct TestStores {
    pub users: Arc<MemoryUserDirectory>,
    pub sessions: Arc<MemorySessionStore>,
}

/// Build an [`AuthService`] over fresh in-memory stores.
pub fn build_test_service() -> (Arc<AuthService>, TestStores) {
    let users = Arc::new(MemoryUserDirectory::new());
    let sessions = Arc::new(MemorySessionStore::new());
    let timeout = Duration::from_secs(test_config().store_timeout_secs);
    let service = build_service_over(users.clone(), sessions.clone(), timeout);
    (Arc::new(service), TestStores { users, sessions })
}

/// Build an [`AuthService`] over caller-supplied stores.
pub fn build_service_over(
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    store_timeout: Duration,
) -> AuthService {
    let config = test_config();
    AuthService::new(
        users,
        sessions,
        TokenIssuer::new(&config.jwt).expect("issuer"),
        cheap_verifier(),
        store_timeout,
    )
}

/// Build the full application router with all middleware layers on
/// in-memory storage.
///
/// This goes through the same `build_app_router` as `main.rs`, so
/// integration tests exercise the production middleware stack.
pub fn build_test_app() -> Router {
    build_test_app_with_stores().0
}

pub fn build_test_app_with_stores() -> (Router, TestStores) {
    let config = test_config();
    let (auth, stores) = build_test_service();
    let state = AppState {
        auth,
        sessions: stores.sessions.clone(),
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config).expect("router");
    (app, stores)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("infallible")
}

fn json_request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = json_request(Method::POST, uri)
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn patch_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = json_request(Method::PATCH, uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// POST /auth/refresh presenting `refresh_token` in the `auth-cookie` cookie.
pub async fn post_refresh(app: Router, refresh_token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/refresh")
        .header(COOKIE, format!("auth-cookie={refresh_token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Raw `Set-Cookie` header of a response, if any.
pub fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Value of the `auth-cookie` cookie set by a response.
pub fn refresh_cookie_value(response: &Response<Body>) -> Option<String> {
    let header = set_cookie(response)?;
    let pair = header.split(';').next()?;
    pair.strip_prefix("auth-cookie=").map(str::to_string)
}

/// Register through the API and return the 201 body.
pub async fn register(app: Router, full_name: &str, email: &str, password: &str) -> serde_json::Value {
    let body = serde_json::json!({ "fullName": full_name, "email": email, "password": password });
    let response = post_json(app, "/auth/registration", body).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await
}
