use std::sync::Arc;

use turnstile_core::session::SessionStore;

use crate::auth::service::AuthService;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Register/login/logout/refresh orchestration.
    pub auth: Arc<AuthService>,
    /// Session rows, used directly only by the health check.
    pub sessions: Arc<dyn SessionStore>,
    /// Server configuration (cookie flags, token lifetimes).
    pub config: Arc<ServerConfig>,
}
