//! Request extractors for the two credential carriers.
//!
//! - [`auth::AuthUser`] -- Access token from the `Authorization: Bearer` header.
//! - [`refresh::RefreshCredential`] -- Refresh token from the `auth-cookie` cookie.

pub mod auth;
pub mod refresh;
