//! Authentication primitives and the session lifecycle orchestrator.
//!
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`jwt`] -- access/refresh token issuance, validation, and digests.
//! - [`service`] -- registration, login, logout, and refresh rotation.

pub mod jwt;
pub mod password;
pub mod service;
