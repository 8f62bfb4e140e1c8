//! Domain types and storage contracts for the Turnstile auth service.
//!
//! - [`error`] -- `CoreError` taxonomy and `StoreError`.
//! - [`session`] -- session rows and the `SessionStore` trait.
//! - [`directory`] -- user records and the `UserDirectory` trait.
//! - [`memory`] -- in-process implementations of both traits.

pub mod directory;
pub mod error;
pub mod memory;
pub mod session;
pub mod types;
