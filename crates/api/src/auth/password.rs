//! Argon2id password hashing and verification.
//!
//! All password hashes use the Argon2id variant with a cryptographically random
//! salt generated via [`OsRng`]. The PHC string format is used for storage so
//! that algorithm parameters and salt are embedded in the hash itself.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use turnstile_core::error::CoreError;

/// Hashes and checks passwords.
///
/// Holds a digest of a throwaway password so that checks for unknown accounts
/// cost the same as checks for real ones.
#[derive(Clone)]
pub struct CredentialVerifier {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl CredentialVerifier {
    /// Build a verifier with the default Argon2id parameters.
    pub fn new() -> Result<Self, CoreError> {
        Self::with_argon2(Argon2::default())
    }

    /// Build a verifier with explicit Argon2 parameters (tests use cheap ones).
    pub fn with_argon2(argon2: Argon2<'static>) -> Result<Self, CoreError> {
        let salt = SaltString::generate(&mut OsRng);
        let dummy_hash = argon2
            .hash_password(b"turnstile-timing-equalizer", &salt)
            .map_err(|e| CoreError::Configuration(format!("Argon2 parameters rejected: {e}")))?
            .to_string();
        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a plaintext password with a fresh random salt.
    ///
    /// Returns the PHC-formatted hash string (includes algorithm, params, salt, and hash).
    pub fn hash(&self, password: &str) -> Result<String, CoreError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CoreError::Internal(format!("Password hashing error: {e}")))?;
        Ok(hash.to_string())
    }

    /// Verify a plaintext password against a stored PHC string.
    ///
    /// A malformed digest is treated as a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Burn one verification's worth of CPU for an account that does not exist.
    /// Always returns `false`.
    pub fn verify_absent(&self, password: &str) -> bool {
        let _ = self.verify(password, &self.dummy_hash);
        false
    }
}
