//! JWT access/refresh token issuance and validation.
//!
//! Both tokens are HS256-signed JWTs carrying the same [`Claims`] payload, but
//! they are signed with different secrets and expire on different schedules,
//! so neither kind can be passed off as the other. Only the SHA-256 digest of
//! a refresh token is stored server-side.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use turnstile_core::error::CoreError;
use turnstile_core::types::DbId;
use uuid::Uuid;

/// JWT claims embedded in both access and refresh tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    pub email: String,
    pub full_name: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier (UUID v4). Keeps two tokens minted in the same
    /// second for the same user distinct.
    pub jti: String,
}

/// Identity a token pair is minted for.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: DbId,
    pub email: String,
    pub full_name: String,
}

/// An access token plus its matching refresh token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Configuration for JWT token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret for access tokens.
    pub access_secret: String,
    /// HMAC-SHA256 secret for refresh tokens. Must differ from `access_secret`.
    pub refresh_secret: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_expiry_days: i64,
}

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                     | Required | Default |
    /// |-----------------------------|----------|---------|
    /// | `ACCESS_TOKEN_SECRET`       | **yes**  | --      |
    /// | `REFRESH_TOKEN_SECRET`      | **yes**  | --      |
    /// | `ACCESS_TOKEN_EXPIRY_MINS`  | no       | `15`    |
    /// | `REFRESH_TOKEN_EXPIRY_DAYS` | no       | `7`     |
    pub fn from_env() -> Result<Self, CoreError> {
        let access_secret = required_secret("ACCESS_TOKEN_SECRET")?;
        let refresh_secret = required_secret("REFRESH_TOKEN_SECRET")?;

        let access_token_expiry_mins =
            crate::config::env_or("ACCESS_TOKEN_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS)?;
        let refresh_token_expiry_days =
            crate::config::env_or("REFRESH_TOKEN_EXPIRY_DAYS", DEFAULT_REFRESH_EXPIRY_DAYS)?;

        Ok(Self {
            access_secret,
            refresh_secret,
            access_token_expiry_mins,
            refresh_token_expiry_days,
        })
    }
}

fn required_secret(name: &str) -> Result<String, CoreError> {
    match std::env::var(name) {
        Ok(secret) if !secret.is_empty() => Ok(secret),
        _ => Err(CoreError::Configuration(format!("{name} must be set"))),
    }
}

/// Mints and validates token pairs.
#[derive(Clone)]
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Build an issuer, rejecting empty, shared, or non-positive settings.
    pub fn new(config: &JwtConfig) -> Result<Self, CoreError> {
        if config.access_secret.is_empty() || config.refresh_secret.is_empty() {
            return Err(CoreError::Configuration(
                "Token signing secrets must not be empty".into(),
            ));
        }
        if config.access_secret == config.refresh_secret {
            return Err(CoreError::Configuration(
                "Access and refresh token secrets must differ".into(),
            ));
        }
        if config.access_token_expiry_mins <= 0 || config.refresh_token_expiry_days <= 0 {
            return Err(CoreError::Configuration(
                "Token lifetimes must be positive".into(),
            ));
        }
        let too_large = || CoreError::Configuration("Token lifetime is too large".into());
        let access_ttl_secs = config
            .access_token_expiry_mins
            .checked_mul(60)
            .ok_or_else(too_large)?;
        let refresh_ttl_secs = config
            .refresh_token_expiry_days
            .checked_mul(24 * 60 * 60)
            .ok_or_else(too_large)?;

        Ok(Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        })
    }

    /// Access token lifetime in seconds.
    pub fn access_expires_in(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Refresh token lifetime in seconds.
    pub fn refresh_expires_in(&self) -> i64 {
        self.refresh_ttl_secs
    }

    /// Mint a fresh access + refresh pair for `subject`.
    pub fn issue_pair(&self, subject: &TokenSubject) -> Result<TokenPair, CoreError> {
        let now = chrono::Utc::now().timestamp();
        let access_token = sign(subject, now, self.access_ttl_secs, &self.access_encoding)?;
        let refresh_token = sign(subject, now, self.refresh_ttl_secs, &self.refresh_encoding)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Validate an access token's signature and expiry.
    pub fn validate_access(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        verify(token, &self.access_decoding)
    }

    /// Validate a refresh token's signature and expiry.
    pub fn validate_refresh(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        verify(token, &self.refresh_decoding)
    }
}

fn sign(
    subject: &TokenSubject,
    now: i64,
    ttl_secs: i64,
    key: &EncodingKey,
) -> Result<String, CoreError> {
    let exp = now.checked_add(ttl_secs).ok_or_else(|| {
        CoreError::Configuration("Token expiry is out of range".into())
    })?;
    let claims = Claims {
        sub: subject.user_id,
        email: subject.email.clone(),
        full_name: subject.full_name.clone(),
        exp,
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };
    encode(&Header::default(), &claims, key)
        .map_err(|e| CoreError::Configuration(format!("Token signing failed: {e}")))
}

fn verify(token: &str, key: &DecodingKey) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(token, key, &Validation::default())?;
    Ok(token_data.claims)
}

/// Compute the SHA-256 hex digest of a refresh token.
///
/// This is the value the session store holds and compares.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
