//! Credential ports.

use serde::{Deserialize, Serialize};
use vela_console_core::AppResult;

/// Port for password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

/// What a signed token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantType {
    /// Authenticates API requests.
    Access,
    /// Exchanges for a new access token.
    Refresh,
}

/// Verified content of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// User name.
    pub username: String,
    /// Token purpose.
    pub grant_type: GrantType,
    /// Expiry as unix seconds.
    pub expires_at: i64,
}

/// Port for signing and verifying session tokens.
///
/// `verify` reports expired, not-yet-valid, malformed and otherwise invalid
/// tokens as `Unauthorized` with distinct messages.
pub trait TokenIssuer: Send + Sync {
    /// Signs a token for a user valid for `ttl_seconds`.
    fn sign(&self, username: &str, grant_type: GrantType, ttl_seconds: i64) -> AppResult<String>;

    /// Verifies a token and returns its claims.
    fn verify(&self, token: &str) -> AppResult<TokenClaims>;
}
