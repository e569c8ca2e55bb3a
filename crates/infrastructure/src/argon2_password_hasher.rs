//! Argon2id password hasher.
//!
//! Parameters follow the OWASP password storage guidance:
//! m=19456 (19 MiB), t=2, p=1.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use vela_console_application::PasswordHasher as PasswordHasherPort;
use vela_console_core::{AppError, AppResult};

/// Argon2id hasher for console user and admin passwords.
#[derive(Clone)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    /// Creates a hasher with the default parameters.
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(19456, 2, 1, None).unwrap_or_else(|_| Params::default());
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasherPort for Argon2PasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|error| AppError::Internal(format!("failed to hash password: {error}")))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        // Stored hashes come from the datastore or the admin secret; a value
        // that does not parse never matches.
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return Ok(false);
        };

        match self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
        {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(error) => Err(AppError::Internal(format!(
                "password verification failed: {error}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use vela_console_application::PasswordHasher as PasswordHasherPort;
    use vela_console_core::AppResult;

    use super::Argon2PasswordHasher;

    #[test]
    fn hash_and_verify_correct_password() -> AppResult<()> {
        let hasher = Argon2PasswordHasher::new();
        let hash = hasher.hash_password("VelaUX12345")?;
        assert!(hasher.verify_password("VelaUX12345", &hash)?);
        Ok(())
    }

    #[test]
    fn verify_wrong_password_returns_false() -> AppResult<()> {
        let hasher = Argon2PasswordHasher::new();
        let hash = hasher.hash_password("VelaUX12345")?;
        assert!(!hasher.verify_password("VelaUX54321", &hash)?);
        Ok(())
    }

    #[test]
    fn hashes_are_salted() -> AppResult<()> {
        let hasher = Argon2PasswordHasher::new();
        assert_ne!(
            hasher.hash_password("VelaUX12345")?,
            hasher.hash_password("VelaUX12345")?
        );
        Ok(())
    }

    #[test]
    fn unparsable_hash_never_matches() -> AppResult<()> {
        let hasher = Argon2PasswordHasher::new();
        assert!(!hasher.verify_password("VelaUX12345", "VelaUX12345")?);
        Ok(())
    }
}
