use vela_console_core::{AppError, AppResult};
use vela_console_domain::{PASSWORD_MIN_LENGTH, validate_password};

const PASSWORD_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// Largest multiple of the alphabet size that fits in a byte. Bytes at or above
// it are rejected so every character is equally likely.
const ACCEPTED_BYTES: usize = 256 - 256 % PASSWORD_ALPHABET.len();

fn alphabet_char(byte: u8) -> Option<char> {
    let value = usize::from(byte);
    (value < ACCEPTED_BYTES).then(|| char::from(PASSWORD_ALPHABET[value % PASSWORD_ALPHABET.len()]))
}

/// Generates a random alphanumeric password that passes the password policy.
pub(super) fn generate_password() -> AppResult<String> {
    loop {
        let mut password = String::with_capacity(PASSWORD_MIN_LENGTH);
        while password.len() < PASSWORD_MIN_LENGTH {
            let mut bytes = [0u8; 32];
            getrandom::fill(&mut bytes).map_err(|error| {
                AppError::Internal(format!("failed to generate admin password: {error}"))
            })?;
            password.extend(
                bytes
                    .into_iter()
                    .filter_map(alphabet_char)
                    .take(PASSWORD_MIN_LENGTH - password.len()),
            );
        }

        if validate_password(&password).is_ok() {
            return Ok(password);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use vela_console_domain::validate_password;

    use super::{ACCEPTED_BYTES, alphabet_char, generate_password};

    #[test]
    fn generated_passwords_pass_the_policy() {
        for _ in 0..32 {
            let password = generate_password().unwrap_or_default();
            assert_eq!(password.len(), 8);
            assert!(validate_password(&password).is_ok());
        }
    }

    #[test]
    fn accepted_bytes_cover_the_alphabet_evenly() {
        let mut counts = HashMap::new();
        for byte in 0..=u8::MAX {
            if let Some(character) = alphabet_char(byte) {
                *counts.entry(character).or_insert(0) += 1;
            }
        }

        assert_eq!(ACCEPTED_BYTES, 248);
        assert_eq!(counts.len(), 62);
        assert!(counts.values().all(|count| *count == 4));
        assert_eq!(alphabet_char(248), None);
        assert_eq!(alphabet_char(u8::MAX), None);
    }
}
