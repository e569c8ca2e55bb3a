//! HS256 session tokens.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use vela_console_application::{GrantType, TokenClaims, TokenIssuer};
use vela_console_core::{AppError, AppResult};

/// Issuer claim stamped on every console token.
pub const TOKEN_ISSUER: &str = "vela-issuer";

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    grant_type: GrantType,
    iss: String,
    iat: i64,
    nbf: i64,
    exp: i64,
}

/// Token issuer signing with a shared secret.
#[derive(Clone)]
pub struct JwtTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenIssuer {
    /// Creates an issuer from the signing secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn sign(&self, username: &str, grant_type: GrantType, ttl_seconds: i64) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: username.to_owned(),
            grant_type,
            iss: TOKEN_ISSUER.to_owned(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(ttl_seconds),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|error| AppError::Internal(format!("failed to sign token: {error}")))
    }

    fn verify(&self, token: &str) -> AppResult<TokenClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map_err(
            |error| match error.kind() {
                ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("the token is expired".to_owned())
                }
                ErrorKind::ImmatureSignature => {
                    AppError::Unauthorized("the token is not yet valid".to_owned())
                }
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AppError::Unauthorized("the token is malformed".to_owned()),
                _ => AppError::Unauthorized(format!("the token is invalid: {error}")),
            },
        )?;

        Ok(TokenClaims {
            username: data.claims.sub,
            grant_type: data.claims.grant_type,
            expires_at: data.claims.exp,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use vela_console_application::{GrantType, TokenIssuer};
    use vela_console_core::{AppError, AppResult};

    use super::{JwtTokenIssuer, SessionClaims, TOKEN_ISSUER};

    fn unauthorized_message(result: AppResult<vela_console_application::TokenClaims>) -> String {
        match result {
            Err(AppError::Unauthorized(message)) => message,
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn signed_tokens_verify() -> AppResult<()> {
        let issuer = JwtTokenIssuer::new("secret");
        let token = issuer.sign("admin", GrantType::Refresh, 3600)?;

        let claims = issuer.verify(&token)?;
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.grant_type, GrantType::Refresh);
        assert!(claims.expires_at > Utc::now().timestamp());
        Ok(())
    }

    #[test]
    fn expired_tokens_are_reported() -> AppResult<()> {
        let issuer = JwtTokenIssuer::new("secret");
        let token = issuer.sign("admin", GrantType::Access, -10)?;

        assert!(unauthorized_message(issuer.verify(&token)).contains("expired"));
        Ok(())
    }

    #[test]
    fn future_tokens_are_not_yet_valid() -> AppResult<()> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: "admin".to_owned(),
            grant_type: GrantType::Access,
            iss: TOKEN_ISSUER.to_owned(),
            iat: now,
            nbf: now + 600,
            exp: now + 1200,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .map_err(|error| AppError::Internal(error.to_string()))?;

        let message = unauthorized_message(JwtTokenIssuer::new("secret").verify(&token));
        assert_eq!(message, "the token is not yet valid");
        Ok(())
    }

    #[test]
    fn garbage_is_malformed() {
        let message = unauthorized_message(JwtTokenIssuer::new("secret").verify("not-a-token"));
        assert_eq!(message, "the token is malformed");
    }

    #[test]
    fn foreign_signatures_are_invalid() -> AppResult<()> {
        let token = JwtTokenIssuer::new("other").sign("admin", GrantType::Access, 3600)?;

        let message = unauthorized_message(JwtTokenIssuer::new("secret").verify(&token));
        assert!(message.starts_with("the token is invalid"));
        Ok(())
    }
}
