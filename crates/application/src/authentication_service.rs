//! Login and session token handling.

use std::sync::Arc;

use tracing::{info, warn};
use vela_console_core::{AppError, AppResult, UserIdentity};
use vela_console_domain::LoginType;

use crate::security_ports::{GrantType, PasswordHasher, TokenClaims, TokenIssuer};
use crate::system_info_service::SystemInfoService;
use crate::user_service::{UserBase, UserService};

/// Lifetime of an access token in seconds.
pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 3600;

/// Lifetime of a refresh token in seconds.
pub const REFRESH_TOKEN_TTL_SECONDS: i64 = 86_400;

/// Local login credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginInput {
    /// Login name.
    pub username: String,
    /// Plaintext password.
    pub password: String,
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    /// The logged-in user.
    pub user: UserBase,
    /// Short-lived token for API requests.
    pub access_token: String,
    /// Long-lived token for renewing the access token.
    pub refresh_token: String,
}

/// Tokens returned by a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    /// New access token.
    pub access_token: String,
    /// The refresh token that was presented.
    pub refresh_token: String,
}

/// Application service for logins and tokens.
#[derive(Clone)]
pub struct AuthenticationService {
    password_hasher: Arc<dyn PasswordHasher>,
    token_issuer: Arc<dyn TokenIssuer>,
    system_info_service: SystemInfoService,
    user_service: UserService,
}

impl AuthenticationService {
    /// Creates a new authentication service.
    #[must_use]
    pub fn new(
        password_hasher: Arc<dyn PasswordHasher>,
        token_issuer: Arc<dyn TokenIssuer>,
        system_info_service: SystemInfoService,
        user_service: UserService,
    ) -> Self {
        Self {
            password_hasher,
            token_issuer,
            system_info_service,
            user_service,
        }
    }

    /// Logs a user in with local credentials and issues a token pair.
    ///
    /// Unknown users, wrong passwords and disabled accounts are all
    /// `Unauthorized`.
    pub async fn login(&self, input: LoginInput) -> AppResult<LoginOutcome> {
        if self.system_info_service.login_type().await? == LoginType::Dex {
            return Err(AppError::Validation(
                "dex login is unsupported by this console".to_owned(),
            ));
        }
        if input.username.is_empty() || input.password.is_empty() {
            return Err(AppError::Validation(
                "the username and password are required".to_owned(),
            ));
        }

        let user = match self.user_service.get_user(&input.username).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                warn!(user = %input.username, "login with an unknown user name");
                return Err(AppError::Unauthorized("the username is not exist".to_owned()));
            }
            Err(error) => return Err(error),
        };
        if !self
            .password_hasher
            .verify_password(&input.password, &user.password)?
        {
            warn!(user = %user.name, "login with a wrong password");
            return Err(AppError::Unauthorized(
                "the username and password do not match".to_owned(),
            ));
        }
        if user.disabled {
            return Err(AppError::Unauthorized("the user is disabled".to_owned()));
        }

        let user = self.user_service.update_login_time(user).await?;
        let access_token =
            self.token_issuer
                .sign(&user.name, GrantType::Access, ACCESS_TOKEN_TTL_SECONDS)?;
        let refresh_token =
            self.token_issuer
                .sign(&user.name, GrantType::Refresh, REFRESH_TOKEN_TTL_SECONDS)?;

        info!(user = %user.name, "user logged in");
        Ok(LoginOutcome {
            user: UserBase::from(&user),
            access_token,
            refresh_token,
        })
    }

    /// Exchanges a refresh token for a new access token.
    pub fn refresh_token(&self, refresh_token: &str) -> AppResult<RefreshedTokens> {
        let claims = self.parse_token(refresh_token).map_err(|error| match error {
            AppError::Unauthorized(message) if message.contains("expired") => {
                AppError::Unauthorized("the refresh token is expired".to_owned())
            }
            other => other,
        })?;
        if claims.grant_type != GrantType::Refresh {
            return Err(AppError::Unauthorized(
                "the token is not a refresh token".to_owned(),
            ));
        }

        let access_token =
            self.token_issuer
                .sign(&claims.username, GrantType::Access, ACCESS_TOKEN_TTL_SECONDS)?;
        Ok(RefreshedTokens {
            access_token,
            refresh_token: refresh_token.to_owned(),
        })
    }

    /// Verifies a token and returns its claims.
    pub fn parse_token(&self, token: &str) -> AppResult<TokenClaims> {
        self.token_issuer.verify(token)
    }

    /// Resolves an access token to the acting user.
    pub async fn authenticate(&self, access_token: &str) -> AppResult<UserIdentity> {
        let claims = self.parse_token(access_token)?;
        if claims.grant_type != GrantType::Access {
            return Err(AppError::Unauthorized(
                "the token is not an access token".to_owned(),
            ));
        }

        let user = self
            .user_service
            .get_user(&claims.username)
            .await
            .map_err(|_| AppError::Unauthorized("the token user is not exist".to_owned()))?;
        if user.disabled {
            return Err(AppError::Unauthorized("the user is disabled".to_owned()));
        }

        let email = (!user.email.is_empty()).then(|| user.email.clone());
        Ok(UserIdentity::new(user.name, user.alias, email))
    }

    /// Returns the active login type.
    pub async fn get_login_type(&self) -> AppResult<LoginType> {
        self.system_info_service.login_type().await
    }
}
