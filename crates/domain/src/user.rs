//! Console users and installation-wide settings.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vela_console_core::{AppError, AppResult};

use crate::entity::{Entity, IndexBuilder, Timestamps};
use crate::entity_timestamps;

/// Name of the user created on first start.
pub const DEFAULT_ADMIN_USER_NAME: &str = "admin";

/// Platform role granted to the initial admin user.
pub const DEFAULT_ADMIN_ROLE_NAME: &str = "admin";

/// Minimum accepted password length.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Maximum accepted password length.
pub const PASSWORD_MAX_LENGTH: usize = 16;

/// A console user stored locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Login name.
    pub name: String,
    /// Optional email. Once set it cannot change.
    #[serde(default)]
    pub email: String,
    /// Display alias.
    #[serde(default)]
    pub alias: String,
    /// Argon2 PHC password hash.
    #[serde(default)]
    pub password: String,
    /// Disabled users cannot log in.
    #[serde(default)]
    pub disabled: bool,
    /// Time of the last successful login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_time: Option<DateTime<Utc>>,
    /// Platform roles of the user.
    #[serde(default)]
    pub user_roles: Vec<String>,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl User {
    /// Builds a lookup key for a user name.
    #[must_use]
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Entity for User {
    const TABLE_NAME: &'static str = "vela_user";

    fn primary_key(&self) -> String {
        self.name.clone()
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("name", &self.name)
            .field("email", &self.email)
            .build()
    }

    entity_timestamps!();
}

/// How users authenticate against the console.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginType {
    /// Username and password stored in the console.
    #[default]
    Local,
    /// Delegated to an external dex server.
    Dex,
}

impl LoginType {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Dex => "dex",
        }
    }
}

impl FromStr for LoginType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "" | "local" => Ok(Self::Local),
            "dex" => Ok(Self::Dex),
            _ => Err(AppError::Validation(format!(
                "unknown login type '{value}'"
            ))),
        }
    }
}

/// Installation-wide settings, stored as a single record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// Random id generated on first start.
    #[serde(rename = "installID")]
    pub install_id: String,
    /// Whether anonymous usage collection is enabled.
    #[serde(default)]
    pub enable_collection: bool,
    /// Active login type.
    #[serde(default)]
    pub login_type: LoginType,
    /// Public address of the console.
    #[serde(default)]
    pub base_url: String,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Entity for SystemInfo {
    const TABLE_NAME: &'static str = "system_info";

    fn primary_key(&self) -> String {
        self.install_id.clone()
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("installID", &self.install_id)
            .build()
    }

    entity_timestamps!();
}

/// Validates a local account password.
///
/// Passwords must be 8 to 16 characters long and contain at least one letter
/// and one digit.
pub fn validate_password(password: &str) -> AppResult<()> {
    let length = password.chars().count();
    if !(PASSWORD_MIN_LENGTH..=PASSWORD_MAX_LENGTH).contains(&length) {
        return Err(AppError::Validation(format!(
            "password must be between {PASSWORD_MIN_LENGTH} and {PASSWORD_MAX_LENGTH} characters"
        )));
    }

    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(AppError::Validation(
            "password must contain at least one letter and one digit".to_owned(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{LoginType, validate_password};

    #[test]
    fn password_needs_letters_and_digits() {
        assert!(validate_password("password").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("passw0rd").is_ok());
    }

    #[test]
    fn password_length_is_bounded() {
        assert!(validate_password("ab1").is_err());
        assert!(validate_password("abcdefghij1234567").is_err());
    }

    #[test]
    fn empty_login_type_defaults_to_local() {
        assert_eq!(LoginType::from_str("").ok(), Some(LoginType::Local));
        assert!(LoginType::from_str("ldap").is_err());
    }
}
