use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vela_console_core::AppError;

use crate::entity::{Entity, IndexBuilder, Timestamps, compose_key};
use crate::entity_timestamps;

/// A named set of permissions, either platform-wide or scoped to a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Role name, unique within its scope.
    pub name: String,
    /// Display alias.
    #[serde(default)]
    pub alias: String,
    /// Owning project. Empty for platform roles.
    #[serde(default)]
    pub project: String,
    /// Permission names granted by the role.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Role {
    /// Builds a lookup key for a role.
    #[must_use]
    pub fn key(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project: project.into(),
            ..Self::default()
        }
    }
}

impl Entity for Role {
    const TABLE_NAME: &'static str = "vela_role";

    fn primary_key(&self) -> String {
        compose_key(&[&self.project, &self.name])
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("name", &self.name)
            .field("project", &self.project)
            .build()
    }

    entity_timestamps!();
}

/// Whether a matching permission grants or refuses the request.
///
/// Stored effects are read case-insensitively and an empty effect means allow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum PermissionEffect {
    /// Grants the request.
    #[default]
    Allow,
    /// Refuses the request, overriding any allow.
    Deny,
}

impl PermissionEffect {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl FromStr for PermissionEffect {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() || value.eq_ignore_ascii_case("allow") {
            return Ok(Self::Allow);
        }
        if value.eq_ignore_ascii_case("deny") {
            return Ok(Self::Deny);
        }

        Err(AppError::Validation(format!(
            "unknown permission effect '{value}'"
        )))
    }
}

impl TryFrom<String> for PermissionEffect {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

/// A policy statement granting or refusing actions on resource patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    /// Permission name, unique within its scope.
    pub name: String,
    /// Display alias.
    #[serde(default)]
    pub alias: String,
    /// Owning project. Empty for platform permissions.
    #[serde(default)]
    pub project: String,
    /// Resource name patterns, see [`crate::ResourceName`].
    #[serde(default)]
    pub resources: Vec<String>,
    /// Allowed actions. `*` covers every action.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Effect applied when the permission matches.
    #[serde(default)]
    pub effect: PermissionEffect,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Permission {
    /// Builds a lookup key for a permission.
    #[must_use]
    pub fn key(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project: project.into(),
            ..Self::default()
        }
    }

    /// Builds an allow permission from static resource and action lists.
    #[must_use]
    pub fn allow(
        project: impl Into<String>,
        name: impl Into<String>,
        alias: impl Into<String>,
        resources: &[&str],
        actions: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            project: project.into(),
            resources: resources.iter().map(|value| (*value).to_owned()).collect(),
            actions: actions.iter().map(|value| (*value).to_owned()).collect(),
            effect: PermissionEffect::Allow,
            timestamps: Timestamps::default(),
        }
    }
}

impl Entity for Permission {
    const TABLE_NAME: &'static str = "vela_permission";

    fn primary_key(&self) -> String {
        compose_key(&[&self.project, &self.name])
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("name", &self.name)
            .field("project", &self.project)
            .build()
    }

    entity_timestamps!();
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::Entity;

    use super::{Permission, PermissionEffect, Role};

    #[test]
    fn effect_parsing_is_case_insensitive() {
        assert_eq!(PermissionEffect::from_str("").ok(), Some(PermissionEffect::Allow));
        assert_eq!(PermissionEffect::from_str("DENY").ok(), Some(PermissionEffect::Deny));
        assert!(PermissionEffect::from_str("maybe").is_err());
    }

    #[test]
    fn stored_effects_decode_in_any_case() -> Result<(), serde_json::Error> {
        assert_eq!(
            serde_json::from_str::<PermissionEffect>("\"Allow\"")?,
            PermissionEffect::Allow
        );
        assert_eq!(
            serde_json::from_str::<PermissionEffect>("\"\"")?,
            PermissionEffect::Allow
        );
        assert_eq!(
            serde_json::from_str::<PermissionEffect>("\"DENY\"")?,
            PermissionEffect::Deny
        );
        assert!(serde_json::from_str::<PermissionEffect>("\"maybe\"").is_err());
        assert_eq!(serde_json::to_string(&PermissionEffect::Deny)?, "\"deny\"");

        let permission: Permission = serde_json::from_str(
            r#"{"name":"app-view","resources":["project:*/application:*"],"actions":["detail"],"effect":"Allow"}"#,
        )?;
        assert_eq!(permission.effect, PermissionEffect::Allow);
        Ok(())
    }

    #[test]
    fn platform_role_key_has_no_project_prefix() {
        assert_eq!(Role::key("", "admin").primary_key(), "admin");
        assert_eq!(Role::key("team", "project-admin").primary_key(), "team-project-admin");
    }
}
