use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, IndexBuilder, Timestamps, compose_key};
use crate::entity_timestamps;

/// Project created on first start.
pub const DEFAULT_PROJECT_NAME: &str = "default";

/// Project role holding every project permission.
pub const PROJECT_ADMIN_ROLE_NAME: &str = "project-admin";

/// Project role holding read permissions.
pub const PROJECT_VIEWER_ROLE_NAME: &str = "project-viewer";

/// A project groups applications, environments and delivery targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique project name.
    pub name: String,
    /// Display alias.
    #[serde(default)]
    pub alias: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Owner user name.
    #[serde(default)]
    pub owner: String,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Project {
    /// Builds a lookup key for a project name.
    #[must_use]
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Entity for Project {
    const TABLE_NAME: &'static str = "vela_project";

    fn primary_key(&self) -> String {
        self.name.clone()
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("name", &self.name)
            .field("owner", &self.owner)
            .build()
    }

    entity_timestamps!();
}

/// Membership of a user in a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUser {
    /// Member user name.
    pub username: String,
    /// Project name.
    pub project_name: String,
    /// Project roles granted to the member.
    #[serde(default)]
    pub user_roles: Vec<String>,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl ProjectUser {
    /// Builds a lookup key for a membership.
    #[must_use]
    pub fn key(project_name: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            project_name: project_name.into(),
            ..Self::default()
        }
    }
}

impl Entity for ProjectUser {
    const TABLE_NAME: &'static str = "vela_project_user";

    fn primary_key(&self) -> String {
        compose_key(&[&self.project_name, &self.username])
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("username", &self.username)
            .field("projectName", &self.project_name)
            .build()
    }

    entity_timestamps!();
}
