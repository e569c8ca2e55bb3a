//! Applications and the parts they are assembled from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, IndexBuilder, JsonObject, Timestamps, compose_key};
use crate::entity_timestamps;

/// Component type that receives a default `scaler` trait.
pub const WEBSERVICE_COMPONENT_TYPE: &str = "webservice";

/// Trait added to webservice components unless one is given.
pub const SCALER_TRAIT_TYPE: &str = "scaler";

/// An application managed through the console.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Unique application name.
    pub name: String,
    /// Display alias.
    #[serde(default)]
    pub alias: String,
    /// Owning project.
    #[serde(default)]
    pub project: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Icon URL.
    #[serde(default)]
    pub icon: String,
    /// User labels copied onto the rendered resource.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Application {
    /// Builds a lookup key for an application name.
    #[must_use]
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Entity for Application {
    const TABLE_NAME: &'static str = "vela_application";

    fn primary_key(&self) -> String {
        self.name.clone()
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("name", &self.name)
            .field("project", &self.project)
            .build()
    }

    entity_timestamps!();
}

/// A trait attached to a component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationTrait {
    /// Trait definition name, unique per component.
    #[serde(rename = "type")]
    pub trait_type: String,
    /// Display alias.
    #[serde(default)]
    pub alias: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Trait parameters.
    #[serde(default)]
    pub properties: JsonObject,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

/// A component of an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationComponent {
    /// Owning application.
    pub app_primary_key: String,
    /// Component name, unique within the application.
    pub name: String,
    /// Display alias.
    #[serde(default)]
    pub alias: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Component definition name.
    #[serde(default, rename = "type")]
    pub component_type: String,
    /// The main component is created with the application and cannot be
    /// deleted on its own.
    #[serde(default)]
    pub main: bool,
    /// Component parameters.
    #[serde(default)]
    pub properties: JsonObject,
    /// Attached traits.
    #[serde(default)]
    pub traits: Vec<ApplicationTrait>,
    /// Components that must be ready first.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// User that created the component.
    #[serde(default)]
    pub creator: String,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl ApplicationComponent {
    /// Builds a lookup key for a component.
    #[must_use]
    pub fn key(app_primary_key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_primary_key: app_primary_key.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Entity for ApplicationComponent {
    const TABLE_NAME: &'static str = "vela_application_component";

    fn primary_key(&self) -> String {
        compose_key(&[&self.app_primary_key, &self.name])
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("appPrimaryKey", &self.app_primary_key)
            .field("name", &self.name)
            .field("type", &self.component_type)
            .build()
    }

    entity_timestamps!();
}

/// A policy of an application.
///
/// Policies generated for an environment workflow carry the environment name.
/// Policies without one apply to every deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPolicy {
    /// Owning application.
    pub app_primary_key: String,
    /// Policy name, unique within the application.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Policy definition name.
    #[serde(default, rename = "type")]
    pub policy_type: String,
    /// User or process that created the policy.
    #[serde(default)]
    pub creator: String,
    /// Policy parameters.
    #[serde(default)]
    pub properties: JsonObject,
    /// Environment the policy was generated for.
    #[serde(default)]
    pub env_name: String,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl ApplicationPolicy {
    /// Builds a lookup key for a policy.
    #[must_use]
    pub fn key(app_primary_key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_primary_key: app_primary_key.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Entity for ApplicationPolicy {
    const TABLE_NAME: &'static str = "vela_application_policy";

    fn primary_key(&self) -> String {
        compose_key(&[&self.app_primary_key, &self.name])
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("appPrimaryKey", &self.app_primary_key)
            .field("name", &self.name)
            .field("type", &self.policy_type)
            .field("envName", &self.env_name)
            .build()
    }

    entity_timestamps!();
}

/// Lifecycle of a deployment revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionStatus {
    /// Recorded but not applied yet.
    #[default]
    Init,
    /// Applied and running its workflow.
    Running,
    /// Workflow finished.
    Complete,
    /// Apply or workflow failed.
    Failure,
    /// Workflow was stopped.
    Terminated,
    /// Rolled back to an earlier revision.
    Rollback,
}

impl RevisionStatus {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failure => "failure",
            Self::Terminated => "terminated",
            Self::Rollback => "rollback",
        }
    }

    /// Returns whether a new deployment may follow this one.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Complete | Self::Terminated)
    }
}

/// A recorded deployment of an application to one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRevision {
    /// Owning application.
    pub app_primary_key: String,
    /// Revision version, derived from the deploy time.
    pub version: String,
    /// Version restored when this revision is a rollback.
    #[serde(default)]
    pub rollback_version: String,
    /// Current status.
    #[serde(default)]
    pub status: Option<RevisionStatus>,
    /// Failure reason.
    #[serde(default)]
    pub reason: String,
    /// User that triggered the deploy.
    #[serde(default)]
    pub deploy_user: String,
    /// Free-form note.
    #[serde(default)]
    pub note: String,
    /// How the deploy was triggered, such as `web` or `api`.
    #[serde(default)]
    pub trigger_type: String,
    /// Workflow used for the deploy.
    #[serde(default)]
    pub workflow_name: String,
    /// Target environment.
    #[serde(default)]
    pub env_name: String,
    /// Rendered Application resource as JSON.
    #[serde(default)]
    pub apply_app_config: String,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl ApplicationRevision {
    /// Builds a lookup key for a revision.
    #[must_use]
    pub fn key(app_primary_key: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            app_primary_key: app_primary_key.into(),
            version: version.into(),
            ..Self::default()
        }
    }
}

impl Entity for ApplicationRevision {
    const TABLE_NAME: &'static str = "vela_application_revision";

    fn primary_key(&self) -> String {
        compose_key(&[&self.app_primary_key, &self.version])
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("appPrimaryKey", &self.app_primary_key)
            .field("version", &self.version)
            .field(
                "status",
                self.status.as_ref().map(RevisionStatus::as_str).unwrap_or_default(),
            )
            .field("envName", &self.env_name)
            .field("workflowName", &self.workflow_name)
            .build()
    }

    entity_timestamps!();
}
