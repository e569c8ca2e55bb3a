use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, IndexBuilder, JsonObject, Timestamps, compose_key};
use crate::entity_timestamps;

/// Step type deploying with the policies named in `properties.policies`.
pub const DEPLOY_STEP_TYPE: &str = "deploy";

/// Legacy step type deploying one env entry of an env-binding policy.
pub const DEPLOY2ENV_STEP_TYPE: &str = "deploy2env";

/// Step type deploying cloud resources through an env-binding policy.
pub const DEPLOY_CLOUD_RESOURCE_STEP_TYPE: &str = "deploy-cloud-resource";

/// Workload type of terraform-backed component definitions.
pub const TERRAFORM_WORKLOAD_TYPE: &str = "configurations.terraform.core.oam.dev";

/// Workload kind of terraform-backed component definitions.
pub const TERRAFORM_WORKLOAD_KIND: &str = "Configuration";

/// Returns the name of the workflow generated for an environment.
#[must_use]
pub fn env_workflow_name(env_name: &str) -> String {
    format!("workflow-{env_name}")
}

/// One step of a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Step name, unique within the workflow.
    pub name: String,
    /// Display alias.
    #[serde(default)]
    pub alias: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Step definition name.
    #[serde(rename = "type")]
    pub step_type: String,
    /// Steps that must finish first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Step parameters.
    #[serde(default)]
    pub properties: JsonObject,
}

impl WorkflowStep {
    /// Returns a string property, or an empty string.
    #[must_use]
    pub fn property_str(&self, key: &str) -> &str {
        self.properties
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
    }

    /// Returns the policy names of a `deploy` step.
    #[must_use]
    pub fn deploy_policies(&self) -> Vec<String> {
        self.properties
            .get("policies")
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// An ordered list of steps executed on deploy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Owning application.
    pub app_primary_key: String,
    /// Workflow name, unique within the application.
    pub name: String,
    /// Display alias.
    #[serde(default)]
    pub alias: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Whether the workflow is enabled.
    #[serde(default)]
    pub enable: bool,
    /// Whether this is the application's default workflow. Unset on query
    /// templates.
    #[serde(default)]
    pub default: Option<bool>,
    /// Environment the workflow deploys to.
    #[serde(default)]
    pub env_name: String,
    /// Ordered steps.
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Workflow {
    /// Builds a lookup key for a workflow.
    #[must_use]
    pub fn key(app_primary_key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_primary_key: app_primary_key.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Entity for Workflow {
    const TABLE_NAME: &'static str = "vela_workflow";

    fn primary_key(&self) -> String {
        compose_key(&[&self.app_primary_key, &self.name])
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("appPrimaryKey", &self.app_primary_key)
            .field("name", &self.name)
            .field("envName", &self.env_name)
            .flag("default", self.default)
            .build()
    }

    entity_timestamps!();
}

/// One execution of a workflow, created for each deploy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRecord {
    /// Owning application.
    pub app_primary_key: String,
    /// Executed workflow.
    pub workflow_name: String,
    /// Record name, the publish version of the deploy.
    pub name: String,
    /// Namespace of the rendered Application.
    #[serde(default)]
    pub namespace: String,
    /// Revision that started the execution.
    #[serde(default)]
    pub revision_primary_key: String,
    /// Execution status.
    #[serde(default)]
    pub status: String,
    /// Whether the execution ended.
    #[serde(default)]
    pub finished: bool,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Entity for WorkflowRecord {
    const TABLE_NAME: &'static str = "vela_workflow_record";

    fn primary_key(&self) -> String {
        compose_key(&[&self.app_primary_key, &self.workflow_name, &self.name])
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("appPrimaryKey", &self.app_primary_key)
            .field("workflowName", &self.workflow_name)
            .field("name", &self.name)
            .field("revisionPrimaryKey", &self.revision_primary_key)
            .field("status", &self.status)
            .build()
    }

    entity_timestamps!();
}
