//! Wire shape of the `core.oam.dev/v1beta1` Application resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::JsonObject;

/// API version of rendered Application resources.
pub const APPLICATION_API_VERSION: &str = "core.oam.dev/v1beta1";

/// Kind of rendered Application resources.
pub const APPLICATION_KIND: &str = "Application";

/// Label carrying the console application name.
pub const LABEL_APP_NAME: &str = "app.oam.dev/name";

/// Label marking resources whose source of truth is the console.
pub const LABEL_SOURCE_OF_TRUTH: &str = "app.oam.dev/source-of-truth";

/// Value of [`LABEL_SOURCE_OF_TRUTH`] for console-managed resources.
pub const SOURCE_OF_TRUTH_FROM_UX: &str = "from-velaux";

/// Annotation carrying the deploy version.
pub const ANNOTATION_DEPLOY_VERSION: &str = "app.oam.dev/deployVersion";

/// Annotation carrying the publish version of the workflow execution.
pub const ANNOTATION_PUBLISH_VERSION: &str = "app.oam.dev/publishVersion";

/// Annotation carrying the workflow name.
pub const ANNOTATION_WORKFLOW_NAME: &str = "app.oam.dev/workflowName";

/// Annotation carrying the application alias.
pub const ANNOTATION_APP_ALIAS: &str = "app.oam.dev/appAlias";

/// Object metadata of a rendered resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name.
    pub name: String,
    /// Resource namespace.
    pub namespace: String,
    /// Labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// A trait of a rendered component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppTrait {
    /// Trait type.
    #[serde(rename = "type")]
    pub trait_type: String,
    /// Trait parameters.
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub properties: JsonObject,
}

/// A rendered component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppComponent {
    /// Component name.
    pub name: String,
    /// Component type.
    #[serde(rename = "type")]
    pub component_type: String,
    /// Component parameters.
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub properties: JsonObject,
    /// Component traits.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<AppTrait>,
    /// Components that must be ready first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// A rendered policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppPolicy {
    /// Policy name.
    pub name: String,
    /// Policy type.
    #[serde(rename = "type")]
    pub policy_type: String,
    /// Policy parameters.
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub properties: JsonObject,
}

/// A rendered workflow step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppWorkflowStep {
    /// Step name.
    pub name: String,
    /// Step type.
    #[serde(rename = "type")]
    pub step_type: String,
    /// Step parameters.
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub properties: JsonObject,
    /// Steps that must finish first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// A rendered workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppWorkflow {
    /// Ordered steps.
    #[serde(default)]
    pub steps: Vec<AppWorkflowStep>,
}

/// Spec of a rendered Application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSpec {
    /// Components.
    #[serde(default)]
    pub components: Vec<AppComponent>,
    /// Policies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<AppPolicy>,
    /// Workflow, when the application has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<AppWorkflow>,
}

/// A rendered `Application` custom resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationManifest {
    /// Always [`APPLICATION_API_VERSION`].
    pub api_version: String,
    /// Always [`APPLICATION_KIND`].
    pub kind: String,
    /// Object metadata.
    pub metadata: ObjectMeta,
    /// Application spec.
    pub spec: ApplicationSpec,
    /// Status reported by the controller. Never written by the console.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
}

/// The parts of the Application status the console reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStatus {
    /// Lifecycle phase, `running` once every component is healthy.
    #[serde(default)]
    pub status: String,
}

impl ApplicationManifest {
    /// Creates an empty manifest with the given metadata.
    #[must_use]
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            api_version: APPLICATION_API_VERSION.to_owned(),
            kind: APPLICATION_KIND.to_owned(),
            metadata,
            spec: ApplicationSpec::default(),
            status: None,
        }
    }

    /// Returns the phase reported by the controller, if any.
    #[must_use]
    pub fn phase(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|status| status.status.as_str())
            .filter(|phase| !phase.is_empty())
    }

    /// Returns a label value.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.labels.get(key).map(String::as_str)
    }

    /// Returns an annotation value.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }
}
