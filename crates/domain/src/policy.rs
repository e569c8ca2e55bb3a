//! Typed views over the properties of the built-in placement policies.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::entity::JsonObject;

/// Policy type placing resources on clusters and a namespace.
pub const TOPOLOGY_POLICY_TYPE: &str = "topology";

/// Policy type patching components per environment.
pub const ENV_BINDING_POLICY_TYPE: &str = "env-binding";

/// Name prefix of generated env-binding policies.
pub const ENV_BINDING_POLICY_DEFAULT_NAME: &str = "env-bindings";

/// Properties of a `topology` policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyPolicySpec {
    /// Cluster names.
    #[serde(default)]
    pub clusters: Vec<String>,
    /// Namespace used on every cluster.
    #[serde(default)]
    pub namespace: String,
}

/// Selects a cluster by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSelector {
    /// Cluster name.
    #[serde(default)]
    pub name: String,
}

/// Selects a namespace by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSelector {
    /// Namespace name.
    #[serde(default)]
    pub name: String,
}

/// Where one environment of an env-binding policy deploys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvPlacement {
    /// Target cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_selector: Option<ClusterSelector>,
    /// Target namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<NamespaceSelector>,
}

/// Per-environment override of one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvComponentPatch {
    /// Component name.
    pub name: String,
    /// Component type.
    #[serde(rename = "type")]
    pub component_type: String,
    /// Properties merged into the component.
    #[serde(default)]
    pub properties: JsonObject,
}

/// Patches applied for one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvPatch {
    /// Component patches.
    #[serde(default)]
    pub components: Vec<EnvComponentPatch>,
}

/// One environment of an env-binding policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Environment entry name. Generated policies use the target name.
    pub name: String,
    /// Deployment location.
    #[serde(default)]
    pub placement: EnvPlacement,
    /// Component overrides.
    #[serde(default)]
    pub patch: EnvPatch,
}

/// Properties of an `env-binding` policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvBindingSpec {
    /// Environment entries.
    #[serde(default)]
    pub envs: Vec<EnvConfig>,
}

impl EnvConfig {
    /// Returns the `cluster/namespace` pair this entry deploys to.
    #[must_use]
    pub fn placement_target(&self) -> String {
        let cluster = self
            .placement
            .cluster_selector
            .as_ref()
            .map(|selector| selector.name.as_str())
            .unwrap_or_default();
        let namespace = self
            .placement
            .namespace_selector
            .as_ref()
            .map(|selector| selector.name.as_str())
            .unwrap_or_default();
        format!("{cluster}/{namespace}")
    }
}

/// Decodes a typed view from a properties object.
pub fn decode_properties<T: DeserializeOwned>(properties: &JsonObject) -> serde_json::Result<T> {
    serde_json::from_value(serde_json::Value::Object(properties.clone()))
}

/// Encodes a typed value into a properties object.
pub fn encode_properties<T: Serialize>(value: &T) -> serde_json::Result<JsonObject> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(object) => Ok(object),
        _ => Ok(JsonObject::new()),
    }
}
