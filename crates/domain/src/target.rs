use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, IndexBuilder, JsonObject, Timestamps};
use crate::entity_timestamps;

/// Cluster reachable in every installation.
pub const LOCAL_CLUSTER_NAME: &str = "local";

/// Target created on first start.
pub const DEFAULT_TARGET_NAME: &str = "default";

/// Namespace label naming the delivery target that owns a namespace.
pub const LABEL_NAMESPACE_OF_TARGET: &str = "namespace.oam.dev/target";

/// Cluster and namespace a delivery target deploys into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTarget {
    /// Cluster name.
    pub cluster_name: String,
    /// Namespace inside the cluster.
    pub namespace: String,
}

/// A delivery target: one namespace of one cluster, owned by a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Unique target name.
    pub name: String,
    /// Display alias.
    #[serde(default)]
    pub alias: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Owning project.
    #[serde(default)]
    pub project: String,
    /// Deployment location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterTarget>,
    /// Variables used when rendering cloud resources, such as `region`.
    #[serde(default)]
    pub variable: JsonObject,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Target {
    /// Builds a lookup key for a target name.
    #[must_use]
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns a string variable, if set.
    #[must_use]
    pub fn variable_str(&self, key: &str) -> Option<&str> {
        self.variable
            .get(key)
            .and_then(serde_json::Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

impl Entity for Target {
    const TABLE_NAME: &'static str = "vela_target";

    fn primary_key(&self) -> String {
        self.name.clone()
    }

    fn index(&self) -> BTreeMap<String, String> {
        let cluster = self.cluster.clone().unwrap_or_default();
        IndexBuilder::new()
            .field("name", &self.name)
            .field("project", &self.project)
            .field("clusterName", &cluster.cluster_name)
            .field("namespace", &cluster.namespace)
            .build()
    }

    entity_timestamps!();
}
