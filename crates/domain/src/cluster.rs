use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, IndexBuilder, Timestamps};
use crate::entity_timestamps;

/// Status of a cluster the console can reach.
pub const CLUSTER_STATUS_HEALTHY: &str = "Healthy";

/// Status of a cluster the console cannot reach.
pub const CLUSTER_STATUS_UNHEALTHY: &str = "Unhealthy";

/// Secret holding the kubeconfig of a registered cluster.
#[must_use]
pub fn cluster_credential_secret_name(cluster: &str) -> String {
    format!("cluster-credential-{cluster}")
}

/// A registered Kubernetes cluster.
///
/// The kubeconfig itself is stored in a Secret, never in the datastore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Unique cluster name.
    pub name: String,
    /// Display alias.
    #[serde(default)]
    pub alias: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Icon URL.
    #[serde(default)]
    pub icon: String,
    /// User labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Last observed status.
    #[serde(default)]
    pub status: String,
    /// Why the cluster is unhealthy.
    #[serde(default)]
    pub reason: String,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Cluster {
    /// Builds a lookup key for a cluster name.
    #[must_use]
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Entity for Cluster {
    const TABLE_NAME: &'static str = "vela_cluster";

    fn primary_key(&self) -> String {
        self.name.clone()
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("name", &self.name)
            .field("status", &self.status)
            .build()
    }

    entity_timestamps!();
}
