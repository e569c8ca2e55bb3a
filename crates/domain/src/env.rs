use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, IndexBuilder, Timestamps, compose_key};
use crate::entity_timestamps;

/// Environment created on first start.
pub const DEFAULT_ENV_NAME: &str = "default";

/// Namespace label naming the project that owns an environment namespace.
pub const LABEL_NAMESPACE_OF_PROJECT: &str = "namespace.oam.dev/project";

/// Namespace label naming the environment bound to a namespace.
pub const LABEL_NAMESPACE_OF_ENV: &str = "namespace.oam.dev/env";

/// Namespace label marking namespaces managed by the console.
pub const LABEL_CONTROL_PLANE_NAMESPACE_USAGE: &str = "usage.oam.dev/control-plane";

/// An environment: a named group of delivery targets inside a project.
///
/// The environment namespace on the control plane hosts the Application
/// resources rendered for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Env {
    /// Unique environment name.
    pub name: String,
    /// Display alias.
    #[serde(default)]
    pub alias: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Control-plane namespace of the environment.
    #[serde(default)]
    pub namespace: String,
    /// Owning project.
    #[serde(default)]
    pub project: String,
    /// Delivery target names, in deployment order.
    #[serde(default)]
    pub targets: Vec<String>,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Env {
    /// Builds a lookup key for an environment name.
    #[must_use]
    pub fn key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Entity for Env {
    const TABLE_NAME: &'static str = "vela_env";

    fn primary_key(&self) -> String {
        self.name.clone()
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("project", &self.project)
            .build()
    }

    entity_timestamps!();
}

/// Binding of an application to an environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvBinding {
    /// Application name.
    pub app_primary_key: String,
    /// Environment name.
    pub name: String,
    /// Creation and update times.
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl EnvBinding {
    /// Builds a lookup key for a binding.
    #[must_use]
    pub fn key(app_primary_key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_primary_key: app_primary_key.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Entity for EnvBinding {
    const TABLE_NAME: &'static str = "vela_envbinding";

    fn primary_key(&self) -> String {
        compose_key(&[&self.app_primary_key, &self.name])
    }

    fn index(&self) -> BTreeMap<String, String> {
        IndexBuilder::new()
            .field("appPrimaryKey", &self.app_primary_key)
            .field("name", &self.name)
            .build()
    }

    entity_timestamps!();
}
