//! Addon registries, addon catalog entries and Helm chart repositories.
//!
//! Registries and Helm repositories are not datastore entities. They live in
//! ConfigMaps of the system namespace, with credentials split out into
//! Secrets so the ConfigMaps never carry tokens or passwords.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::oam::AppComponent;

/// ConfigMap holding every addon registry under [`ADDON_REGISTRIES_KEY`].
pub const ADDON_REGISTRY_CONFIG_MAP: &str = "vela-addon-registry";

/// Data key of the registry ConfigMap.
pub const ADDON_REGISTRIES_KEY: &str = "registries";

/// Data key of an addon catalog ConfigMap.
pub const ADDON_CATALOG_KEY: &str = "addons";

/// Label naming the addon an Application CR installs.
pub const LABEL_ADDON_NAME: &str = "addons.oam.dev/name";

/// Label naming the registry an addon was enabled from.
pub const LABEL_ADDON_REGISTRY: &str = "addons.oam.dev/registry";

/// Annotation carrying the enabled addon version.
pub const ANNOTATION_ADDON_VERSION: &str = "addons.oam.dev/version";

/// Config type of the ConfigMaps describing a Helm repository.
pub const HELM_REPOSITORY_CONFIG_TYPE: &str = "helm-repository";

/// Name of the Application CR installing an addon.
#[must_use]
pub fn addon_app_name(addon: &str) -> String {
    format!("addon-{addon}")
}

/// Name of the Secret holding the arguments an addon was enabled with.
#[must_use]
pub fn addon_secret_name(addon: &str) -> String {
    format!("addon-secret-{addon}")
}

/// Name of the Secret holding the token of a registry.
#[must_use]
pub fn registry_token_secret_name(registry: &str) -> String {
    format!("addon-registry-{registry}")
}

/// Name of the ConfigMap mirroring the addon catalog of a registry.
#[must_use]
pub fn addon_catalog_config_map(registry: &str) -> String {
    format!("addon-catalog-{registry}")
}

/// Name of the ConfigMap describing a Helm repository.
#[must_use]
pub fn helm_repository_config_map(name: &str) -> String {
    format!("helm-repo-{name}")
}

/// Git hosted addon source. Gitee and GitLab sources share this shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitAddonSource {
    /// Repository URL.
    pub url: String,
    /// Directory of the addons inside the repository.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Inline token. Moved into a Secret when the registry is saved.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    /// Secret holding the token.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_secret_ref: String,
}

/// Object-storage addon source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OssAddonSource {
    /// Storage endpoint.
    pub end_point: String,
    /// Bucket name, empty for a bucket-less endpoint.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket: String,
    /// Directory of the addons inside the bucket.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// Helm repository addon source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmAddonSource {
    /// Chart repository URL.
    pub url: String,
}

/// A named addon registry and its source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonRegistry {
    /// Unique registry name.
    pub name: String,
    /// Git source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitAddonSource>,
    /// Gitee source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitee: Option<GitAddonSource>,
    /// GitLab source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitlab: Option<GitAddonSource>,
    /// Object-storage source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oss: Option<OssAddonSource>,
    /// Helm source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm: Option<HelmAddonSource>,
}

impl AddonRegistry {
    /// Returns the git-like source that can carry a token.
    #[must_use]
    pub fn token_source(&self) -> Option<&GitAddonSource> {
        self.git
            .as_ref()
            .or(self.gitee.as_ref())
            .or(self.gitlab.as_ref())
    }

    /// Returns the git-like source that can carry a token, for mutation.
    pub fn token_source_mut(&mut self) -> Option<&mut GitAddonSource> {
        if self.git.is_some() {
            return self.git.as_mut();
        }
        if self.gitee.is_some() {
            return self.gitee.as_mut();
        }
        self.gitlab.as_mut()
    }

    /// Returns whether exactly one source is configured.
    #[must_use]
    pub fn has_single_source(&self) -> bool {
        [
            self.git.is_some(),
            self.gitee.is_some(),
            self.gitlab.is_some(),
            self.oss.is_some(),
            self.helm.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
            == 1
    }
}

/// One addon as published by a registry catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonMeta {
    /// Addon name.
    pub name: String,
    /// Published version.
    #[serde(default)]
    pub version: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Icon URL.
    #[serde(default)]
    pub icon: String,
    /// Search tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Addons that must be enabled first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Hidden from listings, still enable-able as a dependency.
    #[serde(default)]
    pub invisible: bool,
    /// Resources the addon application installs.
    #[serde(default)]
    pub components: Vec<AppComponent>,
    /// Registry that published the addon. Filled when the catalog is read.
    #[serde(default)]
    pub registry_name: String,
}

/// Installation phase of an addon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddonPhase {
    /// No addon application exists.
    Disabled,
    /// The addon application exists and is not running yet.
    Enabling,
    /// The addon application is running.
    Enabled,
}

impl AddonPhase {
    /// Maps the phase of the addon application to an addon phase.
    #[must_use]
    pub fn from_app_phase(phase: Option<&str>) -> Self {
        match phase {
            Some("running") => Self::Enabled,
            _ => Self::Enabling,
        }
    }

    /// Returns the wire name of the phase.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Enabling => "enabling",
            Self::Enabled => "enabled",
        }
    }
}

impl Display for AddonPhase {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A registered Helm chart repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmRepository {
    /// Unique repository name.
    pub name: String,
    /// Repository URL.
    pub url: String,
    /// Owning project, empty for a platform repository.
    #[serde(default)]
    pub project: String,
    /// Basic-auth user name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::{AddonPhase, AddonRegistry, GitAddonSource, HelmAddonSource};

    #[test]
    fn app_phase_maps_to_addon_phase() {
        assert_eq!(AddonPhase::from_app_phase(Some("running")), AddonPhase::Enabled);
        assert_eq!(
            AddonPhase::from_app_phase(Some("runningWorkflow")),
            AddonPhase::Enabling
        );
        assert_eq!(AddonPhase::from_app_phase(None), AddonPhase::Enabling);
    }

    #[test]
    fn registries_need_exactly_one_source() {
        let mut registry = AddonRegistry {
            name: "kubevela".to_owned(),
            ..AddonRegistry::default()
        };
        assert!(!registry.has_single_source());

        registry.helm = Some(HelmAddonSource {
            url: "https://charts.example.com".to_owned(),
        });
        assert!(registry.has_single_source());
        assert!(registry.token_source().is_none());

        registry.gitee = Some(GitAddonSource::default());
        assert!(!registry.has_single_source());
        assert!(registry.token_source_mut().is_some());
    }

    #[test]
    fn oss_registries_decode_camel_case() -> Result<(), serde_json::Error> {
        let registry: AddonRegistry = serde_json::from_str(
            r#"{"name":"kubevela","oss":{"endPoint":"https://addons.kubevela.net"}}"#,
        )?;
        assert_eq!(
            registry.oss.map(|oss| oss.end_point).as_deref(),
            Some("https://addons.kubevela.net")
        );
        Ok(())
    }
}
