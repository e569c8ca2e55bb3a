//! Kubernetes cluster port.

use std::collections::BTreeMap;

use async_trait::async_trait;
use vela_console_core::AppResult;
use vela_console_domain::ApplicationManifest;

/// Namespace as seen by the console.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceInfo {
    /// Namespace name.
    pub name: String,
    /// Namespace labels.
    pub labels: BTreeMap<String, String>,
}

/// The parts of a ComponentDefinition the console needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionSummary {
    /// Definition name, used as component type.
    pub name: String,
    /// `spec.workload.type`.
    pub workload_type: String,
    /// `spec.workload.definition.kind`.
    pub workload_kind: String,
}

/// Labels and annotations of a ComponentDefinition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionMeta {
    /// Definition name.
    pub name: String,
    /// Definition labels.
    pub labels: BTreeMap<String, String>,
    /// Definition annotations.
    pub annotations: BTreeMap<String, String>,
}

/// A ConfigMap as seen by the console.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMapData {
    /// ConfigMap name.
    pub name: String,
    /// ConfigMap labels.
    pub labels: BTreeMap<String, String>,
    /// String data.
    pub data: BTreeMap<String, String>,
}

/// Returns whether labels satisfy an equality-based label selector.
///
/// The selector is a comma-separated list of `key=value` and bare `key`
/// terms. A bare key only needs to be present. An empty selector matches
/// everything.
#[must_use]
pub fn label_selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key.trim()).map(String::as_str) == Some(value.trim()),
            None => labels.contains_key(term),
        })
}

/// Builds a selector requiring every given label.
#[must_use]
pub fn label_selector(labels: &[(&str, &str)]) -> String {
    labels
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                (*key).to_owned()
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Port for the Kubernetes resources the console manages.
///
/// Namespace operations take the cluster name of a delivery target; the other
/// operations address the control-plane cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Returns one namespace.
    async fn get_namespace(&self, cluster: &str, name: &str) -> AppResult<Option<NamespaceInfo>>;

    /// Creates a namespace or merges labels into an existing one.
    async fn ensure_namespace(
        &self,
        cluster: &str,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> AppResult<()>;

    /// Removes labels from a namespace. A missing namespace is ignored.
    async fn remove_namespace_labels(
        &self,
        cluster: &str,
        name: &str,
        keys: &[&str],
    ) -> AppResult<()>;

    /// Lists the namespaces of a cluster.
    async fn list_namespaces(&self, cluster: &str) -> AppResult<Vec<NamespaceInfo>>;

    /// Returns one ComponentDefinition.
    async fn get_component_definition(&self, name: &str) -> AppResult<Option<DefinitionSummary>>;

    /// Lists the ComponentDefinitions matching a label selector.
    async fn list_component_definitions(&self, selector: &str) -> AppResult<Vec<DefinitionMeta>>;

    /// Returns one Application resource.
    async fn get_application(
        &self,
        namespace: &str,
        name: &str,
    ) -> AppResult<Option<ApplicationManifest>>;

    /// Creates or replaces an Application resource.
    async fn apply_application(&self, manifest: &ApplicationManifest) -> AppResult<()>;

    /// Deletes an Application resource. A missing resource is ignored.
    async fn delete_application(&self, namespace: &str, name: &str) -> AppResult<()>;

    /// Lists the Application resources of a namespace matching a label
    /// selector.
    async fn list_applications(
        &self,
        namespace: &str,
        selector: &str,
    ) -> AppResult<Vec<ApplicationManifest>>;

    /// Returns the string data of a Secret.
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> AppResult<Option<BTreeMap<String, String>>>;

    /// Creates or replaces a Secret with string data.
    async fn put_secret(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> AppResult<()>;

    /// Deletes a Secret. A missing Secret is ignored.
    async fn delete_secret(&self, namespace: &str, name: &str) -> AppResult<()>;

    /// Returns one ConfigMap.
    async fn get_config_map(&self, namespace: &str, name: &str)
    -> AppResult<Option<ConfigMapData>>;

    /// Creates or replaces a ConfigMap.
    async fn put_config_map(&self, namespace: &str, config_map: ConfigMapData) -> AppResult<()>;

    /// Deletes a ConfigMap. A missing ConfigMap is ignored.
    async fn delete_config_map(&self, namespace: &str, name: &str) -> AppResult<()>;

    /// Lists the ConfigMaps of a namespace matching a label selector.
    async fn list_config_maps(
        &self,
        namespace: &str,
        selector: &str,
    ) -> AppResult<Vec<ConfigMapData>>;
}

/// Optional cache port for component definitions.
#[async_trait]
pub trait DefinitionCache: Send + Sync {
    /// Returns a cached definition.
    async fn get_definition(&self, name: &str) -> AppResult<Option<DefinitionSummary>>;

    /// Stores a definition with ttl.
    async fn set_definition(&self, definition: DefinitionSummary, ttl_seconds: u32)
    -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{label_selector, label_selector_matches};

    #[test]
    fn selectors_match_equality_and_presence() {
        let labels = BTreeMap::from([
            ("config.oam.dev/type".to_owned(), "helm-repository".to_owned()),
            ("addons.oam.dev/name".to_owned(), "fluxcd".to_owned()),
        ]);

        assert!(label_selector_matches("", &labels));
        assert!(label_selector_matches("addons.oam.dev/name", &labels));
        assert!(label_selector_matches(
            "config.oam.dev/type=helm-repository, addons.oam.dev/name",
            &labels
        ));
        assert!(!label_selector_matches("config.oam.dev/type=image-registry", &labels));
        assert!(!label_selector_matches("config.oam.dev/project", &labels));
    }

    #[test]
    fn selectors_render_presence_for_empty_values() {
        assert_eq!(
            label_selector(&[("a", "1"), ("b", ""), ("c", "3")]),
            "a=1,b,c=3"
        );
    }
}
