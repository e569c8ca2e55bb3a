//! In-memory control plane for local runs and tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use vela_console_application::{
    ClusterClient, ConfigMapData, DefinitionMeta, DefinitionSummary, NamespaceInfo,
    label_selector_matches,
};
use vela_console_core::{AppError, AppResult};
use vela_console_domain::{APPLICATION_API_VERSION, APPLICATION_KIND, ApplicationManifest};

type NamespacedKey = (String, String);

/// In-memory cluster implementation.
///
/// Namespaces are tracked per cluster name; Applications, Secrets and
/// ConfigMaps live on the control plane.
#[derive(Debug, Default)]
pub struct InMemoryClusterClient {
    namespaces: RwLock<HashMap<NamespacedKey, BTreeMap<String, String>>>,
    definitions: RwLock<HashMap<String, DefinitionSummary>>,
    definition_meta: RwLock<BTreeMap<String, DefinitionMeta>>,
    applications: RwLock<HashMap<NamespacedKey, ApplicationManifest>>,
    secrets: RwLock<HashMap<NamespacedKey, BTreeMap<String, String>>>,
    config_maps: RwLock<BTreeMap<NamespacedKey, ConfigMapData>>,
}

impl InMemoryClusterClient {
    /// Creates an empty in-memory cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a ComponentDefinition.
    pub async fn register_definition(&self, definition: DefinitionSummary) {
        self.definitions
            .write()
            .await
            .insert(definition.name.clone(), definition);
    }

    /// Records the labels and annotations of a ComponentDefinition.
    pub async fn register_definition_meta(&self, meta: DefinitionMeta) {
        self.definition_meta
            .write()
            .await
            .insert(meta.name.clone(), meta);
    }
}

fn key(scope: &str, name: &str) -> NamespacedKey {
    (scope.to_owned(), name.to_owned())
}

#[async_trait]
impl ClusterClient for InMemoryClusterClient {
    async fn get_namespace(&self, cluster: &str, name: &str) -> AppResult<Option<NamespaceInfo>> {
        Ok(self
            .namespaces
            .read()
            .await
            .get(&key(cluster, name))
            .map(|labels| NamespaceInfo {
                name: name.to_owned(),
                labels: labels.clone(),
            }))
    }

    async fn ensure_namespace(
        &self,
        cluster: &str,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> AppResult<()> {
        self.namespaces
            .write()
            .await
            .entry(key(cluster, name))
            .or_default()
            .extend(labels.clone());
        debug!(cluster, namespace = name, "ensured namespace");
        Ok(())
    }

    async fn remove_namespace_labels(
        &self,
        cluster: &str,
        name: &str,
        keys: &[&str],
    ) -> AppResult<()> {
        if let Some(labels) = self.namespaces.write().await.get_mut(&key(cluster, name)) {
            for label in keys {
                labels.remove(*label);
            }
        }
        Ok(())
    }

    async fn list_namespaces(&self, cluster: &str) -> AppResult<Vec<NamespaceInfo>> {
        let mut namespaces: Vec<NamespaceInfo> = self
            .namespaces
            .read()
            .await
            .iter()
            .filter(|((scope, _), _)| scope == cluster)
            .map(|((_, name), labels)| NamespaceInfo {
                name: name.clone(),
                labels: labels.clone(),
            })
            .collect();
        namespaces.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(namespaces)
    }

    async fn get_component_definition(&self, name: &str) -> AppResult<Option<DefinitionSummary>> {
        Ok(self.definitions.read().await.get(name).cloned())
    }

    async fn list_component_definitions(&self, selector: &str) -> AppResult<Vec<DefinitionMeta>> {
        Ok(self
            .definition_meta
            .read()
            .await
            .values()
            .filter(|meta| label_selector_matches(selector, &meta.labels))
            .cloned()
            .collect())
    }

    async fn get_application(
        &self,
        namespace: &str,
        name: &str,
    ) -> AppResult<Option<ApplicationManifest>> {
        Ok(self
            .applications
            .read()
            .await
            .get(&key(namespace, name))
            .cloned())
    }

    async fn apply_application(&self, manifest: &ApplicationManifest) -> AppResult<()> {
        if manifest.api_version != APPLICATION_API_VERSION || manifest.kind != APPLICATION_KIND {
            return Err(AppError::Validation(format!(
                "unsupported resource {}/{}",
                manifest.api_version, manifest.kind
            )));
        }
        if manifest.metadata.name.is_empty() || manifest.metadata.namespace.is_empty() {
            return Err(AppError::Validation(
                "the application needs a name and a namespace".to_owned(),
            ));
        }

        let namespace_exists = self
            .namespaces
            .read()
            .await
            .keys()
            .any(|(_, namespace)| namespace == &manifest.metadata.namespace);
        if !namespace_exists {
            return Err(AppError::NotFound(format!(
                "namespace '{}' not found",
                manifest.metadata.namespace
            )));
        }

        self.applications.write().await.insert(
            key(&manifest.metadata.namespace, &manifest.metadata.name),
            manifest.clone(),
        );
        Ok(())
    }

    async fn delete_application(&self, namespace: &str, name: &str) -> AppResult<()> {
        self.applications
            .write()
            .await
            .remove(&key(namespace, name));
        Ok(())
    }

    async fn list_applications(
        &self,
        namespace: &str,
        selector: &str,
    ) -> AppResult<Vec<ApplicationManifest>> {
        let mut applications: Vec<ApplicationManifest> = self
            .applications
            .read()
            .await
            .iter()
            .filter(|((scope, _), manifest)| {
                scope == namespace && label_selector_matches(selector, &manifest.metadata.labels)
            })
            .map(|(_, manifest)| manifest.clone())
            .collect();
        applications.sort_by(|left, right| left.metadata.name.cmp(&right.metadata.name));
        Ok(applications)
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> AppResult<Option<BTreeMap<String, String>>> {
        Ok(self
            .secrets
            .read()
            .await
            .get(&key(namespace, name))
            .cloned())
    }

    async fn put_secret(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> AppResult<()> {
        self.secrets
            .write()
            .await
            .insert(key(namespace, name), data);
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> AppResult<()> {
        self.secrets.write().await.remove(&key(namespace, name));
        Ok(())
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> AppResult<Option<ConfigMapData>> {
        Ok(self
            .config_maps
            .read()
            .await
            .get(&key(namespace, name))
            .cloned())
    }

    async fn put_config_map(&self, namespace: &str, config_map: ConfigMapData) -> AppResult<()> {
        if config_map.name.is_empty() {
            return Err(AppError::Validation(
                "the configmap needs a name".to_owned(),
            ));
        }
        self.config_maps
            .write()
            .await
            .insert(key(namespace, &config_map.name), config_map);
        Ok(())
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> AppResult<()> {
        self.config_maps.write().await.remove(&key(namespace, name));
        Ok(())
    }

    async fn list_config_maps(
        &self,
        namespace: &str,
        selector: &str,
    ) -> AppResult<Vec<ConfigMapData>> {
        Ok(self
            .config_maps
            .read()
            .await
            .iter()
            .filter(|((scope, _), config_map)| {
                scope == namespace && label_selector_matches(selector, &config_map.labels)
            })
            .map(|(_, config_map)| config_map.clone())
            .collect())
    }
}
