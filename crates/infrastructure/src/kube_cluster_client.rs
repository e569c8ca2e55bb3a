//! Kubernetes API adapter for the cluster port.
//!
//! Only the control-plane cluster is reachable through this client. Targets
//! bound to other clusters are reported as validation errors.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::Client;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use serde_json::{Value, json};
use tracing::{debug, info};
use vela_console_application::{
    ClusterClient, ConfigMapData, DefinitionMeta, DefinitionSummary, NamespaceInfo,
};
use vela_console_core::{AppError, AppResult};
use vela_console_domain::{ApplicationManifest, LOCAL_CLUSTER_NAME};

const FIELD_MANAGER: &str = "vela-console";
const OAM_GROUP: &str = "core.oam.dev";
const OAM_VERSION: &str = "v1beta1";

/// Cluster port implementation backed by a `kube::Client`.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    system_namespace: String,
    application_resource: ApiResource,
    definition_resource: ApiResource,
}

impl KubeClusterClient {
    /// Creates a client. ComponentDefinitions are read from `system_namespace`.
    #[must_use]
    pub fn new(client: Client, system_namespace: impl Into<String>) -> Self {
        Self {
            client,
            system_namespace: system_namespace.into(),
            application_resource: ApiResource::from_gvk(&GroupVersionKind::gvk(
                OAM_GROUP,
                OAM_VERSION,
                "Application",
            )),
            definition_resource: ApiResource::from_gvk(&GroupVersionKind::gvk(
                OAM_GROUP,
                OAM_VERSION,
                "ComponentDefinition",
            )),
        }
    }

    fn namespaces(&self, cluster: &str) -> AppResult<Api<Namespace>> {
        if cluster != LOCAL_CLUSTER_NAME {
            return Err(AppError::Validation(format!(
                "cluster '{cluster}' is not reachable from the console"
            )));
        }
        Ok(Api::all(self.client.clone()))
    }

    fn applications(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.application_resource)
    }

    fn definitions(&self) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.client.clone(),
            &self.system_namespace,
            &self.definition_resource,
        )
    }
}

fn kube_error(action: &str, error: kube::Error) -> AppError {
    AppError::Internal(format!("failed to {action}: {error}"))
}

fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 404)
}

fn labels_patch(labels: Value) -> Value {
    json!({ "metadata": { "labels": labels } })
}

fn removal_patch(keys: &[&str]) -> Value {
    let labels = keys
        .iter()
        .map(|key| ((*key).to_owned(), Value::Null))
        .collect::<serde_json::Map<_, _>>();
    labels_patch(Value::Object(labels))
}

fn namespace_info(namespace: Namespace) -> NamespaceInfo {
    NamespaceInfo {
        name: namespace.metadata.name.unwrap_or_default(),
        labels: namespace.metadata.labels.unwrap_or_default(),
    }
}

fn list_params(selector: &str) -> ListParams {
    if selector.is_empty() {
        ListParams::default()
    } else {
        ListParams::default().labels(selector)
    }
}

fn definition_meta(object: DynamicObject) -> DefinitionMeta {
    DefinitionMeta {
        name: object.metadata.name.unwrap_or_default(),
        labels: object.metadata.labels.unwrap_or_default(),
        annotations: object.metadata.annotations.unwrap_or_default(),
    }
}

fn config_map_data(config_map: ConfigMap) -> ConfigMapData {
    ConfigMapData {
        name: config_map.metadata.name.unwrap_or_default(),
        labels: config_map.metadata.labels.unwrap_or_default(),
        data: config_map.data.unwrap_or_default(),
    }
}

fn config_map_object(namespace: &str, config_map: ConfigMapData) -> ConfigMap {
    let mut object = ConfigMap::default();
    object.metadata.name = Some(config_map.name);
    object.metadata.namespace = Some(namespace.to_owned());
    object.metadata.labels = Some(config_map.labels);
    object.data = Some(config_map.data);
    object
}

fn definition_summary(name: &str, object: &DynamicObject) -> DefinitionSummary {
    let workload = object.data.get("spec").and_then(|spec| spec.get("workload"));
    let field = |value: Option<&Value>| {
        value
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_default()
    };

    DefinitionSummary {
        name: name.to_owned(),
        workload_type: field(workload.and_then(|workload| workload.get("type"))),
        workload_kind: field(
            workload
                .and_then(|workload| workload.get("definition"))
                .and_then(|definition| definition.get("kind")),
        ),
    }
}

fn manifest_to_object(manifest: &ApplicationManifest) -> AppResult<DynamicObject> {
    serde_json::to_value(manifest)
        .and_then(serde_json::from_value)
        .map_err(|error| AppError::Internal(format!("failed to encode application: {error}")))
}

fn object_to_manifest(object: DynamicObject) -> AppResult<ApplicationManifest> {
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|error| AppError::Internal(format!("failed to decode application: {error}")))
}

fn secret_string_data(secret: Secret) -> BTreeMap<String, String> {
    let mut data = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(key, ByteString(bytes))| (key, String::from_utf8_lossy(&bytes).into_owned()))
        .collect::<BTreeMap<_, _>>();
    data.extend(secret.string_data.unwrap_or_default());
    data
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_namespace(&self, cluster: &str, name: &str) -> AppResult<Option<NamespaceInfo>> {
        self.namespaces(cluster)?
            .get_opt(name)
            .await
            .map(|namespace| namespace.map(namespace_info))
            .map_err(|error| kube_error("read namespace", error))
    }

    async fn ensure_namespace(
        &self,
        cluster: &str,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> AppResult<()> {
        let api = self.namespaces(cluster)?;
        let existing = api
            .get_opt(name)
            .await
            .map_err(|error| kube_error("read namespace", error))?;

        match existing {
            None => {
                let mut namespace = Namespace::default();
                namespace.metadata.name = Some(name.to_owned());
                namespace.metadata.labels = Some(labels.clone());
                api.create(&PostParams::default(), &namespace)
                    .await
                    .map_err(|error| kube_error("create namespace", error))?;
                info!(namespace = name, "created namespace");
            }
            Some(namespace) => {
                let current = namespace.metadata.labels.unwrap_or_default();
                if labels
                    .iter()
                    .all(|(key, value)| current.get(key) == Some(value))
                {
                    return Ok(());
                }
                api.patch(
                    name,
                    &PatchParams::default(),
                    &Patch::Merge(labels_patch(json!(labels))),
                )
                .await
                .map_err(|error| kube_error("label namespace", error))?;
                debug!(namespace = name, "merged namespace labels");
            }
        }

        Ok(())
    }

    async fn remove_namespace_labels(
        &self,
        cluster: &str,
        name: &str,
        keys: &[&str],
    ) -> AppResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        match self
            .namespaces(cluster)?
            .patch(
                name,
                &PatchParams::default(),
                &Patch::Merge(removal_patch(keys)),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(error) if is_not_found(&error) => Ok(()),
            Err(error) => Err(kube_error("remove namespace labels", error)),
        }
    }

    async fn list_namespaces(&self, cluster: &str) -> AppResult<Vec<NamespaceInfo>> {
        let namespaces = self
            .namespaces(cluster)?
            .list(&ListParams::default())
            .await
            .map_err(|error| kube_error("list namespaces", error))?;
        Ok(namespaces.items.into_iter().map(namespace_info).collect())
    }

    async fn get_component_definition(&self, name: &str) -> AppResult<Option<DefinitionSummary>> {
        let object = self
            .definitions()
            .get_opt(name)
            .await
            .map_err(|error| kube_error("read component definition", error))?;

        Ok(object.map(|object| definition_summary(name, &object)))
    }

    async fn list_component_definitions(&self, selector: &str) -> AppResult<Vec<DefinitionMeta>> {
        let definitions = self
            .definitions()
            .list(&list_params(selector))
            .await
            .map_err(|error| kube_error("list component definitions", error))?;
        Ok(definitions.items.into_iter().map(definition_meta).collect())
    }

    async fn get_application(
        &self,
        namespace: &str,
        name: &str,
    ) -> AppResult<Option<ApplicationManifest>> {
        self.applications(namespace)
            .get_opt(name)
            .await
            .map_err(|error| kube_error("read application", error))?
            .map(object_to_manifest)
            .transpose()
    }

    async fn apply_application(&self, manifest: &ApplicationManifest) -> AppResult<()> {
        let object = manifest_to_object(manifest)?;
        self.applications(&manifest.metadata.namespace)
            .patch(
                &manifest.metadata.name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&object),
            )
            .await
            .map_err(|error| kube_error("apply application", error))?;

        info!(
            namespace = %manifest.metadata.namespace,
            application = %manifest.metadata.name,
            "applied application"
        );
        Ok(())
    }

    async fn delete_application(&self, namespace: &str, name: &str) -> AppResult<()> {
        match self
            .applications(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(error) if is_not_found(&error) => Ok(()),
            Err(error) => Err(kube_error("delete application", error)),
        }
    }

    async fn list_applications(
        &self,
        namespace: &str,
        selector: &str,
    ) -> AppResult<Vec<ApplicationManifest>> {
        self.applications(namespace)
            .list(&list_params(selector))
            .await
            .map_err(|error| kube_error("list applications", error))?
            .items
            .into_iter()
            .map(object_to_manifest)
            .collect()
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> AppResult<Option<BTreeMap<String, String>>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map(|secret| secret.map(secret_string_data))
            .map_err(|error| kube_error("read secret", error))
    }

    async fn put_secret(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> AppResult<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let mut secret = Secret::default();
        secret.metadata.name = Some(name.to_owned());
        secret.metadata.namespace = Some(namespace.to_owned());
        secret.string_data = Some(data);

        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&secret),
        )
        .await
        .map_err(|error| kube_error("write secret", error))?;
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> AppResult<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(error) if is_not_found(&error) => Ok(()),
            Err(error) => Err(kube_error("delete secret", error)),
        }
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> AppResult<Option<ConfigMapData>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map(|config_map| config_map.map(config_map_data))
            .map_err(|error| kube_error("read configmap", error))
    }

    async fn put_config_map(&self, namespace: &str, config_map: ConfigMapData) -> AppResult<()> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let name = config_map.name.clone();
        api.patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&config_map_object(namespace, config_map)),
        )
        .await
        .map_err(|error| kube_error("write configmap", error))?;
        debug!(namespace, configmap = %name, "applied configmap");
        Ok(())
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> AppResult<()> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(error) if is_not_found(&error) => Ok(()),
            Err(error) => Err(kube_error("delete configmap", error)),
        }
    }

    async fn list_config_maps(
        &self,
        namespace: &str,
        selector: &str,
    ) -> AppResult<Vec<ConfigMapData>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_maps = api
            .list(&list_params(selector))
            .await
            .map_err(|error| kube_error("list configmaps", error))?;
        Ok(config_maps.items.into_iter().map(config_map_data).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::ByteString;
    use k8s_openapi::api::core::v1::Secret;
    use kube::core::DynamicObject;
    use serde_json::json;
    use vela_console_core::{AppError, AppResult};
    use vela_console_domain::{AppComponent, ApplicationManifest, ObjectMeta};

    use vela_console_application::ConfigMapData;

    use super::{
        config_map_data, config_map_object, definition_meta, definition_summary, list_params,
        manifest_to_object, object_to_manifest, removal_patch, secret_string_data,
    };

    fn object(value: serde_json::Value) -> AppResult<DynamicObject> {
        serde_json::from_value(value).map_err(|error| AppError::Internal(error.to_string()))
    }

    #[test]
    fn definitions_read_workload_fields() -> AppResult<()> {
        let definition = object(json!({
            "apiVersion": "core.oam.dev/v1beta1",
            "kind": "ComponentDefinition",
            "metadata": { "name": "webservice", "namespace": "vela-system" },
            "spec": {
                "workload": {
                    "type": "deployments.apps",
                    "definition": { "apiVersion": "apps/v1", "kind": "Deployment" }
                }
            }
        }))?;

        let summary = definition_summary("webservice", &definition);
        assert_eq!(summary.workload_type, "deployments.apps");
        assert_eq!(summary.workload_kind, "Deployment");
        Ok(())
    }

    #[test]
    fn definitions_without_workload_have_empty_fields() -> AppResult<()> {
        let definition = object(json!({
            "apiVersion": "core.oam.dev/v1beta1",
            "kind": "ComponentDefinition",
            "metadata": { "name": "raw" }
        }))?;

        let summary = definition_summary("raw", &definition);
        assert!(summary.workload_type.is_empty());
        assert!(summary.workload_kind.is_empty());
        Ok(())
    }

    #[test]
    fn manifests_convert_through_dynamic_objects() -> AppResult<()> {
        let mut manifest = ApplicationManifest::new(ObjectMeta {
            name: "shop".to_owned(),
            namespace: "dev".to_owned(),
            labels: BTreeMap::from([("app.oam.dev/name".to_owned(), "shop".to_owned())]),
            annotations: BTreeMap::new(),
        });
        manifest.spec.components.push(AppComponent {
            name: "web".to_owned(),
            component_type: "webservice".to_owned(),
            ..AppComponent::default()
        });

        let dynamic = manifest_to_object(&manifest)?;
        assert_eq!(dynamic.metadata.name.as_deref(), Some("shop"));
        assert_eq!(
            dynamic.types.as_ref().map(|types| types.kind.as_str()),
            Some("Application")
        );
        assert_eq!(object_to_manifest(dynamic)?, manifest);
        Ok(())
    }

    #[test]
    fn secrets_merge_binary_and_string_data() {
        let secret = Secret {
            data: Some(BTreeMap::from([(
                "admin".to_owned(),
                ByteString(b"hash".to_vec()),
            )])),
            string_data: Some(BTreeMap::from([("other".to_owned(), "value".to_owned())])),
            ..Secret::default()
        };

        let data = secret_string_data(secret);
        assert_eq!(data.get("admin").map(String::as_str), Some("hash"));
        assert_eq!(data.get("other").map(String::as_str), Some("value"));
    }

    #[test]
    fn label_removal_sets_nulls() {
        assert_eq!(
            removal_patch(&["a", "b"]),
            json!({ "metadata": { "labels": { "a": null, "b": null } } })
        );
    }

    #[test]
    fn definition_meta_keeps_labels_and_annotations() -> AppResult<()> {
        let definition = object(json!({
            "apiVersion": "core.oam.dev/v1beta1",
            "kind": "ComponentDefinition",
            "metadata": {
                "name": "config-image-registry",
                "labels": { "custom.definition.oam.dev/catalog.config.oam.dev": "velacore-config" },
                "annotations": { "definition.oam.dev/description": "registry credentials" }
            }
        }))?;

        let meta = definition_meta(definition);
        assert_eq!(meta.name, "config-image-registry");
        assert_eq!(meta.labels.len(), 1);
        assert_eq!(
            meta.annotations
                .get("definition.oam.dev/description")
                .map(String::as_str),
            Some("registry credentials")
        );
        Ok(())
    }

    #[test]
    fn configmaps_convert_both_ways() {
        let data = ConfigMapData {
            name: "helm-repo-bitnami".to_owned(),
            labels: BTreeMap::from([(
                "config.oam.dev/type".to_owned(),
                "helm-repository".to_owned(),
            )]),
            data: BTreeMap::from([("url".to_owned(), "https://charts.bitnami.com".to_owned())]),
        };

        let object = config_map_object("vela-system", data.clone());
        assert_eq!(object.metadata.namespace.as_deref(), Some("vela-system"));
        assert_eq!(config_map_data(object), data);
    }

    #[test]
    fn empty_selectors_list_everything() {
        assert_eq!(list_params("").label_selector, None);
        assert_eq!(
            list_params("addons.oam.dev/name").label_selector.as_deref(),
            Some("addons.oam.dev/name")
        );
    }
}
