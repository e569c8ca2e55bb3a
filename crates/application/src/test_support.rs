//! In-memory fakes shared by the service tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use vela_console_core::{AppError, AppResult, UserIdentity};
use vela_console_domain::{ApplicationManifest, ApplicationStatus};

use crate::application_service::ApplicationService;
use crate::authentication_service::AuthenticationService;
use crate::cluster_ports::{
    ClusterClient, ConfigMapData, DefinitionMeta, DefinitionSummary, NamespaceInfo,
    label_selector_matches,
};
use crate::cluster_service::ClusterService;
use crate::datastore_ports::{
    DataStore, EntityStore, FilterOptions, ListOptions, StoredRecord, count_records,
    select_records,
};
use crate::definition_service::DefinitionService;
use crate::env_binding_service::EnvBindingService;
use crate::env_service::EnvService;
use crate::project_service::ProjectService;
use crate::rbac_service::RbacService;
use crate::security_ports::{GrantType, PasswordHasher, TokenClaims, TokenIssuer};
use crate::system_info_service::SystemInfoService;
use crate::target_service::TargetService;
use crate::user_service::UserService;
use crate::workflow_service::WorkflowService;

type RecordKey = (String, String);

#[derive(Default)]
pub(crate) struct FakeDataStore {
    records: Mutex<BTreeMap<RecordKey, StoredRecord>>,
}

fn record_key(table: &str, primary_key: &str) -> RecordKey {
    (table.to_owned(), primary_key.to_owned())
}

#[async_trait]
impl DataStore for FakeDataStore {
    async fn add(&self, record: StoredRecord) -> AppResult<()> {
        self.batch_add(vec![record]).await
    }

    async fn batch_add(&self, records: Vec<StoredRecord>) -> AppResult<()> {
        let mut stored = self.records.lock().await;
        for record in &records {
            if stored.contains_key(&record_key(&record.table, &record.primary_key)) {
                return Err(AppError::Conflict(format!(
                    "record '{}' already exists",
                    record.primary_key
                )));
            }
        }
        for record in records {
            stored.insert(record_key(&record.table, &record.primary_key), record);
        }
        Ok(())
    }

    async fn put(&self, record: StoredRecord) -> AppResult<()> {
        let mut stored = self.records.lock().await;
        let key = record_key(&record.table, &record.primary_key);
        if !stored.contains_key(&key) {
            return Err(AppError::NotFound(format!(
                "record '{}' not found",
                record.primary_key
            )));
        }
        stored.insert(key, record);
        Ok(())
    }

    async fn get(&self, table: &str, primary_key: &str) -> AppResult<Option<StoredRecord>> {
        Ok(self
            .records
            .lock()
            .await
            .get(&record_key(table, primary_key))
            .cloned())
    }

    async fn delete(&self, table: &str, primary_key: &str) -> AppResult<()> {
        self.records
            .lock()
            .await
            .remove(&record_key(table, primary_key))
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("record '{primary_key}' not found")))
    }

    async fn is_exist(&self, table: &str, primary_key: &str) -> AppResult<bool> {
        Ok(self
            .records
            .lock()
            .await
            .contains_key(&record_key(table, primary_key)))
    }

    async fn list(
        &self,
        table: &str,
        index: &BTreeMap<String, String>,
        options: &ListOptions,
    ) -> AppResult<Vec<StoredRecord>> {
        let stored = self.records.lock().await;
        let records = stored.values().filter(|record| record.table == table);
        Ok(select_records(records, index, options))
    }

    async fn count(
        &self,
        table: &str,
        index: &BTreeMap<String, String>,
        filter: &FilterOptions,
    ) -> AppResult<u64> {
        let stored = self.records.lock().await;
        let records = stored.values().filter(|record| record.table == table);
        Ok(count_records(records, index, filter))
    }
}

#[derive(Default)]
pub(crate) struct FakeClusterClient {
    pub(crate) namespaces: Mutex<BTreeMap<RecordKey, BTreeMap<String, String>>>,
    pub(crate) definitions: Mutex<BTreeMap<String, DefinitionSummary>>,
    pub(crate) definition_reads: Mutex<usize>,
    pub(crate) applications: Mutex<BTreeMap<RecordKey, ApplicationManifest>>,
    pub(crate) secrets: Mutex<BTreeMap<RecordKey, BTreeMap<String, String>>>,
    pub(crate) fail_apply: Mutex<bool>,
    pub(crate) fail_namespace_writes: Mutex<bool>,
    pub(crate) definition_meta: Mutex<BTreeMap<String, DefinitionMeta>>,
    pub(crate) config_maps: Mutex<BTreeMap<RecordKey, ConfigMapData>>,
    pub(crate) unreachable_clusters: Mutex<Vec<String>>,
}

impl FakeClusterClient {
    pub(crate) async fn add_definition_meta(
        &self,
        name: &str,
        labels: &[(&str, &str)],
        annotations: &[(&str, &str)],
    ) {
        let pairs = |entries: &[(&str, &str)]| {
            entries
                .iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                .collect()
        };
        self.definition_meta.lock().await.insert(
            name.to_owned(),
            DefinitionMeta {
                name: name.to_owned(),
                labels: pairs(labels),
                annotations: pairs(annotations),
            },
        );
    }

    pub(crate) async fn set_app_phase(&self, namespace: &str, name: &str, phase: &str) {
        if let Some(manifest) = self
            .applications
            .lock()
            .await
            .get_mut(&record_key(namespace, name))
        {
            manifest.status = Some(ApplicationStatus {
                status: phase.to_owned(),
            });
        }
    }

    pub(crate) async fn add_definition(&self, name: &str, workload_type: &str) {
        self.definitions.lock().await.insert(
            name.to_owned(),
            DefinitionSummary {
                name: name.to_owned(),
                workload_type: workload_type.to_owned(),
                workload_kind: String::new(),
            },
        );
    }
}

#[async_trait]
impl ClusterClient for FakeClusterClient {
    async fn get_namespace(&self, cluster: &str, name: &str) -> AppResult<Option<NamespaceInfo>> {
        Ok(self
            .namespaces
            .lock()
            .await
            .get(&record_key(cluster, name))
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
        if *self.fail_namespace_writes.lock().await {
            return Err(AppError::Internal("namespaces are forbidden".to_owned()));
        }
        self.namespaces
            .lock()
            .await
            .entry(record_key(cluster, name))
            .or_default()
            .extend(labels.clone());
        Ok(())
    }

    async fn remove_namespace_labels(
        &self,
        cluster: &str,
        name: &str,
        keys: &[&str],
    ) -> AppResult<()> {
        if *self.fail_namespace_writes.lock().await {
            return Err(AppError::Internal("namespaces are forbidden".to_owned()));
        }
        if let Some(labels) = self
            .namespaces
            .lock()
            .await
            .get_mut(&record_key(cluster, name))
        {
            for key in keys {
                labels.remove(*key);
            }
        }
        Ok(())
    }

    async fn list_namespaces(&self, cluster: &str) -> AppResult<Vec<NamespaceInfo>> {
        if self.unreachable_clusters.lock().await.iter().any(|name| name == cluster) {
            return Err(AppError::Internal(format!("cluster '{cluster}' is unreachable")));
        }
        Ok(self
            .namespaces
            .lock()
            .await
            .iter()
            .filter(|((scope, _), _)| scope == cluster)
            .map(|((_, name), labels)| NamespaceInfo {
                name: name.clone(),
                labels: labels.clone(),
            })
            .collect())
    }

    async fn get_component_definition(&self, name: &str) -> AppResult<Option<DefinitionSummary>> {
        *self.definition_reads.lock().await += 1;
        Ok(self.definitions.lock().await.get(name).cloned())
    }

    async fn list_component_definitions(&self, selector: &str) -> AppResult<Vec<DefinitionMeta>> {
        Ok(self
            .definition_meta
            .lock()
            .await
            .values()
            .filter(|definition| label_selector_matches(selector, &definition.labels))
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
            .lock()
            .await
            .get(&record_key(namespace, name))
            .cloned())
    }

    async fn apply_application(&self, manifest: &ApplicationManifest) -> AppResult<()> {
        if *self.fail_apply.lock().await {
            return Err(AppError::Internal("admission webhook denied".to_owned()));
        }
        self.applications.lock().await.insert(
            record_key(&manifest.metadata.namespace, &manifest.metadata.name),
            manifest.clone(),
        );
        Ok(())
    }

    async fn delete_application(&self, namespace: &str, name: &str) -> AppResult<()> {
        self.applications
            .lock()
            .await
            .remove(&record_key(namespace, name));
        Ok(())
    }

    async fn list_applications(
        &self,
        namespace: &str,
        selector: &str,
    ) -> AppResult<Vec<ApplicationManifest>> {
        Ok(self
            .applications
            .lock()
            .await
            .iter()
            .filter(|((scope, _), manifest)| {
                scope == namespace && label_selector_matches(selector, &manifest.metadata.labels)
            })
            .map(|(_, manifest)| manifest.clone())
            .collect())
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> AppResult<Option<BTreeMap<String, String>>> {
        Ok(self
            .secrets
            .lock()
            .await
            .get(&record_key(namespace, name))
            .cloned())
    }

    async fn put_secret(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> AppResult<()> {
        self.secrets
            .lock()
            .await
            .insert(record_key(namespace, name), data);
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> AppResult<()> {
        self.secrets
            .lock()
            .await
            .remove(&record_key(namespace, name));
        Ok(())
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> AppResult<Option<ConfigMapData>> {
        Ok(self
            .config_maps
            .lock()
            .await
            .get(&record_key(namespace, name))
            .cloned())
    }

    async fn put_config_map(&self, namespace: &str, config_map: ConfigMapData) -> AppResult<()> {
        self.config_maps
            .lock()
            .await
            .insert(record_key(namespace, &config_map.name), config_map);
        Ok(())
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> AppResult<()> {
        self.config_maps
            .lock()
            .await
            .remove(&record_key(namespace, name));
        Ok(())
    }

    async fn list_config_maps(
        &self,
        namespace: &str,
        selector: &str,
    ) -> AppResult<Vec<ConfigMapData>> {
        Ok(self
            .config_maps
            .lock()
            .await
            .iter()
            .filter(|((scope, _), config_map)| {
                scope == namespace && label_selector_matches(selector, &config_map.labels)
            })
            .map(|(_, config_map)| config_map.clone())
            .collect())
    }
}

pub(crate) struct PlainPasswordHasher;

impl PasswordHasher for PlainPasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(format!("plain:{password}"))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        Ok(hash.strip_prefix("plain:") == Some(password))
    }
}

/// Issues readable `grant.username.expiry` tokens.
pub(crate) struct FakeTokenIssuer;

impl TokenIssuer for FakeTokenIssuer {
    fn sign(&self, username: &str, grant_type: GrantType, ttl_seconds: i64) -> AppResult<String> {
        let grant = match grant_type {
            GrantType::Access => "access",
            GrantType::Refresh => "refresh",
        };
        Ok(format!("{grant}.{username}.{ttl_seconds}"))
    }

    fn verify(&self, token: &str) -> AppResult<TokenClaims> {
        let mut parts = token.splitn(3, '.');
        let grant_type = match parts.next() {
            Some("access") => GrantType::Access,
            Some("refresh") => GrantType::Refresh,
            _ => return Err(AppError::Unauthorized("the token is invalid".to_owned())),
        };
        let username = parts
            .next()
            .ok_or_else(|| AppError::Unauthorized("the token is invalid".to_owned()))?;
        let expires_at = parts
            .next()
            .and_then(|value| value.parse::<i64>().ok())
            .ok_or_else(|| AppError::Unauthorized("the token is invalid".to_owned()))?;
        if expires_at <= 0 {
            return Err(AppError::Unauthorized("the token is expired".to_owned()));
        }

        Ok(TokenClaims {
            username: username.to_owned(),
            grant_type,
            expires_at,
        })
    }
}

pub(crate) fn actor(subject: &str) -> UserIdentity {
    UserIdentity::new(subject, subject, None)
}

pub(crate) fn entity_store() -> EntityStore {
    EntityStore::new(Arc::new(FakeDataStore::default()))
}

pub(crate) const SYSTEM_NAMESPACE: &str = "vela-system";

/// Every service wired over one fake store and one fake cluster.
pub(crate) struct TestConsole {
    pub(crate) store: EntityStore,
    pub(crate) cluster: Arc<FakeClusterClient>,
    pub(crate) system_info: SystemInfoService,
    pub(crate) rbac: RbacService,
    pub(crate) users: UserService,
    pub(crate) authentication: AuthenticationService,
    pub(crate) targets: TargetService,
    pub(crate) workflows: WorkflowService,
    pub(crate) envs: EnvService,
    pub(crate) env_bindings: EnvBindingService,
    pub(crate) projects: ProjectService,
    pub(crate) applications: ApplicationService,
    pub(crate) clusters: ClusterService,
}

impl TestConsole {
    /// Wires the services without running any init routine.
    pub(crate) async fn new() -> Self {
        let store = entity_store();
        let cluster = Arc::new(FakeClusterClient::default());
        cluster.add_definition("webservice", "deployments.apps").await;
        cluster.add_definition("worker", "deployments.apps").await;
        cluster
            .add_definition("alibaba-rds", "configurations.terraform.core.oam.dev")
            .await;
        let cluster_port: Arc<dyn ClusterClient> = cluster.clone();

        let system_info = SystemInfoService::new(store.clone());
        let rbac = RbacService::new(store.clone());
        let users = UserService::new(
            store.clone(),
            Arc::new(PlainPasswordHasher),
            cluster_port.clone(),
            system_info.clone(),
            rbac.clone(),
            SYSTEM_NAMESPACE,
        );
        let authentication = AuthenticationService::new(
            Arc::new(PlainPasswordHasher),
            Arc::new(FakeTokenIssuer),
            system_info.clone(),
            users.clone(),
        );
        let targets = TargetService::new(store.clone(), cluster_port.clone());
        let definitions = DefinitionService::new(cluster_port.clone());
        let workflows = WorkflowService::new(store.clone(), definitions.clone());
        let envs = EnvService::new(
            store.clone(),
            cluster_port.clone(),
            workflows.clone(),
            rbac.clone(),
        );
        let env_bindings =
            EnvBindingService::new(store.clone(), cluster_port.clone(), workflows.clone());
        let projects = ProjectService::new(
            store.clone(),
            rbac.clone(),
            targets.clone(),
            envs.clone(),
        );
        let clusters = ClusterService::new(store.clone(), cluster_port.clone(), SYSTEM_NAMESPACE);
        let applications = ApplicationService::new(
            store.clone(),
            cluster_port,
            workflows.clone(),
            env_bindings.clone(),
            definitions,
            rbac.clone(),
        );

        Self {
            store,
            cluster,
            system_info,
            rbac,
            users,
            authentication,
            targets,
            workflows,
            envs,
            env_bindings,
            projects,
            applications,
            clusters,
        }
    }

    /// Wires the services and runs the startup init routines.
    pub(crate) async fn started() -> AppResult<Self> {
        let console = Self::new().await;
        console.system_info.get_or_create().await?;
        console.rbac.init().await?;
        console.users.init().await?;
        console.projects.init("default").await?;
        console.targets.init().await?;
        console.clusters.init().await?;
        Ok(console)
    }
}
