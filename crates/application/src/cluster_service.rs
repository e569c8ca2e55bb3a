//! Registered Kubernetes clusters.
//!
//! Cluster records live in the datastore. Kubeconfigs are kept in one Secret
//! per cluster in the system namespace.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};
use vela_console_core::{AppError, AppResult, NonEmptyString};
use vela_console_domain::{
    CLUSTER_STATUS_HEALTHY, CLUSTER_STATUS_UNHEALTHY, Cluster, ClusterTarget, LOCAL_CLUSTER_NAME,
    Target, cluster_credential_secret_name,
};

use crate::cluster_ports::ClusterClient;
use crate::common::ListPage;
use crate::datastore_ports::{EntityStore, FilterOptions, ListOptions};

const KUBECONFIG_KEY: &str = "kubeconfig";

/// Input payload for registering a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateClusterInput {
    /// Unique cluster name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Free-form description.
    pub description: String,
    /// Icon URL.
    pub icon: String,
    /// User labels.
    pub labels: BTreeMap<String, String>,
    /// Kubeconfig granting access to the cluster.
    pub kubeconfig: String,
}

/// Input payload for updating a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateClusterInput {
    /// New display alias.
    pub alias: String,
    /// New description.
    pub description: String,
    /// New icon URL.
    pub icon: String,
    /// Replacement labels.
    pub labels: BTreeMap<String, String>,
    /// Replacement kubeconfig, empty to keep the current one.
    pub kubeconfig: String,
}

/// Application service for clusters.
#[derive(Clone)]
pub struct ClusterService {
    store: EntityStore,
    cluster: Arc<dyn ClusterClient>,
    system_namespace: String,
}

fn validate_kubeconfig(kubeconfig: &str) -> AppResult<()> {
    let kubeconfig = NonEmptyString::required("kubeconfig", kubeconfig)?;
    let has_section = |section: &str| {
        kubeconfig
            .lines()
            .any(|line| line.trim_end() == format!("{section}:"))
    };
    if !has_section("clusters") || !has_section("users") {
        return Err(AppError::Validation(
            "the kubeconfig needs clusters and users".to_owned(),
        ));
    }
    Ok(())
}

impl ClusterService {
    /// Creates a new cluster service.
    #[must_use]
    pub fn new(
        store: EntityStore,
        cluster: Arc<dyn ClusterClient>,
        system_namespace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            cluster,
            system_namespace: system_namespace.into(),
        }
    }

    /// Records the control-plane cluster on first start.
    pub async fn init(&self) -> AppResult<()> {
        if self.store.is_exist(&Cluster::key(LOCAL_CLUSTER_NAME)).await? {
            return Ok(());
        }

        self.store
            .add(Cluster {
                alias: "Local Cluster".to_owned(),
                description: "The control-plane cluster".to_owned(),
                status: CLUSTER_STATUS_HEALTHY.to_owned(),
                ..Cluster::key(LOCAL_CLUSTER_NAME)
            })
            .await?;
        info!(cluster = LOCAL_CLUSTER_NAME, "recorded local cluster");
        Ok(())
    }

    /// Stamps the reachability of a cluster onto its record.
    async fn check_status(&self, record: &mut Cluster) {
        match self.cluster.list_namespaces(&record.name).await {
            Ok(_) => {
                record.status = CLUSTER_STATUS_HEALTHY.to_owned();
                record.reason.clear();
            }
            Err(error) => {
                warn!(cluster = %record.name, error = %error, "cluster is unreachable");
                record.status = CLUSTER_STATUS_UNHEALTHY.to_owned();
                record.reason = error.to_string();
            }
        }
    }

    /// Lists clusters newest first, filtered by a name substring.
    pub async fn list_kube_clusters(
        &self,
        query: &str,
        page: usize,
        page_size: usize,
    ) -> AppResult<ListPage<Cluster>> {
        let filter = FilterOptions::default().with_query("name", query);
        let items = self
            .store
            .list(
                &Cluster::default(),
                &ListOptions::filtered(filter.clone())
                    .newest_first("createTime")
                    .paged(page, page_size),
            )
            .await?;
        let total = self.store.count(&Cluster::default(), &filter).await?;
        Ok(ListPage { items, total })
    }

    /// Registers a cluster from a kubeconfig.
    pub async fn create_kube_cluster(&self, input: CreateClusterInput) -> AppResult<Cluster> {
        let name = NonEmptyString::required("cluster name", input.name)?;
        if name == LOCAL_CLUSTER_NAME {
            return Err(AppError::Validation(format!(
                "the cluster name '{LOCAL_CLUSTER_NAME}' is reserved"
            )));
        }
        validate_kubeconfig(&input.kubeconfig)?;
        if self.store.is_exist(&Cluster::key(name.as_str())).await? {
            return Err(AppError::Conflict("the cluster is exist".to_owned()));
        }

        self.cluster
            .put_secret(
                &self.system_namespace,
                &cluster_credential_secret_name(&name),
                BTreeMap::from([(KUBECONFIG_KEY.to_owned(), input.kubeconfig)]),
            )
            .await?;

        let mut record = Cluster {
            alias: input.alias,
            description: input.description,
            icon: input.icon,
            labels: input.labels,
            ..Cluster::key(name)
        };
        self.check_status(&mut record).await;
        let record = self.store.add(record).await?;

        info!(cluster = %record.name, status = %record.status, "registered cluster");
        Ok(record)
    }

    /// Returns one cluster.
    pub async fn get_kube_cluster(&self, name: &str) -> AppResult<Cluster> {
        self.store
            .get(&Cluster::key(name))
            .await?
            .ok_or_else(|| AppError::NotFound("the cluster is not exist".to_owned()))
    }

    /// Updates the display fields of a cluster and optionally its kubeconfig.
    pub async fn modify_kube_cluster(
        &self,
        name: &str,
        input: UpdateClusterInput,
    ) -> AppResult<Cluster> {
        let mut record = self.get_kube_cluster(name).await?;
        record.alias = input.alias;
        record.description = input.description;
        record.icon = input.icon;
        record.labels = input.labels;

        if !input.kubeconfig.is_empty() {
            if name == LOCAL_CLUSTER_NAME {
                return Err(AppError::Validation(
                    "the local cluster uses the in-cluster credentials".to_owned(),
                ));
            }
            validate_kubeconfig(&input.kubeconfig)?;
            self.cluster
                .put_secret(
                    &self.system_namespace,
                    &cluster_credential_secret_name(name),
                    BTreeMap::from([(KUBECONFIG_KEY.to_owned(), input.kubeconfig)]),
                )
                .await?;
            self.check_status(&mut record).await;
        }

        self.store.put(record).await
    }

    /// Deletes a cluster no delivery target points at.
    pub async fn delete_kube_cluster(&self, name: &str) -> AppResult<()> {
        if name == LOCAL_CLUSTER_NAME {
            return Err(AppError::Validation(
                "the local cluster cannot be deleted".to_owned(),
            ));
        }
        let record = self.get_kube_cluster(name).await?;

        let targets = self
            .store
            .list(
                &Target {
                    cluster: Some(ClusterTarget {
                        cluster_name: name.to_owned(),
                        ..ClusterTarget::default()
                    }),
                    ..Target::default()
                },
                &ListOptions::default(),
            )
            .await?;
        if let Some(target) = targets.first() {
            return Err(AppError::Conflict(format!(
                "the cluster is used by target '{}'",
                target.name
            )));
        }

        self.cluster
            .delete_secret(
                &self.system_namespace,
                &cluster_credential_secret_name(name),
            )
            .await?;
        self.store.delete(&record).await?;
        info!(cluster = name, "deleted cluster");
        Ok(())
    }

    /// Lists the namespace names of a cluster.
    pub async fn list_cluster_namespaces(&self, name: &str) -> AppResult<Vec<String>> {
        self.get_kube_cluster(name).await?;
        let mut namespaces: Vec<String> = self
            .cluster
            .list_namespaces(name)
            .await?
            .into_iter()
            .map(|namespace| namespace.name)
            .collect();
        namespaces.sort();
        Ok(namespaces)
    }

    /// Creates a namespace in a cluster. Returns whether it already existed.
    pub async fn create_cluster_namespace(&self, name: &str, namespace: &str) -> AppResult<bool> {
        self.get_kube_cluster(name).await?;
        let namespace = NonEmptyString::required("namespace", namespace)?;
        if self.cluster.get_namespace(name, &namespace).await?.is_some() {
            return Ok(true);
        }

        self.cluster
            .ensure_namespace(name, &namespace, &BTreeMap::new())
            .await?;
        info!(cluster = name, namespace = %namespace, "created namespace");
        Ok(false)
    }
}
