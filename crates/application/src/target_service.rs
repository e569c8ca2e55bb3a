//! Delivery targets: one namespace of one cluster, owned by a project.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;
use vela_console_core::{AppError, AppResult, NonEmptyString};
use vela_console_domain::{
    ClusterTarget, DEFAULT_PROJECT_NAME, Env, JsonObject, LABEL_NAMESPACE_OF_TARGET,
    LOCAL_CLUSTER_NAME, Project, Target,
};

use crate::cluster_ports::ClusterClient;
use crate::common::ListPage;
use crate::datastore_ports::{EntityStore, FilterOptions, ListOptions};

/// Input payload for creating a delivery target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateTargetInput {
    /// Unique target name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Free-form description.
    pub description: String,
    /// Owning project.
    pub project: String,
    /// Deployment location. Defaults to the local cluster and a namespace
    /// named after the target.
    pub cluster: Option<ClusterTarget>,
    /// Rendering variables.
    pub variable: JsonObject,
}

/// Input payload for updating a delivery target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateTargetInput {
    /// New display alias.
    pub alias: String,
    /// New description.
    pub description: String,
    /// Replacement variables.
    pub variable: JsonObject,
}

/// Application service for delivery targets.
#[derive(Clone)]
pub struct TargetService {
    store: EntityStore,
    cluster: Arc<dyn ClusterClient>,
}

impl TargetService {
    /// Creates a new target service.
    #[must_use]
    pub fn new(store: EntityStore, cluster: Arc<dyn ClusterClient>) -> Self {
        Self { store, cluster }
    }

    /// Assigns targets created without a project to the default project.
    pub async fn init(&self) -> AppResult<()> {
        let orphans = self
            .store
            .list(
                &Target::default(),
                &ListOptions::filtered(FilterOptions::default().with_not_exist("project")),
            )
            .await?;

        for target in orphans {
            let name = target.name.clone();
            self.store
                .put(Target {
                    project: DEFAULT_PROJECT_NAME.to_owned(),
                    ..target
                })
                .await?;
            info!(target = %name, "assigned target to the default project");
        }
        Ok(())
    }

    /// Creates a target and its namespace.
    pub async fn create_target(&self, input: CreateTargetInput) -> AppResult<Target> {
        let name = NonEmptyString::required("target name", input.name)?;
        let project = NonEmptyString::required("target project", input.project)?;
        if !self.store.is_exist(&Project::key(project.as_str())).await? {
            return Err(AppError::NotFound(format!(
                "project '{project}' is not exist"
            )));
        }
        if self.store.is_exist(&Target::key(name.as_str())).await? {
            return Err(AppError::Conflict("the target is exist".to_owned()));
        }

        let mut cluster = input.cluster.unwrap_or_default();
        if cluster.cluster_name.is_empty() {
            cluster.cluster_name = LOCAL_CLUSTER_NAME.to_owned();
        }
        if cluster.namespace.is_empty() {
            cluster.namespace = name.clone();
        }

        let occupied = self
            .store
            .list(
                &Target {
                    cluster: Some(cluster.clone()),
                    ..Target::default()
                },
                &ListOptions::default(),
            )
            .await?;
        if let Some(owner) = occupied.first() {
            return Err(AppError::Conflict(format!(
                "the namespace {} of cluster {} is used by target '{}'",
                cluster.namespace, cluster.cluster_name, owner.name
            )));
        }

        self.cluster
            .ensure_namespace(
                &cluster.cluster_name,
                &cluster.namespace,
                &BTreeMap::from([(LABEL_NAMESPACE_OF_TARGET.to_owned(), name.clone())]),
            )
            .await?;

        let target = self
            .store
            .add(Target {
                alias: input.alias,
                description: input.description,
                project,
                cluster: Some(cluster),
                variable: input.variable,
                ..Target::key(name)
            })
            .await?;

        info!(target = %target.name, project = %target.project, "created target");
        Ok(target)
    }

    /// Updates the alias, description and variables of a target.
    pub async fn update_target(&self, name: &str, input: UpdateTargetInput) -> AppResult<Target> {
        let mut target = self.detail_target(name).await?;
        target.alias = input.alias;
        target.description = input.description;
        target.variable = input.variable;
        self.store.put(target).await
    }

    /// Deletes a target that no environment uses.
    pub async fn delete_target(&self, name: &str) -> AppResult<()> {
        let target = self.detail_target(name).await?;

        let envs = self
            .store
            .list(
                &Env {
                    project: target.project.clone(),
                    ..Env::default()
                },
                &ListOptions::default(),
            )
            .await?;
        if let Some(env) = envs
            .iter()
            .find(|env| env.targets.iter().any(|candidate| candidate == name))
        {
            return Err(AppError::Conflict(format!(
                "the target is used by environment '{}'",
                env.name
            )));
        }

        if let Some(cluster) = &target.cluster {
            self.cluster
                .remove_namespace_labels(
                    &cluster.cluster_name,
                    &cluster.namespace,
                    &[LABEL_NAMESPACE_OF_TARGET],
                )
                .await?;
        }
        self.store.delete(&target).await?;

        info!(target = %name, "deleted target");
        Ok(())
    }

    /// Lists targets newest first, optionally scoped to a project.
    pub async fn list_targets(
        &self,
        page: usize,
        page_size: usize,
        project: &str,
    ) -> AppResult<ListPage<Target>> {
        let template = Target {
            project: project.to_owned(),
            ..Target::default()
        };
        let items = self
            .store
            .list(
                &template,
                &ListOptions::default()
                    .newest_first("createTime")
                    .paged(page, page_size),
            )
            .await?;
        let total = self
            .store
            .count(&template, &FilterOptions::default())
            .await?;

        Ok(ListPage { items, total })
    }

    /// Returns one target.
    pub async fn detail_target(&self, name: &str) -> AppResult<Target> {
        self.store
            .get(&Target::key(name))
            .await?
            .ok_or_else(|| AppError::NotFound("the target is not exist".to_owned()))
    }

    /// Returns the targets of a project with the given names.
    pub async fn list_named_targets(
        &self,
        project: &str,
        names: &[String],
    ) -> AppResult<Vec<Target>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        self.store
            .list(
                &Target {
                    project: project.to_owned(),
                    ..Target::default()
                },
                &ListOptions::filtered(FilterOptions::default().with_in("name", names.to_vec())),
            )
            .await
    }
}
