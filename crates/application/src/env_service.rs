//! Environments: a namespace on the control plane plus the delivery targets
//! an application deploys to when bound to it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};
use vela_console_core::{AppError, AppResult, NonEmptyString, UserIdentity};
use vela_console_domain::{
    Application, Env, EnvBinding, LABEL_CONTROL_PLANE_NAMESPACE_USAGE, LABEL_NAMESPACE_OF_ENV,
    LABEL_NAMESPACE_OF_PROJECT, LOCAL_CLUSTER_NAME, Project, Target,
};

use crate::cluster_ports::ClusterClient;
use crate::common::ListPage;
use crate::datastore_ports::{EntityStore, FilterOptions, ListOptions};
use crate::rbac_service::RbacService;
use crate::workflow_service::WorkflowService;

/// Value of the namespace usage label for environment namespaces.
pub const NAMESPACE_USAGE_ENV: &str = "env";

/// Input payload for creating an environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateEnvInput {
    /// Unique environment name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Free-form description.
    pub description: String,
    /// Control-plane namespace. Defaults to the environment name.
    pub namespace: String,
    /// Owning project.
    pub project: String,
    /// Delivery targets, in deploy order.
    pub targets: Vec<String>,
}

/// Input payload for updating an environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateEnvInput {
    /// New display alias.
    pub alias: String,
    /// New description.
    pub description: String,
    /// Replacement delivery targets.
    pub targets: Vec<String>,
}

/// Environment with its delivery targets resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvDetail {
    /// Stored environment.
    pub env: Env,
    /// Targets in the environment's order. Missing targets are left out.
    pub targets: Vec<Target>,
}

/// Application service for environments.
#[derive(Clone)]
pub struct EnvService {
    store: EntityStore,
    cluster: Arc<dyn ClusterClient>,
    workflow_service: WorkflowService,
    rbac_service: RbacService,
}

impl EnvService {
    /// Creates a new environment service.
    #[must_use]
    pub fn new(
        store: EntityStore,
        cluster: Arc<dyn ClusterClient>,
        workflow_service: WorkflowService,
        rbac_service: RbacService,
    ) -> Self {
        Self {
            store,
            cluster,
            workflow_service,
            rbac_service,
        }
    }

    /// Creates an environment and labels its namespace.
    pub async fn create_env(&self, input: CreateEnvInput) -> AppResult<Env> {
        let name = NonEmptyString::required("env name", input.name)?;
        let project = NonEmptyString::required("env project", input.project)?;
        if !self.store.is_exist(&Project::key(project.as_str())).await? {
            return Err(AppError::NotFound(format!(
                "project '{project}' is not exist"
            )));
        }
        if self.store.is_exist(&Env::key(name.as_str())).await? {
            return Err(AppError::Conflict("the env is exist".to_owned()));
        }

        let namespace = if input.namespace.is_empty() {
            name.clone()
        } else {
            input.namespace
        };
        self.check_namespace_free(&name, &namespace).await?;
        self.check_targets(&name, &project, &input.targets).await?;

        let env = Env {
            alias: input.alias,
            description: input.description,
            namespace,
            project,
            targets: input.targets,
            ..Env::key(name)
        };
        self.label_namespace(&env).await?;
        let env = self.store.add(env).await?;

        info!(env = %env.name, project = %env.project, namespace = %env.namespace, "created env");
        Ok(env)
    }

    /// Updates an environment.
    ///
    /// Changed targets re-plan the environment workflow of every application
    /// bound to the environment.
    pub async fn update_env(&self, name: &str, input: UpdateEnvInput) -> AppResult<Env> {
        let mut env = self.get_env(name).await?;
        self.check_targets(&env.name, &env.project, &input.targets)
            .await?;

        let targets_changed = env.targets != input.targets;
        env.alias = input.alias;
        env.description = input.description;
        env.targets = input.targets;
        let env = self.store.put(env).await?;

        if targets_changed {
            for app in self.bound_applications(&env.name).await? {
                self.workflow_service.update_env_workflow(&app, &env).await?;
            }
        }

        info!(env = %env.name, targets = ?env.targets, "updated env");
        Ok(env)
    }

    /// Deletes an environment no application is bound to.
    ///
    /// Deleting a missing environment succeeds.
    pub async fn delete_env(&self, name: &str) -> AppResult<()> {
        let Some(env) = self.store.get(&Env::key(name)).await? else {
            return Ok(());
        };

        let bindings = self
            .store
            .count(
                &EnvBinding {
                    name: env.name.clone(),
                    ..EnvBinding::default()
                },
                &FilterOptions::default(),
            )
            .await?;
        if bindings > 0 {
            return Err(AppError::Conflict(
                "this env has been used by some applications, please unbind them first".to_owned(),
            ));
        }

        // The project label stays so the namespace remains visible to the project.
        if let Err(error) = self
            .cluster
            .remove_namespace_labels(
                LOCAL_CLUSTER_NAME,
                &env.namespace,
                &[LABEL_NAMESPACE_OF_ENV, LABEL_CONTROL_PLANE_NAMESPACE_USAGE],
            )
            .await
        {
            warn!(
                env = %name,
                namespace = %env.namespace,
                error = %error,
                "failed to reset the env namespace labels"
            );
        }
        self.store.delete(&env).await?;

        info!(env = %name, "deleted env");
        Ok(())
    }

    /// Lists the environments of the projects the actor can see, newest
    /// first. A non-empty `project` narrows the list to that project.
    pub async fn list_envs(
        &self,
        actor: &UserIdentity,
        page: usize,
        page_size: usize,
        project: &str,
    ) -> AppResult<ListPage<EnvDetail>> {
        let mut projects = self.rbac_service.accessible_projects(actor).await?;
        if !project.is_empty() {
            projects.retain(|candidate| candidate == project);
        }
        if projects.is_empty() {
            return Ok(ListPage {
                items: Vec::new(),
                total: 0,
            });
        }

        let filter = FilterOptions::default().with_in("project", projects);
        let envs = self
            .store
            .list(
                &Env::default(),
                &ListOptions::filtered(filter.clone())
                    .newest_first("createTime")
                    .paged(page, page_size),
            )
            .await?;
        let total = self.store.count(&Env::default(), &filter).await?;

        let mut items = Vec::with_capacity(envs.len());
        for env in envs {
            items.push(self.resolve_targets(env).await?);
        }
        Ok(ListPage { items, total })
    }

    /// Returns one environment.
    pub async fn get_env(&self, name: &str) -> AppResult<Env> {
        self.store
            .get(&Env::key(name))
            .await?
            .ok_or_else(|| AppError::NotFound("the env is not exist".to_owned()))
    }

    /// Returns one environment with its targets.
    pub async fn detail_env(&self, name: &str) -> AppResult<EnvDetail> {
        let env = self.get_env(name).await?;
        self.resolve_targets(env).await
    }

    async fn resolve_targets(&self, env: Env) -> AppResult<EnvDetail> {
        let mut targets = Vec::with_capacity(env.targets.len());
        for name in &env.targets {
            match self.store.get(&Target::key(name.as_str())).await? {
                Some(target) => targets.push(target),
                None => warn!(env = %env.name, target = %name, "env lists a missing target"),
            }
        }
        Ok(EnvDetail { env, targets })
    }

    async fn bound_applications(&self, env_name: &str) -> AppResult<Vec<Application>> {
        let bindings = self
            .store
            .list(
                &EnvBinding {
                    name: env_name.to_owned(),
                    ..EnvBinding::default()
                },
                &ListOptions::default(),
            )
            .await?;

        let mut apps = Vec::with_capacity(bindings.len());
        for binding in bindings {
            match self
                .store
                .get(&Application::key(binding.app_primary_key.as_str()))
                .await?
            {
                Some(app) => apps.push(app),
                None => {
                    warn!(env = %env_name, app = %binding.app_primary_key, "env binding of a missing application");
                }
            }
        }
        Ok(apps)
    }

    async fn check_namespace_free(&self, env_name: &str, namespace: &str) -> AppResult<()> {
        let owners = self
            .store
            .list(
                &Env {
                    namespace: namespace.to_owned(),
                    ..Env::default()
                },
                &ListOptions::default(),
            )
            .await?;
        if let Some(owner) = owners.iter().find(|owner| owner.name != env_name) {
            return Err(AppError::Conflict(format!(
                "the namespace {namespace} is used by env '{}'",
                owner.name
            )));
        }

        if let Some(existing) = self
            .cluster
            .get_namespace(LOCAL_CLUSTER_NAME, namespace)
            .await?
            && let Some(owner) = existing.labels.get(LABEL_NAMESPACE_OF_ENV)
            && owner != env_name
        {
            return Err(AppError::Conflict(format!(
                "the namespace {namespace} is used by env '{owner}'"
            )));
        }
        Ok(())
    }

    /// A target must belong to the project and to no other environment of it.
    async fn check_targets(&self, env_name: &str, project: &str, targets: &[String]) -> AppResult<()> {
        for name in targets {
            let target = self.store.get(&Target::key(name.as_str())).await?;
            if target.is_none_or(|target| target.project != project) {
                return Err(AppError::NotFound(format!(
                    "target '{name}' is not exist in project '{project}'"
                )));
            }
        }

        let siblings = self
            .store
            .list(
                &Env {
                    project: project.to_owned(),
                    ..Env::default()
                },
                &ListOptions::default(),
            )
            .await?;
        for sibling in siblings.iter().filter(|sibling| sibling.name != env_name) {
            if let Some(shared) = sibling
                .targets
                .iter()
                .find(|target| targets.contains(target))
            {
                return Err(AppError::Conflict(format!(
                    "the target '{shared}' is already used by env '{}'",
                    sibling.name
                )));
            }
        }
        Ok(())
    }

    async fn label_namespace(&self, env: &Env) -> AppResult<()> {
        self.cluster
            .ensure_namespace(
                LOCAL_CLUSTER_NAME,
                &env.namespace,
                &BTreeMap::from([
                    (LABEL_NAMESPACE_OF_PROJECT.to_owned(), env.project.clone()),
                    (LABEL_NAMESPACE_OF_ENV.to_owned(), env.name.clone()),
                    (
                        LABEL_CONTROL_PLANE_NAMESPACE_USAGE.to_owned(),
                        NAMESPACE_USAGE_ENV.to_owned(),
                    ),
                ]),
            )
            .await
    }
}
