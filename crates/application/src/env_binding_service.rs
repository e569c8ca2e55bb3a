//! Bindings between applications and environments.
//!
//! Binding an application to an environment creates the environment workflow
//! `workflow-{env}` with one deploy step per delivery target and the placement
//! policies the steps use.

use std::sync::Arc;

use tracing::{error, info};
use vela_console_core::{AppError, AppResult};
use vela_console_domain::{
    Application, ApplicationPolicy, ApplicationRevision, Env, EnvBinding, RevisionStatus, Target,
    env_workflow_name,
};

use crate::cluster_ports::ClusterClient;
use crate::datastore_ports::{EntityStore, ListOptions};
use crate::workflow_service::{CreateWorkflowInput, WorkflowService};

/// An environment binding with its environment and targets resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvBindingDetail {
    /// Stored binding.
    pub binding: EnvBinding,
    /// Bound environment.
    pub env: Env,
    /// Targets of the environment, in deploy order.
    pub targets: Vec<Target>,
    /// Name of the environment workflow.
    pub workflow_name: String,
    /// Whether the Application resource exists in the environment namespace.
    pub app_deployed: bool,
}

/// Application service for environment bindings.
#[derive(Clone)]
pub struct EnvBindingService {
    store: EntityStore,
    cluster: Arc<dyn ClusterClient>,
    workflow_service: WorkflowService,
}

impl EnvBindingService {
    /// Creates a new environment binding service.
    #[must_use]
    pub fn new(
        store: EntityStore,
        cluster: Arc<dyn ClusterClient>,
        workflow_service: WorkflowService,
    ) -> Self {
        Self {
            store,
            cluster,
            workflow_service,
        }
    }

    /// Binds an application to an environment.
    pub async fn create_env_binding(
        &self,
        app: &Application,
        env_name: &str,
    ) -> AppResult<EnvBindingDetail> {
        self.bind(app, env_name, false).await?;
        self.detail_env_binding(app, env_name).await
    }

    /// Binds an application to several environments. The workflow of the
    /// first environment becomes the default workflow.
    pub async fn batch_create_env_binding(
        &self,
        app: &Application,
        env_names: &[String],
    ) -> AppResult<()> {
        for (index, env_name) in env_names.iter().enumerate() {
            self.bind(app, env_name, index == 0).await?;
        }
        Ok(())
    }

    async fn bind(&self, app: &Application, env_name: &str, default: bool) -> AppResult<()> {
        let env = self.get_env(env_name).await?;
        let binding = EnvBinding::key(app.name.as_str(), env.name.as_str());
        if self.store.is_exist(&binding).await? {
            return Err(AppError::Conflict("the env binding is exist".to_owned()));
        }
        self.store.add(binding).await?;

        if let Err(err) = self.create_env_workflow(app, &env, default).await {
            if let Err(rollback) = self
                .store
                .delete(&EnvBinding::key(app.name.as_str(), env.name.as_str()))
                .await
            {
                error!(app = %app.name, env = %env.name, error = %rollback, "failed to roll back env binding");
            }
            return Err(err);
        }

        info!(app = %app.name, env = %env.name, "bound application to env");
        Ok(())
    }

    async fn create_env_workflow(
        &self,
        app: &Application,
        env: &Env,
        default: bool,
    ) -> AppResult<()> {
        let generated = self.workflow_service.generate_env_workflow(app, env).await?;
        let workflow = self
            .workflow_service
            .create_or_update_workflow(
                app,
                CreateWorkflowInput {
                    name: env_workflow_name(&env.name),
                    alias: format!("{} Workflow", env.alias),
                    description: "Created automatically by envbinding.".to_owned(),
                    env_name: env.name.clone(),
                    default,
                    steps: generated.steps,
                },
            )
            .await?;

        if generated.policies.is_empty() {
            return Ok(());
        }
        if let Err(err) = self.store.batch_add(generated.policies).await {
            if let Err(rollback) = self.workflow_service.delete_workflow(app, &workflow.name).await
            {
                error!(app = %app.name, workflow = %workflow.name, error = %rollback, "failed to roll back env workflow");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Re-plans the environment workflow of a binding against the current
    /// targets of the environment.
    pub async fn update_env_binding(
        &self,
        app: &Application,
        env_name: &str,
    ) -> AppResult<EnvBindingDetail> {
        self.get_binding(app, env_name).await?;
        let env = self.get_env(env_name).await?;
        self.workflow_service.update_env_workflow(app, &env).await?;
        self.detail_env_binding(app, env_name).await
    }

    /// Unbinds an application from an environment, removing the environment
    /// workflow and its policies.
    ///
    /// Refused while the application is still deployed to the environment.
    pub async fn delete_env_binding(&self, app: &Application, env_name: &str) -> AppResult<()> {
        let binding = self.get_binding(app, env_name).await?;
        if let Some(env) = self.store.get(&Env::key(env_name)).await?
            && self
                .cluster
                .get_application(&env.namespace, &app.name)
                .await?
                .is_some()
        {
            return Err(AppError::Conflict(
                "please recycle the application from this env first".to_owned(),
            ));
        }

        self.store.delete(&binding).await?;

        if let Err(err) = self
            .workflow_service
            .delete_workflow(app, &env_workflow_name(env_name))
            .await
            && !err.is_not_found()
        {
            return Err(err);
        }

        let policies = self
            .store
            .list(
                &ApplicationPolicy {
                    app_primary_key: app.name.clone(),
                    env_name: env_name.to_owned(),
                    ..ApplicationPolicy::default()
                },
                &ListOptions::default(),
            )
            .await?;
        for policy in policies {
            if let Err(err) = self.store.delete(&policy).await {
                error!(app = %app.name, policy = %policy.name, error = %err, "failed to delete env policy");
            }
        }

        info!(app = %app.name, env = %env_name, "unbound application from env");
        Ok(())
    }

    /// Removes every binding of an application.
    pub async fn batch_delete_env_binding(&self, app: &Application) -> AppResult<()> {
        for binding in self.bindings(app).await? {
            self.delete_env_binding(app, &binding.name).await?;
        }
        Ok(())
    }

    /// Lists the bindings of an application, skipping missing environments.
    pub async fn list_env_bindings(&self, app: &Application) -> AppResult<Vec<EnvBindingDetail>> {
        let mut details = Vec::new();
        for binding in self.bindings(app).await? {
            match self.detail_env_binding(app, &binding.name).await {
                Ok(detail) => details.push(detail),
                Err(AppError::NotFound(_)) => {
                    error!(app = %app.name, env = %binding.name, "env binding of a missing env");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(details)
    }

    /// Returns one binding with its environment and targets.
    pub async fn detail_env_binding(
        &self,
        app: &Application,
        env_name: &str,
    ) -> AppResult<EnvBindingDetail> {
        let binding = self.get_binding(app, env_name).await?;
        let env = self.get_env(env_name).await?;

        let mut targets = Vec::with_capacity(env.targets.len());
        for name in &env.targets {
            if let Some(target) = self.store.get(&Target::key(name.as_str())).await? {
                targets.push(target);
            }
        }
        let app_deployed = self
            .cluster
            .get_application(&env.namespace, &app.name)
            .await?
            .is_some();

        Ok(EnvBindingDetail {
            binding,
            workflow_name: env_workflow_name(&env.name),
            env,
            targets,
            app_deployed,
        })
    }

    /// Deletes the Application resource of an environment and terminates the
    /// revisions still running there.
    pub async fn application_recycle_env(&self, app: &Application, env_name: &str) -> AppResult<()> {
        self.get_binding(app, env_name).await?;
        let env = self.get_env(env_name).await?;
        self.cluster
            .delete_application(&env.namespace, &app.name)
            .await?;

        let running = self
            .store
            .list(
                &ApplicationRevision {
                    app_primary_key: app.name.clone(),
                    env_name: env.name.clone(),
                    status: Some(RevisionStatus::Running),
                    ..ApplicationRevision::default()
                },
                &ListOptions::default(),
            )
            .await?;
        for mut revision in running {
            revision.status = Some(RevisionStatus::Terminated);
            self.store.put(revision).await?;
        }

        info!(app = %app.name, env = %env.name, namespace = %env.namespace, "recycled application from env");
        Ok(())
    }

    async fn bindings(&self, app: &Application) -> AppResult<Vec<EnvBinding>> {
        self.store
            .list(
                &EnvBinding {
                    app_primary_key: app.name.clone(),
                    ..EnvBinding::default()
                },
                &ListOptions::default(),
            )
            .await
    }

    async fn get_binding(&self, app: &Application, env_name: &str) -> AppResult<EnvBinding> {
        self.store
            .get(&EnvBinding::key(app.name.as_str(), env_name))
            .await?
            .ok_or_else(|| AppError::NotFound("the env binding is not exist".to_owned()))
    }

    async fn get_env(&self, env_name: &str) -> AppResult<Env> {
        self.store
            .get(&Env::key(env_name))
            .await?
            .ok_or_else(|| AppError::NotFound("the env is not exist".to_owned()))
    }
}

#[cfg(test)]
mod tests;
