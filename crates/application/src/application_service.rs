//! Applications: the components, traits and policies they are assembled
//! from, and their deployment to environments.

mod components;
mod deploy;
mod policies;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};
use vela_console_core::{AppError, AppResult, NonEmptyString, UserIdentity};
use vela_console_domain::{
    Application, ApplicationComponent, ApplicationRevision, Env, EnvBinding, Project,
};

use crate::cluster_ports::ClusterClient;
use crate::common::NameAlias;
use crate::datastore_ports::{EntityStore, FilterOptions, ListOptions};
use crate::definition_service::DefinitionService;
use crate::env_binding_service::EnvBindingService;
use crate::rbac_service::RbacService;
use crate::workflow_service::WorkflowService;

pub use components::{
    CreateComponentInput, CreateTraitInput, UpdateComponentInput, UpdateTraitInput,
};
pub use deploy::DeployInput;
pub use policies::{CreatePolicyInput, UpdatePolicyInput};

/// Input payload for creating an application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateApplicationInput {
    /// Unique application name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Free-form description.
    pub description: String,
    /// Icon URL.
    pub icon: String,
    /// Labels copied onto the rendered resource.
    pub labels: BTreeMap<String, String>,
    /// Owning project.
    pub project: String,
    /// Optional main component.
    pub component: Option<CreateComponentInput>,
    /// Environments to bind. The first one's workflow becomes the default.
    pub env_bindings: Vec<String>,
}

/// Input payload for updating an application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateApplicationInput {
    /// New display alias.
    pub alias: String,
    /// New description.
    pub description: String,
    /// New icon URL.
    pub icon: String,
    /// Replacement labels.
    pub labels: BTreeMap<String, String>,
}

/// Filters for listing applications. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListApplicationOptions {
    /// Owning project.
    pub project: String,
    /// Bound environment.
    pub env: String,
    /// Delivery target of a bound environment.
    pub target: String,
    /// Substring of the name, alias or description.
    pub query: String,
}

/// Application summary with its project resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationBase {
    /// Application name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Free-form description.
    pub description: String,
    /// Icon URL.
    pub icon: String,
    /// Labels.
    pub labels: BTreeMap<String, String>,
    /// Owning project.
    pub project: NameAlias,
    /// Creation time.
    pub create_time: Option<DateTime<Utc>>,
    /// Last update time.
    pub update_time: Option<DateTime<Utc>>,
}

/// Application summary with the names of its policies and bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationDetail {
    /// Summary.
    pub base: ApplicationBase,
    /// Policy names.
    pub policies: Vec<String>,
    /// Bound environment names.
    pub env_bindings: Vec<String>,
    /// Number of components.
    pub component_count: u64,
}

/// Counters shown on the application overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplicationStatistics {
    /// Bound environments.
    pub env_count: u64,
    /// Distinct delivery targets across the bound environments.
    pub target_count: u64,
    /// Recorded deployments.
    pub revision_count: u64,
    /// Workflows.
    pub workflow_count: u64,
}

/// Application service for applications.
#[derive(Clone)]
pub struct ApplicationService {
    store: EntityStore,
    cluster: Arc<dyn ClusterClient>,
    workflow_service: WorkflowService,
    env_binding_service: EnvBindingService,
    definition_service: DefinitionService,
    rbac_service: RbacService,
}

impl ApplicationService {
    /// Creates a new application service.
    #[must_use]
    pub fn new(
        store: EntityStore,
        cluster: Arc<dyn ClusterClient>,
        workflow_service: WorkflowService,
        env_binding_service: EnvBindingService,
        definition_service: DefinitionService,
        rbac_service: RbacService,
    ) -> Self {
        Self {
            store,
            cluster,
            workflow_service,
            env_binding_service,
            definition_service,
            rbac_service,
        }
    }

    /// Creates an application with an optional main component and
    /// environment bindings.
    pub async fn create_application(
        &self,
        actor: &UserIdentity,
        input: CreateApplicationInput,
    ) -> AppResult<ApplicationBase> {
        let name = NonEmptyString::required("application name", input.name)?;
        if self.store.is_exist(&Application::key(name.as_str())).await? {
            return Err(AppError::Conflict(
                "the application name is exist".to_owned(),
            ));
        }
        let project = self
            .store
            .get(&Project::key(input.project.as_str()))
            .await?
            .ok_or_else(|| AppError::NotFound("the project is not exist".to_owned()))?;

        let app = Application {
            alias: input.alias,
            description: input.description,
            icon: input.icon,
            labels: input.labels,
            project: project.name.clone(),
            ..Application::key(name)
        };

        if let Some(component) = input.component {
            self.add_component(actor, &app, component, true).await?;
        }
        if !input.env_bindings.is_empty() {
            self.env_binding_service
                .batch_create_env_binding(&app, &input.env_bindings)
                .await?;
        }
        let app = self.store.add(app).await?;

        info!(app = %app.name, project = %app.project, user = %actor.subject(), "created application");
        Ok(application_base(app, project.alias))
    }

    /// Updates the descriptive fields of an application.
    pub async fn update_application(
        &self,
        name: &str,
        input: UpdateApplicationInput,
    ) -> AppResult<ApplicationBase> {
        let mut app = self.get_application(name).await?;
        app.alias = input.alias;
        app.description = input.description;
        app.icon = input.icon;
        app.labels = input.labels;
        let app = self.store.put(app).await?;
        self.base(app).await
    }

    /// Returns one application.
    pub async fn get_application(&self, name: &str) -> AppResult<Application> {
        self.store
            .get(&Application::key(name))
            .await?
            .ok_or_else(|| AppError::NotFound("the application is not exist".to_owned()))
    }

    /// Returns one application with its policy and binding names.
    pub async fn detail_application(&self, name: &str) -> AppResult<ApplicationDetail> {
        let app = self.get_application(name).await?;
        let policies = self
            .list_policies(&app)
            .await?
            .into_iter()
            .map(|policy| policy.name)
            .collect();
        let env_bindings = self
            .bindings(&app)
            .await?
            .into_iter()
            .map(|binding| binding.name)
            .collect();
        let component_count = self
            .store
            .count(
                &ApplicationComponent {
                    app_primary_key: app.name.clone(),
                    ..ApplicationComponent::default()
                },
                &FilterOptions::default(),
            )
            .await?;

        Ok(ApplicationDetail {
            base: self.base(app).await?,
            policies,
            env_bindings,
            component_count,
        })
    }

    /// Lists the applications of the projects the actor can see, most
    /// recently updated first.
    pub async fn list_applications(
        &self,
        actor: &UserIdentity,
        options: &ListApplicationOptions,
    ) -> AppResult<Vec<ApplicationBase>> {
        let mut projects = self.rbac_service.accessible_projects(actor).await?;
        if !options.project.is_empty() {
            projects.retain(|project| project == &options.project);
        }
        if projects.is_empty() {
            return Ok(Vec::new());
        }

        let apps = self
            .store
            .list(
                &Application::default(),
                &ListOptions::filtered(FilterOptions::default().with_in("project", projects)),
            )
            .await?;

        let bound = self.bound_apps(options).await?;
        let mut matched = Vec::new();
        for app in apps {
            if !options.query.is_empty()
                && !(app.name.contains(&options.query)
                    || app.alias.contains(&options.query)
                    || app.description.contains(&options.query))
            {
                continue;
            }
            if let Some(bound) = &bound
                && !bound.contains(&app.name)
            {
                continue;
            }
            matched.push(self.base(app).await?);
        }

        matched.sort_by(|left, right| right.update_time.cmp(&left.update_time));
        Ok(matched)
    }

    /// Names of the applications bound to the environment or target filter,
    /// or `None` when neither filter is set.
    async fn bound_apps(
        &self,
        options: &ListApplicationOptions,
    ) -> AppResult<Option<HashSet<String>>> {
        if options.env.is_empty() && options.target.is_empty() {
            return Ok(None);
        }

        let mut envs = self
            .store
            .list(&Env::default(), &ListOptions::default())
            .await?;
        envs.retain(|env| {
            (options.env.is_empty() || env.name == options.env)
                && (options.target.is_empty() || env.targets.contains(&options.target))
        });

        let mut bound = HashSet::new();
        for env in envs {
            let bindings = self
                .store
                .list(
                    &EnvBinding {
                        name: env.name.clone(),
                        ..EnvBinding::default()
                    },
                    &ListOptions::default(),
                )
                .await?;
            bound.extend(bindings.into_iter().map(|binding| binding.app_primary_key));
        }
        Ok(Some(bound))
    }

    /// Deletes an application with everything it owns.
    ///
    /// Refused while the application is deployed to any environment.
    pub async fn delete_application(&self, name: &str) -> AppResult<()> {
        let app = self.get_application(name).await?;

        for binding in self.bindings(&app).await? {
            let Some(env) = self.store.get(&Env::key(binding.name.as_str())).await? else {
                continue;
            };
            if self
                .cluster
                .get_application(&env.namespace, &app.name)
                .await?
                .is_some()
            {
                return Err(AppError::Conflict(format!(
                    "the application is deployed to env '{}', please recycle it first",
                    env.name
                )));
            }
        }

        if let Err(err) = self.workflow_service.delete_workflows_by_app(&app).await {
            error!(app = %app.name, error = %err, "failed to delete workflows");
        }

        let components = self.list_components(&app).await?;
        for component in components {
            if let Err(err) = self.store.delete(&component).await {
                error!(app = %app.name, component = %component.name, error = %err, "failed to delete component");
            }
        }
        let policies = self.list_policies(&app).await?;
        for policy in policies {
            if let Err(err) = self.store.delete(&policy).await {
                error!(app = %app.name, policy = %policy.name, error = %err, "failed to delete policy");
            }
        }
        let revisions = self
            .store
            .list(
                &ApplicationRevision {
                    app_primary_key: app.name.clone(),
                    ..ApplicationRevision::default()
                },
                &ListOptions::default(),
            )
            .await?;
        for revision in revisions {
            if let Err(err) = self.store.delete(&revision).await {
                error!(app = %app.name, revision = %revision.version, error = %err, "failed to delete revision");
            }
        }
        if let Err(err) = self.env_binding_service.batch_delete_env_binding(&app).await {
            error!(app = %app.name, error = %err, "failed to delete env bindings");
        }

        self.store.delete(&app).await?;
        info!(app = %name, "deleted application");
        Ok(())
    }

    /// Returns the overview counters of an application.
    pub async fn statistics(&self, name: &str) -> AppResult<ApplicationStatistics> {
        let app = self.get_application(name).await?;
        let bindings = self.bindings(&app).await?;

        let mut targets = HashSet::new();
        for binding in &bindings {
            if let Some(env) = self.store.get(&Env::key(binding.name.as_str())).await? {
                targets.extend(env.targets);
            }
        }
        let revision_count = self
            .store
            .count(
                &ApplicationRevision {
                    app_primary_key: app.name.clone(),
                    ..ApplicationRevision::default()
                },
                &FilterOptions::default(),
            )
            .await?;
        let workflow_count = self
            .workflow_service
            .list_application_workflows(&app)
            .await?
            .len();

        Ok(ApplicationStatistics {
            env_count: bindings.len() as u64,
            target_count: targets.len() as u64,
            revision_count,
            workflow_count: workflow_count as u64,
        })
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

    async fn base(&self, app: Application) -> AppResult<ApplicationBase> {
        let project_alias = self
            .store
            .get(&Project::key(app.project.as_str()))
            .await?
            .map(|project| project.alias)
            .unwrap_or_default();
        Ok(application_base(app, project_alias))
    }
}

fn application_base(app: Application, project_alias: String) -> ApplicationBase {
    ApplicationBase {
        project: NameAlias::new(app.project, project_alias),
        name: app.name,
        alias: app.alias,
        description: app.description,
        icon: app.icon,
        labels: app.labels,
        create_time: app.timestamps.create_time,
        update_time: app.timestamps.update_time,
    }
}
