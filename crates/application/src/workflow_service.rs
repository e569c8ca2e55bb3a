//! Application workflows and their execution records.
//!
//! Every environment an application is bound to owns one generated workflow
//! named `workflow-{env}`. Its deploy steps and placement policies follow the
//! delivery targets of the environment; see [`WorkflowService::update_env_workflow`].

mod env_workflow;
mod records;

use tracing::{error, info};
use vela_console_core::{AppError, AppResult, NonEmptyString};
use vela_console_domain::{Application, Workflow, WorkflowRecord, WorkflowStep};

use crate::datastore_ports::{EntityStore, ListOptions};
use crate::definition_service::DefinitionService;

pub use env_workflow::EnvWorkflow;

/// Input payload for creating or replacing a workflow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateWorkflowInput {
    /// Workflow name, unique within the application.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Free-form description.
    pub description: String,
    /// Environment the workflow deploys to.
    pub env_name: String,
    /// Whether this is the default workflow.
    pub default: bool,
    /// Ordered steps.
    pub steps: Vec<WorkflowStep>,
}

/// Application service for workflows.
#[derive(Clone)]
pub struct WorkflowService {
    store: EntityStore,
    definition_service: DefinitionService,
}

impl WorkflowService {
    /// Creates a new workflow service.
    #[must_use]
    pub fn new(store: EntityStore, definition_service: DefinitionService) -> Self {
        Self {
            store,
            definition_service,
        }
    }

    /// Creates a workflow, or replaces the steps of an existing one.
    ///
    /// Several workflows may be marked default; the first one listed wins.
    pub async fn create_or_update_workflow(
        &self,
        app: &Application,
        input: CreateWorkflowInput,
    ) -> AppResult<Workflow> {
        if input.env_name.is_empty() {
            return Err(AppError::Validation(
                "the workflow must belong to an environment".to_owned(),
            ));
        }
        let name = NonEmptyString::required("workflow name", input.name)?;

        if let Some(mut workflow) = self.get_workflow(app, &name).await? {
            workflow.steps = input.steps;
            workflow.alias = input.alias;
            workflow.description = input.description;
            workflow.default = Some(input.default);
            return self.store.put(workflow).await;
        }

        let workflow = self
            .store
            .add(Workflow {
                alias: input.alias,
                description: input.description,
                enable: true,
                default: Some(input.default),
                env_name: input.env_name,
                steps: input.steps,
                ..Workflow::key(app.name.as_str(), name)
            })
            .await?;

        info!(app = %app.name, workflow = %workflow.name, "created workflow");
        Ok(workflow)
    }

    async fn delete_records(&self, app_name: &str, workflow_name: &str) {
        let template = WorkflowRecord {
            app_primary_key: app_name.to_owned(),
            workflow_name: workflow_name.to_owned(),
            ..WorkflowRecord::default()
        };
        let records = match self.store.list(&template, &ListOptions::default()).await {
            Ok(records) => records,
            Err(err) => {
                error!(app = %app_name, workflow = %workflow_name, error = %err, "failed to list workflow records");
                return;
            }
        };
        for record in records {
            if let Err(err) = self.store.delete(&record).await {
                error!(record = %record.name, error = %err, "failed to delete workflow record");
            }
        }
    }

    /// Deletes a workflow and its records.
    pub async fn delete_workflow(&self, app: &Application, workflow_name: &str) -> AppResult<()> {
        self.delete_records(&app.name, workflow_name).await;

        match self
            .store
            .delete(&Workflow::key(app.name.as_str(), workflow_name))
            .await
        {
            Err(AppError::NotFound(_)) => {
                Err(AppError::NotFound("the workflow is not exist".to_owned()))
            }
            other => other,
        }
    }

    /// Deletes every workflow of an application and their records.
    pub async fn delete_workflows_by_app(&self, app: &Application) -> AppResult<()> {
        let workflows = self.list_application_workflows(app).await?;
        for workflow in workflows {
            self.delete_records(&app.name, &workflow.name).await;
            if let Err(err) = self.store.delete(&workflow).await {
                error!(app = %app.name, workflow = %workflow.name, error = %err, "failed to delete workflow");
            }
        }
        Ok(())
    }

    /// Lists the workflows of an application.
    pub async fn list_application_workflows(&self, app: &Application) -> AppResult<Vec<Workflow>> {
        self.store
            .list(
                &Workflow {
                    app_primary_key: app.name.clone(),
                    ..Workflow::default()
                },
                &ListOptions::default(),
            )
            .await
    }

    /// Returns one workflow of an application.
    pub async fn get_workflow(
        &self,
        app: &Application,
        workflow_name: &str,
    ) -> AppResult<Option<Workflow>> {
        self.store
            .get(&Workflow::key(app.name.as_str(), workflow_name))
            .await
    }

    /// Returns the default workflow of an application.
    pub async fn get_application_default_workflow(&self, app: &Application) -> AppResult<Workflow> {
        self.store
            .list(
                &Workflow {
                    app_primary_key: app.name.clone(),
                    default: Some(true),
                    ..Workflow::default()
                },
                &ListOptions::default(),
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("no default workflow".to_owned()))
    }
}
