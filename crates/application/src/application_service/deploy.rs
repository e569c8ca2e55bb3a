use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{error, info, warn};
use vela_console_core::{AppError, AppResult, UserIdentity};
use vela_console_domain::{
    ANNOTATION_APP_ALIAS, ANNOTATION_DEPLOY_VERSION, ANNOTATION_PUBLISH_VERSION,
    ANNOTATION_WORKFLOW_NAME, AppComponent, AppPolicy, AppTrait, AppWorkflow, AppWorkflowStep,
    Application, ApplicationManifest, ApplicationRevision, Env, LABEL_APP_NAME,
    LABEL_SOURCE_OF_TRUTH, LOCAL_CLUSTER_NAME, ObjectMeta, RevisionStatus,
    SOURCE_OF_TRUTH_FROM_UX, Workflow,
};

use super::ApplicationService;
use crate::common::ListPage;
use crate::datastore_ports::{FilterOptions, ListOptions};

/// Input payload for deploying an application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployInput {
    /// Workflow to run. Empty selects the default workflow.
    pub workflow_name: String,
    /// Free-form release note.
    pub note: String,
    /// What started the deployment, for example `web` or `api`.
    pub trigger_type: String,
    /// Deploy even when the previous deployment has not settled.
    pub force: bool,
}

/// Timestamp version, optionally prefixed.
fn generate_version(prefix: &str) -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S%6f").to_string();
    if prefix.is_empty() {
        stamp
    } else {
        format!("{prefix}-{stamp}")
    }
}

/// A rendered Application resource with the workflow and environment it
/// was rendered for.
struct Rendered {
    manifest: ApplicationManifest,
    workflow: Workflow,
    env: Env,
}

impl ApplicationService {
    async fn select_workflow(&self, app: &Application, workflow_name: &str) -> AppResult<Workflow> {
        let workflow = if workflow_name.is_empty() {
            self.workflow_service
                .get_application_default_workflow(app)
                .await?
        } else {
            self.workflow_service
                .get_workflow(app, workflow_name)
                .await?
                .ok_or_else(|| AppError::NotFound("the workflow is not exist".to_owned()))?
        };
        if workflow.env_name.is_empty() {
            return Err(AppError::NotFound("the workflow is not exist".to_owned()));
        }
        Ok(workflow)
    }

    async fn render(&self, app: &Application, workflow_name: &str, version: &str) -> AppResult<Rendered> {
        let workflow = self.select_workflow(app, workflow_name).await?;
        let env = self
            .store
            .get(&Env::key(workflow.env_name.as_str()))
            .await?
            .ok_or_else(|| AppError::NotFound("the env is not exist".to_owned()))?;

        let components = self.list_components(app).await?;
        if components.is_empty() {
            return Err(AppError::Validation(
                "there is no component in the application".to_owned(),
            ));
        }
        let policies = self
            .list_policies(app)
            .await?
            .into_iter()
            .filter(|policy| policy.env_name.is_empty() || policy.env_name == workflow.env_name);

        let mut labels = app.labels.clone();
        labels.insert(LABEL_APP_NAME.to_owned(), app.name.clone());
        labels.insert(
            LABEL_SOURCE_OF_TRUTH.to_owned(),
            SOURCE_OF_TRUTH_FROM_UX.to_owned(),
        );
        let annotations = BTreeMap::from([
            (ANNOTATION_DEPLOY_VERSION.to_owned(), version.to_owned()),
            (
                ANNOTATION_PUBLISH_VERSION.to_owned(),
                generate_version(&workflow.name),
            ),
            (ANNOTATION_APP_ALIAS.to_owned(), app.alias.clone()),
            (ANNOTATION_WORKFLOW_NAME.to_owned(), workflow.name.clone()),
        ]);

        let mut manifest = ApplicationManifest::new(ObjectMeta {
            name: app.name.clone(),
            namespace: env.namespace.clone(),
            labels,
            annotations,
        });
        manifest.spec.components = components
            .into_iter()
            .map(|component| AppComponent {
                name: component.name,
                component_type: component.component_type,
                properties: component.properties,
                traits: component
                    .traits
                    .into_iter()
                    .map(|attached| AppTrait {
                        trait_type: attached.trait_type,
                        properties: attached.properties,
                    })
                    .collect(),
                depends_on: component.depends_on,
            })
            .collect();
        manifest.spec.policies = policies
            .map(|policy| AppPolicy {
                name: policy.name,
                policy_type: policy.policy_type,
                properties: policy.properties,
            })
            .collect();
        manifest.spec.workflow = Some(AppWorkflow {
            steps: workflow
                .steps
                .iter()
                .map(|step| AppWorkflowStep {
                    name: step.name.clone(),
                    step_type: step.step_type.clone(),
                    properties: step.properties.clone(),
                    depends_on: step.depends_on.clone(),
                })
                .collect(),
        });

        Ok(Rendered {
            manifest,
            workflow,
            env,
        })
    }

    /// Renders the Application resource a deployment with `workflow_name`
    /// would apply, without applying it.
    pub async fn dry_run(
        &self,
        app: &Application,
        workflow_name: &str,
    ) -> AppResult<ApplicationManifest> {
        let rendered = self
            .render(app, workflow_name, &generate_version(""))
            .await?;
        Ok(rendered.manifest)
    }

    /// Fails with `Conflict` unless the latest deployment to the
    /// environment has completed or was terminated.
    async fn check_deploy_conflict(&self, app: &Application, env_name: &str) -> AppResult<()> {
        let latest = self
            .store
            .list(
                &ApplicationRevision {
                    app_primary_key: app.name.clone(),
                    env_name: env_name.to_owned(),
                    ..ApplicationRevision::default()
                },
                &ListOptions::default()
                    .newest_first("createTime")
                    .paged(1, 1),
            )
            .await?;
        let Some(latest) = latest.into_iter().next() else {
            return Ok(());
        };

        let status = if latest.status == Some(RevisionStatus::Rollback) {
            self.store
                .get(&ApplicationRevision::key(
                    app.name.as_str(),
                    latest.rollback_version.as_str(),
                ))
                .await?
                .and_then(|rollback| rollback.status)
        } else {
            latest.status
        };

        if status.is_some_and(|status| status.is_settled()) {
            return Ok(());
        }
        warn!(app = %app.name, revision = %latest.version, "last revision has not settled");
        Err(AppError::Conflict(
            "the application is being deployed, wait for it to finish or force the deploy"
                .to_owned(),
        ))
    }

    /// Deploys an application with a workflow.
    ///
    /// Makes sure the environment namespace exists, records a revision and
    /// applies the rendered resource to the control plane. The revision ends
    /// `running` on success and `failure` when the apply is refused.
    pub async fn deploy(
        &self,
        actor: &UserIdentity,
        app: &Application,
        input: DeployInput,
    ) -> AppResult<ApplicationRevision> {
        let version = generate_version("");
        let Rendered {
            manifest,
            workflow,
            env,
        } = self.render(app, &input.workflow_name, &version).await?;

        if !input.force {
            self.check_deploy_conflict(app, &workflow.env_name).await?;
        }

        self.cluster
            .ensure_namespace(LOCAL_CLUSTER_NAME, &env.namespace, &BTreeMap::new())
            .await?;

        let apply_app_config = serde_json::to_string_pretty(&manifest).map_err(|error| {
            AppError::Internal(format!("failed to encode the application: {error}"))
        })?;
        let mut revision = self
            .store
            .add(ApplicationRevision {
                apply_app_config,
                status: Some(RevisionStatus::Init),
                deploy_user: actor.subject().to_owned(),
                note: input.note,
                trigger_type: input.trigger_type,
                workflow_name: workflow.name.clone(),
                env_name: workflow.env_name.clone(),
                ..ApplicationRevision::key(app.name.as_str(), version)
            })
            .await?;

        if let Err(err) = self.cluster.apply_application(&manifest).await {
            error!(app = %app.name, revision = %revision.version, error = %err, "failed to apply application");
            revision.status = Some(RevisionStatus::Failure);
            revision.reason = err.to_string();
            if let Err(put_err) = self.store.put(revision).await {
                warn!(app = %app.name, error = %put_err, "failed to record the failed revision");
            }
            return Err(AppError::Internal(format!(
                "failed to apply the application: {err}"
            )));
        }

        if let Err(err) = self
            .workflow_service
            .create_workflow_record(app, &manifest, &workflow)
            .await
        {
            warn!(app = %app.name, error = %err, "failed to create workflow record");
        }

        revision.status = Some(RevisionStatus::Running);
        let revision = self.store.put(revision).await?;

        info!(
            app = %app.name,
            revision = %revision.version,
            workflow = %workflow.name,
            namespace = %env.namespace,
            user = %actor.subject(),
            "deployed application"
        );
        Ok(revision)
    }

    /// Lists the revisions of an application newest first, optionally
    /// narrowed to one environment or status.
    pub async fn list_revisions(
        &self,
        app: &Application,
        env_name: &str,
        status: Option<RevisionStatus>,
        page: usize,
        page_size: usize,
    ) -> AppResult<ListPage<ApplicationRevision>> {
        let template = ApplicationRevision {
            app_primary_key: app.name.clone(),
            env_name: env_name.to_owned(),
            status,
            ..ApplicationRevision::default()
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

    /// Returns one revision.
    pub async fn detail_revision(
        &self,
        app: &Application,
        version: &str,
    ) -> AppResult<ApplicationRevision> {
        self.store
            .get(&ApplicationRevision::key(app.name.as_str(), version))
            .await?
            .ok_or_else(|| AppError::NotFound("the revision is not exist".to_owned()))
    }

    /// Records the workflow outcome of a revision.
    pub async fn update_revision_status(
        &self,
        app: &Application,
        version: &str,
        status: RevisionStatus,
        reason: &str,
    ) -> AppResult<ApplicationRevision> {
        let mut revision = self.detail_revision(app, version).await?;
        revision.status = Some(status);
        revision.reason = reason.to_owned();
        self.store.put(revision).await
    }
}
