use tracing::warn;
use vela_console_core::{AppError, AppResult};
use vela_console_domain::{
    ANNOTATION_DEPLOY_VERSION, ANNOTATION_PUBLISH_VERSION, Application, ApplicationManifest,
    ApplicationRevision, RevisionStatus, Workflow, WorkflowRecord,
};

use super::WorkflowService;
use crate::common::ListPage;
use crate::datastore_ports::{FilterOptions, ListOptions};

impl WorkflowService {
    /// Records a new execution of a workflow for an applied Application.
    ///
    /// Other running revisions of the application and unfinished records of
    /// the workflow are marked terminated.
    pub async fn create_workflow_record(
        &self,
        app: &Application,
        manifest: &ApplicationManifest,
        workflow: &Workflow,
    ) -> AppResult<WorkflowRecord> {
        let publish_version = manifest
            .annotation(ANNOTATION_PUBLISH_VERSION)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AppError::Validation("failed to get record version from application".to_owned())
            })?;
        let deploy_version = manifest
            .annotation(ANNOTATION_DEPLOY_VERSION)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AppError::Validation("failed to get deploy version from application".to_owned())
            })?;

        let record = self
            .store
            .add(WorkflowRecord {
                app_primary_key: app.name.clone(),
                workflow_name: workflow.name.clone(),
                name: publish_version.to_owned(),
                namespace: manifest.metadata.namespace.clone(),
                revision_primary_key: deploy_version.to_owned(),
                status: RevisionStatus::Running.as_str().to_owned(),
                finished: false,
                ..WorkflowRecord::default()
            })
            .await?;

        self.terminate_previous_runs(app, workflow, deploy_version, publish_version)
            .await?;
        Ok(record)
    }

    async fn terminate_previous_runs(
        &self,
        app: &Application,
        workflow: &Workflow,
        skip_revision: &str,
        skip_record: &str,
    ) -> AppResult<()> {
        let running = self
            .store
            .list(
                &ApplicationRevision {
                    app_primary_key: app.name.clone(),
                    status: Some(RevisionStatus::Running),
                    ..ApplicationRevision::default()
                },
                &ListOptions::default(),
            )
            .await?;
        for mut revision in running {
            if revision.version == skip_revision {
                continue;
            }
            revision.status = Some(RevisionStatus::Terminated);
            let version = revision.version.clone();
            if let Err(err) = self.store.put(revision).await {
                warn!(app = %app.name, revision = %version, error = %err, "failed to terminate revision");
            }
        }

        let records = self
            .store
            .list(
                &WorkflowRecord {
                    app_primary_key: app.name.clone(),
                    workflow_name: workflow.name.clone(),
                    ..WorkflowRecord::default()
                },
                &ListOptions::default(),
            )
            .await?;
        for mut record in records {
            if record.finished || record.name == skip_record {
                continue;
            }
            record.status = RevisionStatus::Terminated.as_str().to_owned();
            record.finished = true;
            let name = record.name.clone();
            if let Err(err) = self.store.put(record).await {
                warn!(app = %app.name, record = %name, error = %err, "failed to terminate workflow record");
            }
        }

        Ok(())
    }

    /// Lists the records of a workflow, newest first.
    pub async fn list_workflow_records(
        &self,
        workflow: &Workflow,
        page: usize,
        page_size: usize,
    ) -> AppResult<ListPage<WorkflowRecord>> {
        let template = WorkflowRecord {
            app_primary_key: workflow.app_primary_key.clone(),
            workflow_name: workflow.name.clone(),
            ..WorkflowRecord::default()
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
}
