use tracing::info;
use vela_console_core::{AppError, AppResult, NonEmptyString, UserIdentity};
use vela_console_domain::{Application, ApplicationPolicy, JsonObject};

use super::ApplicationService;
use crate::datastore_ports::ListOptions;

/// Input payload for adding a policy to an application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatePolicyInput {
    /// Policy name, unique within the application.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// PolicyDefinition name.
    pub policy_type: String,
    /// Policy parameters.
    pub properties: JsonObject,
}

/// Input payload for updating a policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePolicyInput {
    /// New description.
    pub description: String,
    /// New PolicyDefinition name.
    pub policy_type: String,
    /// Replacement parameters.
    pub properties: JsonObject,
}

impl ApplicationService {
    /// Adds a policy shared by every environment of the application.
    pub async fn create_policy(
        &self,
        actor: &UserIdentity,
        app: &Application,
        input: CreatePolicyInput,
    ) -> AppResult<ApplicationPolicy> {
        let name = NonEmptyString::required("policy name", input.name)?;
        let policy_type = NonEmptyString::required("policy type", input.policy_type)?;
        let key = ApplicationPolicy::key(app.name.as_str(), name.as_str());
        if self.store.is_exist(&key).await? {
            return Err(AppError::Conflict("the policy name is exist".to_owned()));
        }

        let policy = self
            .store
            .add(ApplicationPolicy {
                description: input.description,
                policy_type,
                creator: actor.subject().to_owned(),
                properties: input.properties,
                ..key
            })
            .await?;

        info!(app = %app.name, policy = %policy.name, policy_type = %policy.policy_type, "added policy");
        Ok(policy)
    }

    /// Updates a policy.
    pub async fn update_policy(
        &self,
        app: &Application,
        name: &str,
        input: UpdatePolicyInput,
    ) -> AppResult<ApplicationPolicy> {
        let mut policy = self.detail_policy(app, name).await?;
        policy.description = input.description;
        policy.policy_type = NonEmptyString::required("policy type", input.policy_type)?;
        policy.properties = input.properties;
        self.store.put(policy).await
    }

    /// Returns one policy.
    pub async fn detail_policy(&self, app: &Application, name: &str) -> AppResult<ApplicationPolicy> {
        self.store
            .get(&ApplicationPolicy::key(app.name.as_str(), name))
            .await?
            .ok_or_else(|| AppError::NotFound("the policy is not exist".to_owned()))
    }

    /// Lists the policies of an application, newest first.
    pub async fn list_policies(&self, app: &Application) -> AppResult<Vec<ApplicationPolicy>> {
        self.store
            .list(
                &ApplicationPolicy {
                    app_primary_key: app.name.clone(),
                    ..ApplicationPolicy::default()
                },
                &ListOptions::default().newest_first("createTime"),
            )
            .await
    }

    /// Deletes a policy no workflow step references.
    pub async fn delete_policy(&self, app: &Application, name: &str) -> AppResult<()> {
        let policy = self.detail_policy(app, name).await?;

        for workflow in self.workflow_service.list_application_workflows(app).await? {
            if let Some(step) = workflow.steps.iter().find(|step| {
                step.property_str("policy") == name
                    || step.deploy_policies().iter().any(|used| used == name)
            }) {
                return Err(AppError::Conflict(format!(
                    "the policy is used by step '{}' of workflow '{}'",
                    step.name, workflow.name
                )));
            }
        }

        self.store.delete(&policy).await?;
        info!(app = %app.name, policy = %name, "deleted policy");
        Ok(())
    }
}
