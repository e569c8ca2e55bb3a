use std::collections::BTreeMap;

use tracing::error;
use vela_console_core::{AppError, AppResult, UserIdentity};
use vela_console_domain::Permission;

use super::{UserBase, UserService};
use crate::common::ProjectBase;

/// Projects and permissions of the logged-in user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginUserInfo {
    /// Public user fields.
    pub user: UserBase,
    /// Projects the user is a member of.
    pub projects: Vec<ProjectBase>,
    /// Project-scoped permissions keyed by project name.
    pub project_permissions: BTreeMap<String, Vec<Permission>>,
    /// Platform permissions.
    pub platform_permissions: Vec<Permission>,
}

impl UserService {
    /// Returns the projects and permissions of the acting user.
    pub async fn detail_login_user_info(&self, actor: &UserIdentity) -> AppResult<LoginUserInfo> {
        let user = self
            .get_user(actor.subject())
            .await
            .map_err(|_| AppError::Unauthorized("the login user is not exist".to_owned()))?;
        let projects = self.rbac_service.member_projects(&user.name).await?;

        let mut project_permissions = BTreeMap::new();
        for project in &projects {
            match self
                .rbac_service
                .get_user_permissions(&user, &project.name, false)
                .await
            {
                Ok(permissions) => {
                    project_permissions.insert(project.name.clone(), permissions);
                }
                Err(err) => {
                    error!(
                        user = %user.name,
                        project = %project.name,
                        error = %err,
                        "failed to list project permissions of the login user"
                    );
                }
            }
        }

        let platform_permissions = self
            .rbac_service
            .get_user_permissions(&user, "", true)
            .await
            .unwrap_or_else(|err| {
                error!(user = %user.name, error = %err, "failed to list platform permissions");
                Vec::new()
            });

        Ok(LoginUserInfo {
            user: UserBase::from(&user),
            projects,
            project_permissions,
            platform_permissions,
        })
    }
}
