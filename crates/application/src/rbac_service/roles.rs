use chrono::{DateTime, Utc};

use super::*;

use crate::common::{ListPage, NameAlias};

/// Input payload for creating a role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Role name, unique within its scope.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Permission names granted by the role.
    pub permissions: Vec<String>,
}

/// Input payload for updating a role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRoleInput {
    /// New display alias.
    pub alias: String,
    /// New permission names.
    pub permissions: Vec<String>,
}

/// Role projection with resolved permission aliases.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleView {
    /// Role name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Owning project, empty for platform roles.
    pub project: String,
    /// Granted permissions.
    pub permissions: Vec<NameAlias>,
    /// Creation time.
    pub create_time: Option<DateTime<Utc>>,
    /// Last update time.
    pub update_time: Option<DateTime<Utc>>,
}

impl RbacService {
    pub(super) async fn ensure_project(&self, project_name: &str) -> AppResult<()> {
        if project_name.is_empty() || self.store.is_exist(&Project::key(project_name)).await? {
            return Ok(());
        }

        Err(AppError::NotFound(format!(
            "project '{project_name}' is not exist"
        )))
    }

    async fn check_role_permissions(
        &self,
        project_name: &str,
        names: &[String],
    ) -> AppResult<Vec<Permission>> {
        if names.is_empty() {
            return Err(AppError::Validation(
                "the role must grant at least one permission".to_owned(),
            ));
        }

        let permissions = self
            .list_permissions_by_name(project_name, names.to_vec())
            .await?;
        if permissions.len() != names.len() {
            return Err(AppError::Validation(
                "some permissions of the role do not exist".to_owned(),
            ));
        }

        Ok(permissions)
    }

    fn role_view(role: Role, permissions: &[Permission]) -> RoleView {
        let permissions = role
            .permissions
            .iter()
            .map(|name| {
                let alias = permissions
                    .iter()
                    .find(|permission| &permission.name == name)
                    .map(|permission| permission.alias.clone())
                    .unwrap_or_default();
                NameAlias::new(name.clone(), alias)
            })
            .collect();

        RoleView {
            name: role.name,
            alias: role.alias,
            project: role.project,
            permissions,
            create_time: role.timestamps.create_time,
            update_time: role.timestamps.update_time,
        }
    }

    /// Creates a role. An empty project creates a platform role.
    pub async fn create_role(
        &self,
        project_name: &str,
        input: CreateRoleInput,
    ) -> AppResult<RoleView> {
        self.ensure_project(project_name).await?;
        let name = vela_console_core::NonEmptyString::required("role name", input.name)?;
        let permissions = self
            .check_role_permissions(project_name, &input.permissions)
            .await?;

        let role = Role {
            alias: input.alias,
            permissions: input.permissions,
            ..Role::key(project_name, name)
        };
        let role = match self.store.add(role).await {
            Err(AppError::Conflict(_)) => {
                return Err(AppError::Conflict("the role is exist".to_owned()));
            }
            other => other?,
        };

        info!(project = %project_name, role = %role.name, "created role");
        Ok(Self::role_view(role, &permissions))
    }

    /// Replaces the alias and permissions of a role.
    pub async fn update_role(
        &self,
        project_name: &str,
        role_name: &str,
        input: UpdateRoleInput,
    ) -> AppResult<RoleView> {
        self.ensure_project(project_name).await?;
        let permissions = self
            .check_role_permissions(project_name, &input.permissions)
            .await?;

        let mut role = self
            .store
            .get(&Role::key(project_name, role_name))
            .await?
            .ok_or_else(|| AppError::NotFound("the role is not exist".to_owned()))?;
        role.alias = input.alias;
        role.permissions = input.permissions;
        let role = self.store.put(role).await?;

        Ok(Self::role_view(role, &permissions))
    }

    /// Deletes a role.
    pub async fn delete_role(&self, project_name: &str, role_name: &str) -> AppResult<()> {
        match self.store.delete(&Role::key(project_name, role_name)).await {
            Err(AppError::NotFound(_)) => {
                Err(AppError::NotFound("the role is not exist".to_owned()))
            }
            other => other,
        }
    }

    /// Returns one role.
    pub async fn detail_role(&self, project_name: &str, role_name: &str) -> AppResult<RoleView> {
        let role = self
            .store
            .get(&Role::key(project_name, role_name))
            .await?
            .ok_or_else(|| AppError::NotFound("the role is not exist".to_owned()))?;
        let permissions = self
            .list_permissions_by_name(project_name, role.permissions.clone())
            .await?;

        Ok(Self::role_view(role, &permissions))
    }

    /// Lists the roles of a scope, newest first, with the total count.
    pub async fn list_roles(
        &self,
        project_name: &str,
        page: usize,
        page_size: usize,
    ) -> AppResult<ListPage<RoleView>> {
        let mut filter = FilterOptions::default();
        if project_name.is_empty() {
            filter = filter.with_not_exist("project");
        }
        let template = Role::key(project_name, "");

        let roles = self
            .store
            .list(
                &template,
                &ListOptions::filtered(filter.clone())
                    .newest_first("createTime")
                    .paged(page, page_size),
            )
            .await?;
        let total = self.store.count(&template, &filter).await?;
        let permissions = self.list_permissions(project_name).await?;

        Ok(ListPage {
            items: roles
                .into_iter()
                .map(|role| Self::role_view(role, &permissions))
                .collect(),
            total,
        })
    }
}
