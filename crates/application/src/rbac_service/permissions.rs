use std::str::FromStr;

use vela_console_core::NonEmptyString;
use vela_console_domain::{PermissionEffect, validate_resource_pattern};

use super::*;

/// Input payload for creating a permission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatePermissionInput {
    /// Permission name, unique within its scope.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Resource name patterns.
    pub resources: Vec<String>,
    /// Actions, `*` for all.
    pub actions: Vec<String>,
    /// `allow` (default) or `deny`.
    pub effect: String,
}

/// Input payload for updating a permission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePermissionInput {
    /// New display alias.
    pub alias: String,
    /// New resource name patterns.
    pub resources: Vec<String>,
    /// New actions.
    pub actions: Vec<String>,
    /// New effect.
    pub effect: String,
}

fn validate_statement(resources: &[String], actions: &[String]) -> AppResult<()> {
    if resources.is_empty() || actions.is_empty() {
        return Err(AppError::Validation(
            "a permission needs at least one resource and one action".to_owned(),
        ));
    }

    resources
        .iter()
        .try_for_each(|resource| validate_resource_pattern(resource))
}

impl RbacService {
    /// Lists the permissions of a scope. An empty project lists platform
    /// permissions.
    pub async fn list_permissions(&self, project_name: &str) -> AppResult<Vec<Permission>> {
        let mut filter = FilterOptions::default();
        if project_name.is_empty() {
            filter = filter.with_not_exist("project");
        }

        self.store
            .list(
                &Permission::key(project_name, ""),
                &ListOptions::filtered(filter),
            )
            .await
    }

    /// Creates a permission.
    pub async fn create_permission(
        &self,
        project_name: &str,
        input: CreatePermissionInput,
    ) -> AppResult<Permission> {
        self.ensure_project(project_name).await?;
        let name = NonEmptyString::required("permission name", input.name)?;
        validate_statement(&input.resources, &input.actions)?;

        let permission = Permission {
            alias: input.alias,
            resources: input.resources,
            actions: input.actions,
            effect: PermissionEffect::from_str(&input.effect)?,
            ..Permission::key(project_name, name)
        };

        match self.store.add(permission).await {
            Err(AppError::Conflict(_)) => {
                Err(AppError::Conflict("the permission is exist".to_owned()))
            }
            other => other,
        }
    }

    /// Replaces the statement of a permission.
    pub async fn update_permission(
        &self,
        project_name: &str,
        permission_name: &str,
        input: UpdatePermissionInput,
    ) -> AppResult<Permission> {
        validate_statement(&input.resources, &input.actions)?;

        let mut permission = self
            .store
            .get(&Permission::key(project_name, permission_name))
            .await?
            .ok_or_else(|| AppError::NotFound("the permission is not exist".to_owned()))?;
        permission.alias = input.alias;
        permission.resources = input.resources;
        permission.actions = input.actions;
        permission.effect = PermissionEffect::from_str(&input.effect)?;

        self.store.put(permission).await
    }

    /// Deletes a permission that no role of the scope still grants.
    pub async fn delete_permission(
        &self,
        project_name: &str,
        permission_name: &str,
    ) -> AppResult<()> {
        let roles = self
            .list_roles(project_name, 0, 0)
            .await?
            .items;
        if let Some(role) = roles
            .iter()
            .find(|role| role.permissions.iter().any(|p| p.name == permission_name))
        {
            return Err(AppError::Conflict(format!(
                "the permission is used by role '{}'",
                role.name
            )));
        }

        match self
            .store
            .delete(&Permission::key(project_name, permission_name))
            .await
        {
            Err(AppError::NotFound(_)) => {
                Err(AppError::NotFound("the permission is not exist".to_owned()))
            }
            other => other,
        }
    }
}
