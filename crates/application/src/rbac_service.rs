//! Role-based access control: roles, permissions and permission checks.

mod defaults;
mod permissions;
mod roles;

use std::collections::HashMap;

use tracing::{info, warn};
use vela_console_core::{AppError, AppResult, UserIdentity};
use vela_console_domain::{
    DEFAULT_ADMIN_ROLE_NAME, Permission, Project, ProjectUser, RequestResourceAction, Role, User,
    resolve_resource_path,
};

use crate::common::ProjectBase;
use crate::datastore_ports::{EntityStore, FilterOptions, ListOptions};

pub use permissions::{CreatePermissionInput, UpdatePermissionInput};
pub use roles::{CreateRoleInput, RoleView, UpdateRoleInput};

/// Application service for roles, permissions and access checks.
#[derive(Clone)]
pub struct RbacService {
    store: EntityStore,
}

impl RbacService {
    /// Creates a new RBAC service.
    #[must_use]
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Seeds the platform permissions and the platform `admin` role.
    ///
    /// Existing records are left untouched.
    pub async fn init(&self) -> AppResult<()> {
        let mut created = 0;
        for permission in defaults::platform_permissions() {
            if self.store.is_exist(&permission).await? {
                continue;
            }
            self.store.add(permission).await?;
            created += 1;
        }

        let admin_role = Role {
            alias: "Admin".to_owned(),
            permissions: vec![defaults::ADMIN_PERMISSION_NAME.to_owned()],
            ..Role::key("", DEFAULT_ADMIN_ROLE_NAME)
        };
        if !self.store.is_exist(&admin_role).await? {
            self.store.add(admin_role).await?;
            created += 1;
        }

        info!(created, "initialized platform permissions");
        Ok(())
    }

    /// Creates the default permissions and roles of a new project.
    pub async fn init_default_roles_and_permissions_for_project(
        &self,
        project_name: &str,
    ) -> AppResult<()> {
        self.store
            .batch_add(defaults::project_permissions(project_name))
            .await?;
        self.store
            .batch_add(defaults::project_roles(project_name))
            .await?;

        info!(project = %project_name, "initialized default project roles");
        Ok(())
    }

    async fn list_permissions_by_name(
        &self,
        project_name: &str,
        names: Vec<String>,
    ) -> AppResult<Vec<Permission>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut filter = FilterOptions::default().with_in("name", names);
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

    async fn list_roles_by_name(
        &self,
        project_name: &str,
        names: Vec<String>,
    ) -> AppResult<Vec<Role>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut filter = FilterOptions::default().with_in("name", names);
        if project_name.is_empty() {
            filter = filter.with_not_exist("project");
        }
        self.store
            .list(&Role::key(project_name, ""), &ListOptions::filtered(filter))
            .await
    }

    /// Returns the permissions granted to a user.
    ///
    /// Platform permissions come from the user's own roles. Project
    /// permissions come from the user's membership in `project_name`.
    pub async fn get_user_permissions(
        &self,
        user: &User,
        project_name: &str,
        with_platform: bool,
    ) -> AppResult<Vec<Permission>> {
        let mut permissions = Vec::new();

        if with_platform && !user.user_roles.is_empty() {
            let roles = self
                .list_roles_by_name("", user.user_roles.clone())
                .await?;
            let names = roles.into_iter().flat_map(|role| role.permissions).collect();
            permissions.extend(self.list_permissions_by_name("", names).await?);
        }

        if !project_name.is_empty() {
            let membership = self
                .store
                .get(&ProjectUser::key(project_name, user.name.as_str()))
                .await?;
            if let Some(membership) = membership.filter(|member| !member.user_roles.is_empty()) {
                let roles = self
                    .list_roles_by_name(project_name, membership.user_roles)
                    .await?;
                let names = roles.into_iter().flat_map(|role| role.permissions).collect();
                permissions.extend(self.list_permissions_by_name(project_name, names).await?);
            }
        }

        Ok(permissions)
    }

    async fn load_user(&self, actor: &UserIdentity) -> AppResult<User> {
        self.store
            .get(&User::key(actor.subject()))
            .await?
            .ok_or_else(|| AppError::Unauthorized(format!("user '{}' is not exist", actor.subject())))
    }

    /// Returns whether the actor may perform `actions` on a resource.
    ///
    /// `resource` is a short resource path such as `application` or
    /// `project/workflow`; path parameters fill its placeholders. The
    /// `projectName` parameter selects which project permissions apply.
    pub async fn is_allowed(
        &self,
        actor: &UserIdentity,
        resource: &str,
        actions: &[&str],
        path_params: &HashMap<String, String>,
    ) -> AppResult<bool> {
        let template = resolve_resource_path(resource)?;
        let request = RequestResourceAction::new(
            &template,
            |key| path_params.get(key).map(String::as_str),
            actions,
        );

        let user = self.load_user(actor).await?;
        if user.disabled {
            return Err(AppError::Unauthorized(format!(
                "user '{}' is disabled",
                user.name
            )));
        }

        let project_name = path_params
            .get("projectName")
            .map(String::as_str)
            .unwrap_or_default();
        let permissions = self
            .get_user_permissions(&user, project_name, true)
            .await?;

        Ok(request.is_allowed_by(&permissions))
    }

    /// Fails with `Forbidden` unless the actor may perform `actions`.
    pub async fn check_perm(
        &self,
        actor: &UserIdentity,
        resource: &str,
        actions: &[&str],
        path_params: &HashMap<String, String>,
    ) -> AppResult<()> {
        if self
            .is_allowed(actor, resource, actions, path_params)
            .await?
        {
            return Ok(());
        }

        warn!(
            user = %actor.subject(),
            resource,
            actions = ?actions,
            "permission check refused"
        );
        Err(AppError::Forbidden(format!(
            "user '{}' may not {} {resource}",
            actor.subject(),
            actions.join("/")
        )))
    }

    /// Returns the names of the projects a user can see.
    ///
    /// Users allowed to list every project see all of them; everyone else
    /// sees the projects they are a member of.
    pub async fn accessible_projects(&self, actor: &UserIdentity) -> AppResult<Vec<String>> {
        if self
            .is_allowed(actor, "project", &["list"], &HashMap::new())
            .await?
        {
            let projects = self
                .store
                .list(&Project::default(), &ListOptions::default())
                .await?;
            return Ok(projects.into_iter().map(|project| project.name).collect());
        }

        let memberships = self
            .store
            .list(
                &ProjectUser {
                    username: actor.subject().to_owned(),
                    ..ProjectUser::default()
                },
                &ListOptions::default(),
            )
            .await?;
        Ok(memberships
            .into_iter()
            .map(|membership| membership.project_name)
            .collect())
    }

    /// Returns the projects a user is a member of, newest membership first.
    pub async fn member_projects(&self, username: &str) -> AppResult<Vec<ProjectBase>> {
        let memberships = self
            .store
            .list(
                &ProjectUser {
                    username: username.to_owned(),
                    ..ProjectUser::default()
                },
                &ListOptions::default().newest_first("createTime"),
            )
            .await?;

        let mut projects = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let Some(project) = self
                .store
                .get(&Project::key(membership.project_name.as_str()))
                .await?
            else {
                warn!(project = %membership.project_name, "membership of a missing project");
                continue;
            };
            let owner_alias = self
                .store
                .get(&User::key(project.owner.as_str()))
                .await?
                .map(|owner| owner.alias)
                .unwrap_or_default();
            projects.push(ProjectBase::new(project, owner_alias));
        }

        Ok(projects)
    }
}

#[cfg(test)]
mod tests;
