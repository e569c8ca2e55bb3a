//! Projects and their members.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use vela_console_core::{AppError, AppResult, NonEmptyString, UserIdentity};
use vela_console_domain::{
    Application, ClusterTarget, DEFAULT_ADMIN_USER_NAME, DEFAULT_ENV_NAME, DEFAULT_PROJECT_NAME,
    DEFAULT_TARGET_NAME, Env, LOCAL_CLUSTER_NAME, PROJECT_ADMIN_ROLE_NAME, Permission, Project,
    ProjectUser, Role, Target, User,
};

use crate::common::{ListPage, ProjectBase};
use crate::datastore_ports::{EntityStore, FilterOptions, ListOptions};
use crate::env_service::{CreateEnvInput, EnvService};
use crate::rbac_service::RbacService;
use crate::target_service::{CreateTargetInput, TargetService};

/// Input payload for creating a project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateProjectInput {
    /// Unique project name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Free-form description.
    pub description: String,
    /// Owner user. Joins the project as project admin.
    pub owner: String,
}

/// Input payload for updating a project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateProjectInput {
    /// New display alias.
    pub alias: String,
    /// New description.
    pub description: String,
    /// New owner. Empty keeps the current owner.
    pub owner: String,
}

/// Input payload for adding a member to a project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddProjectUserInput {
    /// Member user name.
    pub username: String,
    /// Project roles of the member.
    pub roles: Vec<String>,
}

/// A project member with the user's alias resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectUserBase {
    /// Member user name.
    pub username: String,
    /// Member display alias.
    pub user_alias: String,
    /// Project name.
    pub project_name: String,
    /// Project roles of the member.
    pub roles: Vec<String>,
    /// Membership creation time.
    pub create_time: Option<DateTime<Utc>>,
    /// Membership update time.
    pub update_time: Option<DateTime<Utc>>,
}

/// Application service for projects.
#[derive(Clone)]
pub struct ProjectService {
    store: EntityStore,
    rbac_service: RbacService,
    target_service: TargetService,
    env_service: EnvService,
}

impl ProjectService {
    /// Creates a new project service.
    #[must_use]
    pub fn new(
        store: EntityStore,
        rbac_service: RbacService,
        target_service: TargetService,
        env_service: EnvService,
    ) -> Self {
        Self {
            store,
            rbac_service,
            target_service,
            env_service,
        }
    }

    /// Creates the default project with its default target and environment
    /// when no project exists yet.
    pub async fn init(&self, default_namespace: &str) -> AppResult<()> {
        let projects = self
            .store
            .count(&Project::default(), &FilterOptions::default())
            .await?;
        if projects > 0 {
            return Ok(());
        }

        self.create_project(CreateProjectInput {
            name: DEFAULT_PROJECT_NAME.to_owned(),
            alias: "Default".to_owned(),
            description: "Default project is created by velaux system automatically.".to_owned(),
            owner: DEFAULT_ADMIN_USER_NAME.to_owned(),
        })
        .await?;

        if !self
            .store
            .is_exist(&Target::key(DEFAULT_TARGET_NAME))
            .await?
        {
            self.target_service
                .create_target(CreateTargetInput {
                    name: DEFAULT_TARGET_NAME.to_owned(),
                    alias: "Default".to_owned(),
                    description: "Default target is created by velaux system automatically."
                        .to_owned(),
                    project: DEFAULT_PROJECT_NAME.to_owned(),
                    cluster: Some(ClusterTarget {
                        cluster_name: LOCAL_CLUSTER_NAME.to_owned(),
                        namespace: default_namespace.to_owned(),
                    }),
                    ..CreateTargetInput::default()
                })
                .await?;
        }

        if !self.store.is_exist(&Env::key(DEFAULT_ENV_NAME)).await? {
            self.env_service
                .create_env(CreateEnvInput {
                    name: DEFAULT_ENV_NAME.to_owned(),
                    alias: "Default".to_owned(),
                    description: "Default environment is created by velaux system automatically."
                        .to_owned(),
                    namespace: default_namespace.to_owned(),
                    project: DEFAULT_PROJECT_NAME.to_owned(),
                    targets: vec![DEFAULT_TARGET_NAME.to_owned()],
                })
                .await?;
        }

        info!(namespace = %default_namespace, "initialized the default project");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    /// Creates a project, seeds its roles and adds the owner as project admin.
    pub async fn create_project(&self, input: CreateProjectInput) -> AppResult<ProjectBase> {
        let name = NonEmptyString::required("project name", input.name)?;
        if self.store.is_exist(&Project::key(name.as_str())).await? {
            return Err(AppError::Conflict("the project name is exist".to_owned()));
        }
        let owner_alias = self.owner_alias(&input.owner).await?;

        self.rbac_service
            .init_default_roles_and_permissions_for_project(&name)
            .await?;
        let project = self
            .store
            .add(Project {
                alias: input.alias,
                description: input.description,
                owner: input.owner,
                ..Project::key(name)
            })
            .await?;

        if !project.owner.is_empty() {
            self.join_as_admin(&project.name, &project.owner).await?;
        }

        info!(project = %project.name, owner = %project.owner, "created project");
        Ok(ProjectBase::new(project, owner_alias))
    }

    /// Updates a project. A new owner joins the project as project admin.
    pub async fn update_project(
        &self,
        name: &str,
        input: UpdateProjectInput,
    ) -> AppResult<ProjectBase> {
        let mut project = self.get_project(name).await?;
        project.alias = input.alias;
        project.description = input.description;
        if !input.owner.is_empty() && input.owner != project.owner {
            self.owner_alias(&input.owner).await?;
            if !self
                .store
                .is_exist(&ProjectUser::key(name, input.owner.as_str()))
                .await?
            {
                self.join_as_admin(name, &input.owner).await?;
            }
            project.owner = input.owner;
        }

        let project = self.store.put(project).await?;
        let owner_alias = self.owner_alias(&project.owner).await?;
        Ok(ProjectBase::new(project, owner_alias))
    }

    /// Deletes an empty project with its members, roles and permissions.
    pub async fn delete_project(&self, name: &str) -> AppResult<()> {
        let project = self.get_project(name).await?;

        let no_filter = FilterOptions::default();
        let apps = self
            .store
            .count(
                &Application {
                    project: name.to_owned(),
                    ..Application::default()
                },
                &no_filter,
            )
            .await?;
        if apps > 0 {
            return Err(AppError::Conflict(
                "please delete all applications of the project first".to_owned(),
            ));
        }
        let targets = self
            .store
            .count(
                &Target {
                    project: name.to_owned(),
                    ..Target::default()
                },
                &no_filter,
            )
            .await?;
        if targets > 0 {
            return Err(AppError::Conflict(
                "please delete all targets of the project first".to_owned(),
            ));
        }
        let envs = self
            .store
            .count(
                &Env {
                    project: name.to_owned(),
                    ..Env::default()
                },
                &no_filter,
            )
            .await?;
        if envs > 0 {
            return Err(AppError::Conflict(
                "please delete all environments of the project first".to_owned(),
            ));
        }

        let members = self
            .store
            .list(
                &ProjectUser {
                    project_name: name.to_owned(),
                    ..ProjectUser::default()
                },
                &ListOptions::default(),
            )
            .await?;
        for member in members {
            self.store.delete(&member).await?;
        }
        let roles = self
            .store
            .list(&Role::key(name, ""), &ListOptions::default())
            .await?;
        for role in roles {
            self.store.delete(&role).await?;
        }
        let permissions = self
            .store
            .list(&Permission::key(name, ""), &ListOptions::default())
            .await?;
        for permission in permissions {
            self.store.delete(&permission).await?;
        }
        self.store.delete(&project).await?;

        info!(project = %name, "deleted project");
        Ok(())
    }

    /// Lists the projects the actor can see, newest first.
    pub async fn list_projects(
        &self,
        actor: &UserIdentity,
        page: usize,
        page_size: usize,
    ) -> AppResult<ListPage<ProjectBase>> {
        let names = self.rbac_service.accessible_projects(actor).await?;
        if names.is_empty() {
            return Ok(ListPage {
                items: Vec::new(),
                total: 0,
            });
        }

        let filter = FilterOptions::default().with_in("name", names);
        let projects = self
            .store
            .list(
                &Project::default(),
                &ListOptions::filtered(filter.clone())
                    .newest_first("createTime")
                    .paged(page, page_size),
            )
            .await?;
        let total = self.store.count(&Project::default(), &filter).await?;

        let mut items = Vec::with_capacity(projects.len());
        for project in projects {
            let owner_alias = self.owner_alias(&project.owner).await.unwrap_or_else(|err| {
                warn!(project = %project.name, error = %err, "project owner is missing");
                String::new()
            });
            items.push(ProjectBase::new(project, owner_alias));
        }
        Ok(ListPage { items, total })
    }

    /// Lists the projects a user is a member of.
    pub async fn list_user_projects(&self, username: &str) -> AppResult<Vec<ProjectBase>> {
        self.rbac_service.member_projects(username).await
    }

    /// Returns one project.
    pub async fn detail_project(&self, name: &str) -> AppResult<ProjectBase> {
        let project = self.get_project(name).await?;
        let owner_alias = self.owner_alias(&project.owner).await.unwrap_or_default();
        Ok(ProjectBase::new(project, owner_alias))
    }

    async fn get_project(&self, name: &str) -> AppResult<Project> {
        self.store
            .get(&Project::key(name))
            .await?
            .ok_or_else(|| AppError::NotFound("the project is not exist".to_owned()))
    }

    /// Resolves the alias of a project owner. An unknown owner is a
    /// validation failure; an empty owner has an empty alias.
    async fn owner_alias(&self, owner: &str) -> AppResult<String> {
        if owner.is_empty() {
            return Ok(String::new());
        }
        self.store
            .get(&User::key(owner))
            .await?
            .map(|user| user.alias)
            .ok_or_else(|| {
                AppError::Validation(format!("the project owner '{owner}' is not exist"))
            })
    }

    async fn join_as_admin(&self, project_name: &str, username: &str) -> AppResult<()> {
        self.store
            .add(ProjectUser {
                user_roles: vec![PROJECT_ADMIN_ROLE_NAME.to_owned()],
                ..ProjectUser::key(project_name, username)
            })
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    /// Adds a user to a project.
    pub async fn add_project_user(
        &self,
        project_name: &str,
        input: AddProjectUserInput,
    ) -> AppResult<ProjectUserBase> {
        self.get_project(project_name).await?;
        let user = self
            .store
            .get(&User::key(input.username.as_str()))
            .await?
            .ok_or_else(|| AppError::NotFound("the user is not exist".to_owned()))?;
        self.check_project_roles(project_name, &input.roles).await?;

        let membership = ProjectUser {
            user_roles: input.roles,
            ..ProjectUser::key(project_name, user.name.as_str())
        };
        if self.store.is_exist(&membership).await? {
            return Err(AppError::Conflict(
                "the user is exist in the project".to_owned(),
            ));
        }
        let membership = self.store.add(membership).await?;

        info!(project = %project_name, user = %user.name, roles = ?membership.user_roles, "added project user");
        Ok(project_user_base(membership, user.alias))
    }

    /// Replaces the roles of a project member.
    pub async fn update_project_user(
        &self,
        project_name: &str,
        username: &str,
        roles: Vec<String>,
    ) -> AppResult<ProjectUserBase> {
        let mut membership = self.get_project_user(project_name, username).await?;
        self.check_project_roles(project_name, &roles).await?;
        membership.user_roles = roles;
        let membership = self.store.put(membership).await?;

        let alias = self.member_alias(username).await?;
        Ok(project_user_base(membership, alias))
    }

    /// Removes a user from a project.
    pub async fn delete_project_user(&self, project_name: &str, username: &str) -> AppResult<()> {
        let membership = self.get_project_user(project_name, username).await?;
        self.store.delete(&membership).await?;

        info!(project = %project_name, user = %username, "removed project user");
        Ok(())
    }

    /// Lists the members of a project, newest first.
    pub async fn list_project_users(
        &self,
        project_name: &str,
        page: usize,
        page_size: usize,
    ) -> AppResult<ListPage<ProjectUserBase>> {
        let template = ProjectUser {
            project_name: project_name.to_owned(),
            ..ProjectUser::default()
        };
        let memberships = self
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

        let mut items = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let alias = self.member_alias(&membership.username).await?;
            items.push(project_user_base(membership, alias));
        }
        Ok(ListPage { items, total })
    }

    async fn get_project_user(&self, project_name: &str, username: &str) -> AppResult<ProjectUser> {
        self.store
            .get(&ProjectUser::key(project_name, username))
            .await?
            .ok_or_else(|| AppError::NotFound("the user is not exist in the project".to_owned()))
    }

    async fn member_alias(&self, username: &str) -> AppResult<String> {
        Ok(self
            .store
            .get(&User::key(username))
            .await?
            .map(|user| user.alias)
            .unwrap_or_default())
    }

    async fn check_project_roles(&self, project_name: &str, roles: &[String]) -> AppResult<()> {
        if roles.is_empty() {
            return Err(AppError::Validation(
                "a project user needs at least one role".to_owned(),
            ));
        }

        let existing = self
            .store
            .list(
                &Role::key(project_name, ""),
                &ListOptions::filtered(FilterOptions::default().with_in("name", roles.to_vec())),
            )
            .await?;
        if let Some(missing) = roles
            .iter()
            .find(|role| !existing.iter().any(|found| &found.name == *role))
        {
            return Err(AppError::Validation(format!(
                "the role '{missing}' is not exist in project '{project_name}'"
            )));
        }
        Ok(())
    }
}

fn project_user_base(membership: ProjectUser, user_alias: String) -> ProjectUserBase {
    ProjectUserBase {
        username: membership.username,
        user_alias,
        project_name: membership.project_name,
        roles: membership.user_roles,
        create_time: membership.timestamps.create_time,
        update_time: membership.timestamps.update_time,
    }
}

#[cfg(test)]
mod tests;
