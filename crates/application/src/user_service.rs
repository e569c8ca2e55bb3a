//! Console user management.
//!
//! Owns the user lifecycle: the initial admin account, local user CRUD,
//! enabling and disabling accounts, and the login user's permission view.

mod login_info;
mod password;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use vela_console_core::{AppError, AppResult, NonEmptyString};
use vela_console_domain::{
    DEFAULT_ADMIN_ROLE_NAME, DEFAULT_ADMIN_USER_NAME, LoginType, ProjectUser, User,
    validate_password,
};

use crate::cluster_ports::ClusterClient;
use crate::common::{ListPage, NameAlias, ProjectBase};
use crate::datastore_ports::{EntityStore, FilterOptions, ListOptions};
use crate::rbac_service::RbacService;
use crate::security_ports::PasswordHasher;
use crate::system_info_service::SystemInfoService;

pub use login_info::LoginUserInfo;

/// Name of the secret holding the generated admin password.
pub const ADMIN_PASSWORD_SECRET_NAME: &str = "admin-password";

// ---------------------------------------------------------------------------
// Inputs and projections
// ---------------------------------------------------------------------------

/// Input payload for creating a local user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateUserInput {
    /// Login name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Optional email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Platform roles.
    pub roles: Vec<String>,
}

/// Input payload for updating a user. Empty fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateUserInput {
    /// New display alias.
    pub alias: String,
    /// New plaintext password.
    pub password: String,
    /// Email, only accepted while none is set.
    pub email: String,
    /// Replacement platform roles.
    pub roles: Option<Vec<String>>,
}

/// Fuzzy filters for listing users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListUserOptions {
    /// Matches the login name.
    pub name: String,
    /// Matches the email.
    pub email: String,
    /// Matches the alias.
    pub alias: String,
}

/// Public user fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserBase {
    /// Login name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Email.
    pub email: String,
    /// Whether the account is disabled.
    pub disabled: bool,
    /// Creation time.
    pub create_time: Option<DateTime<Utc>>,
    /// Time of the last login.
    pub last_login_time: Option<DateTime<Utc>>,
}

impl From<&User> for UserBase {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            alias: user.alias.clone(),
            email: user.email.clone(),
            disabled: user.disabled,
            create_time: user.timestamps.create_time,
            last_login_time: user.last_login_time,
        }
    }
}

/// User with resolved roles and projects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDetail {
    /// Public user fields.
    pub user: UserBase,
    /// Platform roles with their aliases.
    pub roles: Vec<NameAlias>,
    /// Projects the user is a member of.
    pub projects: Vec<ProjectBase>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service for console users.
#[derive(Clone)]
pub struct UserService {
    store: EntityStore,
    password_hasher: Arc<dyn PasswordHasher>,
    cluster: Arc<dyn ClusterClient>,
    system_info_service: SystemInfoService,
    rbac_service: RbacService,
    system_namespace: String,
}

impl UserService {
    /// Creates a new user service.
    #[must_use]
    pub fn new(
        store: EntityStore,
        password_hasher: Arc<dyn PasswordHasher>,
        cluster: Arc<dyn ClusterClient>,
        system_info_service: SystemInfoService,
        rbac_service: RbacService,
        system_namespace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            password_hasher,
            cluster,
            system_info_service,
            rbac_service,
            system_namespace: system_namespace.into(),
        }
    }

    /// Creates the `admin` user with a random password on first start.
    ///
    /// The password is logged once and stored in the admin password secret of
    /// the system namespace.
    pub async fn init(&self) -> AppResult<()> {
        if self
            .store
            .is_exist(&User::key(DEFAULT_ADMIN_USER_NAME))
            .await?
        {
            info!("admin user is exist");
            return Ok(());
        }

        let password = password::generate_password()?;
        let admin = User {
            alias: "Administrator".to_owned(),
            password: self.password_hasher.hash_password(&password)?,
            user_roles: vec![DEFAULT_ADMIN_ROLE_NAME.to_owned()],
            ..User::key(DEFAULT_ADMIN_USER_NAME)
        };
        self.store.add(admin).await?;
        info!(
            "initialized admin username and password: {DEFAULT_ADMIN_USER_NAME} / {password}"
        );

        let existing = self
            .cluster
            .get_secret(&self.system_namespace, ADMIN_PASSWORD_SECRET_NAME)
            .await?;
        if existing.is_none() {
            self.cluster
                .put_secret(
                    &self.system_namespace,
                    ADMIN_PASSWORD_SECRET_NAME,
                    BTreeMap::from([(DEFAULT_ADMIN_USER_NAME.to_owned(), password)]),
                )
                .await?;
        }

        Ok(())
    }

    async fn ensure_local_login(&self) -> AppResult<()> {
        if self.system_info_service.login_type().await? == LoginType::Dex {
            return Err(AppError::Validation(
                "users cannot be modified under dex login".to_owned(),
            ));
        }
        Ok(())
    }

    async fn check_platform_roles(&self, roles: &[String]) -> AppResult<()> {
        if roles.is_empty() {
            return Ok(());
        }

        let known = self.rbac_service.list_roles("", 0, 0).await?.items;
        if let Some(missing) = roles
            .iter()
            .find(|role| !known.iter().any(|known| &known.name == *role))
        {
            return Err(AppError::Validation(format!(
                "the platform role '{missing}' is not exist"
            )));
        }
        Ok(())
    }

    async fn platform_role_aliases(&self) -> BTreeMap<String, String> {
        match self.rbac_service.list_roles("", 0, 0).await {
            Ok(page) => page
                .items
                .into_iter()
                .map(|role| (role.name, role.alias))
                .collect(),
            Err(error) => {
                warn!(error = %error, "failed to list platform roles");
                BTreeMap::new()
            }
        }
    }

    fn user_detail(user: &User, aliases: &BTreeMap<String, String>) -> UserDetail {
        UserDetail {
            user: UserBase::from(user),
            roles: user
                .user_roles
                .iter()
                .map(|role| {
                    NameAlias::new(role.clone(), aliases.get(role).cloned().unwrap_or_default())
                })
                .collect(),
            projects: Vec::new(),
        }
    }

    /// Creates a local user.
    pub async fn create_user(&self, input: CreateUserInput) -> AppResult<UserBase> {
        self.ensure_local_login().await?;
        let name = NonEmptyString::required("user name", input.name)?;
        validate_password(&input.password)?;
        self.check_platform_roles(&input.roles).await?;

        let user = User {
            alias: input.alias,
            email: input.email,
            password: self.password_hasher.hash_password(&input.password)?,
            user_roles: input.roles,
            ..User::key(name)
        };
        let user = match self.store.add(user).await {
            Err(AppError::Conflict(_)) => {
                return Err(AppError::Conflict("the user is exist".to_owned()));
            }
            other => other?,
        };

        info!(user = %user.name, "created user");
        Ok(UserBase::from(&user))
    }

    /// Updates a local user.
    pub async fn update_user(&self, username: &str, input: UpdateUserInput) -> AppResult<UserBase> {
        self.ensure_local_login().await?;
        let mut user = self.get_user(username).await?;

        if !input.alias.is_empty() {
            user.alias = input.alias;
        }
        if !input.password.is_empty() {
            validate_password(&input.password)?;
            user.password = self.password_hasher.hash_password(&input.password)?;
        }
        if !input.email.is_empty() {
            if !user.email.is_empty() && user.email != input.email {
                return Err(AppError::Validation(
                    "the email cannot be modified once set".to_owned(),
                ));
            }
            user.email = input.email;
        }
        if let Some(roles) = input.roles {
            self.check_platform_roles(&roles).await?;
            user.user_roles = roles;
        }

        let user = self.store.put(user).await?;
        Ok(UserBase::from(&user))
    }

    /// Deletes a user and its project memberships.
    pub async fn delete_user(&self, username: &str) -> AppResult<()> {
        let memberships = self
            .store
            .list(
                &ProjectUser {
                    username: username.to_owned(),
                    ..ProjectUser::default()
                },
                &ListOptions::default(),
            )
            .await?;
        for membership in memberships {
            if let Err(error) = self.store.delete(&membership).await {
                error!(
                    project = %membership.project_name,
                    user = %username,
                    error = %error,
                    "failed to delete project user"
                );
            }
        }

        match self.store.delete(&User::key(username)).await {
            Err(AppError::NotFound(_)) => {
                Err(AppError::NotFound("the user is not exist".to_owned()))
            }
            other => other,
        }
    }

    /// Returns one stored user.
    pub async fn get_user(&self, username: &str) -> AppResult<User> {
        self.store
            .get(&User::key(username))
            .await?
            .ok_or_else(|| AppError::NotFound("the user is not exist".to_owned()))
    }

    /// Returns a user with its roles and projects.
    pub async fn detail_user(&self, username: &str) -> AppResult<UserDetail> {
        let user = self.get_user(username).await?;
        let mut detail = Self::user_detail(&user, &self.platform_role_aliases().await);
        detail.projects = self.rbac_service.member_projects(&user.name).await?;
        Ok(detail)
    }

    /// Lists users newest first, with fuzzy filters and paging.
    pub async fn list_users(
        &self,
        page: usize,
        page_size: usize,
        options: ListUserOptions,
    ) -> AppResult<ListPage<UserDetail>> {
        let filter = FilterOptions::default()
            .with_query("name", &options.name)
            .with_query("email", &options.email)
            .with_query("alias", &options.alias);

        let users = self
            .store
            .list(
                &User::default(),
                &ListOptions::filtered(filter.clone())
                    .newest_first("createTime")
                    .paged(page, page_size),
            )
            .await?;
        let total = self.store.count(&User::default(), &filter).await?;
        let aliases = self.platform_role_aliases().await;

        Ok(ListPage {
            items: users
                .iter()
                .map(|user| Self::user_detail(user, &aliases))
                .collect(),
            total,
        })
    }

    /// Disables a user.
    pub async fn disable_user(&self, username: &str) -> AppResult<()> {
        let mut user = self.get_user(username).await?;
        if user.disabled {
            return Err(AppError::Validation("the user is already disabled".to_owned()));
        }
        user.disabled = true;
        self.store.put(user).await?;
        info!(user = %username, "disabled user");
        Ok(())
    }

    /// Enables a disabled user.
    pub async fn enable_user(&self, username: &str) -> AppResult<()> {
        let mut user = self.get_user(username).await?;
        if !user.disabled {
            return Err(AppError::Validation("the user is already enabled".to_owned()));
        }
        user.disabled = false;
        self.store.put(user).await?;
        info!(user = %username, "enabled user");
        Ok(())
    }

    /// Records a successful login.
    pub async fn update_login_time(&self, user: User) -> AppResult<User> {
        self.store
            .put(User {
                last_login_time: Some(Utc::now()),
                ..user
            })
            .await
    }
}

#[cfg(test)]
mod tests;
