use vela_console_core::{AppError, AppResult};
use vela_console_domain::{LoginType, User};

use crate::project_service::AddProjectUserInput;
use crate::system_info_service::UpdateSystemInfoInput;
use crate::test_support::{SYSTEM_NAMESPACE, TestConsole, actor};

use super::{
    ADMIN_PASSWORD_SECRET_NAME, CreateUserInput, ListUserOptions, UpdateUserInput,
};

fn user_input(name: &str) -> CreateUserInput {
    CreateUserInput {
        name: name.to_owned(),
        alias: format!("{name} alias"),
        email: format!("{name}@example.com"),
        password: "secret123".to_owned(),
        roles: Vec::new(),
    }
}

#[tokio::test]
async fn init_creates_admin_and_stores_its_password_once() -> AppResult<()> {
    let console = TestConsole::started().await?;

    let admin = console.users.get_user("admin").await?;
    assert_eq!(admin.alias, "Administrator");
    assert_eq!(admin.user_roles, vec!["admin".to_owned()]);

    let secret = console
        .cluster
        .secrets
        .lock()
        .await
        .get(&(SYSTEM_NAMESPACE.to_owned(), ADMIN_PASSWORD_SECRET_NAME.to_owned()))
        .cloned()
        .ok_or_else(|| AppError::NotFound("admin secret".to_owned()))?;
    let password = secret
        .get("admin")
        .ok_or_else(|| AppError::NotFound("admin password".to_owned()))?;
    assert_eq!(admin.password, format!("plain:{password}"));

    console.users.init().await?;
    assert_eq!(console.users.get_user("admin").await?.password, admin.password);
    Ok(())
}

#[tokio::test]
async fn create_user_validates_input() -> AppResult<()> {
    let console = TestConsole::started().await?;

    let created = console.users.create_user(user_input("alice")).await?;
    assert_eq!(created.email, "alice@example.com");
    assert!(!created.disabled);

    assert!(matches!(
        console.users.create_user(user_input("alice")).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        console
            .users
            .create_user(CreateUserInput {
                password: "short1".to_owned(),
                ..user_input("bob")
            })
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        console
            .users
            .create_user(CreateUserInput {
                roles: vec!["no-such-role".to_owned()],
                ..user_input("bob")
            })
            .await,
        Err(AppError::Validation(_))
    ));
    Ok(())
}

#[tokio::test]
async fn users_are_read_only_under_dex_login() -> AppResult<()> {
    let console = TestConsole::started().await?;
    console
        .system_info
        .update_system_info(UpdateSystemInfoInput {
            login_type: LoginType::Dex,
            enable_collection: false,
            base_url: "https://console.example.com".to_owned(),
        })
        .await?;

    let result = console.users.create_user(user_input("alice")).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn update_user_keeps_email_once_set() -> AppResult<()> {
    let console = TestConsole::started().await?;
    console
        .users
        .create_user(CreateUserInput {
            email: String::new(),
            ..user_input("alice")
        })
        .await?;

    let updated = console
        .users
        .update_user(
            "alice",
            UpdateUserInput {
                alias: "Alice".to_owned(),
                email: "alice@example.com".to_owned(),
                password: "newpass99".to_owned(),
                roles: Some(vec!["admin".to_owned()]),
            },
        )
        .await?;
    assert_eq!(updated.alias, "Alice");
    assert_eq!(updated.email, "alice@example.com");
    let stored = console.users.get_user("alice").await?;
    assert_eq!(stored.password, "plain:newpass99");
    assert_eq!(stored.user_roles, vec!["admin".to_owned()]);

    let result = console
        .users
        .update_user(
            "alice",
            UpdateUserInput {
                email: "other@example.com".to_owned(),
                ..UpdateUserInput::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn delete_user_removes_memberships() -> AppResult<()> {
    let console = TestConsole::started().await?;
    console.users.create_user(user_input("alice")).await?;
    console
        .projects
        .add_project_user(
            "default",
            AddProjectUserInput {
                username: "alice".to_owned(),
                roles: vec!["project-viewer".to_owned()],
            },
        )
        .await?;

    console.users.delete_user("alice").await?;

    assert!(console.projects.list_user_projects("alice").await?.is_empty());
    assert!(matches!(
        console.users.delete_user("alice").await,
        Err(AppError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn detail_and_list_users() -> AppResult<()> {
    let console = TestConsole::started().await?;
    console.users.create_user(user_input("alice")).await?;
    console.users.create_user(user_input("alfred")).await?;
    console.users.create_user(user_input("bob")).await?;

    let detail = console.users.detail_user("admin").await?;
    assert_eq!(detail.roles.len(), 1);
    assert_eq!(detail.roles[0].alias, "Admin");
    assert_eq!(detail.projects.len(), 1);
    assert_eq!(detail.projects[0].name, "default");

    let page = console
        .users
        .list_users(
            1,
            10,
            ListUserOptions {
                name: "al".to_owned(),
                ..ListUserOptions::default()
            },
        )
        .await?;
    assert_eq!(page.total, 2);

    let all = console
        .users
        .list_users(1, 2, ListUserOptions::default())
        .await?;
    assert_eq!(all.total, 4);
    assert_eq!(all.items.len(), 2);
    Ok(())
}

#[tokio::test]
async fn disable_and_enable_user() -> AppResult<()> {
    let console = TestConsole::started().await?;
    console.users.create_user(user_input("alice")).await?;

    console.users.disable_user("alice").await?;
    assert!(console.users.get_user("alice").await?.disabled);
    assert!(matches!(
        console.users.disable_user("alice").await,
        Err(AppError::Validation(_))
    ));

    console.users.enable_user("alice").await?;
    assert!(!console.users.get_user("alice").await?.disabled);
    assert!(matches!(
        console.users.enable_user("alice").await,
        Err(AppError::Validation(_))
    ));
    Ok(())
}

#[tokio::test]
async fn login_user_info_lists_project_permissions() -> AppResult<()> {
    let console = TestConsole::started().await?;

    let info = console.users.detail_login_user_info(&actor("admin")).await?;
    assert_eq!(info.user.name, "admin");
    assert_eq!(info.projects.len(), 1);
    assert!(info.project_permissions.contains_key("default"));
    assert!(!info.platform_permissions.is_empty());

    let missing = console.users.detail_login_user_info(&actor("ghost")).await;
    assert!(matches!(missing, Err(AppError::Unauthorized(_))));
    Ok(())
}

#[tokio::test]
async fn update_login_time_records_the_login() -> AppResult<()> {
    let console = TestConsole::started().await?;
    let admin: User = console.users.get_user("admin").await?;
    assert!(admin.last_login_time.is_none());

    let admin = console.users.update_login_time(admin).await?;

    assert!(admin.last_login_time.is_some());
    Ok(())
}
