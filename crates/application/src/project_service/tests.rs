use vela_console_core::{AppError, AppResult};
use vela_console_domain::{
    PROJECT_ADMIN_ROLE_NAME, PROJECT_VIEWER_ROLE_NAME, Project, ProjectUser, Role,
};

use crate::datastore_ports::ListOptions;
use crate::target_service::CreateTargetInput;
use crate::test_support::{TestConsole, actor};
use crate::user_service::CreateUserInput;

use super::{AddProjectUserInput, CreateProjectInput, UpdateProjectInput};

fn project_input(name: &str, owner: &str) -> CreateProjectInput {
    CreateProjectInput {
        name: name.to_owned(),
        alias: format!("{name} project"),
        owner: owner.to_owned(),
        ..CreateProjectInput::default()
    }
}

async fn add_user(console: &TestConsole, name: &str) -> AppResult<()> {
    console
        .users
        .create_user(CreateUserInput {
            name: name.to_owned(),
            alias: name.to_uppercase(),
            password: "secret123".to_owned(),
            ..CreateUserInput::default()
        })
        .await?;
    Ok(())
}

#[tokio::test]
async fn init_seeds_the_default_project_once() -> AppResult<()> {
    let console = TestConsole::started().await?;

    let project = console.projects.detail_project("default").await?;
    assert_eq!(project.alias, "Default");
    assert_eq!(project.owner.name, "admin");
    assert_eq!(project.owner.alias, "Administrator");
    assert!(console.targets.detail_target("default").await.is_ok());
    assert_eq!(console.envs.detail_env("default").await?.targets.len(), 1);

    console.projects.init("other").await?;
    let projects = console
        .store
        .list(&Project::default(), &ListOptions::default())
        .await?;
    assert_eq!(projects.len(), 1);
    Ok(())
}

#[tokio::test]
async fn create_project_seeds_roles_and_owner_membership() -> AppResult<()> {
    let console = TestConsole::started().await?;
    add_user(&console, "alice").await?;

    let created = console
        .projects
        .create_project(project_input("team", "alice"))
        .await?;

    assert_eq!(created.owner.alias, "ALICE");
    for role in [PROJECT_ADMIN_ROLE_NAME, PROJECT_VIEWER_ROLE_NAME] {
        assert!(console.store.is_exist(&Role::key("team", role)).await?);
    }
    let membership = console
        .store
        .get(&ProjectUser::key("team", "alice"))
        .await?
        .ok_or_else(|| AppError::NotFound("membership".to_owned()))?;
    assert_eq!(membership.user_roles, vec![PROJECT_ADMIN_ROLE_NAME.to_owned()]);
    Ok(())
}

#[tokio::test]
async fn create_project_rejects_duplicates_and_unknown_owners() -> AppResult<()> {
    let console = TestConsole::started().await?;

    assert!(matches!(
        console
            .projects
            .create_project(project_input("default", "admin"))
            .await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        console
            .projects
            .create_project(project_input("team", "ghost"))
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        console.projects.create_project(project_input("", "admin")).await,
        Err(AppError::Validation(_))
    ));
    assert!(!console.store.is_exist(&Project::key("team")).await?);
    Ok(())
}

#[tokio::test]
async fn update_project_adds_a_new_owner_as_admin() -> AppResult<()> {
    let console = TestConsole::started().await?;
    add_user(&console, "alice").await?;
    console
        .projects
        .create_project(project_input("team", "admin"))
        .await?;

    let updated = console
        .projects
        .update_project(
            "team",
            UpdateProjectInput {
                alias: "Team".to_owned(),
                description: "the team".to_owned(),
                owner: "alice".to_owned(),
            },
        )
        .await?;

    assert_eq!(updated.alias, "Team");
    assert_eq!(updated.owner.name, "alice");
    assert!(
        console
            .store
            .is_exist(&ProjectUser::key("team", "alice"))
            .await?
    );
    Ok(())
}

#[tokio::test]
async fn delete_project_requires_an_empty_project() -> AppResult<()> {
    let console = TestConsole::started().await?;
    console
        .projects
        .create_project(project_input("team", "admin"))
        .await?;
    console
        .targets
        .create_target(CreateTargetInput {
            name: "team-qa".to_owned(),
            project: "team".to_owned(),
            ..CreateTargetInput::default()
        })
        .await?;

    assert!(matches!(
        console.projects.delete_project("team").await,
        Err(AppError::Conflict(_))
    ));

    console.targets.delete_target("team-qa").await?;
    console.projects.delete_project("team").await?;

    assert!(matches!(
        console.projects.detail_project("team").await,
        Err(AppError::NotFound(_))
    ));
    assert!(
        !console
            .store
            .is_exist(&ProjectUser::key("team", "admin"))
            .await?
    );
    assert!(
        console
            .store
            .list(&Role::key("team", ""), &ListOptions::default())
            .await?
            .is_empty()
    );
    Ok(())
}

#[tokio::test]
async fn list_projects_follows_visibility() -> AppResult<()> {
    let console = TestConsole::started().await?;
    add_user(&console, "bob").await?;
    console
        .projects
        .create_project(project_input("team", "bob"))
        .await?;
    console
        .projects
        .create_project(project_input("ops", "admin"))
        .await?;

    let admin_view = console.projects.list_projects(&actor("admin"), 0, 0).await?;
    assert_eq!(admin_view.total, 3);

    let bob_view = console.projects.list_projects(&actor("bob"), 0, 0).await?;
    assert_eq!(bob_view.total, 1);
    assert_eq!(bob_view.items[0].name, "team");

    let memberships = console.projects.list_user_projects("bob").await?;
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].name, "team");
    Ok(())
}

#[tokio::test]
async fn project_members_can_be_managed() -> AppResult<()> {
    let console = TestConsole::started().await?;
    add_user(&console, "carol").await?;

    let added = console
        .projects
        .add_project_user(
            "default",
            AddProjectUserInput {
                username: "carol".to_owned(),
                roles: vec![PROJECT_VIEWER_ROLE_NAME.to_owned()],
            },
        )
        .await?;
    assert_eq!(added.user_alias, "CAROL");

    let updated = console
        .projects
        .update_project_user(
            "default",
            "carol",
            vec![PROJECT_ADMIN_ROLE_NAME.to_owned()],
        )
        .await?;
    assert_eq!(updated.roles, vec![PROJECT_ADMIN_ROLE_NAME.to_owned()]);

    let members = console.projects.list_project_users("default", 0, 0).await?;
    assert_eq!(members.total, 2);

    console
        .projects
        .delete_project_user("default", "carol")
        .await?;
    let members = console.projects.list_project_users("default", 0, 0).await?;
    assert_eq!(members.total, 1);
    assert_eq!(members.items[0].username, "admin");
    Ok(())
}

#[tokio::test]
async fn add_project_user_validates_input() -> AppResult<()> {
    let console = TestConsole::started().await?;
    add_user(&console, "carol").await?;
    let viewer = || AddProjectUserInput {
        username: "carol".to_owned(),
        roles: vec![PROJECT_VIEWER_ROLE_NAME.to_owned()],
    };

    assert!(matches!(
        console
            .projects
            .add_project_user(
                "default",
                AddProjectUserInput {
                    username: "ghost".to_owned(),
                    ..viewer()
                },
            )
            .await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        console
            .projects
            .add_project_user(
                "default",
                AddProjectUserInput {
                    roles: Vec::new(),
                    ..viewer()
                },
            )
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        console
            .projects
            .add_project_user(
                "default",
                AddProjectUserInput {
                    roles: vec!["owner".to_owned()],
                    ..viewer()
                },
            )
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        console.projects.add_project_user("missing", viewer()).await,
        Err(AppError::NotFound(_))
    ));

    console.projects.add_project_user("default", viewer()).await?;
    assert!(matches!(
        console.projects.add_project_user("default", viewer()).await,
        Err(AppError::Conflict(_))
    ));
    Ok(())
}
