use std::collections::HashMap;

use vela_console_core::{AppError, AppResult};
use vela_console_domain::{
    Permission, PermissionEffect, Project, ProjectUser, Role, User, validate_resource_pattern,
};

use crate::datastore_ports::EntityStore;
use crate::test_support::{actor, entity_store};

use super::defaults::{platform_permissions, project_permissions};
use super::{CreatePermissionInput, CreateRoleInput, RbacService};

async fn seeded_service() -> AppResult<(RbacService, EntityStore)> {
    let store = entity_store();
    let service = RbacService::new(store.clone());
    service.init().await?;

    store
        .add(User {
            user_roles: vec!["admin".to_owned()],
            ..User::key("admin")
        })
        .await?;
    store.add(User::key("dev")).await?;
    store
        .add(Project {
            owner: "admin".to_owned(),
            ..Project::key("team")
        })
        .await?;
    service
        .init_default_roles_and_permissions_for_project("team")
        .await?;

    Ok((service, store))
}

fn project_params(project_name: &str) -> HashMap<String, String> {
    HashMap::from([("projectName".to_owned(), project_name.to_owned())])
}

#[tokio::test]
async fn init_seeds_platform_permissions_once() -> AppResult<()> {
    let store = entity_store();
    let service = RbacService::new(store.clone());
    service.init().await?;
    service.init().await?;

    let permissions = service.list_permissions("").await?;
    assert_eq!(permissions.len(), 8);
    assert!(store.is_exist(&Role::key("", "admin")).await?);
    Ok(())
}

#[tokio::test]
async fn platform_admin_passes_every_check() -> AppResult<()> {
    let (service, _) = seeded_service().await?;

    let result = service
        .check_perm(
            &actor("admin"),
            "application",
            &["deploy"],
            &project_params("team"),
        )
        .await;

    assert!(result.is_ok());
    Ok(())
}

#[tokio::test]
async fn project_viewer_may_read_but_not_create() -> AppResult<()> {
    let (service, store) = seeded_service().await?;
    store
        .add(ProjectUser {
            user_roles: vec!["project-viewer".to_owned()],
            ..ProjectUser::key("team", "dev")
        })
        .await?;

    let params = project_params("team");
    assert!(
        service
            .is_allowed(&actor("dev"), "application", &["detail"], &params)
            .await?
    );
    let refused = service
        .check_perm(&actor("dev"), "application", &["create"], &params)
        .await;
    assert!(matches!(refused, Err(AppError::Forbidden(_))));

    let other_project = service
        .is_allowed(&actor("dev"), "application", &["detail"], &project_params("other"))
        .await?;
    assert!(!other_project);
    Ok(())
}

#[tokio::test]
async fn disabled_or_unknown_users_are_unauthorized() -> AppResult<()> {
    let (service, store) = seeded_service().await?;
    store
        .put(User {
            disabled: true,
            ..User::key("dev")
        })
        .await?;

    let disabled = service
        .is_allowed(&actor("dev"), "project", &["list"], &HashMap::new())
        .await;
    let unknown = service
        .is_allowed(&actor("ghost"), "project", &["list"], &HashMap::new())
        .await;

    assert!(matches!(disabled, Err(AppError::Unauthorized(_))));
    assert!(matches!(unknown, Err(AppError::Unauthorized(_))));
    Ok(())
}

#[tokio::test]
async fn deny_permission_overrides_allow() -> AppResult<()> {
    let (service, store) = seeded_service().await?;
    service
        .create_permission(
            "team",
            CreatePermissionInput {
                name: "no-delete".to_owned(),
                alias: "No Delete".to_owned(),
                resources: vec!["project:team/application:*/*".to_owned()],
                actions: vec!["delete".to_owned()],
                effect: "Deny".to_owned(),
            },
        )
        .await?;
    service
        .create_role(
            "team",
            CreateRoleInput {
                name: "careful-admin".to_owned(),
                alias: String::new(),
                permissions: vec!["app-management".to_owned(), "no-delete".to_owned()],
            },
        )
        .await?;
    store
        .add(ProjectUser {
            user_roles: vec!["careful-admin".to_owned()],
            ..ProjectUser::key("team", "dev")
        })
        .await?;

    let params = project_params("team");
    assert!(
        service
            .is_allowed(&actor("dev"), "application", &["update"], &params)
            .await?
    );
    assert!(
        !service
            .is_allowed(&actor("dev"), "application", &["delete"], &params)
            .await?
    );

    let stored = store.get(&Permission::key("team", "no-delete")).await?;
    assert_eq!(stored.map(|permission| permission.effect), Some(PermissionEffect::Deny));
    Ok(())
}

#[tokio::test]
async fn permission_resources_must_exist_in_the_tree() -> AppResult<()> {
    let (service, store) = seeded_service().await?;

    let result = service
        .create_permission(
            "team",
            CreatePermissionInput {
                name: "bogus".to_owned(),
                alias: String::new(),
                resources: vec!["nosuchthing:x/alsonot".to_owned()],
                actions: vec!["*".to_owned()],
                effect: String::new(),
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(!store.is_exist(&Permission::key("team", "bogus")).await?);
    Ok(())
}

#[test]
fn seeded_permissions_name_known_resources() -> AppResult<()> {
    for permission in platform_permissions()
        .into_iter()
        .chain(project_permissions("team"))
    {
        for resource in &permission.resources {
            validate_resource_pattern(resource)?;
        }
    }
    Ok(())
}

#[tokio::test]
async fn role_requires_existing_permissions() -> AppResult<()> {
    let (service, _) = seeded_service().await?;

    let empty = service
        .create_role(
            "team",
            CreateRoleInput {
                name: "empty".to_owned(),
                alias: String::new(),
                permissions: Vec::new(),
            },
        )
        .await;
    let unknown = service
        .create_role(
            "team",
            CreateRoleInput {
                name: "ghost".to_owned(),
                alias: String::new(),
                permissions: vec!["does-not-exist".to_owned()],
            },
        )
        .await;
    let missing_project = service
        .create_role(
            "nope",
            CreateRoleInput {
                name: "ops".to_owned(),
                alias: String::new(),
                permissions: vec!["project-view".to_owned()],
            },
        )
        .await;

    assert!(matches!(empty, Err(AppError::Validation(_))));
    assert!(matches!(unknown, Err(AppError::Validation(_))));
    assert!(matches!(missing_project, Err(AppError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn duplicate_role_conflicts_and_list_counts_project_roles() -> AppResult<()> {
    let (service, _) = seeded_service().await?;
    let input = CreateRoleInput {
        name: "ops".to_owned(),
        alias: "Ops".to_owned(),
        permissions: vec!["project-view".to_owned()],
    };

    let created = service.create_role("team", input.clone()).await?;
    let duplicate = service.create_role("team", input).await;
    let page = service.list_roles("team", 1, 2).await?;

    assert_eq!(created.permissions[0].alias, "Project View");
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    Ok(())
}

#[tokio::test]
async fn permission_in_use_cannot_be_deleted() -> AppResult<()> {
    let (service, _) = seeded_service().await?;

    let in_use = service.delete_permission("team", "project-view").await;
    let missing = service.delete_permission("team", "nothing").await;

    assert!(matches!(in_use, Err(AppError::Conflict(_))));
    assert!(matches!(missing, Err(AppError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn accessible_projects_follow_membership() -> AppResult<()> {
    let (service, store) = seeded_service().await?;
    store.add(Project::key("other")).await?;
    store
        .add(ProjectUser {
            user_roles: vec!["project-viewer".to_owned()],
            ..ProjectUser::key("team", "dev")
        })
        .await?;

    let mut admin_projects = service.accessible_projects(&actor("admin")).await?;
    admin_projects.sort();
    let dev_projects = service.accessible_projects(&actor("dev")).await?;

    assert_eq!(admin_projects, vec!["other".to_owned(), "team".to_owned()]);
    assert_eq!(dev_projects, vec!["team".to_owned()]);
    Ok(())
}
