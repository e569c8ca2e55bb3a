use std::collections::HashMap;

use proptest::prelude::*;
use vela_console_core::AppError;

use crate::security::{Permission, PermissionEffect};

use super::{
    RequestResourceAction, ResourceName, fill_path_params, resolve_resource_path,
    validate_resource_pattern,
};

fn params() -> HashMap<&'static str, &'static str> {
    HashMap::from([("projectName", "projectName"), ("app1", "app1")])
}

fn request(template: &str, actions: &[&str]) -> RequestResourceAction {
    let params = params();
    RequestResourceAction::new(template, |key| params.get(key).copied(), actions)
}

fn permission(resources: &[&str], actions: &[&str], effect: PermissionEffect) -> Permission {
    Permission {
        effect,
        ..Permission::allow("", "test", "", resources, actions)
    }
}

#[test]
fn resolves_root_and_unique_nested_resources() {
    assert_eq!(
        resolve_resource_path("project").ok().as_deref(),
        Some("project:{projectName}")
    );
    assert_eq!(
        resolve_resource_path("application").ok().as_deref(),
        Some("project:{projectName}/application:{appName}")
    );
    assert_eq!(
        resolve_resource_path("environment").ok().as_deref(),
        Some("project:{projectName}/environment:{envName}")
    );
    assert_eq!(
        resolve_resource_path("component").ok().as_deref(),
        Some("project:{projectName}/application:{appName}/component:{compName}")
    );
    assert_eq!(resolve_resource_path("role").ok().as_deref(), Some("role:*"));
}

#[test]
fn resolves_qualified_paths() {
    assert_eq!(
        resolve_resource_path("project/application/workflow").ok().as_deref(),
        Some("project:{projectName}/application:{appName}/workflow:{workflowName}")
    );
    assert_eq!(
        resolve_resource_path("project/workflow").ok().as_deref(),
        Some("project:{projectName}/workflow:{workflowName}")
    );
}

#[test]
fn rejects_unknown_and_ambiguous_paths() {
    assert!(resolve_resource_path("applications").is_err());
    assert!(resolve_resource_path("project/component").is_err());
    assert!(resolve_resource_path("workflow").is_err());
}

#[test]
fn config_is_ambiguous_and_project_role_is_not() {
    assert!(matches!(
        resolve_resource_path("config"),
        Err(AppError::Validation(message)) if message.contains("not unique")
    ));
    assert_eq!(
        resolve_resource_path("project/role").ok().as_deref(),
        Some("project:{projectName}/role:*")
    );
    assert_eq!(
        resolve_resource_path("configType/config").ok().as_deref(),
        Some("configType:{configType}/config:{name}")
    );
}

#[test]
fn resource_patterns_follow_the_tree() {
    for pattern in [
        "*",
        "project:*",
        "project:team/application:*/*",
        "project:team/application:shop/component:web/trait:scaler",
        "cluster:*/namespace:*",
        "configType:helm-repository/config:*",
        "addonRegistry:*",
        "project",
    ] {
        assert!(validate_resource_pattern(pattern).is_ok(), "{pattern}");
    }

    for pattern in [
        "nosuchthing:x/alsonot",
        "project:team/trait:*",
        "application:*",
        "project:",
        ":x",
        "project:team//application:*",
        "",
    ] {
        assert!(
            matches!(validate_resource_pattern(pattern), Err(AppError::Validation(_))),
            "{pattern}"
        );
    }
}

#[test]
fn empty_path_params_become_wildcards() {
    let params = params();
    let filled = fill_path_params("project:{projectName}/workflow:{empty}", |key| {
        params.get(key).copied()
    });
    assert_eq!(filled, "project:projectName/workflow:*");

    let request = request("project:{empty}/application:{empty}", &["list"]);
    assert_eq!(request.resource().to_string(), "project:*/application:*");
}

#[test]
fn pattern_does_not_cover_deeper_resources() {
    let pattern = ResourceName::parse("project:*");
    let nested = ResourceName::parse("project:p1/application:a1");
    assert!(!pattern.matches(&nested));
    assert!(ResourceName::parse("project:*/*").matches(&nested));
}

#[test]
fn workflow_request_respects_project_and_actions() {
    let request = request("project:{projectName}/workflow:{empty}", &["create"]);

    assert!(request.is_allowed_by(&[permission(
        &["project:*/workflow:*"],
        &["*"],
        PermissionEffect::Allow
    )]));
    assert!(!request.is_allowed_by(&[permission(
        &["project:ddd/workflow:*"],
        &["create"],
        PermissionEffect::Allow
    )]));
    assert!(request.is_allowed_by(&[permission(
        &["project:projectName/workflow:*"],
        &["create"],
        PermissionEffect::Allow
    )]));
    assert!(!request.is_allowed_by(&[permission(
        &["project:projectName/workflow:*"],
        &["create"],
        PermissionEffect::Deny
    )]));
}

#[test]
fn component_request_requires_every_action() {
    let request = request(
        "project:{projectName}/application:{app1}/component:{empty}",
        &["delete"],
    );

    assert!(request.is_allowed_by(&[permission(
        &["project:*/application:app1/component:*"],
        &["list", "delete"],
        PermissionEffect::Allow
    )]));
    assert!(request.is_allowed_by(&[permission(
        &["project:*", "project:*/application:app1/component:*"],
        &["list", "delete"],
        PermissionEffect::Allow
    )]));
    assert!(!request.is_allowed_by(&[permission(
        &["project:*/application:app1/component:*"],
        &["list", "detail"],
        PermissionEffect::Allow
    )]));
    assert!(request.is_allowed_by(&[permission(
        &["project:projectName/application:*/*"],
        &["*"],
        PermissionEffect::Allow
    )]));
}

#[test]
fn deny_overrides_global_allow() {
    let request = request(
        "project:{projectName}/application:{app1}/component:{empty}",
        &["delete"],
    );
    let permissions = [
        permission(&["*"], &["*"], PermissionEffect::Allow),
        permission(
            &["project:*/application:app1/component:*"],
            &["*"],
            PermissionEffect::Deny,
        ),
    ];

    assert!(!request.is_allowed_by(&permissions));
    assert!(request.is_allowed_by(&permissions[..1]));
}

#[test]
fn environment_create_is_refused_for_read_only_grants() -> vela_console_core::AppResult<()> {
    let path = resolve_resource_path("environment")?;
    let request = RequestResourceAction::new(
        &path,
        |key| (key == "projectName").then_some("default"),
        &["create"],
    );

    assert!(!request.is_allowed_by(&[permission(
        &[
            "project:*/*",
            "project:default/environment:*",
            "project:default",
        ],
        &["list", "detail"],
        PermissionEffect::Allow,
    )]));
    Ok(())
}

#[test]
fn empty_permission_set_refuses() {
    let request = request("role:*", &["list"]);
    assert!(!request.is_allowed_by(&[]));
}

proptest! {
    #[test]
    fn global_wildcard_covers_any_resource(
        kinds in proptest::collection::vec("[a-z]{1,8}", 1..5),
        value in "[a-z0-9-]{1,12}",
    ) {
        let resource = kinds
            .iter()
            .map(|kind| format!("{kind}:{value}"))
            .collect::<Vec<_>>()
            .join("/");
        let parsed = ResourceName::parse(&resource);

        prop_assert!(ResourceName::parse("*").matches(&parsed));
        prop_assert!(parsed.matches(&parsed));
        prop_assert_eq!(parsed.to_string(), resource);
    }
}
