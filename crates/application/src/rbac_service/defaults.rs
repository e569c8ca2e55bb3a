use vela_console_domain::{
    PROJECT_ADMIN_ROLE_NAME, PROJECT_VIEWER_ROLE_NAME, Permission, Role,
};

pub(super) const ADMIN_PERMISSION_NAME: &str = "admin";

const PROJECT_VIEW_PERMISSION: &str = "project-view";
const APP_MANAGEMENT_PERMISSION: &str = "app-management";
const ENV_MANAGEMENT_PERMISSION: &str = "env-management";
const ROLE_MANAGEMENT_PERMISSION: &str = "role-management";
const CONFIGURATION_READ_PERMISSION: &str = "configuration-read";

pub(super) fn platform_permissions() -> Vec<Permission> {
    vec![
        Permission::allow("", ADMIN_PERMISSION_NAME, "Admin", &["*"], &["*"]),
        Permission::allow(
            "",
            "cluster-management",
            "Cluster Management",
            &["cluster:*/*"],
            &["*"],
        ),
        Permission::allow(
            "",
            "project-management",
            "Project Management",
            &["project:*"],
            &["*"],
        ),
        Permission::allow(
            "",
            "addon-management",
            "Addon Management",
            &["addon:*", "addonRegistry:*"],
            &["*"],
        ),
        Permission::allow(
            "",
            "target-management",
            "Target Management",
            &["target:*", "cluster:*/namespace:*"],
            &["*"],
        ),
        Permission::allow(
            "",
            "user-management",
            "User Management",
            &["user:*"],
            &["*"],
        ),
        Permission::allow(
            "",
            "role-management",
            "Platform Role Management",
            &["role:*", "permission:*"],
            &["*"],
        ),
        Permission::allow(
            "",
            "environment-management",
            "Environment Management",
            &["project:*/environment:*"],
            &["*"],
        ),
    ]
}

pub(super) fn project_permissions(project: &str) -> Vec<Permission> {
    let scoped = |suffix: &str| format!("project:{project}{suffix}");
    let view_resources = [
        scoped(""),
        scoped("/config:*"),
        scoped("/role:*"),
        scoped("/projectUser:*"),
        scoped("/permission:*"),
        scoped("/environment:*"),
        scoped("/application:*/*"),
    ];
    let view_resources: Vec<&str> = view_resources.iter().map(String::as_str).collect();
    let app_resources = scoped("/application:*/*");
    let env_resources = scoped("/environment:*");
    let role_resources = [
        scoped("/role:*"),
        scoped("/projectUser:*"),
        scoped("/permission:*"),
    ];
    let role_resources: Vec<&str> = role_resources.iter().map(String::as_str).collect();
    let config_resources = scoped("/config:*");

    vec![
        Permission::allow(
            project,
            PROJECT_VIEW_PERMISSION,
            "Project View",
            &view_resources,
            &["list", "detail"],
        ),
        Permission::allow(
            project,
            APP_MANAGEMENT_PERMISSION,
            "App Management",
            &[app_resources.as_str()],
            &["*"],
        ),
        Permission::allow(
            project,
            ENV_MANAGEMENT_PERMISSION,
            "Environment Management",
            &[env_resources.as_str()],
            &["*"],
        ),
        Permission::allow(
            project,
            ROLE_MANAGEMENT_PERMISSION,
            "Role Management",
            &role_resources,
            &["*"],
        ),
        Permission::allow(
            project,
            CONFIGURATION_READ_PERMISSION,
            "Configuration Read",
            &[config_resources.as_str()],
            &["list", "detail"],
        ),
    ]
}

pub(super) fn project_roles(project: &str) -> Vec<Role> {
    vec![
        Role {
            alias: "Project Admin".to_owned(),
            permissions: [
                PROJECT_VIEW_PERMISSION,
                APP_MANAGEMENT_PERMISSION,
                ENV_MANAGEMENT_PERMISSION,
                ROLE_MANAGEMENT_PERMISSION,
                CONFIGURATION_READ_PERMISSION,
            ]
            .map(str::to_owned)
            .to_vec(),
            ..Role::key(project, PROJECT_ADMIN_ROLE_NAME)
        },
        Role {
            alias: "Project Viewer".to_owned(),
            permissions: vec![PROJECT_VIEW_PERMISSION.to_owned()],
            ..Role::key(project, PROJECT_VIEWER_ROLE_NAME)
        },
    ]
}
