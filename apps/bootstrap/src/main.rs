//! vela-console composition root.
//!
//! Loads configuration, wires the adapters, seeds the default resources and
//! verifies that the admin account can log in.

#![forbid(unsafe_code)]

mod bootstrap_config;
mod console_services;

use std::time::Duration;

use tracing::{info, warn};
use vela_console_application::{ADMIN_PASSWORD_SECRET_NAME, ListApplicationOptions, LoginInput};
use vela_console_core::{AppError, AppResult, UserIdentity};
use vela_console_domain::DEFAULT_ADMIN_USER_NAME;

use crate::bootstrap_config::{BootstrapConfig, init_tracing};
use crate::console_services::ConsoleServices;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = BootstrapConfig::load()?;
    let console = ConsoleServices::build(&config).await?;

    let system_info = console.system_info.get_or_create().await?;
    console.rbac.init().await?;
    console.users.init().await?;
    console.projects.init(&config.default_namespace).await?;
    console.targets.init().await?;
    console.clusters.init().await?;
    let catalog_refresh = console.addons.spawn_catalog_refresh(Duration::from_secs(u64::from(
        config.addon_catalog_refresh_seconds,
    )));

    info!(
        install_id = %system_info.install_id,
        login_type = %system_info.login_type.as_str(),
        "vela-console initialized"
    );

    log_default_resources(&console).await?;
    verify_admin_login(&console, &config.system_namespace).await?;

    catalog_refresh.abort();
    Ok(())
}

async fn log_default_resources(console: &ConsoleServices) -> AppResult<()> {
    let admin = UserIdentity::new(DEFAULT_ADMIN_USER_NAME, DEFAULT_ADMIN_USER_NAME, None);

    let roles = console.rbac.list_roles("", 0, 0).await?;
    let projects = console.projects.list_projects(&admin, 0, 0).await?;
    let targets = console.targets.list_targets(0, 0, "").await?;
    let envs = console.envs.list_envs(&admin, 0, 0, "").await?;
    let applications = console
        .applications
        .list_applications(&admin, &ListApplicationOptions::default())
        .await?;
    let clusters = console.clusters.list_kube_clusters("", 0, 0).await?;
    let config_types = console.configs.list_config_types("").await?;
    let registries = console.addons.list_addon_registries().await?;
    let enabled_addons = console.addons.list_enabled_addons().await?;
    let helm_repositories = console.helm_repositories.list_helm_repositories("").await?;

    info!(
        platform_roles = roles.total,
        projects = projects.total,
        targets = targets.total,
        envs = envs.total,
        applications = applications.len(),
        clusters = clusters.total,
        config_types = config_types.len(),
        addon_registries = registries.len(),
        enabled_addons = enabled_addons.len(),
        helm_repositories = helm_repositories.len(),
        "loaded console resources"
    );
    for cluster in &clusters.items {
        info!(cluster = %cluster.name, status = %cluster.status, "cluster");
    }
    for project in &projects.items {
        info!(project = %project.name, owner = %project.owner.name, "project");
    }
    for target in &targets.items {
        let (cluster, namespace) = target
            .cluster
            .as_ref()
            .map(|cluster| (cluster.cluster_name.as_str(), cluster.namespace.as_str()))
            .unwrap_or_default();
        info!(
            target = %target.name,
            project = %target.project,
            cluster,
            namespace,
            "target"
        );
    }
    for detail in &envs.items {
        info!(
            env = %detail.env.name,
            project = %detail.env.project,
            namespace = %detail.env.namespace,
            "env"
        );
    }

    Ok(())
}

async fn verify_admin_login(console: &ConsoleServices, system_namespace: &str) -> AppResult<()> {
    let password = console
        .cluster
        .get_secret(system_namespace, ADMIN_PASSWORD_SECRET_NAME)
        .await?
        .and_then(|data| data.get(DEFAULT_ADMIN_USER_NAME).cloned());

    let Some(password) = password else {
        warn!(
            namespace = system_namespace,
            secret = ADMIN_PASSWORD_SECRET_NAME,
            "admin password secret not found, skipping login check"
        );
        return Ok(());
    };

    match console
        .authentication
        .login(LoginInput {
            username: DEFAULT_ADMIN_USER_NAME.to_owned(),
            password,
        })
        .await
    {
        Ok(outcome) => {
            let identity = console
                .authentication
                .authenticate(&outcome.access_token)
                .await?;
            info!(
                user = %identity.subject(),
                name = %identity.display_name(),
                email = identity.email().unwrap_or_default(),
                "admin login verified"
            );
        }
        Err(AppError::Unauthorized(message)) => {
            warn!(reason = %message, "admin password was changed after initialization");
        }
        Err(error) => return Err(error),
    }

    Ok(())
}
