use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use vela_console_core::{AppError, AppResult};
use vela_console_domain::{
    ADDON_CATALOG_KEY, AddonPhase, AddonRegistry, GitAddonSource, HelmAddonSource, JsonObject,
    LABEL_ADDON_NAME, addon_app_name, addon_catalog_config_map, addon_secret_name,
    registry_token_secret_name,
};

use super::{ADDON_ARGS_KEY, AddonService, UpdateAddonRegistryInput};
use crate::cluster_ports::{ClusterClient, ConfigMapData};
use crate::test_support::{FakeClusterClient, SYSTEM_NAMESPACE};

fn service() -> (AddonService, Arc<FakeClusterClient>) {
    let cluster = Arc::new(FakeClusterClient::default());
    let port: Arc<dyn ClusterClient> = cluster.clone();
    (AddonService::new(port, SYSTEM_NAMESPACE), cluster)
}

fn helm_registry(name: &str) -> AddonRegistry {
    AddonRegistry {
        name: name.to_owned(),
        helm: Some(HelmAddonSource {
            url: format!("https://{name}.example.com"),
        }),
        ..AddonRegistry::default()
    }
}

async fn publish(cluster: &FakeClusterClient, registry: &str, addons: serde_json::Value) {
    cluster.config_maps.lock().await.insert(
        (
            SYSTEM_NAMESPACE.to_owned(),
            addon_catalog_config_map(registry),
        ),
        ConfigMapData {
            name: addon_catalog_config_map(registry),
            labels: BTreeMap::new(),
            data: BTreeMap::from([(ADDON_CATALOG_KEY.to_owned(), addons.to_string())]),
        },
    );
}

fn args(value: serde_json::Value) -> JsonObject {
    match value {
        serde_json::Value::Object(object) => object,
        _ => JsonObject::new(),
    }
}

#[tokio::test]
async fn registry_tokens_move_into_secrets() -> AppResult<()> {
    let (addons, cluster) = service();
    let created = addons
        .create_addon_registry(AddonRegistry {
            name: "private".to_owned(),
            git: Some(GitAddonSource {
                url: "https://git.example.com/addons".to_owned(),
                token: "s3cret".to_owned(),
                ..GitAddonSource::default()
            }),
            ..AddonRegistry::default()
        })
        .await?;

    let source = created.git.unwrap_or_default();
    assert!(source.token.is_empty());
    assert_eq!(source.token_secret_ref, registry_token_secret_name("private"));

    let secret = cluster
        .get_secret(SYSTEM_NAMESPACE, &registry_token_secret_name("private"))
        .await?
        .unwrap_or_default();
    assert_eq!(secret.get("token").map(String::as_str), Some("s3cret"));

    let stored = cluster
        .get_config_map(SYSTEM_NAMESPACE, "vela-addon-registry")
        .await?
        .map(|config_map| config_map.data.into_values().collect::<String>())
        .unwrap_or_default();
    assert!(!stored.contains("s3cret"));

    let listed = addons.list_addon_registries().await?;
    assert_eq!(listed.len(), 1);
    assert!(listed[0].git.as_ref().is_some_and(|git| git.token.is_empty()));
    Ok(())
}

#[tokio::test]
async fn registry_crud_rules() -> AppResult<()> {
    let (addons, cluster) = service();
    addons.create_addon_registry(helm_registry("kubevela")).await?;

    assert!(matches!(
        addons.create_addon_registry(helm_registry("kubevela")).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        addons
            .create_addon_registry(AddonRegistry {
                name: "empty".to_owned(),
                ..AddonRegistry::default()
            })
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        addons.get_addon_registry("missing").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        addons
            .update_addon_registry("missing", UpdateAddonRegistryInput::default())
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        addons
            .update_addon_registry(
                "missing",
                UpdateAddonRegistryInput {
                    helm: helm_registry("missing").helm,
                    ..UpdateAddonRegistryInput::default()
                }
            )
            .await,
        Err(AppError::NotFound(_))
    ));

    let updated = addons
        .update_addon_registry(
            "kubevela",
            UpdateAddonRegistryInput {
                helm: Some(HelmAddonSource {
                    url: "https://mirror.example.com".to_owned(),
                }),
                ..UpdateAddonRegistryInput::default()
            },
        )
        .await?;
    assert_eq!(
        updated.helm.map(|helm| helm.url).as_deref(),
        Some("https://mirror.example.com")
    );

    addons.delete_addon_registry("kubevela").await?;
    addons.delete_addon_registry("kubevela").await?;
    assert!(addons.list_addon_registries().await?.is_empty());
    assert!(
        cluster
            .get_config_map(SYSTEM_NAMESPACE, "vela-addon-registry")
            .await?
            .is_some()
    );
    Ok(())
}

#[tokio::test]
async fn update_without_token_keeps_the_stored_secret() -> AppResult<()> {
    let (addons, cluster) = service();
    addons
        .create_addon_registry(AddonRegistry {
            name: "private".to_owned(),
            gitlab: Some(GitAddonSource {
                url: "https://gitlab.example.com/addons".to_owned(),
                token: "s3cret".to_owned(),
                ..GitAddonSource::default()
            }),
            ..AddonRegistry::default()
        })
        .await?;

    let updated = addons
        .update_addon_registry(
            "private",
            UpdateAddonRegistryInput {
                gitlab: Some(GitAddonSource {
                    url: "https://gitlab.example.com/other".to_owned(),
                    ..GitAddonSource::default()
                }),
                ..UpdateAddonRegistryInput::default()
            },
        )
        .await?;
    assert_eq!(
        updated.gitlab.map(|source| source.token_secret_ref),
        Some(registry_token_secret_name("private"))
    );

    addons.delete_addon_registry("private").await?;
    assert!(
        cluster
            .get_secret(SYSTEM_NAMESPACE, &registry_token_secret_name("private"))
            .await?
            .is_none()
    );
    Ok(())
}

#[tokio::test]
async fn listing_merges_registries_and_hides_invisible_addons() -> AppResult<()> {
    let (addons, cluster) = service();
    addons.create_addon_registry(helm_registry("a-official")).await?;
    addons.create_addon_registry(helm_registry("b-community")).await?;
    publish(
        &cluster,
        "a-official",
        json!([
            {"name": "fluxcd", "version": "1.0.0", "description": "GitOps"},
            {"name": "terraform", "version": "1.0.0", "invisible": true}
        ]),
    )
    .await;
    publish(
        &cluster,
        "b-community",
        json!([
            {"name": "fluxcd", "version": "0.9.0"},
            {"name": "argo-rollouts", "version": "0.1.0", "description": "progressive delivery"}
        ]),
    )
    .await;

    let listed = addons.list_addons("", "").await?;
    let names: Vec<&str> = listed.iter().map(|addon| addon.name.as_str()).collect();
    assert_eq!(names, ["argo-rollouts", "fluxcd"]);
    assert_eq!(listed[1].version, "1.0.0");
    assert_eq!(listed[1].registry_name, "a-official");

    let community = addons.list_addons("b-community", "").await?;
    assert_eq!(community.len(), 2);

    let queried = addons.list_addons("", "GitOps").await?;
    assert_eq!(queried.len(), 1);
    assert_eq!(queried[0].name, "fluxcd");

    assert!(matches!(
        addons.get_addon("nothing", "").await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(addons.get_addon("fluxcd", "b-community").await?.version, "0.9.0");
    Ok(())
}

#[tokio::test]
async fn catalogs_are_served_from_cache_until_refreshed() -> AppResult<()> {
    let (addons, cluster) = service();
    addons.create_addon_registry(helm_registry("kubevela")).await?;
    publish(&cluster, "kubevela", json!([{"name": "fluxcd"}])).await;
    assert_eq!(addons.list_addons("", "").await?.len(), 1);

    publish(
        &cluster,
        "kubevela",
        json!([{"name": "fluxcd"}, {"name": "velaux"}]),
    )
    .await;
    assert_eq!(addons.list_addons("", "").await?.len(), 1);

    addons.refresh_catalogs().await?;
    assert_eq!(addons.list_addons("", "").await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn broken_catalogs_keep_the_previous_entry_on_refresh() -> AppResult<()> {
    let (addons, cluster) = service();
    addons.create_addon_registry(helm_registry("kubevela")).await?;
    publish(&cluster, "kubevela", json!([{"name": "fluxcd"}])).await;
    addons.refresh_catalogs().await?;

    cluster.config_maps.lock().await.insert(
        (
            SYSTEM_NAMESPACE.to_owned(),
            addon_catalog_config_map("kubevela"),
        ),
        ConfigMapData {
            name: addon_catalog_config_map("kubevela"),
            labels: BTreeMap::new(),
            data: BTreeMap::from([(ADDON_CATALOG_KEY.to_owned(), "{broken".to_owned())]),
        },
    );
    addons.refresh_catalogs().await?;

    let listed = addons.list_addons("", "").await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "fluxcd");
    Ok(())
}

#[tokio::test]
async fn background_refresh_picks_up_new_catalogs() -> AppResult<()> {
    let (addons, cluster) = service();
    addons.create_addon_registry(helm_registry("kubevela")).await?;
    publish(&cluster, "kubevela", json!([{"name": "fluxcd"}])).await;
    assert_eq!(addons.list_addons("", "").await?.len(), 1);

    publish(
        &cluster,
        "kubevela",
        json!([{"name": "fluxcd"}, {"name": "velaux"}]),
    )
    .await;
    let handle = addons.spawn_catalog_refresh(Duration::from_secs(3600));

    let mut listed = 0;
    for _ in 0..100 {
        listed = addons.list_addons("", "").await?.len();
        if listed == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();

    assert_eq!(listed, 2);
    Ok(())
}

#[tokio::test]
async fn enabling_installs_dependencies_first() -> AppResult<()> {
    let (addons, cluster) = service();
    addons.create_addon_registry(helm_registry("kubevela")).await?;
    publish(
        &cluster,
        "kubevela",
        json!([
            {"name": "velaux", "version": "1.2.0", "dependencies": ["fluxcd"],
             "components": [{"name": "velaux", "type": "webservice"}]},
            {"name": "fluxcd", "version": "2.0.0"}
        ]),
    )
    .await;

    addons
        .enable_addon("velaux", args(json!({"domain": "vela.example.com"})))
        .await?;

    let velaux = cluster
        .get_application(SYSTEM_NAMESPACE, &addon_app_name("velaux"))
        .await?
        .ok_or_else(|| AppError::NotFound("velaux".to_owned()))?;
    assert_eq!(velaux.label(LABEL_ADDON_NAME), Some("velaux"));
    assert_eq!(velaux.annotation("addons.oam.dev/version"), Some("1.2.0"));
    assert_eq!(velaux.spec.components.len(), 1);
    assert!(
        cluster
            .get_application(SYSTEM_NAMESPACE, &addon_app_name("fluxcd"))
            .await?
            .is_some()
    );
    assert!(
        cluster
            .get_namespace("local", SYSTEM_NAMESPACE)
            .await?
            .is_some()
    );

    let secret = cluster
        .get_secret(SYSTEM_NAMESPACE, &addon_secret_name("velaux"))
        .await?
        .unwrap_or_default();
    assert_eq!(
        secret.get(ADDON_ARGS_KEY).map(String::as_str),
        Some(r#"{"domain":"vela.example.com"}"#)
    );
    Ok(())
}

#[tokio::test]
async fn enabling_keeps_enabled_dependencies_untouched() -> AppResult<()> {
    let (addons, cluster) = service();
    addons.create_addon_registry(helm_registry("kubevela")).await?;
    publish(
        &cluster,
        "kubevela",
        json!([
            {"name": "velaux", "dependencies": ["fluxcd"]},
            {"name": "fluxcd"}
        ]),
    )
    .await;

    addons
        .enable_addon("fluxcd", args(json!({"replicas": 3})))
        .await?;
    addons.enable_addon("velaux", JsonObject::new()).await?;

    let secret = cluster
        .get_secret(SYSTEM_NAMESPACE, &addon_secret_name("fluxcd"))
        .await?
        .unwrap_or_default();
    assert_eq!(
        secret.get(ADDON_ARGS_KEY).map(String::as_str),
        Some(r#"{"replicas":3}"#)
    );
    Ok(())
}

#[tokio::test]
async fn dependency_cycles_and_missing_dependencies_are_rejected() -> AppResult<()> {
    let (addons, cluster) = service();
    addons.create_addon_registry(helm_registry("kubevela")).await?;
    publish(
        &cluster,
        "kubevela",
        json!([
            {"name": "a", "dependencies": ["b"]},
            {"name": "b", "dependencies": ["a"]},
            {"name": "lonely", "dependencies": ["ghost"]}
        ]),
    )
    .await;

    assert!(matches!(
        addons.enable_addon("a", JsonObject::new()).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        addons.enable_addon("lonely", JsonObject::new()).await,
        Err(AppError::NotFound(_))
    ));
    assert!(cluster.applications.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn status_follows_the_addon_application() -> AppResult<()> {
    let (addons, cluster) = service();
    addons.create_addon_registry(helm_registry("kubevela")).await?;
    publish(&cluster, "kubevela", json!([{"name": "fluxcd"}])).await;

    assert_eq!(addons.status_addon("fluxcd").await?.phase, AddonPhase::Disabled);

    addons
        .enable_addon("fluxcd", args(json!({"replicas": 2})))
        .await?;
    let enabling = addons.status_addon("fluxcd").await?;
    assert_eq!(enabling.phase, AddonPhase::Enabling);
    assert!(enabling.args.is_none());
    assert!(addons.list_enabled_addons().await?.is_empty());

    cluster
        .set_app_phase(SYSTEM_NAMESPACE, &addon_app_name("fluxcd"), "running")
        .await;
    let enabled = addons.status_addon("fluxcd").await?;
    assert_eq!(enabled.phase, AddonPhase::Enabled);
    assert_eq!(enabled.args, Some(args(json!({"replicas": 2}))));

    let listed = addons.list_enabled_addons().await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "fluxcd");
    Ok(())
}

#[tokio::test]
async fn disabling_respects_dependents_unless_forced() -> AppResult<()> {
    let (addons, cluster) = service();
    addons.create_addon_registry(helm_registry("kubevela")).await?;
    publish(
        &cluster,
        "kubevela",
        json!([
            {"name": "velaux", "dependencies": ["fluxcd"]},
            {"name": "fluxcd"}
        ]),
    )
    .await;

    assert!(matches!(
        addons.disable_addon("fluxcd", false).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        addons.update_addon("fluxcd", JsonObject::new()).await,
        Err(AppError::NotFound(_))
    ));

    addons.enable_addon("velaux", JsonObject::new()).await?;
    assert!(matches!(
        addons.disable_addon("fluxcd", false).await,
        Err(AppError::Conflict(_))
    ));

    addons.disable_addon("fluxcd", true).await?;
    assert!(
        cluster
            .get_application(SYSTEM_NAMESPACE, &addon_app_name("fluxcd"))
            .await?
            .is_none()
    );
    assert!(
        cluster
            .get_secret(SYSTEM_NAMESPACE, &addon_secret_name("fluxcd"))
            .await?
            .is_none()
    );

    addons.disable_addon("velaux", false).await?;
    Ok(())
}
