//! Addons: registries, the cached addon catalog and addon installation.
//!
//! Registries are read from a ConfigMap. Each registry publishes its catalog
//! into its own ConfigMap; the service keeps the catalogs in memory and a
//! background task reloads them on a fixed period. Enabling an addon applies
//! an `addon-{name}` Application in the system namespace after enabling the
//! addons it depends on.

mod cache;
mod registry;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use vela_console_core::{AppError, AppResult, NonEmptyString};
use vela_console_domain::{
    ADDON_CATALOG_KEY, ANNOTATION_ADDON_VERSION, AddonMeta, AddonPhase, AddonRegistry,
    ApplicationManifest, GitAddonSource, HelmAddonSource, JsonObject, LABEL_ADDON_NAME,
    LABEL_ADDON_REGISTRY, LOCAL_CLUSTER_NAME, ObjectMeta, OssAddonSource, addon_app_name,
    addon_catalog_config_map, addon_secret_name,
};

use crate::cluster_ports::ClusterClient;

use cache::AddonCache;
use registry::RegistryStore;

/// Secret data key holding the arguments an addon was enabled with.
pub const ADDON_ARGS_KEY: &str = "addonParameterDataKey";

const MIN_REFRESH_PERIOD: Duration = Duration::from_secs(1);

/// Input payload for replacing the source of an addon registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateAddonRegistryInput {
    /// Git source.
    pub git: Option<GitAddonSource>,
    /// Gitee source.
    pub gitee: Option<GitAddonSource>,
    /// GitLab source.
    pub gitlab: Option<GitAddonSource>,
    /// Object-storage source.
    pub oss: Option<OssAddonSource>,
    /// Helm source.
    pub helm: Option<HelmAddonSource>,
}

/// Installation state of one addon.
#[derive(Debug, Clone, PartialEq)]
pub struct AddonStatus {
    /// Addon name.
    pub name: String,
    /// Installation phase.
    pub phase: AddonPhase,
    /// Arguments of an enabled addon.
    pub args: Option<JsonObject>,
}

/// An addon whose application is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnabledAddon {
    /// Addon name.
    pub name: String,
    /// Always [`AddonPhase::Enabled`].
    pub phase: AddonPhase,
}

/// Application service for addons and addon registries.
#[derive(Clone)]
pub struct AddonService {
    cluster: Arc<dyn ClusterClient>,
    registries: RegistryStore,
    cache: Arc<AddonCache>,
    system_namespace: String,
}

fn validate_registry(registry: &AddonRegistry) -> AppResult<()> {
    NonEmptyString::required("addon registry name", registry.name.as_str())?;
    if !registry.has_single_source() {
        return Err(AppError::Validation(
            "an addon registry needs exactly one source".to_owned(),
        ));
    }
    Ok(())
}

fn redact(mut registry: AddonRegistry) -> AddonRegistry {
    for source in [&mut registry.git, &mut registry.gitee, &mut registry.gitlab]
        .into_iter()
        .flatten()
    {
        source.token.clear();
    }
    registry
}

impl AddonService {
    /// Creates a new addon service over the system namespace.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterClient>, system_namespace: impl Into<String>) -> Self {
        let system_namespace = system_namespace.into();
        Self {
            registries: RegistryStore::new(cluster.clone(), system_namespace.clone()),
            cluster,
            cache: Arc::new(AddonCache::default()),
            system_namespace,
        }
    }

    /// Registers an addon registry. Tokens are moved into a Secret.
    pub async fn create_addon_registry(&self, registry: AddonRegistry) -> AppResult<AddonRegistry> {
        validate_registry(&registry)?;
        let created = self.registries.add(registry).await?;
        self.cache.remove(&created.name).await;
        Ok(redact(created))
    }

    /// Returns one registry without its token.
    pub async fn get_addon_registry(&self, name: &str) -> AppResult<AddonRegistry> {
        self.registries.get(name).await.map(redact)
    }

    /// Replaces the source of a registry.
    pub async fn update_addon_registry(
        &self,
        name: &str,
        input: UpdateAddonRegistryInput,
    ) -> AppResult<AddonRegistry> {
        let registry = AddonRegistry {
            name: name.to_owned(),
            git: input.git,
            gitee: input.gitee,
            gitlab: input.gitlab,
            oss: input.oss,
            helm: input.helm,
        };
        validate_registry(&registry)?;

        let updated = self.registries.update(registry).await?;
        self.cache.remove(name).await;
        Ok(redact(updated))
    }

    /// Deletes a registry. A missing registry is ignored.
    pub async fn delete_addon_registry(&self, name: &str) -> AppResult<()> {
        self.registries.delete(name).await?;
        self.cache.remove(name).await;
        Ok(())
    }

    /// Lists the registries in name order, without tokens.
    pub async fn list_addon_registries(&self) -> AppResult<Vec<AddonRegistry>> {
        Ok(self
            .registries
            .list()
            .await?
            .into_iter()
            .map(redact)
            .collect())
    }

    async fn read_catalog(&self, registry: &str) -> AppResult<Vec<AddonMeta>> {
        let Some(config_map) = self
            .cluster
            .get_config_map(&self.system_namespace, &addon_catalog_config_map(registry))
            .await?
        else {
            return Ok(Vec::new());
        };
        let Some(raw) = config_map.data.get(ADDON_CATALOG_KEY) else {
            return Ok(Vec::new());
        };

        let mut addons: Vec<AddonMeta> = serde_json::from_str(raw).map_err(|error| {
            AppError::Internal(format!(
                "failed to decode the addon catalog of registry '{registry}': {error}"
            ))
        })?;
        for addon in &mut addons {
            addon.registry_name = registry.to_owned();
        }
        Ok(addons)
    }

    async fn catalog(&self, registry: &str) -> AppResult<Vec<AddonMeta>> {
        if let Some(addons) = self.cache.get(registry).await {
            return Ok(addons);
        }

        let addons = self.read_catalog(registry).await?;
        self.cache.insert(registry, addons.clone()).await;
        Ok(addons)
    }

    /// Reloads the catalog of every registry. A registry whose catalog
    /// cannot be read keeps the catalog it had.
    pub async fn refresh_catalogs(&self) -> AppResult<()> {
        let mut catalogs = BTreeMap::new();
        for registry in self.registries.list().await? {
            match self.read_catalog(&registry.name).await {
                Ok(addons) => {
                    catalogs.insert(registry.name, addons);
                }
                Err(error) => {
                    warn!(registry = %registry.name, error = %error, "failed to refresh addon catalog");
                    if let Some(previous) = self.cache.get(&registry.name).await {
                        catalogs.insert(registry.name, previous);
                    }
                }
            }
        }

        debug!(registries = catalogs.len(), "refreshed addon catalogs");
        self.cache.replace(catalogs).await;
        Ok(())
    }

    /// Refreshes the catalogs every `period` until the handle is aborted.
    /// The first refresh runs immediately.
    pub fn spawn_catalog_refresh(&self, period: Duration) -> JoinHandle<()> {
        let service = self.clone();
        let period = period.max(MIN_REFRESH_PERIOD);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_seconds = period.as_secs(), "addon catalog refresh started");

            loop {
                ticker.tick().await;
                if let Err(error) = service.refresh_catalogs().await {
                    warn!(error = %error, "addon catalog refresh failed");
                }
            }
        })
    }

    /// Lists visible addons, optionally from one registry and filtered by a
    /// substring of the name or description. When two registries publish the
    /// same addon the first registry in name order wins. Unreadable catalogs
    /// are skipped.
    pub async fn list_addons(&self, registry: &str, query: &str) -> AppResult<Vec<AddonMeta>> {
        let mut addons: Vec<AddonMeta> = Vec::new();
        for source in self.registries.list().await? {
            if !registry.is_empty() && source.name != registry {
                continue;
            }
            let catalog = match self.catalog(&source.name).await {
                Ok(catalog) => catalog,
                Err(error) => {
                    warn!(registry = %source.name, error = %error, "skipping unreadable addon catalog");
                    continue;
                }
            };
            for addon in catalog {
                if !addon.name.is_empty() && !addons.iter().any(|known| known.name == addon.name) {
                    addons.push(addon);
                }
            }
        }

        addons.retain(|addon| {
            !addon.invisible
                && (query.is_empty()
                    || addon.name.contains(query)
                    || addon.description.contains(query))
        });
        addons.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(addons)
    }

    async fn find_addon(&self, name: &str) -> AppResult<Option<AddonMeta>> {
        for registry in self.registries.list().await? {
            if let Some(addon) = self
                .catalog(&registry.name)
                .await?
                .into_iter()
                .find(|addon| addon.name == name)
            {
                return Ok(Some(addon));
            }
        }
        Ok(None)
    }

    /// Returns one addon, from a given registry or from the first registry
    /// publishing it.
    pub async fn get_addon(&self, name: &str, registry: &str) -> AppResult<AddonMeta> {
        let found = if registry.is_empty() {
            self.find_addon(name).await?
        } else {
            let registry = self.registries.get(registry).await?;
            self.catalog(&registry.name)
                .await?
                .into_iter()
                .find(|addon| addon.name == name)
        };
        found.ok_or_else(|| AppError::NotFound("the addon is not exist".to_owned()))
    }

    /// Returns the addon preceded by everything it depends on, dependencies
    /// first.
    async fn install_order(&self, addon: AddonMeta) -> AppResult<Vec<AddonMeta>> {
        let mut order: Vec<AddonMeta> = Vec::new();
        let mut open: Vec<(AddonMeta, usize)> = vec![(addon, 0)];

        loop {
            let Some((current, next)) = open.last_mut() else {
                break;
            };
            let dependency = current.dependencies.get(*next).cloned();
            *next += 1;

            let Some(dependency) = dependency else {
                if let Some((done, _)) = open.pop() {
                    order.push(done);
                }
                continue;
            };
            if order.iter().any(|done| done.name == dependency) {
                continue;
            }
            if open.iter().any(|(pending, _)| pending.name == dependency) {
                return Err(AppError::Validation(format!(
                    "addon '{dependency}' depends on itself"
                )));
            }
            let meta = self.find_addon(&dependency).await?.ok_or_else(|| {
                AppError::NotFound(format!("the dependency addon '{dependency}' is not exist"))
            })?;
            open.push((meta, 0));
        }

        Ok(order)
    }

    async fn install(&self, addon: &AddonMeta, args: &JsonObject) -> AppResult<()> {
        let encoded = serde_json::to_string(args).map_err(|error| {
            AppError::Internal(format!("failed to encode addon arguments: {error}"))
        })?;
        self.cluster
            .put_secret(
                &self.system_namespace,
                &addon_secret_name(&addon.name),
                BTreeMap::from([(ADDON_ARGS_KEY.to_owned(), encoded)]),
            )
            .await?;

        let mut manifest = ApplicationManifest::new(ObjectMeta {
            name: addon_app_name(&addon.name),
            namespace: self.system_namespace.clone(),
            labels: BTreeMap::from([
                (LABEL_ADDON_NAME.to_owned(), addon.name.clone()),
                (LABEL_ADDON_REGISTRY.to_owned(), addon.registry_name.clone()),
            ]),
            annotations: BTreeMap::from([(
                ANNOTATION_ADDON_VERSION.to_owned(),
                addon.version.clone(),
            )]),
        });
        manifest.spec.components = addon.components.clone();
        self.cluster.apply_application(&manifest).await?;

        info!(
            addon = %addon.name,
            registry = %addon.registry_name,
            version = %addon.version,
            "enabled addon"
        );
        Ok(())
    }

    async fn addon_app(&self, name: &str) -> AppResult<Option<ApplicationManifest>> {
        self.cluster
            .get_application(&self.system_namespace, &addon_app_name(name))
            .await
    }

    /// Enables an addon with arguments. Dependencies that are not enabled
    /// yet are enabled first with empty arguments.
    pub async fn enable_addon(&self, name: &str, args: JsonObject) -> AppResult<()> {
        let addon = self.get_addon(name, "").await?;
        let mut plan = self.install_order(addon).await?;
        let Some(target) = plan.pop() else {
            return Ok(());
        };

        self.cluster
            .ensure_namespace(LOCAL_CLUSTER_NAME, &self.system_namespace, &BTreeMap::new())
            .await?;
        for dependency in &plan {
            if self.addon_app(&dependency.name).await?.is_none() {
                self.install(dependency, &JsonObject::new()).await?;
            }
        }
        self.install(&target, &args).await
    }

    /// Re-enables an enabled addon with new arguments.
    pub async fn update_addon(&self, name: &str, args: JsonObject) -> AppResult<()> {
        if self.addon_app(name).await?.is_none() {
            return Err(AppError::NotFound("the addon is not enabled".to_owned()));
        }
        self.enable_addon(name, args).await
    }

    /// Disables an addon. Unless forced, an addon another enabled addon
    /// depends on is refused.
    pub async fn disable_addon(&self, name: &str, force: bool) -> AppResult<()> {
        if self.addon_app(name).await?.is_none() {
            return Err(AppError::NotFound("the addon is not enabled".to_owned()));
        }

        if !force {
            let installed = self
                .cluster
                .list_applications(&self.system_namespace, LABEL_ADDON_NAME)
                .await?;
            for app in installed {
                let Some(dependent) = app.label(LABEL_ADDON_NAME) else {
                    continue;
                };
                if dependent == name {
                    continue;
                }
                let depends = self
                    .find_addon(dependent)
                    .await?
                    .is_some_and(|meta| meta.dependencies.iter().any(|dep| dep == name));
                if depends {
                    return Err(AppError::Conflict(format!(
                        "addon '{dependent}' depends on addon '{name}'"
                    )));
                }
            }
        }

        self.cluster
            .delete_application(&self.system_namespace, &addon_app_name(name))
            .await?;
        if let Err(error) = self
            .cluster
            .delete_secret(&self.system_namespace, &addon_secret_name(name))
            .await
        {
            warn!(addon = name, error = %error, "failed to delete the addon arguments");
        }
        info!(addon = name, force, "disabled addon");
        Ok(())
    }

    /// Returns the phase of an addon, and its arguments once enabled.
    pub async fn status_addon(&self, name: &str) -> AppResult<AddonStatus> {
        let Some(app) = self.addon_app(name).await? else {
            return Ok(AddonStatus {
                name: name.to_owned(),
                phase: AddonPhase::Disabled,
                args: None,
            });
        };

        let phase = AddonPhase::from_app_phase(app.phase());
        let args = if phase == AddonPhase::Enabled {
            self.cluster
                .get_secret(&self.system_namespace, &addon_secret_name(name))
                .await?
                .and_then(|mut data| data.remove(ADDON_ARGS_KEY))
                .map(|raw| serde_json::from_str::<JsonObject>(&raw))
                .transpose()
                .map_err(|error| {
                    AppError::Internal(format!("failed to decode addon arguments: {error}"))
                })?
        } else {
            None
        };

        Ok(AddonStatus {
            name: name.to_owned(),
            phase,
            args,
        })
    }

    /// Lists the addons whose application is running, in name order.
    pub async fn list_enabled_addons(&self) -> AppResult<Vec<EnabledAddon>> {
        let mut enabled: Vec<EnabledAddon> = self
            .cluster
            .list_applications(&self.system_namespace, LABEL_ADDON_NAME)
            .await?
            .into_iter()
            .filter(|app| AddonPhase::from_app_phase(app.phase()) == AddonPhase::Enabled)
            .filter_map(|app| {
                app.label(LABEL_ADDON_NAME).map(|name| EnabledAddon {
                    name: name.to_owned(),
                    phase: AddonPhase::Enabled,
                })
            })
            .collect();
        enabled.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(enabled)
    }
}

#[cfg(test)]
mod tests;
