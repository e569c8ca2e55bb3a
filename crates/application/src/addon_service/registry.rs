use std::collections::{BTreeMap, btree_map::Entry};
use std::sync::Arc;

use tracing::{info, warn};
use vela_console_core::{AppError, AppResult};
use vela_console_domain::{
    ADDON_REGISTRIES_KEY, ADDON_REGISTRY_CONFIG_MAP, AddonRegistry, registry_token_secret_name,
};

use crate::cluster_ports::{ClusterClient, ConfigMapData};

const TOKEN_KEY: &str = "token";

/// Addon registries kept in one ConfigMap of the system namespace.
///
/// Registry tokens never reach the ConfigMap: they move into one Secret per
/// registry and are loaded back on read.
#[derive(Clone)]
pub(super) struct RegistryStore {
    cluster: Arc<dyn ClusterClient>,
    namespace: String,
}

type Registries = BTreeMap<String, AddonRegistry>;

impl RegistryStore {
    pub(super) fn new(cluster: Arc<dyn ClusterClient>, namespace: String) -> Self {
        Self { cluster, namespace }
    }

    async fn load(&self) -> AppResult<Option<Registries>> {
        let Some(config_map) = self
            .cluster
            .get_config_map(&self.namespace, ADDON_REGISTRY_CONFIG_MAP)
            .await?
        else {
            return Ok(None);
        };
        let raw = config_map.data.get(ADDON_REGISTRIES_KEY).ok_or_else(|| {
            AppError::Internal(format!(
                "the addon registry configmap has no '{ADDON_REGISTRIES_KEY}' key"
            ))
        })?;

        serde_json::from_str(raw).map(Some).map_err(|error| {
            AppError::Internal(format!("failed to decode addon registries: {error}"))
        })
    }

    async fn save(&self, registries: &Registries) -> AppResult<()> {
        let encoded = serde_json::to_string(registries).map_err(|error| {
            AppError::Internal(format!("failed to encode addon registries: {error}"))
        })?;
        self.cluster
            .put_config_map(
                &self.namespace,
                ConfigMapData {
                    name: ADDON_REGISTRY_CONFIG_MAP.to_owned(),
                    labels: BTreeMap::new(),
                    data: BTreeMap::from([(ADDON_REGISTRIES_KEY.to_owned(), encoded)]),
                },
            )
            .await
    }

    /// Moves an inline token into the registry Secret.
    async fn store_token(&self, registry: &mut AddonRegistry) -> AppResult<()> {
        let secret_name = registry_token_secret_name(&registry.name);
        let Some(source) = registry.token_source_mut() else {
            return Ok(());
        };
        if source.token.is_empty() {
            return Ok(());
        }

        let token = std::mem::take(&mut source.token);
        self.cluster
            .put_secret(
                &self.namespace,
                &secret_name,
                BTreeMap::from([(TOKEN_KEY.to_owned(), token)]),
            )
            .await?;
        source.token_secret_ref = secret_name;
        Ok(())
    }

    async fn load_token(&self, registry: &mut AddonRegistry) -> AppResult<()> {
        let Some(source) = registry.token_source_mut() else {
            return Ok(());
        };
        if source.token_secret_ref.is_empty() {
            return Ok(());
        }

        // A missing Secret leaves the token empty.
        if let Some(mut data) = self
            .cluster
            .get_secret(&self.namespace, &source.token_secret_ref)
            .await?
        {
            source.token = data.remove(TOKEN_KEY).unwrap_or_default();
        }
        Ok(())
    }

    /// Lists every registry in name order, tokens included.
    pub(super) async fn list(&self) -> AppResult<Vec<AddonRegistry>> {
        let mut registries: Vec<AddonRegistry> =
            self.load().await?.unwrap_or_default().into_values().collect();
        for registry in &mut registries {
            self.load_token(registry).await?;
        }
        Ok(registries)
    }

    pub(super) async fn get(&self, name: &str) -> AppResult<AddonRegistry> {
        let mut registry = self
            .load()
            .await?
            .and_then(|mut registries| registries.remove(name))
            .ok_or_else(|| AppError::NotFound("the addon registry is not exist".to_owned()))?;
        self.load_token(&mut registry).await?;
        Ok(registry)
    }

    pub(super) async fn add(&self, mut registry: AddonRegistry) -> AppResult<AddonRegistry> {
        let mut registries = self.load().await?.unwrap_or_default();
        if registries.contains_key(&registry.name) {
            return Err(AppError::Conflict("the addon registry is exist".to_owned()));
        }

        self.store_token(&mut registry).await?;
        registries.insert(registry.name.clone(), registry.clone());
        self.save(&registries).await?;
        info!(registry = %registry.name, "added addon registry");
        Ok(registry)
    }

    pub(super) async fn update(&self, mut registry: AddonRegistry) -> AppResult<AddonRegistry> {
        let mut registries = self.load().await?.unwrap_or_default();
        let Entry::Occupied(mut slot) = registries.entry(registry.name.clone()) else {
            return Err(AppError::NotFound(
                "the addon registry is not exist".to_owned(),
            ));
        };

        // An update without a token keeps the stored one.
        if let (Some(source), Some(previous)) =
            (registry.token_source_mut(), slot.get().token_source())
            && source.token.is_empty()
            && source.token_secret_ref.is_empty()
        {
            source.token_secret_ref = previous.token_secret_ref.clone();
        }
        self.store_token(&mut registry).await?;
        slot.insert(registry.clone());
        self.save(&registries).await?;
        Ok(registry)
    }

    /// Deletes a registry and its token Secret. A missing registry is ignored.
    pub(super) async fn delete(&self, name: &str) -> AppResult<()> {
        let Some(mut registries) = self.load().await? else {
            return Ok(());
        };
        let Some(registry) = registries.remove(name) else {
            return Ok(());
        };

        if let Some(source) = registry.token_source()
            && !source.token_secret_ref.is_empty()
            && let Err(error) = self
                .cluster
                .delete_secret(&self.namespace, &source.token_secret_ref)
                .await
        {
            warn!(registry = name, error = %error, "failed to delete the registry token secret");
        }

        self.save(&registries).await?;
        info!(registry = name, "deleted addon registry");
        Ok(())
    }
}
