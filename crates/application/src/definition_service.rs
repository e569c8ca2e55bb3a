//! Component definition lookups with optional caching.

use std::sync::Arc;

use vela_console_core::{AppError, AppResult};
use vela_console_domain::{TERRAFORM_WORKLOAD_KIND, TERRAFORM_WORKLOAD_TYPE};

use crate::cluster_ports::{ClusterClient, DefinitionCache, DefinitionSummary};

/// Application service for component definitions.
#[derive(Clone)]
pub struct DefinitionService {
    cluster: Arc<dyn ClusterClient>,
    definition_cache: Option<Arc<dyn DefinitionCache>>,
    definition_cache_ttl_seconds: u32,
}

impl DefinitionService {
    /// Creates a new definition service without caching.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            definition_cache: None,
            definition_cache_ttl_seconds: 0,
        }
    }

    /// Adds optional definition caching behavior.
    #[must_use]
    pub fn with_definition_cache(
        mut self,
        definition_cache: Arc<dyn DefinitionCache>,
        ttl_seconds: u32,
    ) -> Self {
        self.definition_cache = Some(definition_cache);
        self.definition_cache_ttl_seconds = ttl_seconds;
        self
    }

    /// Returns the definition of a component type.
    pub async fn get_component_definition(&self, name: &str) -> AppResult<DefinitionSummary> {
        if self.definition_cache_ttl_seconds > 0
            && let Some(cache) = &self.definition_cache
            && let Some(definition) = cache.get_definition(name).await?
        {
            return Ok(definition);
        }

        let definition = self
            .cluster
            .get_component_definition(name)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("the component type is not supported".to_owned())
            })?;

        if self.definition_cache_ttl_seconds > 0
            && let Some(cache) = &self.definition_cache
        {
            cache
                .set_definition(definition.clone(), self.definition_cache_ttl_seconds)
                .await?;
        }

        Ok(definition)
    }

    /// Returns whether a component type renders a terraform cloud resource.
    ///
    /// Unknown types are not cloud resources.
    pub async fn is_cloud_resource(&self, component_type: &str) -> AppResult<bool> {
        match self.get_component_definition(component_type).await {
            Ok(definition) => Ok(definition.workload_type == TERRAFORM_WORKLOAD_TYPE
                || definition.workload_kind == TERRAFORM_WORKLOAD_KIND),
            Err(AppError::NotFound(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }
}
