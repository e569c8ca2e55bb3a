//! Redis-backed component definition cache.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use vela_console_application::{DefinitionCache, DefinitionSummary};
use vela_console_core::{AppError, AppResult};

#[derive(Serialize, Deserialize)]
struct CachedDefinition {
    name: String,
    workload_type: String,
    workload_kind: String,
}

/// Redis implementation of the definition cache port.
#[derive(Clone)]
pub struct RedisDefinitionCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisDefinitionCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, name: &str) -> String {
        format!("{}:definition={name}", self.key_prefix)
    }

    fn encode_definition(definition: DefinitionSummary) -> AppResult<String> {
        serde_json::to_string(&CachedDefinition {
            name: definition.name,
            workload_type: definition.workload_type,
            workload_kind: definition.workload_kind,
        })
        .map_err(|error| AppError::Internal(format!("failed to encode definition: {error}")))
    }

    fn decode_definition(value: &str) -> AppResult<DefinitionSummary> {
        let cached: CachedDefinition = serde_json::from_str(value).map_err(|error| {
            AppError::Internal(format!("invalid definition cache value '{value}': {error}"))
        })?;

        Ok(DefinitionSummary {
            name: cached.name,
            workload_type: cached.workload_type,
            workload_kind: cached.workload_kind,
        })
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl DefinitionCache for RedisDefinitionCache {
    async fn get_definition(&self, name: &str) -> AppResult<Option<DefinitionSummary>> {
        let mut connection = self.connection().await?;

        let encoded: Option<String> =
            connection
                .get(self.key_for(name))
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to read definition cache entry: {error}"))
                })?;

        encoded.as_deref().map(Self::decode_definition).transpose()
    }

    async fn set_definition(
        &self,
        definition: DefinitionSummary,
        ttl_seconds: u32,
    ) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let key = self.key_for(&definition.name);
        let value = Self::encode_definition(definition)?;
        let mut connection = self.connection().await?;

        connection
            .set_ex(key, value, u64::from(ttl_seconds))
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to write definition cache entry: {error}"))
            })
    }
}
