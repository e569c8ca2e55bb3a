use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use vela_console_application::{DefinitionCache, DefinitionSummary};
use vela_console_core::AppResult;

#[derive(Debug, Clone)]
struct DefinitionCacheEntry {
    definition: DefinitionSummary,
    expires_at: Instant,
}

/// In-memory cache adapter for component definitions.
#[derive(Debug, Default)]
pub struct InMemoryDefinitionCache {
    entries: RwLock<HashMap<String, DefinitionCacheEntry>>,
}

impl InMemoryDefinitionCache {
    /// Creates an empty in-memory definition cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DefinitionCache for InMemoryDefinitionCache {
    async fn get_definition(&self, name: &str) -> AppResult<Option<DefinitionSummary>> {
        {
            let entries = self.entries.read().await;
            match entries.get(name) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.definition.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(name)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(name);
        }

        Ok(None)
    }

    async fn set_definition(
        &self,
        definition: DefinitionSummary,
        ttl_seconds: u32,
    ) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(ttl_seconds)))
            .unwrap_or(now);

        self.entries.write().await.insert(
            definition.name.clone(),
            DefinitionCacheEntry {
                definition,
                expires_at,
            },
        );

        Ok(())
    }
}
