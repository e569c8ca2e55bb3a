use std::collections::BTreeMap;

use tokio::sync::RwLock;
use vela_console_domain::AddonMeta;

/// Addon catalogs keyed by registry name.
///
/// Readers share the lock; a refresh swaps the whole map under the write
/// lock so a listing never sees half of a refresh.
#[derive(Debug, Default)]
pub(super) struct AddonCache {
    catalogs: RwLock<BTreeMap<String, Vec<AddonMeta>>>,
}

impl AddonCache {
    pub(super) async fn get(&self, registry: &str) -> Option<Vec<AddonMeta>> {
        self.catalogs.read().await.get(registry).cloned()
    }

    pub(super) async fn insert(&self, registry: &str, addons: Vec<AddonMeta>) {
        self.catalogs
            .write()
            .await
            .insert(registry.to_owned(), addons);
    }

    pub(super) async fn remove(&self, registry: &str) {
        self.catalogs.write().await.remove(registry);
    }

    pub(super) async fn replace(&self, catalogs: BTreeMap<String, Vec<AddonMeta>>) {
        *self.catalogs.write().await = catalogs;
    }
}
