use std::sync::Arc;

use chrono::Utc;
use vela_console_core::{AppError, AppResult};
use vela_console_domain::Entity;

use super::{DataStore, FilterOptions, ListOptions, StoredRecord};

/// Typed access to the document datastore.
///
/// Sets `createTime` on insert and `updateTime` on every write.
#[derive(Clone)]
pub struct EntityStore {
    data_store: Arc<dyn DataStore>,
}

fn encode<E: Entity>(entity: &E) -> AppResult<StoredRecord> {
    let data = serde_json::to_value(entity).map_err(|error| {
        AppError::Internal(format!(
            "failed to encode {} record '{}': {error}",
            E::TABLE_NAME,
            entity.primary_key()
        ))
    })?;

    Ok(StoredRecord {
        table: E::TABLE_NAME.to_owned(),
        primary_key: entity.primary_key(),
        index: entity.index(),
        data,
    })
}

fn decode<E: Entity>(record: StoredRecord) -> AppResult<E> {
    serde_json::from_value(record.data).map_err(|error| {
        AppError::Internal(format!(
            "failed to decode {} record '{}': {error}",
            E::TABLE_NAME,
            record.primary_key
        ))
    })
}

impl EntityStore {
    /// Creates a typed store over a datastore port.
    #[must_use]
    pub fn new(data_store: Arc<dyn DataStore>) -> Self {
        Self { data_store }
    }

    /// Inserts a new entity and returns it with its timestamps set.
    pub async fn add<E: Entity>(&self, mut entity: E) -> AppResult<E> {
        let now = Utc::now();
        let timestamps = entity.timestamps_mut();
        timestamps.create_time = Some(now);
        timestamps.update_time = Some(now);

        self.data_store.add(encode(&entity)?).await?;
        Ok(entity)
    }

    /// Inserts several entities atomically.
    pub async fn batch_add<E: Entity>(&self, entities: Vec<E>) -> AppResult<()> {
        let now = Utc::now();
        let mut records = Vec::with_capacity(entities.len());
        for mut entity in entities {
            let timestamps = entity.timestamps_mut();
            timestamps.create_time = Some(now);
            timestamps.update_time = Some(now);
            records.push(encode(&entity)?);
        }

        self.data_store.batch_add(records).await
    }

    /// Replaces an existing entity and returns it with `updateTime` refreshed.
    pub async fn put<E: Entity>(&self, mut entity: E) -> AppResult<E> {
        let now = Utc::now();
        let timestamps = entity.timestamps_mut();
        if timestamps.create_time.is_none() {
            timestamps.create_time = Some(now);
        }
        timestamps.update_time = Some(now);

        self.data_store.put(encode(&entity)?).await?;
        Ok(entity)
    }

    /// Returns the stored entity with the key of `key`.
    pub async fn get<E: Entity>(&self, key: &E) -> AppResult<Option<E>> {
        self.data_store
            .get(E::TABLE_NAME, &key.primary_key())
            .await?
            .map(decode)
            .transpose()
    }

    /// Deletes the stored entity with the key of `key`.
    pub async fn delete<E: Entity>(&self, key: &E) -> AppResult<()> {
        self.data_store
            .delete(E::TABLE_NAME, &key.primary_key())
            .await
    }

    /// Returns whether an entity with the key of `key` exists.
    pub async fn is_exist<E: Entity>(&self, key: &E) -> AppResult<bool> {
        self.data_store
            .is_exist(E::TABLE_NAME, &key.primary_key())
            .await
    }

    /// Lists entities whose index matches the set fields of `template`.
    pub async fn list<E: Entity>(&self, template: &E, options: &ListOptions) -> AppResult<Vec<E>> {
        self.data_store
            .list(E::TABLE_NAME, &template.index(), options)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Counts entities whose index matches the set fields of `template`.
    pub async fn count<E: Entity>(&self, template: &E, filter: &FilterOptions) -> AppResult<u64> {
        self.data_store
            .count(E::TABLE_NAME, &template.index(), filter)
            .await
    }
}
