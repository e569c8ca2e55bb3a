//! In-memory document datastore.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use vela_console_application::{
    DataStore, FilterOptions, ListOptions, StoredRecord, count_records, select_records,
};
use vela_console_core::{AppError, AppResult};

type RecordKey = (String, String);

/// In-memory datastore implementation keyed by table and primary key.
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    records: RwLock<HashMap<RecordKey, StoredRecord>>,
}

impl InMemoryDataStore {
    /// Creates an empty in-memory datastore.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn record_key(table: &str, primary_key: &str) -> RecordKey {
    (table.to_owned(), primary_key.to_owned())
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn add(&self, record: StoredRecord) -> AppResult<()> {
        self.batch_add(vec![record]).await
    }

    async fn batch_add(&self, records: Vec<StoredRecord>) -> AppResult<()> {
        let mut stored = self.records.write().await;

        let mut incoming = Vec::with_capacity(records.len());
        for record in &records {
            let key = record_key(&record.table, &record.primary_key);
            if stored.contains_key(&key) || incoming.contains(&key) {
                return Err(AppError::Conflict(format!(
                    "record '{}' already exists in table '{}'",
                    record.primary_key, record.table
                )));
            }
            incoming.push(key);
        }

        for (key, record) in incoming.into_iter().zip(records) {
            stored.insert(key, record);
        }
        Ok(())
    }

    async fn put(&self, record: StoredRecord) -> AppResult<()> {
        let mut stored = self.records.write().await;
        let key = record_key(&record.table, &record.primary_key);

        let Some(slot) = stored.get_mut(&key) else {
            return Err(AppError::NotFound(format!(
                "record '{}' not found in table '{}'",
                record.primary_key, record.table
            )));
        };
        *slot = record;
        Ok(())
    }

    async fn get(&self, table: &str, primary_key: &str) -> AppResult<Option<StoredRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(&record_key(table, primary_key))
            .cloned())
    }

    async fn delete(&self, table: &str, primary_key: &str) -> AppResult<()> {
        self.records
            .write()
            .await
            .remove(&record_key(table, primary_key))
            .map(|_| ())
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "record '{primary_key}' not found in table '{table}'"
                ))
            })
    }

    async fn is_exist(&self, table: &str, primary_key: &str) -> AppResult<bool> {
        Ok(self
            .records
            .read()
            .await
            .contains_key(&record_key(table, primary_key)))
    }

    async fn list(
        &self,
        table: &str,
        index: &BTreeMap<String, String>,
        options: &ListOptions,
    ) -> AppResult<Vec<StoredRecord>> {
        let stored = self.records.read().await;
        let records = stored.values().filter(|record| record.table == table);
        Ok(select_records(records, index, options))
    }

    async fn count(
        &self,
        table: &str,
        index: &BTreeMap<String, String>,
        filter: &FilterOptions,
    ) -> AppResult<u64> {
        let stored = self.records.read().await;
        let records = stored.values().filter(|record| record.table == table);
        Ok(count_records(records, index, filter))
    }
}
