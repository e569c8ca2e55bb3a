//! Document datastore port.
//!
//! Every entity is stored as a JSON document in a logical table, addressed by
//! its primary key and filterable by its index fields.

mod query;
mod store;

use std::collections::BTreeMap;

use async_trait::async_trait;
use vela_console_core::AppResult;

pub use query::{
    FilterOptions, FuzzyQueryOption, InQueryOption, IsNotExistQueryOption, ListOptions,
    SortOption, SortOrder, count_records, select_records,
};
pub use store::EntityStore;

/// One stored document with its addressing and index data.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Logical table name.
    pub table: String,
    /// Unique key inside the table.
    pub primary_key: String,
    /// Indexed fields used for equality, `in` and `is-not-exist` filters.
    pub index: BTreeMap<String, String>,
    /// Full document.
    pub data: serde_json::Value,
}

/// Repository port for the document datastore.
///
/// `add` fails with `Conflict` when the key is taken; `put` and `delete` fail
/// with `NotFound` when it is missing.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Inserts a new record.
    async fn add(&self, record: StoredRecord) -> AppResult<()>;

    /// Inserts several records. Either all are stored or none.
    async fn batch_add(&self, records: Vec<StoredRecord>) -> AppResult<()>;

    /// Replaces an existing record.
    async fn put(&self, record: StoredRecord) -> AppResult<()>;

    /// Returns one record by primary key.
    async fn get(&self, table: &str, primary_key: &str) -> AppResult<Option<StoredRecord>>;

    /// Deletes one record by primary key.
    async fn delete(&self, table: &str, primary_key: &str) -> AppResult<()>;

    /// Returns whether a record exists.
    async fn is_exist(&self, table: &str, primary_key: &str) -> AppResult<bool>;

    /// Lists records whose index contains every `index` entry and that pass
    /// the list options.
    async fn list(
        &self,
        table: &str,
        index: &BTreeMap<String, String>,
        options: &ListOptions,
    ) -> AppResult<Vec<StoredRecord>>;

    /// Counts records the same way `list` selects them, ignoring paging.
    async fn count(
        &self,
        table: &str,
        index: &BTreeMap<String, String>,
        filter: &FilterOptions,
    ) -> AppResult<u64>;
}
