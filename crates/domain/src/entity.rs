use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Free-form JSON object carried by components, traits, policies and steps.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Creation and modification times shared by every persisted entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    /// Set once when the record is first stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    /// Refreshed on every write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

/// A record kept in the document datastore.
///
/// `index` returns the non-empty fields a list query may filter on with
/// equality. An entity used as a query template only sets the fields it
/// wants to match.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Logical table holding every record of this entity.
    const TABLE_NAME: &'static str;

    /// Returns the unique key of the record inside its table.
    fn primary_key(&self) -> String;

    /// Returns the indexed fields that are set on this value.
    fn index(&self) -> BTreeMap<String, String>;

    /// Returns the record timestamps.
    fn timestamps(&self) -> &Timestamps;

    /// Returns the record timestamps for mutation.
    fn timestamps_mut(&mut self) -> &mut Timestamps;
}

/// Collects the non-empty index fields of an entity.
#[derive(Debug, Default)]
pub struct IndexBuilder(BTreeMap<String, String>);

impl IndexBuilder {
    /// Starts an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field when its value is not empty.
    #[must_use]
    pub fn field(mut self, key: &str, value: &str) -> Self {
        if !value.is_empty() {
            self.0.insert(key.to_owned(), value.to_owned());
        }
        self
    }

    /// Adds an optional boolean field.
    #[must_use]
    pub fn flag(mut self, key: &str, value: Option<bool>) -> Self {
        if let Some(value) = value {
            self.0.insert(key.to_owned(), value.to_string());
        }
        self
    }

    /// Returns the collected index.
    #[must_use]
    pub fn build(self) -> BTreeMap<String, String> {
        self.0
    }
}

/// Implements the timestamp accessors for entities holding a `timestamps` field.
#[macro_export]
macro_rules! entity_timestamps {
    () => {
        fn timestamps(&self) -> &$crate::Timestamps {
            &self.timestamps
        }

        fn timestamps_mut(&mut self) -> &mut $crate::Timestamps {
            &mut self.timestamps
        }
    };
}

/// Joins key parts with `-`, skipping empty segments.
#[must_use]
pub fn compose_key(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::{IndexBuilder, compose_key};

    #[test]
    fn index_builder_skips_empty_values() {
        let index = IndexBuilder::new()
            .field("name", "dev")
            .field("project", "")
            .flag("default", Some(true))
            .build();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("default").map(String::as_str), Some("true"));
    }

    #[test]
    fn compose_key_skips_empty_scope() {
        assert_eq!(compose_key(&["", "admin"]), "admin");
        assert_eq!(compose_key(&["team", "admin"]), "team-admin");
    }
}
