use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::DateTime;
use serde_json::Value;

use super::StoredRecord;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Sorts by one document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOption {
    /// Document field name.
    pub key: String,
    /// Direction.
    pub order: SortOrder,
}

/// Case-insensitive substring match on a document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyQueryOption {
    /// Document field name.
    pub key: String,
    /// Substring to look for.
    pub query: String,
}

/// Requires an index field to hold one of the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InQueryOption {
    /// Index field name.
    pub key: String,
    /// Accepted values.
    pub values: Vec<String>,
}

/// Requires an index field to be unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsNotExistQueryOption {
    /// Index field name.
    pub key: String,
}

/// Filters beyond index equality. All options must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    /// Fuzzy document matches.
    pub queries: Vec<FuzzyQueryOption>,
    /// Index membership checks.
    pub in_: Vec<InQueryOption>,
    /// Index absence checks.
    pub is_not_exist: Vec<IsNotExistQueryOption>,
}

impl FilterOptions {
    /// Adds an index membership check.
    #[must_use]
    pub fn with_in(mut self, key: &str, values: Vec<String>) -> Self {
        self.in_.push(InQueryOption {
            key: key.to_owned(),
            values,
        });
        self
    }

    /// Adds an index absence check.
    #[must_use]
    pub fn with_not_exist(mut self, key: &str) -> Self {
        self.is_not_exist.push(IsNotExistQueryOption {
            key: key.to_owned(),
        });
        self
    }

    /// Adds a fuzzy match unless the query is empty.
    #[must_use]
    pub fn with_query(mut self, key: &str, query: &str) -> Self {
        if !query.is_empty() {
            self.queries.push(FuzzyQueryOption {
                key: key.to_owned(),
                query: query.to_owned(),
            });
        }
        self
    }
}

/// Paging, sorting and filtering for list queries.
///
/// Paging applies when both `page` (1-based) and `page_size` are positive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// 1-based page number.
    pub page: usize,
    /// Page size.
    pub page_size: usize,
    /// Sort keys, most significant first.
    pub sort_by: Vec<SortOption>,
    /// Filters.
    pub filter: FilterOptions,
}

impl ListOptions {
    /// Lists everything matching a filter.
    #[must_use]
    pub fn filtered(filter: FilterOptions) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Adds a descending sort key.
    #[must_use]
    pub fn newest_first(mut self, key: &str) -> Self {
        self.sort_by.push(SortOption {
            key: key.to_owned(),
            order: SortOrder::Descending,
        });
        self
    }

    /// Restricts the result to one page.
    #[must_use]
    pub fn paged(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }
}

fn matches(
    record: &StoredRecord,
    index: &BTreeMap<String, String>,
    filter: &FilterOptions,
) -> bool {
    let index_match = index
        .iter()
        .all(|(key, value)| record.index.get(key) == Some(value));
    let in_match = filter.in_.iter().all(|option| {
        record
            .index
            .get(&option.key)
            .is_some_and(|value| option.values.contains(value))
    });
    let not_exist_match = filter
        .is_not_exist
        .iter()
        .all(|option| !record.index.contains_key(&option.key));
    let fuzzy_match = filter.queries.iter().all(|option| {
        let needle = option.query.to_lowercase();
        record
            .data
            .get(&option.key)
            .and_then(Value::as_str)
            .is_some_and(|value| value.to_lowercase().contains(&needle))
    });

    index_match && in_match && not_exist_match && fuzzy_match
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::String(left)), Some(Value::String(right))) => {
            match (
                DateTime::parse_from_rfc3339(left),
                DateTime::parse_from_rfc3339(right),
            ) {
                (Ok(left), Ok(right)) => left.cmp(&right),
                _ => left.cmp(right),
            }
        }
        (Some(Value::Number(left)), Some(Value::Number(right))) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(left)), Some(Value::Bool(right))) => left.cmp(right),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

/// Applies index equality, filters, sorting and paging to stored records.
pub fn select_records<'a>(
    records: impl IntoIterator<Item = &'a StoredRecord>,
    index: &BTreeMap<String, String>,
    options: &ListOptions,
) -> Vec<StoredRecord> {
    let mut selected: Vec<StoredRecord> = records
        .into_iter()
        .filter(|record| matches(record, index, &options.filter))
        .cloned()
        .collect();

    if !options.sort_by.is_empty() {
        selected.sort_by(|left, right| {
            options
                .sort_by
                .iter()
                .map(|sort| {
                    let ordering =
                        compare_values(left.data.get(&sort.key), right.data.get(&sort.key));
                    match sort.order {
                        SortOrder::Ascending => ordering,
                        SortOrder::Descending => ordering.reverse(),
                    }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    if options.page > 0 && options.page_size > 0 {
        return selected
            .into_iter()
            .skip((options.page - 1).saturating_mul(options.page_size))
            .take(options.page_size)
            .collect();
    }

    selected
}

/// Counts the records `select_records` would return without paging.
pub fn count_records<'a>(
    records: impl IntoIterator<Item = &'a StoredRecord>,
    index: &BTreeMap<String, String>,
    filter: &FilterOptions,
) -> u64 {
    records
        .into_iter()
        .filter(|record| matches(record, index, filter))
        .count() as u64
}
