//! PostgreSQL-backed document datastore.
//!
//! Every logical table shares `vela_records`. Index equality is pushed down
//! as JSONB containment; the remaining filters, sorting and paging run over
//! the matching rows with the shared record selection.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::PgPool;
use vela_console_application::{
    DataStore, FilterOptions, ListOptions, StoredRecord, count_records, select_records,
};
use vela_console_core::{AppError, AppResult};

/// PostgreSQL implementation of the datastore port.
#[derive(Clone)]
pub struct PostgresDataStore {
    pool: PgPool,
}

impl PostgresDataStore {
    /// Creates a datastore with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_matching(
        &self,
        table: &str,
        index: &BTreeMap<String, String>,
    ) -> AppResult<Vec<StoredRecord>> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            r#"
            SELECT primary_key, index_fields::text, data::text
            FROM vela_records
            WHERE table_name = $1 AND index_fields @> $2::jsonb
            "#,
        )
        .bind(table)
        .bind(encode_json(index)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list {table} records: {error}")))?;

        rows.into_iter()
            .map(|(primary_key, index_fields, data)| {
                Ok(StoredRecord {
                    table: table.to_owned(),
                    primary_key,
                    index: decode_json(&index_fields)?,
                    data: decode_json(&data)?,
                })
            })
            .collect()
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string(value)
        .map_err(|error| AppError::Internal(format!("failed to encode record: {error}")))
}

fn decode_json<T: serde::de::DeserializeOwned>(value: &str) -> AppResult<T> {
    serde_json::from_str(value)
        .map_err(|error| AppError::Internal(format!("failed to decode record: {error}")))
}

fn conflict(record: &StoredRecord) -> AppError {
    AppError::Conflict(format!(
        "record '{}' already exists in table '{}'",
        record.primary_key, record.table
    ))
}

#[async_trait]
impl DataStore for PostgresDataStore {
    async fn add(&self, record: StoredRecord) -> AppResult<()> {
        self.batch_add(vec![record]).await
    }

    async fn batch_add(&self, records: Vec<StoredRecord>) -> AppResult<()> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        for record in &records {
            let inserted = sqlx::query(
                r#"
                INSERT INTO vela_records (table_name, primary_key, index_fields, data)
                VALUES ($1, $2, $3::jsonb, $4::jsonb)
                ON CONFLICT (table_name, primary_key) DO NOTHING
                "#,
            )
            .bind(&record.table)
            .bind(&record.primary_key)
            .bind(encode_json(&record.index)?)
            .bind(encode_json(&record.data)?)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to insert {} record '{}': {error}",
                    record.table, record.primary_key
                ))
            })?;

            if inserted.rows_affected() == 0 {
                return Err(conflict(record));
            }
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })
    }

    async fn put(&self, record: StoredRecord) -> AppResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE vela_records
            SET index_fields = $3::jsonb, data = $4::jsonb
            WHERE table_name = $1 AND primary_key = $2
            "#,
        )
        .bind(&record.table)
        .bind(&record.primary_key)
        .bind(encode_json(&record.index)?)
        .bind(encode_json(&record.data)?)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to update {} record '{}': {error}",
                record.table, record.primary_key
            ))
        })?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "record '{}' not found in table '{}'",
                record.primary_key, record.table
            )));
        }
        Ok(())
    }

    async fn get(&self, table: &str, primary_key: &str) -> AppResult<Option<StoredRecord>> {
        let row = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT index_fields::text, data::text
            FROM vela_records
            WHERE table_name = $1 AND primary_key = $2
            "#,
        )
        .bind(table)
        .bind(primary_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load {table} record '{primary_key}': {error}"
            ))
        })?;

        row.map(|(index_fields, data)| {
            Ok(StoredRecord {
                table: table.to_owned(),
                primary_key: primary_key.to_owned(),
                index: decode_json(&index_fields)?,
                data: decode_json(&data)?,
            })
        })
        .transpose()
    }

    async fn delete(&self, table: &str, primary_key: &str) -> AppResult<()> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM vela_records
            WHERE table_name = $1 AND primary_key = $2
            "#,
        )
        .bind(table)
        .bind(primary_key)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete {table} record '{primary_key}': {error}"
            ))
        })?;

        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "record '{primary_key}' not found in table '{table}'"
            )));
        }
        Ok(())
    }

    async fn is_exist(&self, table: &str, primary_key: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM vela_records WHERE table_name = $1 AND primary_key = $2
            )
            "#,
        )
        .bind(table)
        .bind(primary_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to check {table} record '{primary_key}': {error}"
            ))
        })
    }

    async fn list(
        &self,
        table: &str,
        index: &BTreeMap<String, String>,
        options: &ListOptions,
    ) -> AppResult<Vec<StoredRecord>> {
        let records = self.fetch_matching(table, index).await?;
        Ok(select_records(&records, index, options))
    }

    async fn count(
        &self,
        table: &str,
        index: &BTreeMap<String, String>,
        filter: &FilterOptions,
    ) -> AppResult<u64> {
        let records = self.fetch_matching(table, index).await?;
        Ok(count_records(&records, index, filter))
    }
}

#[cfg(test)]
mod tests;
