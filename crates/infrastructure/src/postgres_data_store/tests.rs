use std::collections::BTreeMap;

use serde_json::json;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use vela_console_application::{DataStore, FilterOptions, ListOptions, StoredRecord};
use vela_console_core::AppError;

use super::PostgresDataStore;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres datastore tests: {error}");
    }

    Some(pool)
}

fn env_record(table: &str, name: &str, project: &str, created: &str) -> StoredRecord {
    StoredRecord {
        table: table.to_owned(),
        primary_key: name.to_owned(),
        index: BTreeMap::from([
            ("name".to_owned(), name.to_owned()),
            ("project".to_owned(), project.to_owned()),
        ]),
        data: json!({ "name": name, "project": project, "createTime": created }),
    }
}

#[tokio::test]
async fn records_round_trip_through_postgres() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresDataStore::new(pool);
    let table = format!("vela_env_{}", uuid::Uuid::new_v4().simple());

    let seeded = store
        .batch_add(vec![
            env_record(&table, "dev", "team", "2024-01-01T00:00:00Z"),
            env_record(&table, "prod", "team", "2024-01-02T00:00:00Z"),
            env_record(&table, "ops", "infra", "2024-01-03T00:00:00Z"),
        ])
        .await;
    assert!(seeded.is_ok());

    let duplicate = store
        .add(env_record(&table, "dev", "team", "2024-01-04T00:00:00Z"))
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let team = BTreeMap::from([("project".to_owned(), "team".to_owned())]);
    let listed = store
        .list(&table, &team, &ListOptions::default().newest_first("createTime"))
        .await;
    assert!(matches!(
        listed.as_deref(),
        Ok([first, second]) if first.primary_key == "prod" && second.primary_key == "dev"
    ));

    let counted = store
        .count(
            &table,
            &BTreeMap::new(),
            &FilterOptions::default().with_in("name", vec!["ops".to_owned()]),
        )
        .await;
    assert!(matches!(counted, Ok(1)));

    let missing = store
        .put(env_record(&table, "qa", "team", "2024-01-05T00:00:00Z"))
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    assert!(store.delete(&table, "dev").await.is_ok());
    assert!(matches!(store.is_exist(&table, "dev").await, Ok(false)));
    assert!(matches!(
        store.delete(&table, "dev").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn failed_batch_add_leaves_no_partial_rows() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresDataStore::new(pool);
    let table = format!("vela_env_{}", uuid::Uuid::new_v4().simple());

    assert!(
        store
            .add(env_record(&table, "dev", "team", "2024-01-01T00:00:00Z"))
            .await
            .is_ok()
    );
    let result = store
        .batch_add(vec![
            env_record(&table, "qa", "team", "2024-01-02T00:00:00Z"),
            env_record(&table, "dev", "team", "2024-01-03T00:00:00Z"),
        ])
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(matches!(store.is_exist(&table, "qa").await, Ok(false)));
}
