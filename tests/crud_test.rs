//! Integration tests for the CRUD helpers against a real SQLite database.
//!
//! Tests verify that:
//! - insert_one round-trips values through RETURNING
//! - select helpers honor filters, ordering, projection, and paging
//! - unsafe deletes and malformed identifiers are rejected before execution
//! - schema introspection reports columns in ordinal order
//!
//! A PostgreSQL variant of the smoke test runs when TEST_POSTGRES_URL is set.

use dbkit::config::DbConfig;
use dbkit::db::{Dao, Param, SelectOptions};
use dbkit::error::DbError;
use dbkit::JsonMap;
use serde_json::json;
use tempfile::NamedTempFile;

fn map(value: serde_json::Value) -> JsonMap {
    value.as_object().cloned().unwrap()
}

/// Create a writable SQLite test database with a users table.
async fn setup_dao() -> Dao {
    let temp_file = NamedTempFile::new().unwrap();
    // Keep the temp file alive - prevent deletion when function returns
    let db_path = temp_file
        .into_temp_path()
        .keep()
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let dao = Dao::connect(DbConfig::sqlite(&db_path)).await.unwrap();
    dao.execute(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER, email TEXT)",
        &[],
    )
    .await
    .unwrap();
    dao
}

async fn seed_users(dao: &Dao) {
    dao.insert_many(
        "users",
        &[
            map(json!({"name": "alice", "age": 30, "email": "alice@example.com"})),
            map(json!({"name": "bob", "age": 25, "email": "bob@example.com"})),
            map(json!({"name": "carol", "age": 35, "email": null})),
        ],
        &[],
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_insert_one_round_trips_values() {
    let dao = setup_dao().await;

    let row = dao
        .insert_one(
            "users",
            &map(json!({"name": "alice", "age": 30, "email": "alice@example.com"})),
            &[],
        )
        .await
        .unwrap();

    assert_eq!(row["name"], json!("alice"));
    assert_eq!(row["age"], json!(30));
    assert_eq!(row["email"], json!("alice@example.com"));
    assert!(row["id"].is_number());
}

#[tokio::test]
async fn test_insert_one_with_projection() {
    let dao = setup_dao().await;

    let row = dao
        .insert_one(
            "users",
            &map(json!({"name": "bob", "age": 25})),
            &["id".to_string(), "name".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(row.len(), 2);
    assert_eq!(row["name"], json!("bob"));
}

#[tokio::test]
async fn test_select_many_filter_order_limit() {
    let dao = setup_dao().await;
    seed_users(&dao).await;

    let opts = SelectOptions::default()
        .with_order_by("age DESC")
        .with_limit(2);
    let rows = dao.select_many("users", &opts).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], json!("carol"));
    assert_eq!(rows[1]["name"], json!("alice"));

    let filtered = dao
        .select_many(
            "users",
            &SelectOptions::default().with_where(map(json!({"name": "bob"}))),
        )
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0]["age"], json!(25));
}

#[tokio::test]
async fn test_select_many_offset_pages_past_rows() {
    let dao = setup_dao().await;
    seed_users(&dao).await;

    let opts = SelectOptions::default()
        .with_order_by("name")
        .with_limit(10)
        .with_offset(2);
    let rows = dao.select_many("users", &opts).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("carol"));
}

#[tokio::test]
async fn test_select_many_offset_without_limit() {
    let dao = setup_dao().await;
    seed_users(&dao).await;

    let rows = dao
        .select_many(
            "users",
            &SelectOptions::default().with_order_by("name").with_offset(1),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], json!("bob"));
    assert_eq!(rows[1]["name"], json!("carol"));
}

#[tokio::test]
async fn test_select_one_absent_row_is_none() {
    let dao = setup_dao().await;
    seed_users(&dao).await;

    let found = dao
        .select_one("users", &map(json!({"name": "alice"})), None)
        .await
        .unwrap();
    assert!(found.is_some());

    let missing = dao
        .select_one("users", &map(json!({"name": "nobody"})), None)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_insert_many_rejects_mismatched_keys() {
    let dao = setup_dao().await;

    let err = dao
        .insert_many(
            "users",
            &[
                map(json!({"name": "alice", "age": 30})),
                map(json!({"name": "bob"})),
            ],
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Validation { .. }));

    // Nothing was inserted
    let rows = dao
        .select_many("users", &SelectOptions::default())
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_update_many_empty_filter_updates_all_rows() {
    let dao = setup_dao().await;
    seed_users(&dao).await;

    let updated = dao
        .update_many(
            "users",
            &map(json!({"email": "shared@example.com"})),
            &JsonMap::new(),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(updated.len(), 3);
    assert!(updated
        .iter()
        .all(|r| r["email"] == json!("shared@example.com")));
}

#[tokio::test]
async fn test_delete_many_empty_filter_rejected_data_intact() {
    let dao = setup_dao().await;
    seed_users(&dao).await;

    let err = dao
        .delete_many("users", &JsonMap::new(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Validation { .. }));

    let rows = dao
        .select_many("users", &SelectOptions::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_delete_many_returns_deleted_rows() {
    let dao = setup_dao().await;
    seed_users(&dao).await;

    let deleted = dao
        .delete_many("users", &map(json!({"name": "bob"})), &[])
        .await
        .unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0]["age"], json!(25));

    let remaining = dao
        .select_many("users", &SelectOptions::default())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
async fn test_malformed_identifiers_rejected() {
    let dao = setup_dao().await;
    seed_users(&dao).await;

    let err = dao
        .select_many("users; DROP TABLE users", &SelectOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Validation { .. }));

    let err = dao
        .select_many(
            "users",
            &SelectOptions::default().with_where(map(json!({"name = '' OR 1=1 --": "x"}))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Validation { .. }));

    // Table untouched by either attempt
    assert!(dao.table_exists("users").await.unwrap());
}

#[tokio::test]
async fn test_query_and_execute_with_params() {
    let dao = setup_dao().await;
    seed_users(&dao).await;

    let result = dao
        .query(
            "SELECT name FROM users WHERE age > $1 ORDER BY name",
            &[Param::Int(26)],
        )
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0]["name"], json!("alice"));

    let result = dao
        .execute(
            "UPDATE users SET age = age + $1 WHERE name = $2",
            &[Param::Int(1), Param::String("bob".to_string())],
        )
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 1);
}

#[tokio::test]
async fn test_table_exists_and_describe_table() {
    let dao = setup_dao().await;

    assert!(dao.table_exists("users").await.unwrap());
    assert!(!dao.table_exists("missing").await.unwrap());

    let columns = dao.describe_table("users").await.unwrap();
    assert_eq!(columns.len(), 4);
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "age", "email"]);
    assert!(columns.windows(2).all(|w| w[0].ordinal < w[1].ordinal));
    assert!(!columns[1].nullable); // name TEXT NOT NULL
    assert!(columns[2].nullable);

    let missing = dao.describe_table("missing").await.unwrap();
    assert!(missing.is_empty());
}

#[tokio::test]
async fn test_close_then_operate_fails() {
    let dao = setup_dao().await;
    dao.close().await;
    assert!(!dao.is_connected());

    let err = dao
        .select_many("users", &SelectOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }));
}

/// PostgreSQL smoke test, gated on TEST_POSTGRES_URL.
#[tokio::test]
async fn test_postgres_crud_smoke() {
    let url = match std::env::var("TEST_POSTGRES_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping PostgreSQL test: TEST_POSTGRES_URL not set");
            return;
        }
    };

    let dao = Dao::connect(DbConfig::from_url(url).unwrap()).await.unwrap();
    dao.execute("DROP TABLE IF EXISTS dbkit_smoke", &[])
        .await
        .unwrap();
    dao.execute(
        "CREATE TABLE dbkit_smoke (id SERIAL PRIMARY KEY, name TEXT NOT NULL, age INT, \
         created_at TIMESTAMPTZ NOT NULL DEFAULT now(), birthday DATE DEFAULT '1990-03-14')",
        &[],
    )
    .await
    .unwrap();

    let row = dao
        .insert_one("dbkit_smoke", &map(json!({"name": "alice", "age": 30})), &[])
        .await
        .unwrap();
    assert_eq!(row["name"], json!("alice"));

    // Temporal columns decode to ISO-8601 strings, not null
    let created_at = row["created_at"].as_str().unwrap();
    assert!(created_at.starts_with("20"));
    assert_eq!(row["birthday"], json!("1990-03-14"));

    let updated = dao
        .update_many(
            "dbkit_smoke",
            &map(json!({"age": 31})),
            &map(json!({"name": "alice"})),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0]["age"], json!(31));

    dao.execute("DROP TABLE dbkit_smoke", &[]).await.unwrap();
    dao.close().await;
}
