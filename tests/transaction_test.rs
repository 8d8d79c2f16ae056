//! Integration tests for the scoped transaction API.
//!
//! Tests verify that:
//! - a successful callback commits exactly once and its writes persist
//! - a callback error rolls back every write and propagates unchanged
//! - update_batch is all-or-nothing across its data/filter pairs
//! - a pair matching zero rows does not abort the batch

use dbkit::config::DbConfig;
use dbkit::db::{BatchUpdate, Dao, SelectOptions};
use dbkit::error::DbError;
use dbkit::JsonMap;
use serde_json::json;
use tempfile::NamedTempFile;

fn map(value: serde_json::Value) -> JsonMap {
    value.as_object().cloned().unwrap()
}

async fn setup_dao() -> Dao {
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file
        .into_temp_path()
        .keep()
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let dao = Dao::connect(DbConfig::sqlite(&db_path)).await.unwrap();
    dao.execute(
        "CREATE TABLE accounts (id INTEGER PRIMARY KEY, owner TEXT NOT NULL, balance INTEGER NOT NULL)",
        &[],
    )
    .await
    .unwrap();
    dao
}

async fn balances(dao: &Dao) -> Vec<(String, i64)> {
    dao.select_many("accounts", &SelectOptions::default().with_order_by("owner"))
        .await
        .unwrap()
        .into_iter()
        .map(|r| {
            (
                r["owner"].as_str().unwrap().to_string(),
                r["balance"].as_i64().unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_with_transaction_commits_on_success() {
    let dao = setup_dao().await;

    let inserted = dao
        .with_transaction(|tx| {
            Box::pin(async move {
                let row = tx
                    .insert_one(
                        "accounts",
                        &map(json!({"owner": "alice", "balance": 100})),
                        &[],
                    )
                    .await?;
                tx.insert_one("accounts", &map(json!({"owner": "bob", "balance": 50})), &[])
                    .await?;
                Ok(row)
            })
        })
        .await
        .unwrap();

    assert_eq!(inserted["owner"], json!("alice"));
    assert_eq!(
        balances(&dao).await,
        vec![("alice".to_string(), 100), ("bob".to_string(), 50)]
    );
}

#[tokio::test]
async fn test_with_transaction_rolls_back_and_propagates_error() {
    let dao = setup_dao().await;

    let err = dao
        .with_transaction(|tx| {
            Box::pin(async move {
                tx.insert_one(
                    "accounts",
                    &map(json!({"owner": "alice", "balance": 100})),
                    &[],
                )
                .await?;
                Err::<(), _>(DbError::validation("insufficient funds"))
            })
        })
        .await
        .unwrap_err();

    // The callback's own error, not a wrapper
    match err {
        DbError::Validation { message } => assert_eq!(message, "insufficient funds"),
        other => panic!("expected the callback error, got {other:?}"),
    }
    assert!(balances(&dao).await.is_empty());
}

#[tokio::test]
async fn test_with_transaction_rolls_back_on_driver_error() {
    let dao = setup_dao().await;

    let err = dao
        .with_transaction(|tx| {
            Box::pin(async move {
                tx.insert_one(
                    "accounts",
                    &map(json!({"owner": "alice", "balance": 100})),
                    &[],
                )
                .await?;
                // balance is NOT NULL
                tx.insert_one(
                    "accounts",
                    &map(json!({"owner": "bob", "balance": null})),
                    &[],
                )
                .await?;
                Ok(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Driver { .. }));
    assert!(balances(&dao).await.is_empty());
}

#[tokio::test]
async fn test_transaction_reads_see_own_writes() {
    let dao = setup_dao().await;

    let seen = dao
        .with_transaction(|tx| {
            Box::pin(async move {
                tx.insert_one(
                    "accounts",
                    &map(json!({"owner": "alice", "balance": 100})),
                    &[],
                )
                .await?;
                tx.select_one("accounts", &map(json!({"owner": "alice"})), None)
                    .await
            })
        })
        .await
        .unwrap();

    assert!(seen.is_some());
}

#[tokio::test]
async fn test_update_batch_applies_all_pairs_atomically() {
    let dao = setup_dao().await;
    dao.insert_many(
        "accounts",
        &[
            map(json!({"owner": "alice", "balance": 100})),
            map(json!({"owner": "bob", "balance": 50})),
        ],
        &[],
    )
    .await
    .unwrap();

    let rows = dao
        .update_batch(
            "accounts",
            &[
                BatchUpdate {
                    data: map(json!({"balance": 70})),
                    where_eq: map(json!({"owner": "alice"})),
                },
                BatchUpdate {
                    data: map(json!({"balance": 80})),
                    where_eq: map(json!({"owner": "bob"})),
                },
            ],
            &[],
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(
        balances(&dao).await,
        vec![("alice".to_string(), 70), ("bob".to_string(), 80)]
    );
}

#[tokio::test]
async fn test_update_batch_zero_match_pair_is_not_an_error() {
    let dao = setup_dao().await;
    dao.insert_one(
        "accounts",
        &map(json!({"owner": "alice", "balance": 100})),
        &[],
    )
    .await
    .unwrap();

    let rows = dao
        .update_batch(
            "accounts",
            &[
                BatchUpdate {
                    data: map(json!({"balance": 70})),
                    where_eq: map(json!({"owner": "alice"})),
                },
                BatchUpdate {
                    data: map(json!({"balance": 80})),
                    where_eq: map(json!({"owner": "nobody"})),
                },
            ],
            &[],
        )
        .await
        .unwrap();

    // Only the matching pair contributed rows; the batch still committed
    assert_eq!(rows.len(), 1);
    assert_eq!(balances(&dao).await, vec![("alice".to_string(), 70)]);
}

#[tokio::test]
async fn test_update_batch_failure_rolls_back_prior_pairs() {
    let dao = setup_dao().await;
    dao.insert_one(
        "accounts",
        &map(json!({"owner": "alice", "balance": 100})),
        &[],
    )
    .await
    .unwrap();

    let err = dao
        .update_batch(
            "accounts",
            &[
                BatchUpdate {
                    data: map(json!({"balance": 70})),
                    where_eq: map(json!({"owner": "alice"})),
                },
                BatchUpdate {
                    // no such column
                    data: map(json!({"missing_column": 1})),
                    where_eq: map(json!({"owner": "alice"})),
                },
            ],
            &[],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Driver { .. }));
    // First pair rolled back with the rest
    assert_eq!(balances(&dao).await, vec![("alice".to_string(), 100)]);
}

#[tokio::test]
async fn test_update_batch_rejects_empty_batch() {
    let dao = setup_dao().await;
    let err = dao.update_batch("accounts", &[], &[]).await.unwrap_err();
    assert!(matches!(err, DbError::Validation { .. }));
}
