//! Integration tests against a live PostgreSQL server
//!
//! These tests require a reachable server with a `snap_test` database:
//!
//! ```bash
//! docker run -d -p 5432:5432 -e POSTGRES_HOST_AUTH_METHOD=trust -e POSTGRES_DB=snap_test postgres
//! PG_TEST_HOST=localhost cargo test --test integration_tests -- --ignored
//! ```
//!
//! Every test works inside its own schema so `key_index` never collides
//! between tests.

use std::time::{SystemTime, UNIX_EPOCH};

use assert_matches::assert_matches;
use pg_metrics_publisher::PublishError;
use pg_metrics_publisher::config::ConfigMap;
use pg_metrics_publisher::plugin::SNAP_JSON_CONTENT_TYPE;
use pg_metrics_publisher::publisher::{PostgresPublisher, Publisher, connection_config};
use pg_metrics_publisher::storage::StorageError;
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlx::{Connection, PgConnection, Row};

use crate::helpers::*;

fn test_host() -> String {
    std::env::var("PG_TEST_HOST").unwrap_or_else(|_| "localhost".to_string())
}

/// Fresh schema name, unique per test run
fn unique_schema(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}_{}_{nanos}", std::process::id())
}

async fn admin_connection(config: &ConfigMap) -> PgConnection {
    let connection = connection_config(config).unwrap();
    PgConnection::connect_with(&connection.connect_options())
        .await
        .expect("Failed to connect to PostgreSQL -- is the server running?")
}

async fn setup_schema(prefix: &str) -> (ConfigMap, PgConnection, String) {
    let schema = unique_schema(prefix);
    let config = create_test_config(&test_host(), 5432, &format!("{schema}.info"));
    let mut conn = admin_connection(&config).await;
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&mut conn)
        .await
        .unwrap();
    (config, conn, schema)
}

async fn teardown_schema(mut conn: PgConnection, schema: &str) {
    sqlx::query(&format!("DROP SCHEMA {schema} CASCADE"))
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();
}

async fn stored_rows(conn: &mut PgConnection, schema: &str) -> Vec<(String, String)> {
    sqlx::query(&format!(
        "SELECT key_column, value_column FROM {schema}.info ORDER BY id"
    ))
    .fetch_all(conn)
    .await
    .unwrap()
    .into_iter()
    .map(|row| (row.get("key_column"), row.get("value_column")))
    .collect()
}

#[tokio::test]
#[ignore = "requires live PostgreSQL server (PG_TEST_HOST)"]
async fn test_missing_table_then_publish_succeeds() {
    let (config, mut conn, schema) = setup_schema("missing_table").await;
    let publisher = PostgresPublisher::new();
    let content = encode_batch(&[create_metric(&["foo"], json!(99))]);

    let first = publisher
        .publish(SNAP_JSON_CONTENT_TYPE, &content, &config)
        .await;
    assert_matches!(first, Err(ref e) if e.is_missing_table());

    publisher
        .publish(SNAP_JSON_CONTENT_TYPE, &content, &config)
        .await
        .unwrap();

    assert_eq!(
        stored_rows(&mut conn, &schema).await,
        vec![("foo".to_string(), "99".to_string())]
    );

    let index: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM pg_indexes WHERE schemaname = $1 AND indexname = 'key_index'",
    )
    .bind(&schema)
    .fetch_one(&mut conn)
    .await
    .unwrap();
    assert_eq!(index.0, 1);

    teardown_schema(conn, &schema).await;
}

#[tokio::test]
#[ignore = "requires live PostgreSQL server (PG_TEST_HOST)"]
async fn test_publish_multiple_metrics() {
    let (config, mut conn, schema) = setup_schema("multiple").await;
    let publisher = PostgresPublisher::new();
    let content = encode_batch(&[
        create_metric(&["foo"], json!(101)),
        create_metric(&["bar"], json!(5.789)),
        create_metric(&["baz"], json!(true)),
        create_metric(&["intel", "list"], json!(["a", "b"])),
    ]);

    // first call only creates the table
    let _ = publisher
        .publish(SNAP_JSON_CONTENT_TYPE, &content, &config)
        .await;
    publisher
        .publish(SNAP_JSON_CONTENT_TYPE, &content, &config)
        .await
        .unwrap();

    let rows = stored_rows(&mut conn, &schema).await;
    assert_eq!(
        rows,
        vec![
            ("foo".to_string(), "101".to_string()),
            ("bar".to_string(), "5.789".to_string()),
            ("baz".to_string(), "1".to_string()),
            ("intel.list".to_string(), "a, b".to_string()),
        ]
    );

    teardown_schema(conn, &schema).await;
}

#[tokio::test]
#[ignore = "requires live PostgreSQL server (PG_TEST_HOST)"]
async fn test_unsupported_first_writes_no_rows() {
    let (config, mut conn, schema) = setup_schema("unsupported").await;
    let publisher = PostgresPublisher::new();
    let table_setup = encode_batch(&[create_metric(&["setup"], json!(0))]);
    let _ = publisher
        .publish(SNAP_JSON_CONTENT_TYPE, &table_setup, &config)
        .await;

    let content = encode_batch(&[
        create_metric(&["bad"], json!({"nested": 1})),
        create_metric(&["good"], json!(1)),
    ]);
    let result = publisher
        .publish(SNAP_JSON_CONTENT_TYPE, &content, &config)
        .await;

    assert_matches!(result, Err(PublishError::UnsupportedType(_)));
    assert!(stored_rows(&mut conn, &schema).await.is_empty());

    teardown_schema(conn, &schema).await;
}

#[tokio::test]
#[ignore = "requires live PostgreSQL server (PG_TEST_HOST)"]
async fn test_index_collision_on_manual_table() {
    let (config, mut conn, schema) = setup_schema("collision").await;
    sqlx::query(&format!(
        "CREATE TABLE {schema}.other (id SERIAL PRIMARY KEY, key_column VARCHAR(200))"
    ))
    .execute(&mut conn)
    .await
    .unwrap();
    sqlx::query(&format!("CREATE INDEX key_index on {schema}.other (key_column)"))
        .execute(&mut conn)
        .await
        .unwrap();

    let publisher = PostgresPublisher::new();
    let content = encode_batch(&[create_metric(&["foo"], json!(1))]);
    let result = publisher
        .publish(SNAP_JSON_CONTENT_TYPE, &content, &config)
        .await;

    assert_matches!(
        result,
        Err(PublishError::Storage(StorageError::TableCreation { .. }))
    );

    teardown_schema(conn, &schema).await;
}
