//! End-to-end publish tests against the in-memory store
//!
//! These tests verify that:
//! - Wire batches decode into the expected rows
//! - Every supported value type is stored in its canonical form
//! - A missing table fails the first call and is ready for the next one
//! - Encoding failures abort before anything is written

use assert_matches::assert_matches;
use chrono::Utc;
use pg_metrics_publisher::PublishError;
use pg_metrics_publisher::plugin::{SNAP_JSON_CONTENT_TYPE, decode_batch};
use pg_metrics_publisher::publisher::{connection_config, write_batch};
use pg_metrics_publisher::storage::{MemoryStore, StorageError, TableName};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::helpers::*;

#[tokio::test]
async fn test_all_supported_types_round_trip_through_the_wire() {
    let metrics = vec![
        create_metric(&["foo"], json!(99)),
        create_metric(&["foo", "unsigned"], json!(u64::MAX)),
        create_metric(&["bar"], json!(3.141)),
        create_metric(&["qux"], json!("bar")),
        create_metric(&["baz"], json!(true)),
        create_metric(&["ints"], json!([1, 2, 3])),
        create_metric(&["floats"], json!([0.5, 1.25])),
        create_metric(&["strings"], json!(["a", "b"])),
    ];
    let content = encode_batch(&metrics);

    let batch = decode_batch(SNAP_JSON_CONTENT_TYPE, &content).unwrap();
    let table = TableName::parse("info").unwrap();
    let mut store = MemoryStore::with_table(&table);
    let written = write_batch(&mut store, &table, &batch, Utc::now())
        .await
        .unwrap();

    assert_eq!(written, 8);
    let stored: Vec<(&str, &str)> = store
        .rows(&table)
        .unwrap()
        .iter()
        .map(|row| (row.key.as_str(), row.value.as_str()))
        .collect();
    assert_eq!(
        stored,
        vec![
            ("foo", "99"),
            ("foo.unsigned", "18446744073709551615"),
            ("bar", "3.141"),
            ("qux", "bar"),
            ("baz", "1"),
            ("ints", "1, 2, 3"),
            ("floats", "0.5, 1.25"),
            ("strings", "a, b"),
        ]
    );
}

#[tokio::test]
async fn test_missing_table_then_next_cycle_succeeds() {
    let config = connection_config(&create_test_config("localhost", 5432, "info")).unwrap();
    let batch = vec![create_metric(&["intel", "cpu", "load"], json!(0.42))];
    let mut store = MemoryStore::new();

    let first = write_batch(&mut store, &config.table, &batch, Utc::now()).await;
    assert_matches!(
        first,
        Err(PublishError::Storage(StorageError::MissingTable { ref table, .. })) if table == "info"
    );
    assert_eq!(store.rows(&config.table).unwrap().len(), 0);
    assert_eq!(
        store.statements(),
        &[
            config.table.insert_sql(),
            config.table.create_table_sql(),
            config.table.create_index_sql(),
        ]
    );

    let second = write_batch(&mut store, &config.table, &batch, Utc::now()).await;
    assert_matches!(second, Ok(1));

    let rows = store.rows(&config.table).unwrap();
    assert_eq!(rows[0].key, "intel.cpu.load");
    assert_eq!(rows[0].value, "0.42");
}

#[tokio::test]
async fn test_unsupported_metric_first_leaves_zero_rows() {
    let content = encode_batch(&[
        create_metric(&["nested"], json!({"a": {"b": 1}})),
        create_metric(&["fine"], json!(1)),
    ]);
    let batch = decode_batch(SNAP_JSON_CONTENT_TYPE, &content).unwrap();
    let table = TableName::parse("info").unwrap();
    let mut store = MemoryStore::with_table(&table);

    let result = write_batch(&mut store, &table, &batch, Utc::now()).await;

    assert_matches!(result, Err(PublishError::UnsupportedType(ref e)) if e.type_name == "map");
    assert_eq!(store.rows(&table).unwrap().len(), 0);
    assert_eq!(store.statement_count(), 0);
}

#[tokio::test]
async fn test_rows_share_one_timestamp_per_call() {
    let content = encode_batch(&[
        create_metric(&["a"], json!(1)),
        create_metric(&["b"], json!(2)),
        create_metric(&["c"], json!(3)),
    ]);
    let batch = decode_batch(SNAP_JSON_CONTENT_TYPE, &content).unwrap();
    let table = TableName::parse("info").unwrap();
    let mut store = MemoryStore::with_table(&table);

    write_batch(&mut store, &table, &batch, Utc::now())
        .await
        .unwrap();

    let rows = store.rows(&table).unwrap();
    assert!(rows.iter().all(|row| row.time_posted == rows[0].time_posted));
    assert_eq!(rows[0].time_posted.timestamp_subsec_nanos(), 0);
}

#[test]
fn test_namespace_element_objects_on_the_wire() {
    let content = br#"[{
        "namespace": [{"Value": "intel"}, {"Value": "mem"}, {"Value": "free", "Description": "free memory"}],
        "timestamp": "2016-03-01T12:00:00Z",
        "unit": "B",
        "data": 1024
    }]"#;

    let batch = decode_batch(SNAP_JSON_CONTENT_TYPE, content).unwrap();

    assert_eq!(batch[0].key(), "intel.mem.free");
    assert_eq!(batch[0].unit, "B");
}
