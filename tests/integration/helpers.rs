//! Helper functions for integration tests

#![allow(dead_code)]

use chrono::Utc;
use pg_metrics_publisher::Metric;
use pg_metrics_publisher::config::{ConfigMap, ConfigValue};

/// Option map as a host would hand it over, before defaults are applied
pub fn create_test_config(hostname: &str, port: i64, table: &str) -> ConfigMap {
    ConfigMap::from([
        ("hostname".to_string(), ConfigValue::from(hostname)),
        ("port".to_string(), ConfigValue::Int(port)),
        ("username".to_string(), ConfigValue::from("postgres")),
        ("password".to_string(), ConfigValue::from("")),
        ("database".to_string(), ConfigValue::from("snap_test")),
        ("table_name".to_string(), ConfigValue::from(table)),
    ])
}

/// Config pointing at a port nothing listens on
pub fn create_unreachable_config() -> ConfigMap {
    create_test_config("127.0.0.1", 1, "info")
}

pub fn create_metric(namespace: &[&str], data: serde_json::Value) -> Metric {
    Metric::new(namespace, Utc::now(), data)
}

/// Serialize metrics into a `snap.json` batch
pub fn encode_batch(metrics: &[Metric]) -> Vec<u8> {
    serde_json::to_vec(metrics).unwrap()
}
