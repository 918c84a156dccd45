use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub const ENV_DATABASE_URL: &str = "ORDERS_DATABASE_URL";
pub const ENV_KAFKA_BROKERS: &str = "ORDERS_KAFKA_BROKERS";
pub const ENV_CONFIG_PATH: &str = "ORDERS_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HttpConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_http_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PostgresConfig {
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    pub db_name: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

fn default_pg_port() -> u16 {
    5432
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KafkaConfig {
    #[serde(default)]
    pub broker_list: Vec<String>,
    #[serde(default = "default_order_topic")]
    pub order_event_topic: String,
    #[serde(default = "default_status_topic")]
    pub status_event_topic: String,
}

fn default_order_topic() -> String {
    "order-events".to_string()
}

fn default_status_topic() -> String {
    "order-status-events".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_cache_sweep_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_cache_ttl_seconds() -> u64 {
    600
}

fn default_cache_sweep_seconds() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    #[serde(default = "default_relay_batch_size")]
    pub batch_size: i64,
    #[serde(default = "default_relay_tick_seconds")]
    pub tick_interval_seconds: u64,
}

fn default_relay_batch_size() -> i64 {
    100
}

fn default_relay_tick_seconds() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

impl PostgresConfig {
    pub fn to_connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.db_name, self.ssl_mode
        )
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub app: AppConfig,
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Load + merge YAML files in order, then canonicalize to JSON and hash.
/// Later files override earlier files via deep-merge. Environment variables
/// named `ENV_DATABASE_URL` / `ENV_KAFKA_BROKERS` layer on top and win.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for p in paths {
        let s = fs::read_to_string(p).with_context(|| format!("read config: {p}"))?;
        let yaml_val: serde_yaml::Value =
            serde_yaml::from_str(&s).with_context(|| format!("parse yaml: {p}"))?;
        let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    apply_env_overrides(&mut merged);

    let canonical = canonicalize_json(&merged);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(hasher.finalize());

    let app: AppConfig =
        serde_json::from_value(merged.clone()).context("config does not match AppConfig shape")?;

    Ok(LoadedConfig {
        app,
        config_json: merged,
        canonical_json: canonical,
        config_hash: hash,
    })
}

fn apply_env_overrides(merged: &mut Value) {
    if let Ok(brokers) = std::env::var(ENV_KAFKA_BROKERS) {
        let list: Vec<Value> = brokers
            .split(',')
            .map(|s| Value::String(s.trim().to_string()))
            .collect();
        set_path(merged, &["kafka", "broker_list"], Value::Array(list));
    }
}

fn set_path(root: &mut Value, path: &[&str], value: Value) {
    let mut cur = root;
    for (i, key) in path.iter().enumerate() {
        if !cur.is_object() {
            *cur = Value::Object(Default::default());
        }
        let map = cur.as_object_mut().expect("just ensured object");
        if i == path.len() - 1 {
            map.insert((*key).to_string(), value);
            return;
        }
        cur = map.entry((*key).to_string()).or_insert_with(|| Value::Object(Default::default()));
    }
}

/// Deep-merge: objects merge recursively; arrays replaced; scalars overwritten.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

/// Canonicalize JSON by sorting all object keys recursively and emitting compact JSON.
fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_merge_overrides_scalars_and_preserves_siblings() {
        let mut dst = serde_json::json!({"a": 1, "b": {"c": 2, "d": 3}});
        let src = serde_json::json!({"b": {"c": 99}});
        deep_merge(&mut dst, src);
        assert_eq!(dst, serde_json::json!({"a": 1, "b": {"c": 99, "d": 3}}));
    }

    #[test]
    fn canonicalize_sorts_keys_deterministically() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(canonicalize_json(&a), canonicalize_json(&b));
    }

    #[test]
    fn default_app_config_has_documented_defaults() {
        let app: AppConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(app.http.port, 8080);
        assert_eq!(app.cache.capacity, 10_000);
        assert_eq!(app.relay.batch_size, 100);
    }
}
