//! Key-value storage contract
//!
//! Settings and user lists live in the `Sync` area; the imported remote list
//! and its fetch timestamp live in `Local`. Values are JSON, records are JSON
//! objects keyed by storage key.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreError;

/// A batch of key/value pairs.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    Sync,
    Local,
}

impl StorageArea {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sync" => Some(Self::Sync),
            "local" => Some(Self::Local),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Local => "local",
        }
    }
}

/// One key's change, as delivered by a store's change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub area: StorageArea,
}

/// Async get/set store. Implementations run on a single-threaded executor.
#[async_trait(?Send)]
pub trait KeyValueStore {
    /// Read `keys` from `area`. Missing keys are absent from the record.
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<Record, StoreError>;

    /// Write every pair of `record` into `area`.
    async fn set(&self, area: StorageArea, record: Record) -> Result<(), StoreError>;
}

/// Storage key names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub settings: String,
    pub blocklist: String,
    pub allowlist: String,
    pub remote_list: String,
    pub remote_fetched_at: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            settings: "unAIfySettings".to_string(),
            blocklist: "unAIfyBlacklist".to_string(),
            allowlist: "unAIfyAllowlist".to_string(),
            remote_list: "unAIfyGithubBlacklist".to_string(),
            remote_fetched_at: "unAIfyGithubBlacklistFetchedAt".to_string(),
        }
    }
}

impl StorageKeys {
    pub fn sync_keys(&self) -> [&str; 3] {
        [
            self.settings.as_str(),
            self.blocklist.as_str(),
            self.allowlist.as_str(),
        ]
    }

    pub fn local_keys(&self) -> [&str; 2] {
        [self.remote_list.as_str(), self.remote_fetched_at.as_str()]
    }
}

/// Read a stored string array. Anything that is not an array reads as empty;
/// non-string members are skipped.
pub fn string_list(record: &Record, key: &str) -> Vec<String> {
    match record.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Read a stored millisecond timestamp; missing or non-numeric reads as 0.
pub fn timestamp_ms(record: &Record, key: &str) -> u64 {
    record
        .get(key)
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)))
        .unwrap_or(0)
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store that broadcasts every effective change.
pub struct MemoryStore {
    areas: Mutex<HashMap<StorageArea, Record>>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            areas: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Receive every change written after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    fn write(&self, area: StorageArea, record: Record) -> Result<Vec<StorageChange>, StoreError> {
        let mut areas = self
            .areas
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        let stored = areas.entry(area).or_default();

        let mut changes = Vec::new();
        for (key, new_value) in record {
            let old_value = stored.insert(key.clone(), new_value.clone());
            if old_value.as_ref() == Some(&new_value) {
                continue;
            }
            changes.push(StorageChange {
                key,
                old_value,
                new_value: Some(new_value),
                area,
            });
        }
        Ok(changes)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl KeyValueStore for MemoryStore {
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<Record, StoreError> {
        let areas = self
            .areas
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        let mut out = Record::new();
        if let Some(stored) = areas.get(&area) {
            for key in keys {
                if let Some(value) = stored.get(*key) {
                    out.insert((*key).to_string(), value.clone());
                }
            }
        }
        Ok(out)
    }

    async fn set(&self, area: StorageArea, record: Record) -> Result<(), StoreError> {
        for change in self.write(area, record)? {
            // No subscribers is fine.
            let _ = self.changes.send(change);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn get_returns_only_present_keys() {
        let store = MemoryStore::new();
        store
            .set(StorageArea::Sync, record(json!({"a": 1, "b": [1, 2]})))
            .await
            .unwrap();

        let got = store.get(StorageArea::Sync, &["a", "missing"]).await.unwrap();
        assert_eq!(got, record(json!({"a": 1})));
        assert!(store.get(StorageArea::Local, &["a"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_broadcasts_effective_changes() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store
            .set(StorageArea::Local, record(json!({"k": "v1"})))
            .await
            .unwrap();
        store
            .set(StorageArea::Local, record(json!({"k": "v1"})))
            .await
            .unwrap();
        store
            .set(StorageArea::Local, record(json!({"k": "v2"})))
            .await
            .unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.key, "k");
        assert_eq!(first.old_value, None);
        assert_eq!(first.new_value, Some(json!("v1")));
        assert_eq!(first.area, StorageArea::Local);

        let second = rx.try_recv().unwrap();
        assert_eq!(second.old_value, Some(json!("v1")));
        assert_eq!(second.new_value, Some(json!("v2")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reads_lists_and_timestamps_leniently() {
        let rec = record(json!({
            "list": ["a.com", 3, "b.com"],
            "notlist": "a.com",
            "ts": 1700000000000u64,
            "fts": 12.5,
            "bad": "yesterday"
        }));
        assert_eq!(string_list(&rec, "list"), ["a.com", "b.com"]);
        assert!(string_list(&rec, "notlist").is_empty());
        assert!(string_list(&rec, "missing").is_empty());
        assert_eq!(timestamp_ms(&rec, "ts"), 1_700_000_000_000);
        assert_eq!(timestamp_ms(&rec, "fts"), 12);
        assert_eq!(timestamp_ms(&rec, "bad"), 0);
    }

    #[test]
    fn parses_area_names() {
        assert_eq!(StorageArea::parse("sync"), Some(StorageArea::Sync));
        assert_eq!(StorageArea::parse("managed"), None);
        assert_eq!(StorageArea::Local.as_str(), "local");
    }
}
