//! Persisted settings and list snapshot
//!
//! The settings record is shared with other features of the extension, so
//! toggles this crate does not know about are kept as-is and written back
//! unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use sieve_lists::{ListSources, ListToggles};

use crate::error::StoreError;
use crate::store::{string_list, timestamp_ms, KeyValueStore, Record, StorageArea, StorageKeys};

const FILTER_TOGGLE: &str = "filter_ai_domains";
const REMOTE_TOGGLE: &str = "use_uBlockOrigin_blacklist";
/// Older name of the remote-list toggle, still read.
const LEGACY_REMOTE_TOGGLE: &str = "use_github_blacklist";

/// The toggle record stored under the settings key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub filter_ai_domains: bool,
    #[serde(rename = "use_uBlockOrigin_blacklist")]
    pub use_remote_list: bool,
    /// Toggles owned by other features.
    #[serde(flatten)]
    pub extra: Record,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            filter_ai_domains: true,
            use_remote_list: false,
            extra: Record::new(),
        }
    }
}

impl Settings {
    /// Read a stored settings value. Anything that is not an object yields
    /// the defaults; toggles accept any JSON value by truthiness.
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };
        let mut extra = map.clone();
        let filter = extra.remove(FILTER_TOGGLE);
        let remote = extra.remove(REMOTE_TOGGLE);
        let legacy = extra.remove(LEGACY_REMOTE_TOGGLE);

        let filter_ai_domains = match filter {
            None | Some(Value::Null) => true,
            Some(v) => truthy(&v),
        };
        let use_remote_list = remote
            .filter(|v| !v.is_null())
            .or(legacy)
            .map(|v| truthy(&v))
            .unwrap_or(false);

        Self {
            filter_ai_domains,
            use_remote_list,
            extra,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert(FILTER_TOGGLE.to_string(), Value::Bool(self.filter_ai_domains));
        map.insert(REMOTE_TOGGLE.to_string(), Value::Bool(self.use_remote_list));
        Value::Object(map)
    }

    pub fn toggles(&self) -> ListToggles {
        ListToggles {
            filtering_enabled: self.filter_ai_domains,
            use_remote_list: self.use_remote_list,
        }
    }
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Everything the filter derives its state from, read in one go.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub settings: Settings,
    pub blocklist: Vec<String>,
    pub allowlist: Vec<String>,
    pub remote_list: Vec<String>,
    pub remote_fetched_at: u64,
}

impl Snapshot {
    pub fn toggles(&self) -> ListToggles {
        self.settings.toggles()
    }

    /// Raw list sources with the built-in fallback filled in.
    pub fn sources(&self) -> ListSources {
        ListSources {
            local: self.blocklist.clone(),
            remote: self.remote_list.clone(),
            allow: self.allowlist.clone(),
            ..ListSources::with_default_fallback()
        }
    }
}

/// Read settings and lists from both storage areas.
pub async fn load_snapshot<S>(store: &S, keys: &StorageKeys) -> Result<Snapshot, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let sync = store.get(StorageArea::Sync, &keys.sync_keys()).await?;
    let local = store.get(StorageArea::Local, &keys.local_keys()).await?;

    let settings = sync
        .get(&keys.settings)
        .map(Settings::from_value)
        .unwrap_or_default();

    Ok(Snapshot {
        settings,
        blocklist: string_list(&sync, &keys.blocklist),
        allowlist: string_list(&sync, &keys.allowlist),
        remote_list: string_list(&local, &keys.remote_list),
        remote_fetched_at: timestamp_ms(&local, &keys.remote_fetched_at),
    })
}

pub async fn save_settings<S>(store: &S, keys: &StorageKeys, settings: &Settings) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let mut record = Record::new();
    record.insert(keys.settings.clone(), settings.to_value());
    store.set(StorageArea::Sync, record).await
}

/// Store a user-edited list (block or allow) as a string array.
pub async fn save_user_list<S>(store: &S, key: &str, domains: &[String]) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let mut record = Record::new();
    record.insert(key.to_string(), Value::from(domains.to_vec()));
    store.set(StorageArea::Sync, record).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn defaults_when_missing_or_malformed() {
        assert_eq!(Settings::from_value(&Value::Null), Settings::default());
        assert_eq!(Settings::from_value(&json!([1, 2])), Settings::default());
        let s = Settings::from_value(&json!({}));
        assert!(s.filter_ai_domains);
        assert!(!s.use_remote_list);
    }

    #[test]
    fn reads_toggles_by_truthiness() {
        let s = Settings::from_value(&json!({"filter_ai_domains": 0, "use_uBlockOrigin_blacklist": "yes"}));
        assert!(!s.filter_ai_domains);
        assert!(s.use_remote_list);
    }

    #[test]
    fn reads_legacy_remote_toggle() {
        let s = Settings::from_value(&json!({"use_github_blacklist": true}));
        assert!(s.use_remote_list);

        let s = Settings::from_value(&json!({"use_github_blacklist": true, "use_uBlockOrigin_blacklist": false}));
        assert!(!s.use_remote_list);
    }

    #[test]
    fn preserves_unknown_toggles() {
        let stored = json!({
            "filter_ai_domains": true,
            "hide_ai_overview": true,
            "date_warning": false
        });
        let s: Settings = serde_json::from_value(stored).unwrap();
        assert_eq!(s.extra.len(), 2);

        let written = s.to_value();
        assert_eq!(written["hide_ai_overview"], json!(true));
        assert_eq!(written["date_warning"], json!(false));
        assert_eq!(written["use_uBlockOrigin_blacklist"], json!(false));
        assert_eq!(serde_json::to_value(&s).unwrap(), written);
    }

    #[tokio::test]
    async fn loads_snapshot_from_both_areas() {
        let store = MemoryStore::new();
        let keys = StorageKeys::default();

        let settings = Settings {
            use_remote_list: true,
            ..Settings::default()
        };
        save_settings(&store, &keys, &settings).await.unwrap();
        save_user_list(&store, &keys.blocklist, &["openai.com".to_string()])
            .await
            .unwrap();
        let mut local = Record::new();
        local.insert(keys.remote_list.clone(), json!(["deepai.org"]));
        local.insert(keys.remote_fetched_at.clone(), json!(42));
        store.set(StorageArea::Local, local).await.unwrap();

        let snapshot = load_snapshot(&store, &keys).await.unwrap();
        assert!(snapshot.toggles().use_remote_list);
        assert_eq!(snapshot.blocklist, ["openai.com"]);
        assert!(snapshot.allowlist.is_empty());
        assert_eq!(snapshot.remote_list, ["deepai.org"]);
        assert_eq!(snapshot.remote_fetched_at, 42);

        let sources = snapshot.sources();
        assert_eq!(sources.local, ["openai.com"]);
        assert!(!sources.fallback.is_empty());
    }

    #[tokio::test]
    async fn empty_store_loads_defaults() {
        let store = MemoryStore::new();
        let snapshot = load_snapshot(&store, &StorageKeys::default()).await.unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }
}
