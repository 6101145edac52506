//! JSON-file key-value store
//!
//! One document with a `sync` and a `local` object, the same layout the
//! extension storage areas have. A missing file reads as empty.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use sieve_runtime::{KeyValueStore, Record, StorageArea, StoreError};

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Record, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Record::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Record::new());
        }
        match serde_json::from_str(&text)? {
            Value::Object(doc) => Ok(doc),
            _ => Err(StoreError::Unavailable(format!(
                "{} is not a JSON object",
                self.path.display()
            ))),
        }
    }
}

#[async_trait(?Send)]
impl KeyValueStore for FileStore {
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<Record, StoreError> {
        let doc = self.load().await?;
        let mut out = Record::new();
        if let Some(Value::Object(stored)) = doc.get(area.as_str()) {
            for key in keys {
                if let Some(value) = stored.get(*key) {
                    out.insert((*key).to_string(), value.clone());
                }
            }
        }
        Ok(out)
    }

    async fn set(&self, area: StorageArea, record: Record) -> Result<(), StoreError> {
        let mut doc = self.load().await?;
        let slot = doc
            .entry(area.as_str())
            .or_insert_with(|| Value::Object(Record::new()));
        if !slot.is_object() {
            *slot = Value::Object(Record::new());
        }
        if let Value::Object(stored) = slot {
            stored.extend(record);
        }

        let text = serde_json::to_string_pretty(&Value::Object(doc))?;
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sieve-cli-{}-{}.json", std::process::id(), name))
    }

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let store = FileStore::new(temp_path("missing"));
        let got = store.get(StorageArea::Sync, &["unAIfySettings"]).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn writes_areas_separately() {
        let path = temp_path("areas");
        let store = FileStore::new(&path);

        let mut sync = Record::new();
        sync.insert("unAIfyBlacklist".to_string(), json!(["openai.com"]));
        store.set(StorageArea::Sync, sync).await.unwrap();

        let mut local = Record::new();
        local.insert("unAIfyGithubBlacklistFetchedAt".to_string(), json!(7));
        store.set(StorageArea::Local, local).await.unwrap();

        let got = store.get(StorageArea::Sync, &["unAIfyBlacklist"]).await.unwrap();
        assert_eq!(got["unAIfyBlacklist"], json!(["openai.com"]));
        let got = store
            .get(StorageArea::Local, &["unAIfyBlacklist", "unAIfyGithubBlacklistFetchedAt"])
            .await
            .unwrap();
        assert_eq!(got.len(), 1);

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(doc["sync"].is_object() && doc["local"].is_object());
        std::fs::remove_file(&path).unwrap();
    }
}
