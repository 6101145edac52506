//! `chrome.storage` binding
//!
//! Values cross the JS boundary as JSON text so the runtime only ever sees
//! `serde_json` values.

use async_trait::async_trait;
use js_sys::{Array, Promise, JSON};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use sieve_runtime::{KeyValueStore, Record, StorageArea, StorageChange, StoreError};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = get)]
    fn sync_get(keys: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = set)]
    fn sync_set(items: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = get)]
    fn local_get(keys: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = set)]
    fn local_set(items: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "onChanged"], js_name = addListener)]
    fn add_changed_listener(listener: &Closure<dyn FnMut(JsValue, String)>) -> Result<(), JsValue>;
}

/// Extension storage reached through the `chrome.storage` promise API.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeStore;

#[async_trait(?Send)]
impl KeyValueStore for ChromeStore {
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<Record, StoreError> {
        let js_keys: Array = keys.iter().map(|k| JsValue::from_str(k)).collect();
        let promise = match area {
            StorageArea::Sync => sync_get(&js_keys),
            StorageArea::Local => local_get(&js_keys),
        }
        .map_err(unavailable)?;
        let items = JsFuture::from(promise).await.map_err(unavailable)?;

        match to_json(&items)? {
            Value::Object(record) => Ok(record),
            _ => Ok(Record::new()),
        }
    }

    async fn set(&self, area: StorageArea, record: Record) -> Result<(), StoreError> {
        let items = from_json(&Value::Object(record))?;
        let promise = match area {
            StorageArea::Sync => sync_set(&items),
            StorageArea::Local => local_set(&items),
        }
        .map_err(unavailable)?;
        JsFuture::from(promise)
            .await
            .map_err(|e| StoreError::Rejected(format!("{e:?}")))?;
        Ok(())
    }
}

/// Register `listener` for `chrome.storage.onChanged`. The closure is leaked
/// for the lifetime of the page.
pub fn on_changed<F>(mut listener: F) -> Result<(), JsValue>
where
    F: FnMut(Vec<StorageChange>) + 'static,
{
    let callback = Closure::wrap(Box::new(move |changes: JsValue, area: String| {
        let Some(area) = StorageArea::parse(&area) else {
            return;
        };
        match to_json(&changes) {
            Ok(json) => listener(parse_changes(&json, area)),
            Err(e) => log::warn!("unreadable storage change: {e}"),
        }
    }) as Box<dyn FnMut(JsValue, String)>);

    add_changed_listener(&callback)?;
    callback.forget();
    Ok(())
}

/// Turn an `onChanged` payload (`{key: {oldValue, newValue}}`) into changes.
pub fn parse_changes(json: &Value, area: StorageArea) -> Vec<StorageChange> {
    let Value::Object(map) = json else {
        return Vec::new();
    };
    map.iter()
        .map(|(key, change)| StorageChange {
            key: key.clone(),
            old_value: change.get("oldValue").cloned(),
            new_value: change.get("newValue").cloned(),
            area,
        })
        .collect()
}

fn to_json(value: &JsValue) -> Result<Value, StoreError> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Null);
    }
    let text: String = JSON::stringify(value).map_err(unavailable)?.into();
    Ok(serde_json::from_str(&text)?)
}

fn from_json(value: &Value) -> Result<JsValue, StoreError> {
    let text = serde_json::to_string(value)?;
    JSON::parse(&text).map_err(unavailable)
}

fn unavailable(e: JsValue) -> StoreError {
    StoreError::Unavailable(format!("{e:?}"))
}
