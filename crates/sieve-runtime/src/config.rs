//! Runtime configuration

use serde::{Deserialize, Serialize};

use sieve_core::FilterConfig;

use crate::remote::{DEFAULT_CACHE_TTL_MS, DEFAULT_REMOTE_LIST_URL};
use crate::store::StorageKeys;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub filter: FilterConfig,
    pub keys: StorageKeys,
    pub remote_list_url: String,
    pub cache_ttl_ms: u64,
    /// Refresh a stale remote cache while loading settings.
    pub refresh_remote_on_load: bool,
    /// Interval of the missing-results-root poll.
    pub root_poll_ms: u32,
    /// Attempts before the root poll gives up.
    pub root_poll_limit: u32,
    /// Interval of the in-page navigation check.
    pub url_poll_ms: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            keys: StorageKeys::default(),
            remote_list_url: DEFAULT_REMOTE_LIST_URL.to_string(),
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            refresh_remote_on_load: true,
            root_poll_ms: 250,
            root_poll_limit: 240,
            url_poll_ms: 800,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
