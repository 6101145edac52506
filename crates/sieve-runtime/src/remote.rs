//! Remote blocklist import
//!
//! The remote list is a hosts-style file. Its parsed domains are cached in the
//! `Local` storage area next to the fetch time, and a cache younger than the
//! TTL is served without touching the network.

use async_trait::async_trait;
use serde_json::Value;

use sieve_lists::{parse_domain_list, ParseStats};

use crate::error::{FetchError, RuntimeError};
use crate::store::{string_list, timestamp_ms, KeyValueStore, Record, StorageArea, StorageKeys};

pub const DEFAULT_REMOTE_LIST_URL: &str =
    "https://raw.githubusercontent.com/laylavish/uBlockOrigin-HUGE-AI-Blocklist/main/noai_hosts.txt";

/// 24 hours.
pub const DEFAULT_CACHE_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Retrieves list text. Non-2xx responses are errors.
#[async_trait(?Send)]
pub trait ListFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub ttl_ms: u64,
    /// Fetch even when the cache is fresh.
    pub force: bool,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_CACHE_TTL_MS,
            force: false,
        }
    }
}

/// Where the returned list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOrigin {
    FreshCache,
    Fetched(ParseStats),
    /// The fetch failed and an older cache was served.
    StaleCache,
    /// The fetch failed and nothing was cached.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRefresh {
    pub domains: Vec<String>,
    pub fetched_at: u64,
    pub origin: RefreshOrigin,
}

/// Return the remote list, fetching it when the cache is stale or was never
/// filled. A fetch inside the TTL counts as fresh even if it yielded no
/// domains, so a bad response is not re-requested on every load.
///
/// Fetch failures never surface: the cached list (or nothing) is returned and
/// the failure is logged. Storage failures do.
pub async fn refresh_remote_list<S, F>(
    store: &S,
    fetcher: &F,
    keys: &StorageKeys,
    url: &str,
    now_ms: u64,
    policy: RefreshPolicy,
) -> Result<RemoteRefresh, RuntimeError>
where
    S: KeyValueStore + ?Sized,
    F: ListFetcher + ?Sized,
{
    let cached = store.get(StorageArea::Local, &keys.local_keys()).await?;
    let cache = string_list(&cached, &keys.remote_list);
    let fetched_at = timestamp_ms(&cached, &keys.remote_fetched_at);

    let fresh = fetched_at > 0 && now_ms.saturating_sub(fetched_at) < policy.ttl_ms;
    if !policy.force && fresh {
        log::debug!("remote list cache is fresh ({} domains)", cache.len());
        return Ok(RemoteRefresh {
            domains: cache,
            fetched_at,
            origin: RefreshOrigin::FreshCache,
        });
    }

    match fetcher.fetch_text(url).await {
        Ok(text) => {
            let parsed = parse_domain_list(&text);
            let domains: Vec<String> = parsed.domains.into_iter().map(|d| d.into_string()).collect();

            let mut record = Record::new();
            record.insert(keys.remote_list.clone(), Value::from(domains.clone()));
            record.insert(keys.remote_fetched_at.clone(), Value::from(now_ms));
            store.set(StorageArea::Local, record).await?;

            log::info!(
                "remote list loaded: {} domains ({} lines rejected)",
                domains.len(),
                parsed.stats.rejected
            );
            Ok(RemoteRefresh {
                domains,
                fetched_at: now_ms,
                origin: RefreshOrigin::Fetched(parsed.stats),
            })
        }
        Err(e) => {
            log::warn!("remote list fetch failed, using cached list if any: {e}");
            let origin = if cache.is_empty() {
                RefreshOrigin::Empty
            } else {
                RefreshOrigin::StaleCache
            };
            Ok(RemoteRefresh {
                domains: cache,
                fetched_at,
                origin,
            })
        }
    }
}

/// Drop the cached remote list and its timestamp.
pub async fn clear_remote_cache<S>(store: &S, keys: &StorageKeys) -> Result<(), RuntimeError>
where
    S: KeyValueStore + ?Sized,
{
    let mut record = Record::new();
    record.insert(keys.remote_list.clone(), Value::Array(Vec::new()));
    record.insert(keys.remote_fetched_at.clone(), Value::from(0u64));
    store.set(StorageArea::Local, record).await?;
    Ok(())
}
