//! ResultSieve Runtime
//!
//! Everything between storage and the filter engine: the key-value store
//! contract, the persisted settings, the cached remote list, and the
//! [`Controller`] that reacts to page mutations, setting changes and in-page
//! navigation.
//!
//! Collaborator traits are `?Send`: the runtime is driven from one thread.

pub mod config;
pub mod controller;
pub mod error;
pub mod remote;
pub mod settings;
pub mod store;

pub use config::RuntimeConfig;
pub use controller::{classify_changes, load_state, ChangeSet, Controller, FilterState, ReloadTicket, RootPoll};
pub use error::{FetchError, RuntimeError, StoreError};
pub use remote::{
    clear_remote_cache, refresh_remote_list, ListFetcher, RefreshOrigin, RefreshPolicy, RemoteRefresh,
    DEFAULT_CACHE_TTL_MS, DEFAULT_REMOTE_LIST_URL,
};
pub use settings::{load_snapshot, save_settings, save_user_list, Settings, Snapshot};
pub use store::{KeyValueStore, MemoryStore, Record, StorageArea, StorageChange, StorageKeys};
