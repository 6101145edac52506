//! Reactivity Controller
//!
//! Owns the filter state and the render surface, and turns page mutations,
//! storage changes and in-page navigation into bounded scans.
//!
//! The controller itself is synchronous. Hosts drive it:
//!
//! 1. On a DOM mutation call [`Controller::notify_mutation`]; when it returns
//!    `true`, schedule one microtask that calls [`Controller::flush`].
//! 2. On a storage notification call [`Controller::wants_reload`]; when it
//!    returns `true`, take a ticket with [`Controller::begin_reload`], read a
//!    [`Snapshot`] with [`load_state`] and hand both to
//!    [`Controller::apply_snapshot`].
//! 3. On a timer call [`Controller::check_url`] and [`Controller::poll_root`].

use bitflags::bitflags;

use sieve_core::{EffectiveLists, FilterEngine, PageContext, RenderSurface, ScanReport};
use sieve_lists::{build_effective_lists, BuildStats, ListToggles};

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::remote::{refresh_remote_list, ListFetcher, RefreshPolicy};
use crate::settings::{load_snapshot, Snapshot};
use crate::store::{KeyValueStore, StorageArea, StorageChange, StorageKeys};

// =============================================================================
// Change classification
// =============================================================================

bitflags! {
    /// Which inputs of the filter state a storage notification touched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeSet: u8 {
        const SETTINGS = 1 << 0;
        const BLOCKLIST = 1 << 1;
        const ALLOWLIST = 1 << 2;
        const REMOTE_CACHE = 1 << 3;
    }
}

/// Map storage changes onto the filter inputs they affect.
pub fn classify_changes(changes: &[StorageChange], keys: &StorageKeys) -> ChangeSet {
    changes.iter().fold(ChangeSet::empty(), |set, change| {
        let key = change.key.as_str();
        let flag = match change.area {
            StorageArea::Sync if key == keys.settings => ChangeSet::SETTINGS,
            StorageArea::Sync if key == keys.blocklist => ChangeSet::BLOCKLIST,
            StorageArea::Sync if key == keys.allowlist => ChangeSet::ALLOWLIST,
            // The fetch time alone changes nothing a scan decides against.
            StorageArea::Local if key == keys.remote_list && change.old_value != change.new_value => {
                ChangeSet::REMOTE_CACHE
            }
            _ => ChangeSet::empty(),
        };
        set | flag
    })
}

// =============================================================================
// State
// =============================================================================

/// Everything scans are decided against. Replaced wholesale on reload.
#[derive(Debug, Clone)]
pub struct FilterState {
    pub lists: EffectiveLists,
    pub toggles: ListToggles,
    pub page: PageContext,
    pub stats: BuildStats,
}

impl FilterState {
    fn new(page_url: &str) -> Self {
        Self {
            lists: EffectiveLists::default(),
            toggles: ListToggles::default(),
            page: PageContext::new(page_url),
            stats: BuildStats::default(),
        }
    }
}

/// Proof that a reload was started; stale tickets are refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct ReloadTicket(u64);

/// Outcome of one root poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootPoll {
    /// No results root yet.
    Missing,
    /// The root is the one already being observed.
    Unchanged,
    /// A new root appeared and was scanned; observe it.
    Attached(ScanReport),
}

// =============================================================================
// Controller
// =============================================================================

pub struct Controller<S: RenderSurface> {
    config: RuntimeConfig,
    engine: FilterEngine,
    surface: S,
    state: FilterState,
    page_url: String,
    root: Option<S::Element>,
    root_polls: u32,
    generation: u64,
    scan_pending: bool,
    scanning: bool,
}

impl<S: RenderSurface> Controller<S> {
    pub fn new(config: RuntimeConfig, surface: S, page_url: &str) -> Self {
        let engine = FilterEngine::new(config.filter.clone());
        Self {
            config,
            engine,
            surface,
            state: FilterState::new(page_url),
            page_url: page_url.to_string(),
            root: None,
            root_polls: 0,
            generation: 0,
            scan_pending: false,
            scanning: false,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn is_enabled(&self) -> bool {
        self.state.toggles.filtering_enabled
    }

    pub fn is_scan_pending(&self) -> bool {
        self.scan_pending
    }

    /// The results root last reported by [`Controller::poll_root`].
    pub fn root(&self) -> Option<&S::Element> {
        self.root.as_ref()
    }

    // -------------------------------------------------------------------------
    // Page mutations
    // -------------------------------------------------------------------------

    /// Record a DOM mutation. Returns `true` only for the first mutation of a
    /// burst; the caller then schedules exactly one [`Controller::flush`].
    pub fn notify_mutation(&mut self) -> bool {
        if self.scan_pending {
            return false;
        }
        self.scan_pending = true;
        true
    }

    /// Run the coalesced scan, if one is pending.
    pub fn flush(&mut self) -> Option<ScanReport> {
        if !self.scan_pending || self.scanning {
            return None;
        }
        self.scan_pending = false;
        Some(self.scan())
    }

    /// Scan now, or mark a scan pending if one is already running.
    pub fn scan(&mut self) -> ScanReport {
        if self.scanning {
            self.scan_pending = true;
            return ScanReport::default();
        }
        if !self.state.toggles.filtering_enabled {
            return ScanReport::default();
        }
        let Some(root) = self.engine.find_root(&self.surface) else {
            return ScanReport::default();
        };

        self.scanning = true;
        let report = self
            .engine
            .scan(&mut self.surface, &root, &self.state.lists, &self.state.page);
        self.scanning = false;

        if report.hidden > 0 {
            log::debug!(
                "scan hid {} results ({} links evaluated, {} matched)",
                report.hidden,
                report.evaluated,
                report.matched
            );
        }
        report
    }

    // -------------------------------------------------------------------------
    // Settings and lists
    // -------------------------------------------------------------------------

    /// Whether a storage notification affects the filter state.
    pub fn wants_reload(&self, changes: &[StorageChange]) -> bool {
        let mut set = classify_changes(changes, &self.config.keys);
        // A remote cache update only matters while the remote list is in use.
        if !self.state.toggles.use_remote_list {
            set.remove(ChangeSet::REMOTE_CACHE);
        }
        !set.is_empty()
    }

    /// Start a reload. Only the newest ticket's snapshot is applied.
    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.generation += 1;
        ReloadTicket(self.generation)
    }

    /// Rebuild the filter state from `snapshot` and bring the page in line.
    ///
    /// Returns `None` when `ticket` was superseded by a later reload.
    pub fn apply_snapshot(&mut self, ticket: ReloadTicket, snapshot: &Snapshot) -> Option<ScanReport> {
        if ticket.0 != self.generation {
            log::debug!("dropping superseded settings snapshot #{}", ticket.0);
            return None;
        }

        let toggles = snapshot.toggles();
        let (lists, stats) = build_effective_lists(&snapshot.sources(), toggles);
        let lists_changed = lists != self.state.lists;

        log::info!(
            "filter active: {}, blocked domains: {}, allowlisted: {}",
            toggles.filtering_enabled,
            stats.blocked,
            stats.allowed
        );

        self.state.lists = lists;
        self.state.toggles = toggles;
        self.state.stats = stats;

        if !toggles.filtering_enabled {
            let restored = self.engine.restore_all(&mut self.surface);
            if restored > 0 {
                log::debug!("filtering disabled, restored {restored} results");
            }
            return Some(ScanReport::default());
        }

        if lists_changed {
            // Entries may have left the blocklist; re-decide from a clean page.
            self.engine.restore_all(&mut self.surface);
        } else {
            self.engine.reset_evaluated(&mut self.surface);
        }
        Some(self.scan())
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Handle an in-page navigation: restore everything, then rescan against
    /// the new page.
    pub fn on_navigation(&mut self, url: &str) -> ScanReport {
        log::debug!("page navigated to {url}");
        self.page_url = url.to_string();
        self.state.page = PageContext::new(url);
        self.engine.restore_all(&mut self.surface);
        self.root = None;
        self.root_polls = 0;
        self.scan()
    }

    /// Compare against the last seen page URL. Returns a report when the URL
    /// changed.
    pub fn check_url(&mut self, url: &str) -> Option<ScanReport> {
        if url == self.page_url {
            return None;
        }
        Some(self.on_navigation(url))
    }

    /// Look for a results root that appeared late or was replaced. A new root
    /// gets the same treatment as a settings change: full restore, then scan.
    pub fn poll_root(&mut self) -> RootPoll {
        let Some(found) = self.engine.find_root(&self.surface) else {
            self.root_polls = self.root_polls.saturating_add(1);
            return RootPoll::Missing;
        };
        if self.root.as_ref() == Some(&found) {
            return RootPoll::Unchanged;
        }

        let replaced = self.root.replace(found).is_some();
        log::debug!("results root {}", if replaced { "replaced" } else { "attached" });
        self.root_polls = 0;
        self.engine.restore_all(&mut self.surface);
        RootPoll::Attached(self.scan())
    }

    /// Whether the missing-root poll has used up its attempts.
    pub fn root_poll_exhausted(&self) -> bool {
        self.root_polls >= self.config.root_poll_limit
    }
}

// =============================================================================
// State loading
// =============================================================================

/// Read a snapshot, refreshing a stale remote cache when the remote list is
/// in use.
pub async fn load_state<K, F>(
    store: &K,
    fetcher: &F,
    config: &RuntimeConfig,
    now_ms: u64,
) -> Result<Snapshot, RuntimeError>
where
    K: KeyValueStore + ?Sized,
    F: ListFetcher + ?Sized,
{
    let mut snapshot = load_snapshot(store, &config.keys).await?;
    let toggles = snapshot.toggles();
    if config.refresh_remote_on_load && toggles.filtering_enabled && toggles.use_remote_list {
        let policy = RefreshPolicy {
            ttl_ms: config.cache_ttl_ms,
            force: false,
        };
        let refreshed =
            refresh_remote_list(store, fetcher, &config.keys, &config.remote_list_url, now_ms, policy)
                .await?;
        snapshot.remote_list = refreshed.domains;
        snapshot.remote_fetched_at = refreshed.fetched_at;
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::settings::{save_settings, save_user_list, Settings};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use sieve_core::{MemoryDocument, NodeId};
    use std::cell::Cell;

    const PAGE: &str = "https://www.google.com/search?q=ai+tools";

    struct NoFetch;

    #[async_trait(?Send)]
    impl ListFetcher for NoFetch {
        async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            Err(FetchError::Transport {
                url: url.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    struct CountingFetch {
        body: &'static str,
        calls: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl ListFetcher for CountingFetch {
        async fn fetch_text(&self, _url: &str) -> Result<String, FetchError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.body.to_string())
        }
    }

    fn result_html(href: &str) -> String {
        format!(
            r#"<div class="MjjYud"><a href="{}">result</a></div>"#,
            href.replace('&', "&amp;")
        )
    }

    struct Page {
        controller: Controller<MemoryDocument>,
        root: NodeId,
        wrapper: NodeId,
    }

    impl Page {
        fn new() -> Self {
            let doc = MemoryDocument::parse(
                r#"<html><body><div id="search"><div id="rso"></div></div></body></html>"#,
            );
            let root = doc.query("#search").unwrap();
            let wrapper = doc.query("#rso").unwrap();
            let controller = Controller::new(RuntimeConfig::default(), doc, PAGE);
            Self {
                controller,
                root,
                wrapper,
            }
        }

        fn add_result(&mut self, href: &str) -> NodeId {
            let wrapper = self.wrapper;
            self.controller.surface_mut().append_html(&wrapper, &result_html(href))[0]
        }

        fn hidden(&self, node: NodeId) -> bool {
            self.controller.surface().inline_display(&node) == "none"
        }

        fn apply(&mut self, snapshot: &Snapshot) -> Option<ScanReport> {
            let ticket = self.controller.begin_reload();
            self.controller.apply_snapshot(ticket, snapshot)
        }
    }

    fn snapshot(block: &[&str], allow: &[&str]) -> Snapshot {
        Snapshot {
            blocklist: block.iter().map(|s| s.to_string()).collect(),
            allowlist: allow.iter().map(|s| s.to_string()).collect(),
            ..Snapshot::default()
        }
    }

    fn disabled(mut snapshot: Snapshot) -> Snapshot {
        snapshot.settings.filter_ai_domains = false;
        snapshot
    }

    #[test]
    fn hides_wrapped_link_once_across_scans() {
        let mut page = Page::new();
        let hit = page.add_result("/url?q=https://perplexity.ai/foo&sa=U");
        let miss = page.add_result("https://example.org/");

        let report = page.apply(&snapshot(&["perplexity.ai"], &[])).unwrap();
        assert_eq!(report.hidden, 1);
        assert!(page.hidden(hit));
        assert!(!page.hidden(miss));

        assert_eq!(page.controller.scan().hidden, 0);
        assert_eq!(
            page.controller.surface().query_all("[data-sieve-filtered]"),
            vec![hit]
        );
    }

    #[test]
    fn mutation_bursts_coalesce_into_one_scan() {
        let mut page = Page::new();
        page.apply(&snapshot(&["openai.com"], &[]));

        let first = page.add_result("https://openai.com/");
        assert!(page.controller.notify_mutation());
        let second = page.add_result("https://www.openai.com/research");
        assert!(!page.controller.notify_mutation());
        assert!(!page.controller.notify_mutation());
        assert!(page.controller.is_scan_pending());

        let report = page.controller.flush().unwrap();
        assert_eq!(report.hidden, 2);
        assert!(page.hidden(first) && page.hidden(second));
        assert_eq!(page.controller.flush(), None);
        assert!(page.controller.notify_mutation());
    }

    #[test]
    fn disabling_restores_and_later_scans_hide_nothing() {
        let mut page = Page::new();
        let hit = page.add_result("https://deepai.org/");
        page.apply(&snapshot(&["deepai.org"], &[]));
        assert!(page.hidden(hit));

        page.apply(&disabled(snapshot(&["deepai.org"], &[])));
        assert!(!page.hidden(hit));
        assert!(page.controller.surface().query("[data-sieve-filtered]").is_none());

        let late = page.add_result("https://deepai.org/other");
        assert!(page.controller.notify_mutation());
        assert_eq!(page.controller.flush().unwrap().hidden, 0);
        assert!(!page.hidden(late));
    }

    #[test]
    fn reenabling_rescans_previously_evaluated_links() {
        let mut page = Page::new();
        let hit = page.add_result("https://scite.ai/");
        page.apply(&disabled(snapshot(&["scite.ai"], &[])));
        page.controller.scan();
        assert!(!page.hidden(hit));

        page.apply(&snapshot(&["scite.ai"], &[]));
        assert!(page.hidden(hit));
    }

    #[test]
    fn allowlist_change_unhides_result() {
        let mut page = Page::new();
        let chat = page.add_result("https://chat.openai.com/");
        let main = page.add_result("https://openai.com/");
        page.apply(&snapshot(&["openai.com"], &[]));
        assert!(page.hidden(chat) && page.hidden(main));

        page.apply(&snapshot(&["openai.com"], &["chat.openai.com"]));
        assert!(!page.hidden(chat));
        assert!(page.hidden(main));
    }

    #[test]
    fn stale_reload_tickets_are_dropped() {
        let mut page = Page::new();
        let hit = page.add_result("https://openai.com/");

        let older = page.controller.begin_reload();
        let newer = page.controller.begin_reload();
        assert!(page
            .controller
            .apply_snapshot(newer, &snapshot(&["openai.com"], &[]))
            .is_some());
        assert_eq!(
            page.controller
                .apply_snapshot(older, &disabled(snapshot(&["openai.com"], &[]))),
            None
        );
        assert!(page.controller.is_enabled());
        assert!(page.hidden(hit));
    }

    #[test]
    fn navigation_restores_then_rescans() {
        let mut page = Page::new();
        let hit = page.add_result("https://openai.com/");
        page.apply(&snapshot(&["openai.com"], &[]));
        assert!(page.hidden(hit));

        assert_eq!(page.controller.check_url(PAGE), None);

        // New results replace the old ones without a reload.
        let wrapper = page.wrapper;
        page.controller.surface_mut().clear_children(&wrapper);
        let fresh = page.add_result("https://perplexity.ai/");
        let kept = page.add_result("https://openai.com/pricing");

        let report = page
            .controller
            .check_url("https://www.google.com/search?q=chatbots")
            .unwrap();
        assert_eq!(report.hidden, 1);
        assert!(page.hidden(kept));
        assert!(!page.hidden(fresh));
        assert_eq!(page.controller.state().page.host(), "google.com");
    }

    #[test]
    fn late_root_is_attached_by_polling() {
        let doc = MemoryDocument::new();
        let body = doc.body().unwrap();
        let config = RuntimeConfig {
            root_poll_limit: 2,
            ..RuntimeConfig::default()
        };
        let mut controller = Controller::new(config, doc, PAGE);
        let ticket = controller.begin_reload();
        assert_eq!(
            controller.apply_snapshot(ticket, &snapshot(&["openai.com"], &[])),
            Some(ScanReport::default())
        );

        assert_eq!(controller.poll_root(), RootPoll::Missing);
        assert!(!controller.root_poll_exhausted());

        let root = controller.surface_mut().append_html(
            &body,
            r#"<div id="search"><div><div class="g"><a href="https://openai.com/">x</a></div></div></div>"#,
        )[0];

        match controller.poll_root() {
            RootPoll::Attached(report) => assert_eq!(report.hidden, 1),
            other => panic!("expected attach, got {other:?}"),
        }
        assert_eq!(controller.root(), Some(&root));
        assert_eq!(controller.poll_root(), RootPoll::Unchanged);
    }

    #[test]
    fn replaced_root_restores_then_rescans() {
        let mut page = Page::new();
        let stale = page.add_result("https://openai.com/");
        page.apply(&snapshot(&["openai.com"], &[]));
        assert!(matches!(page.controller.poll_root(), RootPoll::Attached(_)));
        assert!(page.hidden(stale));

        // The page re-renders: the old root loses its id and a new one follows it.
        let old_root = page.root;
        let controller = &mut page.controller;
        controller.surface_mut().remove_attribute(&old_root, "id");
        let body = controller.surface().body().unwrap();
        let html = format!(r#"<div id="search"><div>{}</div></div>"#, result_html("https://www.openai.com/x"));
        let new_root = controller.surface_mut().append_html(&body, &html)[0];
        let fresh = controller.surface().query_within(&new_root, ".MjjYud")[0];

        match page.controller.poll_root() {
            RootPoll::Attached(report) => assert_eq!(report.hidden, 1),
            other => panic!("expected attach, got {other:?}"),
        }
        assert_eq!(page.controller.root(), Some(&new_root));
        assert!(page.hidden(fresh));
        assert!(!page.hidden(stale));
        assert_eq!(
            page.controller.surface().query_all("[data-sieve-filtered]"),
            vec![fresh]
        );
    }

    #[test]
    fn root_poll_gives_up_after_limit() {
        let config = RuntimeConfig {
            root_poll_limit: 2,
            ..RuntimeConfig::default()
        };
        let mut controller = Controller::new(config, MemoryDocument::new(), PAGE);
        controller.poll_root();
        controller.poll_root();
        assert!(controller.root_poll_exhausted());
    }

    #[test]
    fn results_root_itself_is_never_hidden() {
        let mut page = Page::new();
        let root = page.root;
        page.controller
            .surface_mut()
            .append_html(&root, r#"<a href="https://openai.com/">bare</a>"#);
        let report = page.apply(&snapshot(&["openai.com"], &[])).unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.hidden, 0);
        assert_eq!(page.controller.surface().inline_display(&root), "");
    }

    #[test]
    fn classifies_storage_changes() {
        let keys = StorageKeys::default();
        let change = |key: &str, area| StorageChange {
            key: key.to_string(),
            old_value: None,
            new_value: Some(json!(true)),
            area,
        };
        let set = classify_changes(
            &[
                change("unAIfySettings", StorageArea::Sync),
                change("unAIfyGithubBlacklistFetchedAt", StorageArea::Local),
                change("unAIfyCutOffYear", StorageArea::Sync),
                change("unAIfyBlacklist", StorageArea::Local),
            ],
            &keys,
        );
        assert_eq!(set, ChangeSet::SETTINGS);

        let list = change("unAIfyGithubBlacklist", StorageArea::Local);
        assert_eq!(classify_changes(&[list], &keys), ChangeSet::REMOTE_CACHE);
        let unchanged = StorageChange {
            key: "unAIfyGithubBlacklist".to_string(),
            old_value: Some(json!(["deepai.org"])),
            new_value: Some(json!(["deepai.org"])),
            area: StorageArea::Local,
        };
        assert!(classify_changes(&[unchanged], &keys).is_empty());
        assert!(classify_changes(&[change("unAIfyCutOffYear", StorageArea::Sync)], &keys).is_empty());
    }

    #[test]
    fn remote_cache_changes_matter_only_when_enabled() {
        let mut page = Page::new();
        let remote = [StorageChange {
            key: "unAIfyGithubBlacklist".to_string(),
            old_value: None,
            new_value: Some(json!(["deepai.org"])),
            area: StorageArea::Local,
        }];
        assert!(!page.controller.wants_reload(&remote));

        let mut snap = snapshot(&[], &[]);
        snap.settings.use_remote_list = true;
        page.apply(&snap);
        assert!(page.controller.wants_reload(&remote));
    }

    #[tokio::test]
    async fn settings_change_round_trip_through_store() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe();
        let mut page = Page::new();
        let hit = page.add_result("/url?q=https://www.perplexity.ai/search");
        let config = page.controller.config().clone();

        // Nothing stored yet: the fallback list applies.
        let ticket = page.controller.begin_reload();
        let snap = load_state(&store, &NoFetch, &config, 0).await.unwrap();
        page.controller.apply_snapshot(ticket, &snap);
        assert!(page.hidden(hit));

        let settings = Settings {
            filter_ai_domains: false,
            ..Settings::default()
        };
        save_settings(&store, &config.keys, &settings).await.unwrap();
        let change = changes.try_recv().unwrap();
        assert!(page.controller.wants_reload(&[change]));

        let ticket = page.controller.begin_reload();
        let snap = load_state(&store, &NoFetch, &config, 0).await.unwrap();
        page.controller.apply_snapshot(ticket, &snap);
        assert!(!page.hidden(hit));
    }

    #[tokio::test]
    async fn load_state_serves_cached_remote_list_when_fetch_fails() {
        let store = MemoryStore::new();
        let config = RuntimeConfig::default();
        let settings = Settings {
            use_remote_list: true,
            ..Settings::default()
        };
        save_settings(&store, &config.keys, &settings).await.unwrap();
        save_user_list(&store, &config.keys.blocklist, &["openai.com".to_string()])
            .await
            .unwrap();
        let mut local = crate::store::Record::new();
        local.insert(config.keys.remote_list.clone(), json!(["deepai.org"]));
        local.insert(config.keys.remote_fetched_at.clone(), json!(0));
        store.set(StorageArea::Local, local).await.unwrap();

        let snap = load_state(&store, &NoFetch, &config, 30 * 60 * 60 * 1000)
            .await
            .unwrap();
        assert_eq!(snap.remote_list, ["deepai.org"]);

        let mut page = Page::new();
        let hit = page.add_result("https://deepai.org/");
        page.apply(&snap);
        assert!(page.hidden(hit));
    }

    #[tokio::test]
    async fn empty_remote_body_does_not_refetch_in_a_loop() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe();
        let config = RuntimeConfig::default();
        let fetcher = CountingFetch {
            body: "<html>\n<head><title>429 Too Many Requests</title></head>\n</html>\n",
            calls: Cell::new(0),
        };
        let settings = Settings {
            use_remote_list: true,
            ..Settings::default()
        };
        save_settings(&store, &config.keys, &settings).await.unwrap();

        let mut page = Page::new();
        let mut now = 1_000;
        let mut reloads = 0;
        loop {
            let ticket = page.controller.begin_reload();
            let snap = load_state(&store, &fetcher, &config, now).await.unwrap();
            page.controller.apply_snapshot(ticket, &snap);
            reloads += 1;
            now += 1_000;

            let mut pending = Vec::new();
            while let Ok(change) = changes.try_recv() {
                pending.push(change);
            }
            if !page.controller.wants_reload(&pending) || reloads > 5 {
                break;
            }
        }

        assert_eq!(fetcher.calls.get(), 1);
        assert!(reloads <= 3, "still reloading after {reloads} rounds");
        assert!(page.controller.state().toggles.use_remote_list);
    }
}
