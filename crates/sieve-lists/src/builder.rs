//! Effective list construction
//!
//! Every build starts from scratch: parse each active source, union the
//! blocking sources, then subtract whatever the allowlist covers.

use sieve_core::domain::Domain;
use sieve_core::matcher::{DomainSet, EffectiveLists};

use crate::optimizer::{merge_sources, MergeStats};
use crate::parser::{parse_domain_lines, ParseStats, ParsedList};

/// Used when the user's own blocklist contributes nothing.
pub const DEFAULT_FALLBACK_BLOCKLIST: &[&str] = &[
    "perplexity.ai",
    "deepai.org",
    "gemini.google.com",
    "openai.com",
    "aixploria.com",
    "scite.ai",
];

/// Where a raw line collection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    LocalEdited,
    RemoteImported,
    FallbackDefault,
    AllowEdited,
}

/// Raw line collections, one per provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSources {
    pub local: Vec<String>,
    pub remote: Vec<String>,
    pub fallback: Vec<String>,
    pub allow: Vec<String>,
}

impl ListSources {
    /// Sources with the built-in fallback blocklist filled in.
    pub fn with_default_fallback() -> Self {
        Self {
            fallback: DEFAULT_FALLBACK_BLOCKLIST
                .iter()
                .map(|d| d.to_string())
                .collect(),
            ..Self::default()
        }
    }

    pub fn lines(&self, provenance: Provenance) -> &[String] {
        match provenance {
            Provenance::LocalEdited => &self.local,
            Provenance::RemoteImported => &self.remote,
            Provenance::FallbackDefault => &self.fallback,
            Provenance::AllowEdited => &self.allow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListToggles {
    pub filtering_enabled: bool,
    pub use_remote_list: bool,
}

impl Default for ListToggles {
    fn default() -> Self {
        Self {
            filtering_enabled: true,
            use_remote_list: false,
        }
    }
}

/// What one build did, for logs and the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub used_fallback: bool,
    pub local: ParseStats,
    pub remote: Option<ParseStats>,
    pub fallback: Option<ParseStats>,
    pub allow: ParseStats,
    pub merged: MergeStats,
    /// Blocked entries dropped because the allowlist covers them.
    pub allowlisted: usize,
    pub blocked: usize,
    pub allowed: usize,
}

/// Build the allowlist-subtracted effective lists.
///
/// With filtering disabled the result is empty and nothing is parsed.
pub fn build_effective_lists(
    sources: &ListSources,
    toggles: ListToggles,
) -> (EffectiveLists, BuildStats) {
    let mut stats = BuildStats::default();
    if !toggles.filtering_enabled {
        log::debug!("filtering disabled, effective lists left empty");
        return (EffectiveLists::default(), stats);
    }

    let local = parse_domain_lines(sources.lines(Provenance::LocalEdited));
    stats.local = local.stats;

    let mut blocking: Vec<ParsedList> = Vec::with_capacity(2);
    if local.is_empty() {
        let fallback = parse_domain_lines(sources.lines(Provenance::FallbackDefault));
        stats.used_fallback = true;
        stats.fallback = Some(fallback.stats);
        blocking.push(fallback);
    } else {
        blocking.push(local);
    }

    if toggles.use_remote_list {
        let remote = parse_domain_lines(sources.lines(Provenance::RemoteImported));
        stats.remote = Some(remote.stats);
        blocking.push(remote);
    }

    let (block, merged) = merge_sources(blocking.iter().map(|l| l.domains.as_slice()));
    stats.merged = merged;

    let allow_list = parse_domain_lines(sources.lines(Provenance::AllowEdited));
    stats.allow = allow_list.stats;
    let allow: DomainSet = allow_list.domains.into_iter().collect::<DomainSet>();

    let lists = EffectiveLists::new(block, allow);
    stats.blocked = lists.block().len();
    stats.allowed = lists.allow().len();
    stats.allowlisted = merged.after - stats.blocked;

    log::debug!(
        "built effective lists: {} blocked, {} allowed, {} allowlisted{}",
        stats.blocked,
        stats.allowed,
        stats.allowlisted,
        if stats.used_fallback { " (fallback)" } else { "" }
    );

    (lists, stats)
}

/// Convenience for callers that only hold already-normalized domains.
pub fn effective_from_domains<B, A>(block: B, allow: A) -> EffectiveLists
where
    B: IntoIterator<Item = Domain>,
    A: IntoIterator<Item = Domain>,
{
    EffectiveLists::new(block.into_iter().collect(), allow.into_iter().collect())
}
