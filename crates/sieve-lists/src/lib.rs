//! ResultSieve List Builder
//!
//! Parses raw list text (user textareas, hosts files, adblock host rules) and
//! merges the active sources into allowlist-subtracted effective lists.

pub mod parser;
pub mod optimizer;
pub mod builder;

pub use builder::{
    build_effective_lists, effective_from_domains, BuildStats, ListSources, ListToggles, Provenance,
    DEFAULT_FALLBACK_BLOCKLIST,
};
pub use optimizer::{merge_sources, MergeStats};
pub use parser::{parse_domain_lines, parse_domain_list, ParseStats, ParsedList};
