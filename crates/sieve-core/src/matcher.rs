//! Domain Set Matching
//!
//! Membership is suffix-on-label-boundary: `x.example.com` is a member of
//! `{example.com}`, `notexample.com` is not. Lookups walk the host's label
//! suffixes against a hash set, so cost scales with label count rather than
//! list size.

use std::collections::HashSet;

use crate::domain::{strip_www, Domain};
use crate::psl::walk_host_suffixes;
use crate::types::MatchDecision;

// =============================================================================
// DomainSet
// =============================================================================

/// Duplicate-free set of normalized domains.
///
/// Built from an iterator and never patched afterwards; a change in any source
/// produces a new set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet {
    domains: HashSet<Domain>,
}

impl DomainSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Exact entry lookup (no suffix semantics).
    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.domains.iter()
    }

    /// Entries in lexical order, for stable output.
    pub fn sorted(&self) -> Vec<&Domain> {
        let mut out: Vec<&Domain> = self.domains.iter().collect();
        out.sort();
        out
    }

    /// The entry that covers `host`, most specific first.
    pub fn find_member(&self, host: &str) -> Option<&Domain> {
        walk_host_suffixes(host).find_map(|suffix| self.domains.get(suffix))
    }

    /// A new set without every entry that `other` covers.
    pub fn without_members_of(&self, other: &DomainSet) -> DomainSet {
        self.domains
            .iter()
            .filter(|d| !is_member(d.as_str(), other))
            .cloned()
            .collect()
    }
}

impl FromIterator<Domain> for DomainSet {
    fn from_iter<I: IntoIterator<Item = Domain>>(iter: I) -> Self {
        Self {
            domains: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DomainSet {
    type Item = &'a Domain;
    type IntoIter = std::collections::hash_set::Iter<'a, Domain>;

    fn into_iter(self) -> Self::IntoIter {
        self.domains.iter()
    }
}

/// Suffix membership: `host == d` or `host` ends with `"." + d` for some `d`.
#[inline]
pub fn is_member(host: &str, set: &DomainSet) -> bool {
    set.find_member(host).is_some()
}

// =============================================================================
// Effective Lists
// =============================================================================

/// The allowlist-subtracted blocklist and the allowlist it was built against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveLists {
    block: DomainSet,
    allow: DomainSet,
}

impl EffectiveLists {
    /// Pair a blocklist with its allowlist, dropping every blocked entry the
    /// allowlist covers.
    pub fn new(block: DomainSet, allow: DomainSet) -> Self {
        let block = block.without_members_of(&allow);
        Self { block, allow }
    }

    pub fn block(&self) -> &DomainSet {
        &self.block
    }

    pub fn allow(&self) -> &DomainSet {
        &self.allow
    }

    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }

    /// Decide a host. The allowlist wins over the blocklist at any depth.
    pub fn decide(&self, host: &str) -> MatchDecision {
        let host = strip_www(host);
        if is_member(host, &self.allow) {
            MatchDecision::Allow
        } else if is_member(host, &self.block) {
            MatchDecision::Block
        } else {
            MatchDecision::NotListed
        }
    }

    #[inline]
    pub fn blocks(&self, host: &str) -> bool {
        self.decide(host) == MatchDecision::Block
    }
}
