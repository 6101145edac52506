//! Host suffix utilities
//!
//! Label-boundary suffix walking for set lookups, plus the registrable-domain
//! lookup used to decide which site owns the current page.
//!
//! # Examples
//!
//! ```
//! use sieve_core::psl::{registrable_domain, walk_host_suffixes};
//!
//! assert_eq!(registrable_domain("sub.example.co.uk"), "example.co.uk");
//! let suffixes: Vec<_> = walk_host_suffixes("a.b.example.com").collect();
//! assert_eq!(suffixes, ["a.b.example.com", "b.example.com", "example.com"]);
//! ```

use psl::{List, Psl};

// =============================================================================
// Suffix Walking
// =============================================================================

/// Get the parent domain (strip leftmost label).
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Iterator over a host and each parent that still has at least two labels.
///
/// Single-label suffixes are skipped: no normalized domain can equal one.
pub struct HostSuffixIter<'a> {
    current: Option<&'a str>,
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current.filter(|s| s.contains('.'))?;
        self.current = get_parent_domain(result);
        Some(result)
    }
}

/// Walk host suffixes from most specific to least specific.
pub fn walk_host_suffixes(host: &str) -> HostSuffixIter<'_> {
    HostSuffixIter {
        current: Some(host).filter(|h| !h.is_empty()),
    }
}

// =============================================================================
// Registrable Domain
// =============================================================================

/// Registrable domain (eTLD+1) for a host, from the Public Suffix List.
///
/// `www.google.co.uk` gives `google.co.uk`. Hosts that are themselves a public
/// suffix, or have a single label, are returned unchanged.
pub fn registrable_domain(host: &str) -> &str {
    let host = host.trim_end_matches('.');
    match List.domain(host.as_bytes()) {
        Some(domain) => &host[host.len() - domain.as_bytes().len()..],
        None => host,
    }
}

/// Leading label of the registrable domain: `google` for `maps.google.de`.
pub fn site_owner_label(host: &str) -> &str {
    let etld1 = registrable_domain(host);
    etld1.split('.').next().unwrap_or(etld1)
}

/// True when `label` appears in `host` followed by at least one more label.
///
/// `owned_by("maps.google.com", "google")` and `owned_by("google.de", "google")`
/// hold; `owned_by("notgoogle.com", "google")` does not.
pub fn owned_by(host: &str, label: &str) -> bool {
    if label.is_empty() {
        return false;
    }
    let mut labels = host.split('.').peekable();
    while let Some(current) = labels.next() {
        if current == label && labels.peek().is_some() {
            return true;
        }
    }
    false
}
