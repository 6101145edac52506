//! Core type definitions shared by the matcher, link resolver and filter engine.

use url::Url;

use crate::domain::strip_www;
use crate::psl::{owned_by, site_owner_label};

// =============================================================================
// Match Result
// =============================================================================

/// Final decision for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchDecision {
    /// Host is in neither list
    NotListed,
    /// Host is covered by the allowlist (wins over any block entry)
    Allow,
    /// Host is covered by the blocklist and not allowlisted
    Block,
}

// =============================================================================
// Page Context
// =============================================================================

/// The page being filtered: its URL (base for relative hrefs) and owning site.
#[derive(Debug, Clone)]
pub struct PageContext {
    base: Option<Url>,
    host: String,
    owner: String,
}

impl PageContext {
    /// Build from the page's current `location.href`.
    ///
    /// An unparsable URL yields a context with no base and no owner: relative
    /// hrefs then fail to resolve and nothing is exempt.
    pub fn new(page_url: &str) -> Self {
        let base = Url::parse(page_url).ok();
        let host = base
            .as_ref()
            .and_then(Url::host_str)
            .map(|h| strip_www(&h.to_ascii_lowercase()).to_string())
            .unwrap_or_default();
        let owner = site_owner_label(&host).to_string();
        Self { base, host, owner }
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Leading label of the page's registrable domain, e.g. `google`.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Links into the page's own site are never filtered.
    pub fn is_exempt(&self, host: &str) -> bool {
        owned_by(host, &self.owner)
    }
}

// =============================================================================
// Resolved Link
// =============================================================================

/// The real destination behind an anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// Absolute destination URL
    pub url: String,
    /// Lowercase host with any `www.` prefix removed
    pub host: String,
}
