//! DOM Filter Engine
//!
//! Walks candidate anchors under a results root, decides each one at most once,
//! and hides the nearest safe result container of every blocked link.
//!
//! All engine state lives on the render surface as namespaced marker
//! attributes:
//!
//! - `evaluated` on anchors already decided in this page lifetime
//! - `filtered` on containers this engine hid
//! - `previous display` on hidden containers, holding the inline `display`
//!   value to put back on restore
//!
//! A container carries the filtered marker iff its visibility was changed here,
//! so hiding twice is a no-op and restoring is exact.

use std::cell::OnceCell;

use serde::{Deserialize, Serialize};

use crate::link::{resolve_anchor, LinkConfig};
use crate::matcher::EffectiveLists;
use crate::surface::RenderSurface;
use crate::types::{MatchDecision, PageContext, ResolvedLink};

// =============================================================================
// Configuration
// =============================================================================

/// Marker attribute names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerNames {
    pub evaluated: String,
    pub filtered: String,
    pub previous_display: String,
}

impl Default for MarkerNames {
    fn default() -> Self {
        Self {
            evaluated: "data-sieve-evaluated".to_string(),
            filtered: "data-sieve-filtered".to_string(),
            previous_display: "data-sieve-prev-display".to_string(),
        }
    }
}

/// Where to look and what to hide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Selector of the results subtree that is scanned and observed.
    pub results_root: String,
    /// Selector of candidate anchors.
    pub anchor_selector: String,
    /// Container selectors in priority order; the first with a match wins.
    /// The last entry is the broad wrapper fallback.
    pub container_selectors: Vec<String>,
    pub links: LinkConfig,
    pub markers: MarkerNames,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            results_root: "#search".to_string(),
            anchor_selector: r#"a[href^="http"], a[href^="/url?"]"#.to_string(),
            container_selectors: vec![
                ".MjjYud, .g, .xpd, .Ww4FFb, [data-sokoban-container]".to_string(),
                "#search > div".to_string(),
            ],
            links: LinkConfig::default(),
            markers: MarkerNames::default(),
        }
    }
}

// =============================================================================
// Scan Report
// =============================================================================

/// Counters for one scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Anchors decided in this pass
    pub evaluated: usize,
    /// Anchors without a usable destination
    pub unresolved: usize,
    /// Anchors pointing into the page's own site
    pub exempt: usize,
    /// Anchors covered by the allowlist
    pub allowed: usize,
    /// Anchors covered by the blocklist
    pub matched: usize,
    /// Blocked anchors with no safe container to hide
    pub uncontained: usize,
    /// Containers newly hidden in this pass
    pub hidden: usize,
}

impl ScanReport {
    pub fn merge(&mut self, other: ScanReport) {
        self.evaluated += other.evaluated;
        self.unresolved += other.unresolved;
        self.exempt += other.exempt;
        self.allowed += other.allowed;
        self.matched += other.matched;
        self.uncontained += other.uncontained;
        self.hidden += other.hidden;
    }
}

// =============================================================================
// Candidate Links
// =============================================================================

/// An anchor under consideration, with its destination resolved on first use.
pub struct CandidateLink<E> {
    element: E,
    resolved: OnceCell<Option<ResolvedLink>>,
}

impl<E: Clone + PartialEq> CandidateLink<E> {
    pub fn new(element: E) -> Self {
        Self {
            element,
            resolved: OnceCell::new(),
        }
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    /// Destination of the anchor, computed once per candidate.
    pub fn resolve<S>(&self, surface: &S, page: &PageContext, config: &LinkConfig) -> Option<&ResolvedLink>
    where
        S: RenderSurface<Element = E>,
    {
        self.resolved
            .get_or_init(|| resolve_anchor(surface, &self.element, page, config))
            .as_ref()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Stateless filter engine; everything it remembers is on the surface.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    config: FilterConfig,
}

impl FilterEngine {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Locate the results root, if the page has rendered it.
    pub fn find_root<S: RenderSurface>(&self, surface: &S) -> Option<S::Element> {
        surface.query(&self.config.results_root)
    }

    /// Decide every not-yet-evaluated anchor under `root` and hide the
    /// containers of blocked ones. Re-running without changes hides nothing.
    pub fn scan<S: RenderSurface>(
        &self,
        surface: &mut S,
        root: &S::Element,
        lists: &EffectiveLists,
        page: &PageContext,
    ) -> ScanReport {
        let markers = &self.config.markers;
        let mut report = ScanReport::default();

        let candidates: Vec<CandidateLink<S::Element>> = surface
            .query_within(root, &self.config.anchor_selector)
            .into_iter()
            .filter(|a| !surface.has_attribute(a, &markers.evaluated))
            .map(CandidateLink::new)
            .collect();

        for candidate in &candidates {
            surface.set_attribute(candidate.element(), &markers.evaluated, "1");
            report.evaluated += 1;

            let Some(link) = candidate.resolve(&*surface, page, &self.config.links) else {
                report.unresolved += 1;
                continue;
            };

            if page.is_exempt(&link.host) {
                report.exempt += 1;
                continue;
            }

            match lists.decide(&link.host) {
                MatchDecision::NotListed => continue,
                MatchDecision::Allow => {
                    report.allowed += 1;
                    continue;
                }
                MatchDecision::Block => report.matched += 1,
            }

            let Some(container) = self.find_container(&*surface, candidate.element(), root) else {
                log::debug!("no safe container for blocked link to {}", link.host);
                report.uncontained += 1;
                continue;
            };

            if self.hide(surface, &container) {
                log::debug!("hid result linking to {}", link.host);
                report.hidden += 1;
            }
        }

        report
    }

    /// Nearest container of `anchor` that is safe to hide: never the results
    /// root, anything enclosing it, `body` or `html`.
    pub fn find_container<S: RenderSurface>(
        &self,
        surface: &S,
        anchor: &S::Element,
        root: &S::Element,
    ) -> Option<S::Element> {
        self.config.container_selectors.iter().find_map(|selector| {
            let container = surface.closest(anchor, selector)?;
            // A match at or above the root is an ancestor of the root too.
            if surface.closest(root, selector).as_ref() == Some(&container) {
                return None;
            }
            if matches!(surface.tag_name(&container).as_str(), "body" | "html") {
                return None;
            }
            Some(container)
        })
    }

    /// Hide one container. Returns `false` if it was already hidden.
    pub fn hide<S: RenderSurface>(&self, surface: &mut S, container: &S::Element) -> bool {
        let markers = &self.config.markers;
        if surface.has_attribute(container, &markers.filtered) {
            return false;
        }
        let previous = surface.inline_display(container);
        surface.set_attribute(container, &markers.previous_display, &previous);
        surface.set_inline_display(container, "none");
        surface.set_attribute(container, &markers.filtered, "1");
        true
    }

    /// Undo [`FilterEngine::hide`] exactly. Returns `false` if not hidden here.
    pub fn restore<S: RenderSurface>(&self, surface: &mut S, container: &S::Element) -> bool {
        let markers = &self.config.markers;
        if !surface.has_attribute(container, &markers.filtered) {
            return false;
        }
        let previous = surface
            .attribute(container, &markers.previous_display)
            .unwrap_or_default();
        surface.set_inline_display(container, &previous);
        surface.remove_attribute(container, &markers.previous_display);
        surface.remove_attribute(container, &markers.filtered);
        true
    }

    /// Restore every hidden container and forget every decision.
    /// Returns the number of containers restored.
    pub fn restore_all<S: RenderSurface>(&self, surface: &mut S) -> usize {
        let selector = attribute_selector(&self.config.markers.filtered);
        let mut restored = 0;
        for container in surface.query_all(&selector) {
            if self.restore(surface, &container) {
                restored += 1;
            }
        }
        self.reset_evaluated(surface);
        restored
    }

    /// Clear the evaluated marker so the next scan re-decides every anchor.
    /// Hidden containers stay hidden.
    pub fn reset_evaluated<S: RenderSurface>(&self, surface: &mut S) -> usize {
        let marker = &self.config.markers.evaluated;
        let anchors = surface.query_all(&attribute_selector(marker));
        for anchor in &anchors {
            surface.remove_attribute(anchor, marker);
        }
        anchors.len()
    }
}

fn attribute_selector(name: &str) -> String {
    format!("[{name}]")
}
