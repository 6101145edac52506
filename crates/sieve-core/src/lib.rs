//! ResultSieve Core Library
//!
//! Domain matching and reversible result hiding for search-results pages.
//!
//! # Architecture
//!
//! List lines are normalized into canonical domains, collected into
//! [`DomainSet`]s, and paired into allowlist-subtracted [`EffectiveLists`].
//! The [`FilterEngine`] walks result anchors on a [`RenderSurface`], resolves
//! each anchor's real destination, and hides the enclosing result container
//! of every blocked link. All per-element state lives on the surface as marker
//! attributes, so hiding is idempotent and restoring is exact.
//!
//! # Modules
//!
//! - `domain`: list-line normalization into [`Domain`]
//! - `psl`: label-suffix walking and Public Suffix List lookups
//! - `matcher`: [`DomainSet`] suffix membership and [`EffectiveLists`]
//! - `link`: redirect-wrapper unwrapping and host extraction
//! - `surface`: the [`RenderSurface`] trait
//! - `dom`: [`MemoryDocument`], an HTML-backed render surface
//! - `filter`: the [`FilterEngine`]
//! - `types`: shared type definitions

pub mod domain;
pub mod dom;
pub mod filter;
pub mod link;
pub mod matcher;
pub mod psl;
pub mod surface;
pub mod types;

// Re-export commonly used types
pub use domain::{normalize, Domain};
pub use dom::{MemoryDocument, NodeId};
pub use filter::{FilterConfig, FilterEngine, ScanReport};
pub use matcher::{is_member, DomainSet, EffectiveLists};
pub use surface::RenderSurface;
pub use types::{MatchDecision, PageContext, ResolvedLink};
