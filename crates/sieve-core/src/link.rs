//! Link resolution
//!
//! Finds the real destination behind a result anchor. Search engines wrap
//! outbound links in redirect paths such as `/url?q=<target>&sa=...`; those are
//! unwrapped, absolute `http(s)` hrefs are taken as-is, everything else is
//! skipped.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::strip_www;
use crate::surface::RenderSurface;
use crate::types::{PageContext, ResolvedLink};

/// Redirect-wrapper recognition settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Href prefixes that mark a redirect wrapper, e.g. `/url?`.
    pub redirect_prefixes: Vec<String>,
    /// Query parameters that may carry the target, tried in order.
    pub target_params: Vec<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            redirect_prefixes: vec!["/url?".to_string()],
            target_params: vec!["q".to_string(), "url".to_string()],
        }
    }
}

/// Resolve an href to its destination URL and host.
///
/// Returns `None` for relative links that are not redirect wrappers, for
/// non-http schemes, and for anything that fails to parse.
pub fn resolve_href(href: &str, page: &PageContext, config: &LinkConfig) -> Option<ResolvedLink> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let target = if is_redirect_wrapper(href, config) {
        unwrap_redirect(href, page, config)?
    } else if has_http_scheme(href) {
        Url::parse(href).ok()?
    } else {
        return None;
    };

    to_resolved(target)
}

/// Resolve an anchor element through its `href` attribute.
pub fn resolve_anchor<S: RenderSurface>(
    surface: &S,
    anchor: &S::Element,
    page: &PageContext,
    config: &LinkConfig,
) -> Option<ResolvedLink> {
    let href = surface.attribute(anchor, "href")?;
    resolve_href(&href, page, config)
}

fn is_redirect_wrapper(href: &str, config: &LinkConfig) -> bool {
    config
        .redirect_prefixes
        .iter()
        .any(|prefix| !prefix.is_empty() && href.starts_with(prefix.as_str()))
}

fn unwrap_redirect(href: &str, page: &PageContext, config: &LinkConfig) -> Option<Url> {
    let wrapper = page
        .base()
        .filter(|base| !base.cannot_be_a_base())
        .and_then(|base| base.join(href).ok())
        // Without a usable page URL any origin works: only the query string matters.
        .or_else(|| Url::parse("https://localhost/").ok()?.join(href).ok())?;

    let target = config.target_params.iter().find_map(|param| {
        wrapper
            .query_pairs()
            .find(|(key, value)| key == param.as_str() && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    })?;

    if !has_http_scheme(&target) {
        return None;
    }
    Url::parse(&target).ok()
}

fn to_resolved(url: Url) -> Option<ResolvedLink> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    let host = strip_www(&host).to_string();
    if host.is_empty() {
        return None;
    }
    Some(ResolvedLink {
        url: url.into(),
        host,
    })
}

fn has_http_scheme(s: &str) -> bool {
    let bytes = s.as_bytes();
    (bytes.len() >= 7 && bytes[..7].eq_ignore_ascii_case(b"http://"))
        || (bytes.len() >= 8 && bytes[..8].eq_ignore_ascii_case(b"https://"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageContext {
        PageContext::new("https://www.google.com/search?q=ai+tools")
    }

    fn host_of(href: &str) -> Option<String> {
        resolve_href(href, &page(), &LinkConfig::default()).map(|r| r.host)
    }

    #[test]
    fn unwraps_redirect_wrapper() {
        let resolved = resolve_href(
            "/url?q=https://perplexity.ai/foo&sa=U&ved=abc",
            &page(),
            &LinkConfig::default(),
        )
        .expect("wrapper should resolve");
        assert_eq!(resolved.host, "perplexity.ai");
        assert_eq!(resolved.url, "https://perplexity.ai/foo");
    }

    #[test]
    fn decodes_percent_encoded_targets() {
        assert_eq!(
            host_of("/url?sa=t&url=https%3A%2F%2Fwww.DeepAI.org%2Fchat%3Fx%3D1").as_deref(),
            Some("deepai.org")
        );
    }

    #[test]
    fn takes_absolute_hrefs_as_is() {
        assert_eq!(host_of("https://www.openai.com/research").as_deref(), Some("openai.com"));
        assert_eq!(host_of("HTTP://Sub.Example.com").as_deref(), Some("sub.example.com"));
    }

    #[test]
    fn skips_unresolvable_links() {
        assert_eq!(host_of(""), None);
        assert_eq!(host_of("/search?q=next"), None);
        assert_eq!(host_of("#top"), None);
        assert_eq!(host_of("javascript:void(0)"), None);
        assert_eq!(host_of("/url?sa=U"), None);
        assert_eq!(host_of("/url?q=/relative/path"), None);
        assert_eq!(host_of("https://"), None);
        assert_eq!(host_of("http://[::1"), None);
    }

    #[test]
    fn resolves_wrapper_without_page_url() {
        let page = PageContext::new("about:blank");
        let resolved = resolve_href("/url?q=https://scite.ai/", &page, &LinkConfig::default());
        assert_eq!(resolved.map(|r| r.host).as_deref(), Some("scite.ai"));
    }
}
