//! Live-DOM render surface

use sieve_core::RenderSurface;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, NodeList};

/// [`RenderSurface`] over the page's `document`.
pub struct DocumentSurface {
    document: Document,
}

impl DocumentSurface {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

fn elements(list: Result<NodeList, wasm_bindgen::JsValue>, selector: &str) -> Vec<Element> {
    match list {
        Ok(list) => (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect(),
        Err(e) => {
            log::debug!("selector {selector:?} rejected: {e:?}");
            Vec::new()
        }
    }
}

impl RenderSurface for DocumentSurface {
    type Element = Element;

    fn query(&self, selector: &str) -> Option<Element> {
        self.document.query_selector(selector).ok().flatten()
    }

    fn query_all(&self, selector: &str) -> Vec<Element> {
        elements(self.document.query_selector_all(selector), selector)
    }

    fn query_within(&self, root: &Element, selector: &str) -> Vec<Element> {
        elements(root.query_selector_all(selector), selector)
    }

    fn closest(&self, element: &Element, selector: &str) -> Option<Element> {
        element.closest(selector).ok().flatten()
    }

    fn tag_name(&self, element: &Element) -> String {
        element.tag_name().to_ascii_lowercase()
    }

    fn attribute(&self, element: &Element, name: &str) -> Option<String> {
        element.get_attribute(name)
    }

    fn set_attribute(&mut self, element: &Element, name: &str, value: &str) {
        if let Err(e) = element.set_attribute(name, value) {
            log::warn!("failed to set {name}: {e:?}");
        }
    }

    fn remove_attribute(&mut self, element: &Element, name: &str) {
        if let Err(e) = element.remove_attribute(name) {
            log::warn!("failed to remove {name}: {e:?}");
        }
    }

    fn has_attribute(&self, element: &Element, name: &str) -> bool {
        element.has_attribute(name)
    }

    fn inline_display(&self, element: &Element) -> String {
        let Some(html) = element.dyn_ref::<HtmlElement>() else {
            return String::new();
        };
        let style = html.style();
        let value = style.get_property_value("display").unwrap_or_default();
        if !value.is_empty() && style.get_property_priority("display") == IMPORTANT {
            format!("{value} !{IMPORTANT}")
        } else {
            value
        }
    }

    fn set_inline_display(&mut self, element: &Element, value: &str) {
        let Some(html) = element.dyn_ref::<HtmlElement>() else {
            return;
        };
        let style = html.style();
        let (value, priority) = split_priority(value);
        let result = if value.is_empty() {
            style.remove_property("display").map(|_| ())
        } else {
            style.set_property_with_priority("display", value, priority)
        };
        if let Err(e) = result {
            log::warn!("failed to set display: {e:?}");
        }
    }
}

const IMPORTANT: &str = "important";

/// `"flex !important"` gives `("flex", "important")`.
fn split_priority(value: &str) -> (&str, &str) {
    let value = value.trim();
    match value.strip_suffix(IMPORTANT).and_then(|rest| rest.trim_end().strip_suffix('!')) {
        Some(rest) => (rest.trim_end(), IMPORTANT),
        None => (value, ""),
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use sieve_core::{normalize, Domain, EffectiveLists, FilterEngine, PageContext};
    use sieve_lists::effective_from_domains;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn results_page(html: &str) -> DocumentSurface {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .expect("browser document");
        let body = document.body().expect("document body");
        body.set_inner_html(html);
        DocumentSurface::new(document)
    }

    fn blocking(domain: &str) -> EffectiveLists {
        effective_from_domains(normalize(domain), Vec::<Domain>::new())
    }

    #[wasm_bindgen_test]
    fn splits_important_priority() {
        assert_eq!(split_priority("flex !important"), ("flex", "important"));
        assert_eq!(split_priority(" block ! important "), ("block", "important"));
        assert_eq!(split_priority("none"), ("none", ""));
        assert_eq!(split_priority(""), ("", ""));
    }

    #[wasm_bindgen_test]
    fn hides_and_restores_live_elements() {
        let mut surface = results_page(
            r#"<div id="search"><div>
                 <div class="g" style="display: flex !important"><a href="https://scite.ai/">s</a></div>
                 <div class="g"><a href="https://example.org/">e</a></div>
               </div></div>"#,
        );
        let root = surface.query("#search").expect("results root");
        let results = surface.query_all(".g");
        let page = PageContext::new("https://www.google.com/search?q=ai");
        let engine = FilterEngine::default();

        let report = engine.scan(&mut surface, &root, &blocking("scite.ai"), &page);
        assert_eq!(report.hidden, 1);
        assert_eq!(surface.inline_display(&results[0]), "none");
        assert_eq!(surface.inline_display(&results[1]), "");

        assert_eq!(engine.restore_all(&mut surface), 1);
        assert_eq!(surface.inline_display(&results[0]), "flex !important");
        let style = results[0].dyn_ref::<HtmlElement>().expect("html element").style();
        assert_eq!(style.get_property_priority("display"), "important");
        assert!(surface.query("[data-sieve-evaluated]").is_none());
    }

    #[wasm_bindgen_test]
    fn invalid_selectors_match_nothing() {
        let surface = results_page(r#"<div id="search"><a href="https://scite.ai/">s</a></div>"#);
        let anchor = surface.query("a").expect("anchor");
        assert!(surface.query_all("a[[bad").is_empty());
        assert_eq!(surface.closest(&anchor, "#search >"), None);
        assert_eq!(surface.tag_name(&anchor), "a");
    }
}
