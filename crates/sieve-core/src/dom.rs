//! In-memory render surface
//!
//! [`MemoryDocument`] parses HTML with `dom_query` and implements
//! [`RenderSurface`] over it, so the filter engine runs on saved result pages
//! and in tests exactly as it does on a live page.
//!
//! Inline `display` lives in the `style` attribute. Only the `display`
//! declaration is rewritten; the other declarations keep their text and order.

use dom_query::{Document, Matcher, NodeRef, Selection};

pub use dom_query::NodeId;

use crate::surface::RenderSurface;

/// A parsed HTML page addressed by [`NodeId`].
pub struct MemoryDocument {
    doc: Document,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for MemoryDocument {
    fn from(html: &str) -> Self {
        Self::parse(html)
    }
}

impl MemoryDocument {
    /// An empty page: `html`, `head` and `body` only.
    pub fn new() -> Self {
        Self::parse("")
    }

    pub fn parse(html: &str) -> Self {
        Self {
            doc: Document::from(html),
        }
    }

    pub fn body(&self) -> Option<NodeId> {
        self.query("body")
    }

    /// Parse `html` and append it to `parent`. Returns the appended top-level
    /// elements in order.
    pub fn append_html(&mut self, parent: &NodeId, html: &str) -> Vec<NodeId> {
        let Some(node) = self.node(parent) else {
            return Vec::new();
        };
        let before = node.children().len();
        Selection::from(node).append_html(html);
        node.children()
            .into_iter()
            .skip(before)
            .filter(|child| child.is_element())
            .map(|child| child.id)
            .collect()
    }

    /// Detach `node` and its subtree.
    pub fn remove(&mut self, node: &NodeId) {
        if let Some(node) = self.node(node) {
            Selection::from(node).remove();
        }
    }

    /// Detach every child element of `node`.
    pub fn clear_children(&mut self, node: &NodeId) {
        if let Some(node) = self.node(node) {
            Selection::from(node).children().remove();
        }
    }

    pub fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.node(node)?.parent().map(|p| p.id)
    }

    /// Whether `node` is still reachable from the document root.
    pub fn is_connected(&self, node: &NodeId) -> bool {
        let root = self.doc.root().id;
        let mut current = self.node(node);
        while let Some(n) = current {
            if n.id == root {
                return true;
            }
            current = n.parent();
        }
        false
    }

    /// Serialized markup of `node`, attributes in source order.
    pub fn outer_html(&self, node: &NodeId) -> String {
        self.node(node)
            .map(|n| Selection::from(n).html().to_string())
            .unwrap_or_default()
    }

    /// Serialized markup of the whole page.
    pub fn html(&self) -> String {
        self.doc.html().to_string()
    }

    fn node(&self, id: &NodeId) -> Option<NodeRef<'_>> {
        self.doc.tree.get(id)
    }

    fn selection(&self, id: &NodeId) -> Option<Selection<'_>> {
        self.node(id).map(Selection::from)
    }
}

fn matcher(selector: &str) -> Option<Matcher> {
    match Matcher::new(selector) {
        Ok(matcher) => Some(matcher),
        Err(_) => {
            log::debug!("ignoring invalid selector {selector:?}");
            None
        }
    }
}

fn ids(selection: &Selection<'_>) -> Vec<NodeId> {
    selection.nodes().iter().map(|n| n.id).collect()
}

impl RenderSurface for MemoryDocument {
    type Element = NodeId;

    fn query(&self, selector: &str) -> Option<NodeId> {
        let matcher = matcher(selector)?;
        self.doc.select_matcher(&matcher).nodes().first().map(|n| n.id)
    }

    fn query_all(&self, selector: &str) -> Vec<NodeId> {
        match matcher(selector) {
            Some(matcher) => ids(&self.doc.select_matcher(&matcher)),
            None => Vec::new(),
        }
    }

    fn query_within(&self, root: &NodeId, selector: &str) -> Vec<NodeId> {
        let (Some(matcher), Some(root)) = (matcher(selector), self.selection(root)) else {
            return Vec::new();
        };
        ids(&root.select_matcher(&matcher))
    }

    fn closest(&self, element: &NodeId, selector: &str) -> Option<NodeId> {
        let matcher = matcher(selector)?;
        let mut current = self.node(element);
        while let Some(node) = current {
            if node.is_element() && Selection::from(node).is_matcher(&matcher) {
                return Some(node.id);
            }
            current = node.parent();
        }
        None
    }

    fn tag_name(&self, element: &NodeId) -> String {
        self.node(element)
            .and_then(|n| n.node_name())
            .map(|name| name.to_ascii_lowercase())
            .unwrap_or_default()
    }

    fn attribute(&self, element: &NodeId, name: &str) -> Option<String> {
        self.selection(element)?.attr(name).map(|v| v.to_string())
    }

    fn set_attribute(&mut self, element: &NodeId, name: &str, value: &str) {
        if let Some(sel) = self.selection(element) {
            sel.set_attr(name, value);
        }
    }

    fn remove_attribute(&mut self, element: &NodeId, name: &str) {
        if let Some(sel) = self.selection(element) {
            sel.remove_attr(name);
        }
    }

    fn has_attribute(&self, element: &NodeId, name: &str) -> bool {
        self.selection(element).is_some_and(|sel| sel.has_attr(name))
    }

    fn inline_display(&self, element: &NodeId) -> String {
        self.attribute(element, "style")
            .map(|style| style_display(&style))
            .unwrap_or_default()
    }

    fn set_inline_display(&mut self, element: &NodeId, value: &str) {
        let style = self.attribute(element, "style").unwrap_or_default();
        let updated = replace_display(&style, value.trim());
        if updated.is_empty() {
            self.remove_attribute(element, "style");
        } else {
            self.set_attribute(element, "style", &updated);
        }
    }
}

// =============================================================================
// Style Attribute
// =============================================================================

fn split_declaration(declaration: &str) -> Option<(&str, &str)> {
    let (name, value) = declaration.split_once(':')?;
    Some((name.trim(), value.trim()))
}

fn is_display(declaration: &str) -> bool {
    split_declaration(declaration).is_some_and(|(name, _)| name.eq_ignore_ascii_case("display"))
}

/// Value of the last `display` declaration, priority included.
fn style_display(style: &str) -> String {
    style
        .split(';')
        .filter_map(split_declaration)
        .filter(|(name, _)| name.eq_ignore_ascii_case("display"))
        .last()
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}

/// Rewrite the `display` declaration in place, append it, or drop it when
/// `value` is empty.
fn replace_display(style: &str, value: &str) -> String {
    let mut declarations = Vec::new();
    let mut written = false;
    for declaration in style.split(';').map(str::trim).filter(|d| !d.is_empty()) {
        if !is_display(declaration) {
            declarations.push(declaration.to_string());
        } else if !written && !value.is_empty() {
            declarations.push(format!("display: {value}"));
            written = true;
        }
    }
    if !written && !value.is_empty() {
        declarations.push(format!("display: {value}"));
    }
    declarations.join("; ")
}
