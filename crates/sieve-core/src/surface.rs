//! Render surface abstraction
//!
//! The minimal document capabilities the filter engine needs. A browser binding
//! implements this over the live DOM; [`crate::dom::MemoryDocument`] implements
//! it in memory for tests and offline use.

/// A document tree addressed through CSS selectors, attributes and inline
/// `display`.
///
/// Selectors passed in are plain CSS selector lists. Implementations treat an
/// invalid selector as matching nothing.
pub trait RenderSurface {
    /// Handle to one element. Cheap to clone; equality is element identity.
    type Element: Clone + PartialEq;

    /// First element in the whole document matching `selector`.
    fn query(&self, selector: &str) -> Option<Self::Element>;

    /// All elements in the whole document matching `selector`, document order.
    fn query_all(&self, selector: &str) -> Vec<Self::Element>;

    /// Descendants of `root` (not `root` itself) matching `selector`.
    fn query_within(&self, root: &Self::Element, selector: &str) -> Vec<Self::Element>;

    /// `element` itself or its nearest ancestor matching `selector`.
    fn closest(&self, element: &Self::Element, selector: &str) -> Option<Self::Element>;

    /// Lowercase tag name (`a`, `div`, `body`).
    fn tag_name(&self, element: &Self::Element) -> String;

    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;

    fn set_attribute(&mut self, element: &Self::Element, name: &str, value: &str);

    fn remove_attribute(&mut self, element: &Self::Element, name: &str);

    fn has_attribute(&self, element: &Self::Element, name: &str) -> bool {
        self.attribute(element, name).is_some()
    }

    /// Inline `style.display`; empty when unset.
    fn inline_display(&self, element: &Self::Element) -> String;

    /// Set inline `style.display`; an empty value removes the property.
    fn set_inline_display(&mut self, element: &Self::Element, value: &str);
}
