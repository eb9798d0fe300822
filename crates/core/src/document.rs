//! The query surface of the live document being harvested.
//!
//! Everything the harvester and extractor know about the page goes through
//! [`DocumentSource`]. Selection always goes through a [`LocatorSet`]: the
//! helpers here try each expression configured for a role in order and stop
//! at the first one that matches.

use crate::Result;
use crate::locators::{LocatorSet, Role};

/// Read/interact access to a document that may change as it is used.
///
/// Clicking and scrolling are the only mutations. Queries with no scope
/// search the whole document, including any open overlay.
pub trait DocumentSource {
    type Element: Clone + PartialEq + std::fmt::Debug;

    /// First element matching `selector` inside `scope` (or the document).
    fn query(&self, scope: Option<&Self::Element>, selector: &str) -> Option<Self::Element>;

    /// Every element matching `selector` inside `scope`, in document order.
    fn query_all(&self, scope: Option<&Self::Element>, selector: &str) -> Vec<Self::Element>;

    fn click(&mut self, element: &Self::Element) -> Result<()>;

    fn is_visible(&self, element: &Self::Element) -> bool;

    /// Rendered text of the element.
    fn text(&self, element: &Self::Element) -> String;

    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;

    /// Ask the feed to load more items.
    fn scroll_to_bottom(&mut self) -> Result<()>;

    /// Size of the loaded document. Grows when a scroll loaded more content.
    fn current_height(&self) -> u64;
}

/// First element for `role`, trying the role's expressions in order.
pub fn locate<D: DocumentSource>(
    source: &D, locators: &LocatorSet, scope: Option<&D::Element>, role: Role,
) -> Option<D::Element> {
    locators
        .selectors(role)
        .iter()
        .find_map(|selector| source.query(scope, selector))
}

/// All elements for `role` from the first expression that matches anything.
pub fn locate_all<D: DocumentSource>(
    source: &D, locators: &LocatorSet, scope: Option<&D::Element>, role: Role,
) -> Vec<D::Element> {
    for selector in locators.selectors(role) {
        let found = source.query_all(scope, selector);
        if !found.is_empty() {
            tracing::trace!(%role, selector = selector.as_str(), count = found.len(), "Located elements");
            return found;
        }
    }
    Vec::new()
}

/// Like [`locate_all`], minus matches nested inside another match.
///
/// Comment and reply expressions commonly overlap (a reply is also an
/// article inside a comment), so the comments of a container are the
/// outermost matches only.
pub fn locate_outermost<D: DocumentSource>(
    source: &D, locators: &LocatorSet, scope: Option<&D::Element>, role: Role,
) -> Vec<D::Element> {
    let found = locate_all(source, locators, scope, role);
    let nested: Vec<D::Element> = found
        .iter()
        .flat_map(|element| locate_all(source, locators, Some(element), role))
        .collect();

    found.into_iter().filter(|element| !nested.contains(element)).collect()
}

/// Text of the first element for `role`, when it has any.
pub fn locate_text<D: DocumentSource>(
    source: &D, locators: &LocatorSet, scope: Option<&D::Element>, role: Role,
) -> Option<String> {
    locate(source, locators, scope, role)
        .map(|element| source.text(&element))
        .filter(|text| !text.trim().is_empty())
}

/// First visible element for `role` across all of its expressions.
pub fn locate_visible<D: DocumentSource>(
    source: &D, locators: &LocatorSet, scope: Option<&D::Element>, role: Role,
) -> Option<D::Element> {
    locators
        .selectors(role)
        .iter()
        .flat_map(|selector| source.query_all(scope, selector))
        .find(|element| source.is_visible(element))
}

/// Every visible element for `role`, deduplicated across expressions.
pub fn locate_all_visible<D: DocumentSource>(
    source: &D, locators: &LocatorSet, scope: Option<&D::Element>, role: Role,
) -> Vec<D::Element> {
    let mut visible: Vec<D::Element> = Vec::new();
    for selector in locators.selectors(role) {
        for element in source.query_all(scope, selector) {
            if source.is_visible(&element) && !visible.contains(&element) {
                visible.push(element);
            }
        }
    }
    visible
}
