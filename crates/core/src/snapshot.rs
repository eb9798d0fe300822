//! A [`DocumentSource`] over saved HTML pages.
//!
//! Each page is one state of the feed, oldest first: scrolling moves to the
//! next page, the way a live feed grows as it loads. Detail views are
//! separate pages registered under the link that opens them; clicking an
//! element whose `href` (or `data-href`) names one opens it as an overlay on
//! top of the feed, and clicking an element matching the dismiss selector
//! inside the overlay closes it again.
//!
//! Clicking marks an element as consumed, which hides it, and reveals the
//! element its `aria-controls` attribute points at. That is enough to model
//! "See more" links, "View replies" buttons and collapsed threads in a saved
//! page.
//!
//! # Example
//!
//! ```rust
//! use feedharvest_core::{DocumentSource, SnapshotSource};
//!
//! let mut source = SnapshotSource::new(vec![
//!     r#"<div class="post">First</div>"#.to_string(),
//!     r#"<div class="post">First</div><div class="post">Second</div>"#.to_string(),
//! ])
//! .unwrap();
//!
//! assert_eq!(source.query_all(None, "div.post").len(), 1);
//! source.scroll_to_bottom().unwrap();
//! assert_eq!(source.query_all(None, "div.post").len(), 2);
//! ```

use std::collections::{HashMap, HashSet};

use scraper::{ElementRef, Html, Selector};

use crate::document::DocumentSource;
use crate::preprocess::{PreprocessConfig, preprocess_html};
use crate::{HarvestError, Result};

/// Which parsed page an element belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Layer {
    /// A feed page, by position.
    Page(usize),
    /// A detail page, by the link it is registered under.
    Detail(String),
}

/// Handle to an element of a [`SnapshotSource`].
///
/// The index is the element's position in document order within its layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotElement {
    pub layer: Layer,
    pub index: usize,
}

/// Saved pages behaving like a live, scrolling feed.
pub struct SnapshotSource {
    pages: Vec<Html>,
    current: usize,
    details: HashMap<String, Html>,
    overlay: Option<String>,
    dismiss: Option<Selector>,
    config: PreprocessConfig,
    consumed: HashSet<SnapshotElement>,
    revealed: HashSet<(Layer, String)>,
}

impl std::fmt::Debug for SnapshotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotSource")
            .field("pages", &self.pages.len())
            .field("current", &self.current)
            .field("details", &self.details.keys().collect::<Vec<_>>())
            .field("overlay", &self.overlay)
            .finish()
    }
}

impl SnapshotSource {
    /// Builds a source from feed pages, preprocessed with the default config.
    pub fn new(pages: Vec<String>) -> Result<Self> {
        Self::with_config(pages, PreprocessConfig::default())
    }

    /// Builds a source from feed pages with a custom preprocessing config.
    pub fn with_config(pages: Vec<String>, config: PreprocessConfig) -> Result<Self> {
        if pages.is_empty() {
            return Err(HarvestError::DocumentError("at least one page is required".to_string()));
        }

        let pages = pages.iter().map(|page| Html::parse_document(&preprocess_html(page, &config))).collect();

        Ok(Self {
            pages,
            current: 0,
            details: HashMap::new(),
            overlay: None,
            dismiss: None,
            config,
            consumed: HashSet::new(),
            revealed: HashSet::new(),
        })
    }

    /// Registers a detail page opened by links whose target is `key`.
    pub fn with_detail(mut self, key: impl Into<String>, html: &str) -> Self {
        self.add_detail(key, html);
        self
    }

    pub fn add_detail(&mut self, key: impl Into<String>, html: &str) {
        let html = Html::parse_document(&preprocess_html(html, &self.config));
        self.details.insert(key.into(), html);
    }

    /// Sets the selector whose elements close an open detail page.
    pub fn with_dismiss_selector(mut self, selector: &str) -> Result<Self> {
        let parsed = Selector::parse(selector).map_err(|e| HarvestError::InvalidSelector {
            selector: selector.to_string(),
            message: e.to_string(),
        })?;
        self.dismiss = Some(parsed);
        Ok(self)
    }

    /// Number of feed pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Position of the page currently shown.
    pub fn current_page(&self) -> usize {
        self.current
    }

    /// Link key of the open detail page, if any.
    pub fn open_detail(&self) -> Option<&str> {
        self.overlay.as_deref()
    }

    fn html(&self, layer: &Layer) -> Option<&Html> {
        match layer {
            Layer::Page(index) => self.pages.get(*index),
            Layer::Detail(key) => self.details.get(key),
        }
    }

    fn is_live(&self, layer: &Layer) -> bool {
        match layer {
            Layer::Page(index) => *index == self.current,
            Layer::Detail(key) => self.overlay.as_deref() == Some(key.as_str()),
        }
    }

    /// Layers searched by an unscoped query, topmost first.
    fn live_layers(&self) -> Vec<Layer> {
        let mut layers = Vec::with_capacity(2);
        if let Some(key) = &self.overlay {
            layers.push(Layer::Detail(key.clone()));
        }
        layers.push(Layer::Page(self.current));
        layers
    }

    fn resolve<'a>(&'a self, element: &SnapshotElement) -> Option<ElementRef<'a>> {
        elements(self.html(&element.layer)?).nth(element.index)
    }

    fn select_in(&self, layer: &Layer, scope: Option<usize>, selector: &Selector) -> Vec<SnapshotElement> {
        let Some(html) = self.html(layer) else {
            return Vec::new();
        };

        let matched: HashSet<_> = match scope.and_then(|index| elements(html).nth(index)) {
            Some(scope) => scope.select(selector).filter(|e| e.id() != scope.id()).map(|e| e.id()).collect(),
            None if scope.is_some() => return Vec::new(),
            None => html.select(selector).map(|e| e.id()).collect(),
        };

        if matched.is_empty() {
            return Vec::new();
        }

        elements(html)
            .enumerate()
            .filter(|(_, e)| matched.contains(&e.id()))
            .map(|(index, _)| SnapshotElement { layer: layer.clone(), index })
            .collect()
    }

    fn hidden_by_markup(&self, layer: &Layer, element: ElementRef<'_>) -> bool {
        std::iter::once(element)
            .chain(element.ancestors().filter_map(ElementRef::wrap))
            .any(|e| self.hides_itself(layer, e))
    }

    fn hides_itself(&self, layer: &Layer, element: ElementRef<'_>) -> bool {
        let value = element.value();
        if let Some(id) = value.attr("id")
            && self.revealed.contains(&(layer.clone(), id.to_string()))
        {
            return false;
        }

        let display_none = value
            .attr("style")
            .map(|style| style.replace(char::is_whitespace, "").to_lowercase().contains("display:none"))
            .unwrap_or(false);

        value.attr("hidden").is_some() || value.attr("aria-hidden") == Some("true") || display_none
    }

    fn collect_text(&self, layer: &Layer, element: ElementRef<'_>, out: &mut String) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                out.push_str(text);
            } else if let Some(child) = ElementRef::wrap(child) {
                if self.hides_itself(layer, child) {
                    continue;
                }
                self.collect_text(layer, child, out);
                if matches!(child.value().name(), "br" | "p" | "div" | "li") {
                    out.push(' ');
                }
            }
        }
    }

    fn link_target(element: ElementRef<'_>) -> Option<String> {
        let value = element.value();
        value.attr("href").or_else(|| value.attr("data-href")).map(str::to_string)
    }

    fn close_overlay(&mut self) {
        if let Some(key) = self.overlay.take() {
            let layer = Layer::Detail(key);
            self.consumed.retain(|e| e.layer != layer);
            self.revealed.retain(|(l, _)| *l != layer);
            tracing::trace!(?layer, "Closed detail page");
        }
    }
}

/// Every element of a document in document order.
fn elements(html: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    html.root_element().descendants().filter_map(ElementRef::wrap)
}

impl DocumentSource for SnapshotSource {
    type Element = SnapshotElement;

    fn query(&self, scope: Option<&SnapshotElement>, selector: &str) -> Option<SnapshotElement> {
        self.query_all(scope, selector).into_iter().next()
    }

    fn query_all(&self, scope: Option<&SnapshotElement>, selector: &str) -> Vec<SnapshotElement> {
        let Ok(parsed) = Selector::parse(selector) else {
            tracing::debug!(selector, "Skipping unparseable selector");
            return Vec::new();
        };

        match scope {
            Some(scope) => self.select_in(&scope.layer, Some(scope.index), &parsed),
            None => self
                .live_layers()
                .iter()
                .flat_map(|layer| self.select_in(layer, None, &parsed))
                .collect(),
        }
    }

    fn click(&mut self, element: &SnapshotElement) -> Result<()> {
        if !self.is_live(&element.layer) {
            return Err(HarvestError::DocumentError("clicked element is no longer attached".to_string()));
        }
        let target = self
            .resolve(element)
            .ok_or_else(|| HarvestError::DocumentError(format!("no element at index {}", element.index)))?;

        let dismisses = matches!(element.layer, Layer::Detail(_))
            && self.dismiss.as_ref().is_some_and(|dismiss| dismiss.matches(&target));
        let opens = Self::link_target(target).filter(|key| self.details.contains_key(key));
        let controls = target.value().attr("aria-controls").map(str::to_string);

        if dismisses {
            self.close_overlay();
            return Ok(());
        }

        if let Some(id) = controls {
            self.revealed.insert((element.layer.clone(), id));
        }
        self.consumed.insert(element.clone());

        if let Some(key) = opens {
            self.close_overlay();
            tracing::trace!(key = key.as_str(), "Opened detail page");
            self.overlay = Some(key);
        }

        Ok(())
    }

    fn is_visible(&self, element: &SnapshotElement) -> bool {
        if !self.is_live(&element.layer) || self.consumed.contains(element) {
            return false;
        }
        match self.resolve(element) {
            Some(target) => !self.hidden_by_markup(&element.layer, target),
            None => false,
        }
    }

    fn text(&self, element: &SnapshotElement) -> String {
        let mut out = String::new();
        if let Some(target) = self.resolve(element) {
            self.collect_text(&element.layer, target, &mut out);
        }
        out
    }

    fn attribute(&self, element: &SnapshotElement, name: &str) -> Option<String> {
        self.resolve(element)?.value().attr(name).map(str::to_string)
    }

    fn scroll_to_bottom(&mut self) -> Result<()> {
        if self.current + 1 < self.pages.len() {
            self.current += 1;
            tracing::trace!(page = self.current, "Advanced to next page");
        }
        Ok(())
    }

    fn current_height(&self) -> u64 {
        self.pages
            .get(self.current)
            .map(|html| elements(html).count() as u64)
            .unwrap_or(0)
    }
}
