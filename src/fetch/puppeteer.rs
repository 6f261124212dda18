//! Browser-rendering capability for JS-driven archives

use crate::title::{equalize_title, LinkTitle};
use crate::FetchError;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Strategy that locates an interactive "load more" control in a rendered page
///
/// Returns a CSS selector the browser can click, or `None` when the page has
/// no such control.
pub type FindLoadMoreButton = dyn Fn(&Html) -> Option<String> + Send + Sync;

/// Capability to render a page in a headless browser
#[async_trait]
pub trait PuppeteerClient: Send + Sync {
    /// Renders `uri` and returns the resulting HTML
    ///
    /// When `find_load_more_button` is given, the client keeps clicking the
    /// control it points at until every title in `known_entry_titles` shows
    /// up in the page or the control disappears.
    async fn fetch(
        &self,
        uri: &Url,
        known_entry_titles: &[LinkTitle],
        find_load_more_button: Option<&FindLoadMoreButton>,
    ) -> Result<String, FetchError>;
}

/// Labels that identify a load-more control, compared after equalization
const LOAD_MORE_LABELS: &[&str] = &[
    "load more",
    "load more posts",
    "show more",
    "show more posts",
    "more posts",
    "view more",
    "see more",
];

/// Finds a button or link whose label reads like "load more"
pub fn default_load_more_button(document: &Html) -> Option<String> {
    let selector = Selector::parse("button, a, [role='button']").ok()?;

    document
        .select(&selector)
        .find(|element| {
            let label = equalize_title(&element.text().collect::<String>());
            LOAD_MORE_LABELS.contains(&label.as_str())
        })
        .map(|element| css_path(&element))
}

/// Builds a selector that identifies an element well enough to click it
fn css_path(element: &ElementRef) -> String {
    let value = element.value();
    if let Some(id) = value.id() {
        return format!("#{}", id);
    }

    let classes: Vec<&str> = value
        .attr("class")
        .map(|class| class.split_whitespace().collect())
        .unwrap_or_default();
    if classes.is_empty() {
        value.name().to_string()
    } else {
        format!("{}.{}", value.name(), classes.join("."))
    }
}

/// Returns true if every known title is present in `html`
pub fn contains_all_titles(html: &str, known_entry_titles: &[LinkTitle]) -> bool {
    let document = Html::parse_document(html);
    let text = equalize_title(&document.root_element().text().collect::<Vec<_>>().join(" "));
    known_entry_titles
        .iter()
        .all(|title| text.contains(&title.equalized_value))
}

/// Process-wide cap on concurrently live browser instances
///
/// Each browser is resource-heavy; every browser-backed client created for
/// concurrent crawls shares one `BrowserSlots`.
#[derive(Debug, Clone)]
pub struct BrowserSlots {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl BrowserSlots {
    pub fn new(max_browser_count: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_browser_count)),
            capacity: max_browser_count,
        }
    }

    /// Waits for a free slot; the slot is released when the permit drops
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, FetchError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchError::NoBrowser)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
