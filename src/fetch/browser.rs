//! Headless Chromium implementation of [`PuppeteerClient`]

use crate::fetch::{contains_all_titles, BrowserSlots, FindLoadMoreButton, PuppeteerClient};
use crate::title::LinkTitle;
use crate::FetchError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use scraper::Html;
use std::time::Duration;
use url::Url;

/// Clicks on a load-more control before giving up
const MAX_LOAD_MORE_CLICKS: u32 = 50;

/// Time allowed for a page to settle after a click
const CLICK_SETTLE: Duration = Duration::from_millis(1500);

/// Renders pages in a short-lived Chromium instance per fetch
///
/// Live browsers are capped by the shared [`BrowserSlots`].
pub struct ChromiumPuppeteerClient {
    slots: BrowserSlots,
    user_agent: String,
}

impl ChromiumPuppeteerClient {
    pub fn new(slots: BrowserSlots, user_agent: impl Into<String>) -> Self {
        Self {
            slots,
            user_agent: user_agent.into(),
        }
    }

    async fn render(
        &self,
        browser: &Browser,
        uri: &Url,
        known_entry_titles: &[LinkTitle],
        find_load_more_button: Option<&FindLoadMoreButton>,
    ) -> Result<String, chromiumoxide::error::CdpError> {
        let page = browser.new_page(uri.as_str()).await?;
        page.wait_for_navigation().await?;

        let content = match find_load_more_button {
            Some(finder) => click_until_complete(&page, known_entry_titles, finder).await?,
            None => page.content().await?,
        };

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page for {}: {}", uri, e);
        }
        Ok(content)
    }
}

/// Clicks the load-more control until all known titles are shown
async fn click_until_complete(
    page: &Page,
    known_entry_titles: &[LinkTitle],
    finder: &FindLoadMoreButton,
) -> Result<String, chromiumoxide::error::CdpError> {
    let mut content = page.content().await?;

    for clicks in 0..MAX_LOAD_MORE_CLICKS {
        if contains_all_titles(&content, known_entry_titles) {
            tracing::debug!("All known titles present after {} clicks", clicks);
            break;
        }

        let selector = {
            let document = Html::parse_document(&content);
            finder(&document)
        };
        let Some(selector) = selector else {
            tracing::debug!("No load-more control after {} clicks", clicks);
            break;
        };

        match page.find_element(selector.as_str()).await {
            Ok(element) => {
                element.click().await?;
            }
            Err(e) => {
                tracing::debug!("Load-more control {} not clickable: {}", selector, e);
                break;
            }
        }

        tokio::time::sleep(CLICK_SETTLE).await;
        content = page.content().await?;
    }

    Ok(content)
}

#[async_trait]
impl PuppeteerClient for ChromiumPuppeteerClient {
    async fn fetch(
        &self,
        uri: &Url,
        known_entry_titles: &[LinkTitle],
        find_load_more_button: Option<&FindLoadMoreButton>,
    ) -> Result<String, FetchError> {
        let _permit = self.slots.acquire().await?;
        let browser_error = |message: String| FetchError::Browser {
            url: uri.to_string(),
            message,
        };

        let config = BrowserConfig::builder()
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--no-first-run")
            .arg("--disable-extensions")
            .build()
            .map_err(browser_error)?;

        tracing::info!("Launching browser for {}", uri);
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_error(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler error: {:?}", e);
                }
            }
        });

        let result = self
            .render(&browser, uri, known_entry_titles, find_load_more_button)
            .await
            .map_err(|e| browser_error(e.to_string()));

        if let Err(e) = browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        handler_task.abort();

        result
    }
}
