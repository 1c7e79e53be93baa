// spider_chrome re-exports chromiumoxide API
use super::selector::{marker_selector, text_locator_script, Selector};
use crate::driver::{ElementHandle, PageDriver};
use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

const TAG_NAME_JS: &str = "function() { return this.tagName.toLowerCase(); }";

const IS_FILLABLE_JS: &str = r#"function() {
    const tag = this.tagName.toLowerCase();
    if (this.isContentEditable) return true;
    if (tag === 'textarea') return !this.disabled && !this.readOnly;
    if (tag !== 'input') return false;
    const blocked = ['button', 'submit', 'reset', 'checkbox', 'radio', 'file', 'image', 'hidden'];
    return !blocked.includes((this.type || '').toLowerCase()) && !this.disabled && !this.readOnly;
}"#;

const CLEAR_VALUE_JS: &str = r#"function() {
    if (this.isContentEditable) { this.textContent = ''; }
    else { this.value = ''; }
    this.dispatchEvent(new Event('input', { bubbles: true }));
}"#;

pub struct ChromeDriver {
    browser: Browser,
    temp_dir: Option<PathBuf>,
    locator_seq: AtomicU64,
}

/// Connection mode for Chrome browser
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    /// Sandboxed mode - launches Chrome using system installation
    Sandboxed {
        chrome_path: Option<String>,
        no_sandbox: bool,
        headless: bool,
    },
    /// Advanced mode - connects to existing Chrome on debug port
    DebugPort(u16),
}

impl ChromeDriver {
    /// Helper method to get the current active page, excluding Chrome's new-tab-page
    async fn get_active_page(&self) -> Result<chromiumoxide::page::Page> {
        let pages = self.browser.pages().await?;

        for page in pages.iter() {
            if let Ok(Some(url)) = page.url().await {
                if !url.starts_with("chrome://") {
                    return Ok(page.clone());
                }
            }
        }

        if let Some(page) = pages.last() {
            return Ok(page.clone());
        }

        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Other(format!("Failed to create page: {}", e)))
    }

    /// Create new ChromeDriver with specified connection mode
    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        let (browser, temp_dir) = match mode {
            ConnectionMode::Sandboxed {
                chrome_path,
                no_sandbox,
                headless,
            } => {
                // Unique profile directory per session
                let unique_id = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or_default();
                let temp_dir = std::env::temp_dir().join(format!("heal-webdriver-{}", unique_id));
                std::fs::create_dir_all(&temp_dir).map_err(|e| {
                    BrowserError::LaunchFailed(format!("Failed to create temp directory: {}", e))
                })?;

                let mut config = if headless {
                    BrowserConfig::builder()
                } else {
                    BrowserConfig::builder().with_head()
                };

                config = config.user_data_dir(&temp_dir);

                // Linux AppArmor workaround
                if no_sandbox {
                    config = config.arg("--no-sandbox");
                }

                if let Some(path) = chrome_path {
                    config = config.chrome_executable(path);
                }

                let config = config.build().map_err(|e| {
                    BrowserError::LaunchFailed(format!("{}. {}", e, CHROME_HINT))
                })?;

                let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
                    BrowserError::LaunchFailed(format!("{}. {}", e, CHROME_HINT))
                })?;

                tokio::spawn(async move {
                    while (handler.next().await).is_some() {
                        // Handle browser events
                    }
                });

                (browser, Some(temp_dir))
            }
            ConnectionMode::DebugPort(port) => {
                let url = format!("http://localhost:{}", port);
                let (browser, mut handler) = Browser::connect(&url).await.map_err(|e| {
                    BrowserError::ConnectionFailed(format!(
                        "Failed to connect to Chrome on port {}. \
                             Make sure Chrome is running with --remote-debugging-port={}: {}",
                        port, port, e
                    ))
                })?;

                tokio::spawn(async move {
                    while (handler.next().await).is_some() {
                        // Handle browser events
                    }
                });

                (browser, None)
            }
        };

        Ok(Self {
            browser,
            temp_dir,
            locator_seq: AtomicU64::new(0),
        })
    }

    /// Get current URL
    pub async fn current_url(&self) -> Result<String> {
        let page = self.get_active_page().await?;

        let url = page
            .url()
            .await
            .map_err(|e| BrowserError::Other(e.to_string()))?
            .ok_or(BrowserError::NoPage)?;

        Ok(url)
    }

    /// Get page title
    pub async fn title(&self) -> Result<String> {
        let page = self.get_active_page().await?;

        let title = page
            .get_title()
            .await
            .map_err(|e| BrowserError::Other(e.to_string()))?
            .ok_or(BrowserError::NoPage)?;

        Ok(title)
    }

    /// Execute arbitrary JavaScript in the page context
    pub async fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        let page = self.get_active_page().await?;

        let result = page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Other(format!("Script execution failed: {}", e)))?;

        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    /// Resolve a selector in the dialect of [`Selector`] to the first matching element
    async fn locate(&self, selector: &str) -> Result<Element> {
        let page = self.get_active_page().await?;

        let css = match Selector::parse(selector) {
            Selector::Css(css) => css.to_string(),
            Selector::Text { text, exact } => {
                let marker = format!("m-{}", self.locator_seq.fetch_add(1, Ordering::Relaxed));
                let found = self
                    .execute_script(&text_locator_script(text, exact, &marker))
                    .await?
                    .as_bool()
                    .unwrap_or(false);
                if !found {
                    return Err(BrowserError::ElementNotFound(selector.to_string()));
                }
                marker_selector(&marker)
            }
        };

        page.find_element(css)
            .await
            .map_err(|_e| BrowserError::ElementNotFound(selector.to_string()))
    }
}

const CHROME_HINT: &str = "Chrome not found. You can:\n\
     - Install Chrome: https://www.google.com/chrome/\n\
     - Ubuntu/Debian: sudo apt install chromium-browser\n\
     - Or specify path: --chrome-path /path/to/chrome\n\
     - Linux sandbox issue? Try: --no-sandbox";

#[async_trait]
impl PageDriver for ChromeDriver {
    type Element = ChromeElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        use chromiumoxide::cdp::browser_protocol::page::{EventLoadEventFired, NavigateParams};

        log::debug!("Starting navigation to: {}", url);

        let mut pages = self.browser.pages().await?;

        // Single-page sessions only
        for (i, p) in pages.iter().enumerate() {
            if i > 0 {
                log::debug!("Closing extra page {}", i);
                let _ = p
                    .execute(
                        chromiumoxide::cdp::browser_protocol::target::CloseTargetParams::new(
                            p.target_id().clone(),
                        ),
                    )
                    .await;
            }
        }

        pages = self.browser.pages().await?;

        let page = if let Some(page) = pages.first() {
            page.clone()
        } else {
            self.browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?
        };

        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| BrowserError::NavigationFailed(format!("Invalid URL {}: {}", url, e)))?;

        // Subscribe before navigating so the load event cannot be missed
        let mut load_events = page.event_listener::<EventLoadEventFired>().await?;

        let response = page.execute(params).await.map_err(|e| {
            let error_str = e.to_string();

            // "oneshot canceled" means the browser connection is dead
            if error_str.contains("oneshot canceled") {
                BrowserError::NavigationFailed(
                    "Browser connection lost. The browser may have been closed or crashed."
                        .to_string(),
                )
            } else {
                BrowserError::NavigationFailed(format!("Failed to navigate to {}: {}", url, e))
            }
        })?;

        if let Some(error_text) = response.result.error_text.clone() {
            return Err(BrowserError::NavigationFailed(format!(
                "Navigation error: {}",
                error_text
            )));
        }

        match tokio::time::timeout(LOAD_TIMEOUT, load_events.next()).await {
            Ok(Some(_)) => log::debug!("Page load event fired"),
            Ok(None) => log::warn!("Load event stream closed before the page finished loading"),
            Err(_) => {
                return Err(BrowserError::NavigationFailed(format!(
                    "Timed out after {}s waiting for {} to load",
                    LOAD_TIMEOUT.as_secs(),
                    url
                )));
            }
        }

        Ok(())
    }

    async fn query_elements(&self, selector: &str) -> Result<Vec<ChromeElement>> {
        let page = self.get_active_page().await?;
        let elements = page.find_elements(selector).await?;
        Ok(elements.into_iter().map(ChromeElement).collect())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self.locate(selector).await?;
        element.click().await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let element = self.locate(selector).await?;

        let fillable = element
            .call_js_fn(IS_FILLABLE_JS, false)
            .await?
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !fillable {
            return Err(BrowserError::NotFillable(selector.to_string()));
        }

        element.click().await?;
        element.call_js_fn(CLEAR_VALUE_JS, false).await?;
        element.type_str(value).await?;
        Ok(())
    }

    async fn close(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::Other(e.to_string()))?;
        Ok(())
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.exists() {
                let _ = std::fs::remove_dir_all(temp_dir);
            }
        }
    }
}

/// Element handle backed by a CDP remote object
pub struct ChromeElement(Element);

#[async_trait]
impl ElementHandle for ChromeElement {
    async fn tag_name(&self) -> Result<String> {
        let returns = self.0.call_js_fn(TAG_NAME_JS, false).await?;
        returns
            .result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| BrowserError::Other("Element has no tag name".to_string()))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.0.attribute(name).await?)
    }

    async fn text(&self) -> Result<String> {
        Ok(self.0.inner_text().await?.unwrap_or_default())
    }
}
