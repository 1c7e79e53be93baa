//! Browser capability surface
//!
//! The executor, fingerprinter and page context only ever talk to a browser
//! through these two traits. `ChromeDriver` is the production binding; tests
//! drive the same code through an in-memory page.

use crate::error::Result;
use async_trait::async_trait;

/// Tags whose elements are considered interactive.
pub const INTERACTIVE_TAGS: [&str; 3] = ["button", "input", "a"];

/// A live element on the current page.
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// Lowercase tag name (e.g. `button`)
    async fn tag_name(&self) -> Result<String>;

    /// Attribute value, `None` when the attribute is absent
    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    /// Rendered text content
    async fn text(&self) -> Result<String>;
}

/// A single-page browser session.
#[async_trait]
pub trait PageDriver: Send + Sync {
    type Element: ElementHandle;

    /// Navigate the page to an absolute URL and wait for it to load
    async fn navigate(&self, url: &str) -> Result<()>;

    /// All elements matching a CSS selector, in document order
    async fn query_elements(&self, selector: &str) -> Result<Vec<Self::Element>>;

    /// Click the first element matching `selector`
    async fn click(&self, selector: &str) -> Result<()>;

    /// Replace the value of the first element matching `selector`
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Release the session
    async fn close(self) -> Result<()>
    where
        Self: Sized;
}
