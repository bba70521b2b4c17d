//! The browser automation capability the extractor is written against.
//!
//! Selector arguments use the grammar in [`crate::selector`]. A selector the
//! engine rejects is reported as an `Err`, which probing callers treat as
//! "no match".

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate and wait for the DOM to be ready.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Number of elements matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Trimmed text content of every match, in document order.
    async fn texts(&self, selector: &str) -> Result<Vec<String>>;

    /// Value of attribute `name` on every match, in document order.
    async fn attributes(&self, selector: &str, name: &str) -> Result<Vec<Option<String>>>;

    /// Click the `index`-th match.
    async fn click(&self, selector: &str, index: usize) -> Result<()>;

    async fn press_key(&self, key: &str) -> Result<()>;

    /// Evaluate a script in the page and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Serialized HTML of the live document.
    async fn content(&self) -> Result<String>;

    async fn url(&self) -> Result<String>;

    /// Full-page PNG screenshot.
    async fn screenshot(&self) -> Result<Vec<u8>>;
}
