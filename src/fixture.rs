//! A `Page` backed by static HTML.
//!
//! Interactions are recorded and handed to an optional handler that may rewrite
//! the document, which is enough to model modals opening and closing or
//! option buttons switching the product state.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use scraper::Html;
use serde_json::Value;

use crate::page::Page;
use crate::selector::{text_of, Query};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Click { selector: String, index: usize },
    Key(String),
}

/// The mutable part of a fixture: what a handler is allowed to change.
#[derive(Debug, Clone, Default)]
pub struct FixtureDom {
    pub html: String,
    pub url: String,
}

type Handler = Box<dyn FnMut(&Interaction, &mut FixtureDom) + Send>;

struct State {
    dom: FixtureDom,
    routes: HashMap<String, String>,
    handler: Option<Handler>,
    interactions: Vec<Interaction>,
    visited: Vec<String>,
    evaluate_result: Value,
    evaluations: usize,
    screenshots: usize,
    fail_screenshots: bool,
    rejected_clicks: Vec<(String, usize)>,
}

pub struct FixturePage {
    state: Mutex<State>,
}

impl FixturePage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State {
                dom: FixtureDom {
                    html: html.into(),
                    url: "about:blank".to_string(),
                },
                routes: HashMap::new(),
                handler: None,
                interactions: Vec::new(),
                visited: Vec::new(),
                evaluate_result: Value::Null,
                evaluations: 0,
                screenshots: 0,
                fail_screenshots: false,
                rejected_clicks: Vec::new(),
            }),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::new(html))
    }

    pub fn with_url(self, url: &str) -> Self {
        self.lock().dom.url = url.to_string();
        self
    }

    /// Serve `html` when `goto(url)` is called. Unrouted URLs keep the
    /// current document.
    pub fn with_route(self, url: &str, html: impl Into<String>) -> Self {
        self.lock().routes.insert(url.to_string(), html.into());
        self
    }

    pub fn on_interaction<F>(self, handler: F) -> Self
    where
        F: FnMut(&Interaction, &mut FixtureDom) + Send + 'static,
    {
        self.lock().handler = Some(Box::new(handler));
        self
    }

    pub fn with_evaluate_result(self, value: Value) -> Self {
        self.lock().evaluate_result = value;
        self
    }

    pub fn failing_screenshots(self) -> Self {
        self.lock().fail_screenshots = true;
        self
    }

    /// Make clicks on the `index`-th match of `selector` fail, as a covered
    /// or detached element would.
    pub fn rejecting_click(self, selector: &str, index: usize) -> Self {
        self.lock().rejected_clicks.push((selector.to_string(), index));
        self
    }

    pub fn interactions(&self) -> Vec<Interaction> {
        self.lock().interactions.clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.lock().visited.clone()
    }

    pub fn evaluations(&self) -> usize {
        self.lock().evaluations
    }

    pub fn screenshot_attempts(&self) -> usize {
        self.lock().screenshots
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicking handler poisons the lock; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn query<T>(&self, selector: &str, f: impl FnOnce(Vec<scraper::ElementRef<'_>>) -> T) -> Result<T> {
        let query = Query::parse(selector)?;
        let html = self.lock().dom.html.clone();
        let document = Html::parse_document(&html);
        Ok(f(query.select(&document)))
    }

    fn interact(&self, interaction: Interaction) {
        let mut state = self.lock();
        state.interactions.push(interaction.clone());
        let State { handler, dom, .. } = &mut *state;
        if let Some(handler) = handler.as_mut() {
            handler(&interaction, dom);
        }
    }
}

#[async_trait]
impl Page for FixturePage {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut state = self.lock();
        state.visited.push(url.to_string());
        if let Some(html) = state.routes.get(url).cloned() {
            state.dom.html = html;
        }
        state.dom.url = url.to_string();
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        self.query(selector, |found| found.len())
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>> {
        self.query(selector, |found| {
            found.iter().map(|el| text_of(el).trim().to_string()).collect()
        })
    }

    async fn attributes(&self, selector: &str, name: &str) -> Result<Vec<Option<String>>> {
        self.query(selector, |found| {
            found
                .iter()
                .map(|el| el.value().attr(name).map(str::to_string))
                .collect()
        })
    }

    async fn click(&self, selector: &str, index: usize) -> Result<()> {
        let available = self.query(selector, |found| found.len())?;
        if index >= available {
            return Err(anyhow!(
                "no element at index {} for `{}` ({} match(es))",
                index,
                selector,
                available
            ));
        }
        let rejected = self
            .lock()
            .rejected_clicks
            .iter()
            .any(|(s, i)| s == selector && *i == index);
        if rejected {
            return Err(anyhow!("element {} of `{}` is not clickable", index, selector));
        }
        self.interact(Interaction::Click {
            selector: selector.to_string(),
            index,
        });
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.interact(Interaction::Key(key.to_string()));
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> Result<Value> {
        let mut state = self.lock();
        state.evaluations += 1;
        Ok(state.evaluate_result.clone())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.lock().dom.html.clone())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.lock().dom.url.clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let mut state = self.lock();
        state.screenshots += 1;
        if state.fail_screenshots {
            return Err(anyhow!("screenshot capture unavailable"));
        }
        Ok(PNG_MAGIC.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handler_can_rewrite_document() {
        let page = FixturePage::new("<button id='open'>Open</button>").on_interaction(|event, dom| {
            if let Interaction::Click { .. } = event {
                dom.html = "<div class='modal'><p>Hi</p></div>".to_string();
            }
        });

        assert_eq!(page.count(".modal").await.unwrap(), 0);
        page.click("#open", 0).await.unwrap();
        assert_eq!(page.texts(".modal p").await.unwrap(), vec!["Hi"]);
    }

    #[tokio::test]
    async fn click_out_of_range_is_an_error() {
        let page = FixturePage::new("<button>One</button>");
        assert!(page.click("button", 1).await.is_err());
        assert!(page.interactions().is_empty());
    }

    #[tokio::test]
    async fn rejected_click_is_an_error_and_not_recorded() {
        let page = FixturePage::new("<button>One</button><button>Two</button>").rejecting_click("button", 1);
        assert!(page.click("button", 1).await.is_err());
        page.click("button", 0).await.unwrap();
        assert_eq!(
            page.interactions(),
            vec![Interaction::Click {
                selector: "button".to_string(),
                index: 0
            }]
        );
    }

    #[tokio::test]
    async fn routes_replace_document_on_goto() {
        let page = FixturePage::new("<p>home</p>").with_route("https://shop.test/red", "<p>red</p>");
        page.goto("https://shop.test/red").await.unwrap();
        assert_eq!(page.texts("p").await.unwrap(), vec!["red"]);
        assert_eq!(page.url().await.unwrap(), "https://shop.test/red");

        page.goto("https://shop.test/unknown").await.unwrap();
        assert_eq!(page.texts("p").await.unwrap(), vec!["red"]);
        assert_eq!(page.visited().len(), 2);
    }
}
