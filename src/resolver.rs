//! Ordered selector fallback chains and first-match resolution.

use anyhow::Result;
use tracing::{debug, info};

use crate::page::Page;

/// Selectors tried in order; the first one is the primary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorSet(Vec<String>);

impl SelectorSet {
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(selectors.into_iter().map(Into::into).collect())
    }

    pub fn primary(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found {
        selector: String,
        /// Position of the winning selector within its set.
        position: usize,
        count: usize,
    },
    NotFound,
}

impl Resolution {
    pub fn selector(&self) -> Option<&str> {
        match self {
            Resolution::Found { selector, .. } => Some(selector),
            Resolution::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }
}

/// Returns the first selector in `set` with at least one match. A probe that
/// errors (e.g. a selector the engine rejects) counts as zero matches.
pub async fn resolve<P: Page + ?Sized>(page: &P, set: &SelectorSet) -> Resolution {
    for (position, selector) in set.iter().enumerate() {
        match page.count(selector).await {
            Ok(count) if count > 0 => {
                debug!("Selector `{}` matched {} element(s)", selector, count);
                return Resolution::Found {
                    selector: selector.to_string(),
                    position,
                    count,
                };
            }
            Ok(_) => debug!("Selector `{}` matched nothing", selector),
            Err(e) => debug!("Selector `{}` probe failed, treating as no match: {:#}", selector, e),
        }
    }
    Resolution::NotFound
}

/// Resolves `set` and clicks the first element of the winning selector.
/// Nothing is clicked when no selector matches.
pub async fn resolve_and_click<P: Page + ?Sized>(page: &P, set: &SelectorSet) -> Result<Resolution> {
    let resolution = resolve(page, set).await;
    if let Resolution::Found { ref selector, .. } = resolution {
        info!("🖱️ Clicking `{}`", selector);
        page.click(selector, 0).await?;
    }
    Ok(resolution)
}
