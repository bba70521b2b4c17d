//! Bounded waits for content to appear, one selector at a time.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::diagnostics::{Diagnostics, DEBUG_SCREENSHOT};
use crate::error::ScrapeError;
use crate::page::Page;
use crate::resolver::SelectorSet;
use crate::selector::Query;

/// The primary selector gets `primary_timeout`, each fallback
/// `fallback_timeout`. Attempts run in order, never in parallel.
#[derive(Debug, Clone)]
pub struct WaitPlan {
    pub selectors: SelectorSet,
    pub primary_timeout: Duration,
    pub fallback_timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitPlan {
    pub fn new(selectors: SelectorSet, primary_timeout: Duration, fallback_timeout: Duration) -> Self {
        Self {
            selectors,
            primary_timeout,
            fallback_timeout,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Upper bound on how long `wait_for_content` can take.
    pub fn budget(&self) -> Duration {
        let fallbacks = self.selectors.len().saturating_sub(1) as u32;
        if self.selectors.is_empty() {
            Duration::ZERO
        } else {
            self.primary_timeout + self.fallback_timeout * fallbacks
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Matched(String),
    TimedOut,
}

/// Polls until `selector` matches at least one element or `timeout` elapses.
pub async fn wait_for_selector<P: Page + ?Sized>(
    page: &P,
    selector: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> bool {
    if let Err(e) = Query::parse(selector) {
        debug!("Skipping wait on unusable selector: {}", e);
        return false;
    }

    let deadline = Instant::now() + timeout;
    loop {
        match page.count(selector).await {
            Ok(n) if n > 0 => return true,
            Ok(_) => {}
            Err(e) => debug!("Probe for `{}` failed: {:#}", selector, e),
        }

        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        sleep(poll_interval.min(deadline - now)).await;
    }
}

pub async fn wait_for_content<P: Page + ?Sized>(page: &P, plan: &WaitPlan) -> WaitOutcome {
    for (i, selector) in plan.selectors.iter().enumerate() {
        let timeout = if i == 0 {
            plan.primary_timeout
        } else {
            plan.fallback_timeout
        };

        if wait_for_selector(page, selector, timeout, plan.poll_interval).await {
            if i == 0 {
                info!("✅ Content appeared: `{}`", selector);
            } else {
                info!("✅ Content appeared via fallback `{}`", selector);
            }
            return WaitOutcome::Matched(selector.to_string());
        }

        if i == 0 {
            info!("Content didn't appear, trying alternative selectors...");
        }
    }
    WaitOutcome::TimedOut
}

/// Like [`wait_for_content`], but a total timeout captures one diagnostic
/// screenshot and reports `ContentTimeout` so the caller skips the page.
pub async fn await_content<P: Page + ?Sized>(
    page: &P,
    plan: &WaitPlan,
    diagnostics: &Diagnostics,
) -> Result<String, ScrapeError> {
    match wait_for_content(page, plan).await {
        WaitOutcome::Matched(selector) => Ok(selector),
        WaitOutcome::TimedOut => {
            warn!("⚠️ No content found. Taking screenshot for debugging...");
            diagnostics.capture(page, DEBUG_SCREENSHOT).await;
            Err(ScrapeError::ContentTimeout {
                tried: plan.selectors.to_vec(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{FixturePage, Interaction};

    fn plan(selectors: &[&str]) -> WaitPlan {
        WaitPlan::new(
            SelectorSet::new(selectors.iter().copied()),
            Duration::from_secs(10),
            Duration::from_secs(2),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn matches_immediately_when_present() {
        let page = FixturePage::new("<div class='specs'></div>");
        let start = Instant::now();
        let outcome = wait_for_content(&page, &plan(&[".specs"])).await;
        assert_eq!(outcome, WaitOutcome::Matched(".specs".to_string()));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_after_primary_timeout() {
        let page = FixturePage::new("<div class='tech-specs'></div>");
        let start = Instant::now();
        let outcome = wait_for_content(&page, &plan(&[".modal .specs", ".popup .specs", ".tech-specs"])).await;
        assert_eq!(outcome, WaitOutcome::Matched(".tech-specs".to_string()));
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn total_timeout_is_bounded_and_screenshots_once() {
        let dir = tempfile::tempdir().unwrap();
        let diagnostics = Diagnostics::new(dir.path());
        let page = FixturePage::new("<p>nothing here</p>");
        let plan = plan(&[".a", ".b", "div[", ".c"]);

        let start = Instant::now();
        let err = await_content(&page, &plan, &diagnostics).await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, ScrapeError::ContentTimeout { ref tried } if tried.len() == 4));
        assert!(elapsed <= plan.budget());
        assert_eq!(page.screenshot_attempts(), 1);
        assert!(dir.path().join(DEBUG_SCREENSHOT).exists());
    }

    #[tokio::test(start_paused = true)]
    async fn picks_up_content_that_appears_later() {
        let page = FixturePage::new("<button id='go'>Go</button>").on_interaction(|event, dom| {
            if matches!(event, Interaction::Key(_)) {
                dom.html = "<section class='late'></section>".to_string();
            }
        });
        let page = std::sync::Arc::new(page);

        let waiter = {
            let page = std::sync::Arc::clone(&page);
            tokio::spawn(async move {
                wait_for_selector(page.as_ref(), ".late", Duration::from_secs(5), Duration::from_millis(100)).await
            })
        };
        sleep(Duration::from_secs(1)).await;
        page.press_key("Enter").await.unwrap();

        assert!(waiter.await.unwrap());
    }

    #[test]
    fn budget_sums_sequential_attempts() {
        assert_eq!(plan(&[".a", ".b", ".c"]).budget(), Duration::from_secs(14));
        assert_eq!(plan(&[]).budget(), Duration::ZERO);
    }
}
