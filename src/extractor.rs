use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::diagnostics::Diagnostics;
use crate::error::{Result, ScrapeError};
use crate::page::Page;
use crate::resolver::{resolve_and_click, Resolution, SelectorSet};
use crate::scrape::{scrape, ExtractionResult, ScrapeLayout};
use crate::wait::{await_content, WaitPlan};

/// Everything needed to open one page's specifications panel and read it.
#[derive(Debug, Clone)]
pub struct SnapshotProfile {
    /// Pause after navigation before probing.
    pub settle: Duration,
    /// Control that reveals the panel. Skipped when nothing matches.
    pub trigger: SelectorSet,
    pub content: WaitPlan,
    pub layout: ScrapeLayout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Extracted(ExtractionResult),
    /// The panel never appeared; a diagnostic screenshot was attempted.
    Skipped { tried: Vec<String> },
}

/// Navigate, reveal the panel, wait for it and scrape it.
pub async fn extract_snapshot<P: Page + ?Sized>(
    page: &P,
    url: &str,
    profile: &SnapshotProfile,
    diagnostics: &Diagnostics,
) -> Result<PageOutcome> {
    page.goto(url).await?;
    sleep(profile.settle).await;

    info!("🔍 Looking for specs button...");
    match resolve_and_click(page, &profile.trigger).await? {
        Resolution::Found { selector, position, .. } if position > 0 => {
            info!("Found button with fallback selector: {}", selector)
        }
        Resolution::Found { .. } => {}
        Resolution::NotFound => warn!("⚠️ No specs button matched; waiting for content anyway"),
    }

    info!("Waiting for modal to appear...");
    let container = match await_content(page, &profile.content, diagnostics).await {
        Ok(selector) => selector,
        Err(ScrapeError::ContentTimeout { tried }) => return Ok(PageOutcome::Skipped { tried }),
        Err(e) => return Err(e),
    };

    let html = page.content().await?;
    let result = scrape(&html, &container, &profile.layout)?;
    info!("✅ Extracted {} section(s)", result.len());
    Ok(PageOutcome::Extracted(result))
}
