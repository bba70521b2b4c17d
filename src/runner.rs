//! One function per command: the page-level flows the binary drives.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::Config;
use crate::diagnostics::{Diagnostics, MemoryMonitor, MemorySnapshot};
use crate::error::Result;
use crate::extractor::{extract_snapshot, PageOutcome};
use crate::offers::{crawl_offers, ColorOffer};
use crate::output::{save_json, VariantReport};
use crate::page::Page;
use crate::scrape::ExtractionResult;
use crate::sites;
use crate::variants::drive_variants;

/// Specifications snapshot. `None` means the page was skipped because the
/// panel never appeared.
pub async fn run_specs<P: Page + ?Sized>(page: &P, url: &str, config: &Config) -> Result<Option<ExtractionResult>> {
    let diagnostics = Diagnostics::new(&config.debug_dir);
    match extract_snapshot(page, url, &sites::cellphones_specs(), &diagnostics).await? {
        PageOutcome::Extracted(result) => Ok(Some(result)),
        PageOutcome::Skipped { tried } => {
            warn!("⚠️ Skipping {}: no specifications among {} selector(s)", url, tried.len());
            Ok(None)
        }
    }
}

/// Storage × color crawl with memory diagnostics. The bundle is saved to
/// `config.variants_output` when at least one combination was recorded.
pub async fn run_variants<P: Page + ?Sized + 'static>(page: Arc<P>, url: &str, config: &Config) -> Result<VariantReport> {
    let profile = sites::fpt_variants();

    page.goto(url).await?;
    info!("Waiting for page to fully load...");
    sleep(profile.settle).await;

    info!("📊 Measuring memory after initial load...");
    let initial = MemorySnapshot::take(page.as_ref()).await;
    info!("📦 Memory: {}", initial.summary());

    let monitor = MemoryMonitor::start(Arc::clone(&page), config.memory_interval);
    let run = drive_variants(page.as_ref(), &profile).await;
    monitor.stop();

    info!("📊 Final memory measurement...");
    let final_ = MemorySnapshot::take(page.as_ref()).await;
    info!("📦 Final memory: {}", final_.summary());

    let report = VariantReport::new(run, initial, final_);
    if !report.results.is_empty() {
        save_json(&config.variants_output, &report)?;
    }
    Ok(report)
}

pub async fn run_offers<P: Page + ?Sized>(page: &P, url: &str) -> Result<Vec<ColorOffer>> {
    crawl_offers(page, url, &sites::thegioididong_offers()).await
}
