//! Storage × color crawl of a configurable product.
//!
//! Each combination is driven from the host one step at a time: select the
//! storage option, select the color option, read price and SKU, open the
//! specifications panel, scrape it and close it again. A combination that
//! fails still yields a record.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::page::Page;
use crate::resolver::{resolve, Resolution, SelectorSet};
use crate::scrape::{scrape_sections, ScrapeLayout, SpecSection};
use crate::selector::{text_of, Query};
use crate::wait::{wait_for_content, WaitOutcome, WaitPlan};

pub const SPECS_BUTTON_NOT_FOUND: &str = "Specs button not found";
pub const PANEL_NOT_SHOWN: &str = "Specifications panel did not appear";
pub const MISSING_VARIANTS: &str = "Missing variants";
pub const OPTION_NOT_SELECTED: &str = "Could not select option";

static DEFAULT_SKU_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)sku[=/](\w+)").unwrap());
static PRICE_LIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+[.,]\d+").unwrap());

/// One way of dismissing the specifications panel.
#[derive(Debug, Clone)]
pub enum CloseStrategy {
    /// Click the first element of the first matching selector.
    Click(SelectorSet),
    /// Dispatch a key press, e.g. `Escape`.
    Key(String),
}

#[derive(Debug, Clone)]
pub struct VariantProfile {
    pub settle: Duration,
    /// Option buttons of the first dimension.
    pub storage_options: String,
    /// Option buttons of the second dimension.
    pub color_options: String,
    /// Label inside an option button; falls back to "Storage N"/"Color N".
    pub option_label: String,
    pub storage_settle: Duration,
    pub color_settle: Duration,
    pub price: SelectorSet,
    pub sku_pattern: Regex,
    pub specs_button: SelectorSet,
    pub panel: WaitPlan,
    pub layout: ScrapeLayout,
    pub close: Vec<CloseStrategy>,
    /// Any of these present means the panel is still open.
    pub panel_markers: SelectorSet,
    pub close_settle: Duration,
    pub after_close: Duration,
}

impl VariantProfile {
    pub fn default_sku_pattern() -> Regex {
        DEFAULT_SKU_PATTERN.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRecord {
    pub storage: String,
    pub color: String,
    pub timestamp: String,
    pub price: Option<String>,
    pub sku: Option<String>,
    pub url: Option<String>,
    pub specifications: Vec<SpecSection>,
    pub total_specs: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRun {
    pub results: Vec<VariantRecord>,
    pub total_processed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Price, SKU and URL visible right after a combination is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageState {
    pub price: Option<String>,
    pub sku: Option<String>,
    pub url: Option<String>,
}

/// Visits every storage × color combination once, in order.
pub async fn drive_variants<P: Page + ?Sized>(page: &P, profile: &VariantProfile) -> VariantRun {
    let storage_total = page.count(&profile.storage_options).await.unwrap_or(0);
    let color_total = page.count(&profile.color_options).await.unwrap_or(0);

    if storage_total == 0 || color_total == 0 {
        warn!("❌ Cannot proceed - missing storage or color buttons");
        return VariantRun {
            error: Some(MISSING_VARIANTS.to_string()),
            ..Default::default()
        };
    }

    let total = storage_total * color_total;
    info!("🎯 Will process {} combinations", total);
    let mut results = Vec::with_capacity(total);

    for storage_index in 0..storage_total {
        // Option lists are re-read every time: earlier clicks may have
        // replaced the buttons.
        let Some(storage) = select_option(page, &profile.storage_options, storage_index, &profile.option_label, "Storage").await
        else {
            continue;
        };
        info!("📦 PROCESSING STORAGE: {}", storage.label);
        sleep(profile.storage_settle).await;

        for color_index in 0..color_total {
            let Some(color) = select_option(page, &profile.color_options, color_index, &profile.option_label, "Color").await
            else {
                continue;
            };
            info!("🎨 PROCESSING COLOR: {}", color.label);
            sleep(profile.color_settle).await;

            let record = match (&storage.clicked, &color.clicked) {
                (Err(error), _) | (_, Err(error)) => {
                    let state = capture_state(page, profile).await;
                    failed_record(&storage.label, &color.label, state, error.clone())
                }
                _ => process_combination(page, profile, &storage.label, &color.label).await,
            };
            if let Some(ref error) = record.error {
                warn!("⚠️ {} + {}: {}", storage.label, color.label, error);
            } else {
                info!(
                    "✅ EXTRACTED: {} specs, SKU: {}",
                    record.total_specs,
                    record.sku.as_deref().unwrap_or("Not found")
                );
            }
            results.push(record);
            info!("📊 Progress: {}/{}", results.len(), total);
        }
    }

    info!("🎉 COMPLETED! Processed {} combinations", results.len());
    VariantRun {
        total_processed: results.len(),
        results,
        error: None,
    }
}

/// An option present in the live list. `clicked` holds the record error when
/// selecting it failed.
struct Selection {
    label: String,
    clicked: Result<(), String>,
}

/// Clicks the `index`-th option of a live list. `None` when the list no
/// longer has that many options.
async fn select_option<P: Page + ?Sized>(
    page: &P,
    options: &str,
    index: usize,
    label_selector: &str,
    fallback: &str,
) -> Option<Selection> {
    let html = match page.content().await {
        Ok(html) => html,
        Err(e) => {
            warn!("⚠️ Could not read page while selecting {} {}: {:#}", fallback, index + 1, e);
            return None;
        }
    };
    let Some(label) = option_label(&html, options, index, label_selector) else {
        warn!("⚠️ {} option {} disappeared, skipping", fallback, index + 1);
        return None;
    };
    let label = label.unwrap_or_else(|| format!("{} {}", fallback, index + 1));

    let clicked = page.click(options, index).await.map_err(|e| {
        warn!("⚠️ Could not select {}: {:#}", label, e);
        format!("{} {}: {:#}", OPTION_NOT_SELECTED, label, e)
    });
    Some(Selection { label, clicked })
}

/// `None` when there is no `index`-th option; `Some(None)` when it has no
/// readable label.
fn option_label(html: &str, options: &str, index: usize, label_selector: &str) -> Option<Option<String>> {
    let options = Query::parse(options).ok()?;
    let document = Html::parse_document(html);
    let found = options.select(&document);
    let option = found.get(index)?;

    let label = Query::parse(label_selector)
        .ok()
        .and_then(|q| q.select_in(*option).first().map(|el| text_of(el).trim().to_string()))
        .filter(|text| !text.is_empty());
    Some(label)
}

async fn process_combination<P: Page + ?Sized>(
    page: &P,
    profile: &VariantProfile,
    storage: &str,
    color: &str,
) -> VariantRecord {
    let state = capture_state(page, profile).await;

    info!("🔍 EXTRACTING SPECS for {} + {}...", storage, color);
    let selector = match resolve(page, &profile.specs_button).await {
        Resolution::Found { selector, .. } => selector,
        Resolution::NotFound => {
            return failed_record(storage, color, state, SPECS_BUTTON_NOT_FOUND.to_string());
        }
    };
    if let Err(e) = page.click(&selector, 0).await {
        return failed_record(storage, color, state, format!("{:#}", e));
    }
    info!("📋 Specs button clicked");

    // Once the button is clicked the panel is closed whatever the scrape gave.
    let scraped = read_panel(page, profile).await;
    close_panel(page, profile).await;
    sleep(profile.after_close).await;

    match scraped {
        Ok(specifications) => VariantRecord {
            storage: storage.to_string(),
            color: color.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            price: state.price,
            sku: state.sku,
            url: state.url,
            total_specs: specifications.iter().map(|s| s.spec_count).sum(),
            specifications,
            error: None,
        },
        Err(error) => failed_record(storage, color, state, error),
    }
}

async fn read_panel<P: Page + ?Sized>(page: &P, profile: &VariantProfile) -> Result<Vec<SpecSection>, String> {
    match wait_for_content(page, &profile.panel).await {
        WaitOutcome::Matched(container) => {
            let html = page.content().await.map_err(|e| format!("{:#}", e))?;
            scrape_sections(&html, &container, &profile.layout).map_err(|e| e.to_string())
        }
        WaitOutcome::TimedOut => Err(PANEL_NOT_SHOWN.to_string()),
    }
}

fn failed_record(storage: &str, color: &str, state: PageState, error: String) -> VariantRecord {
    VariantRecord {
        storage: storage.to_string(),
        color: color.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        price: state.price,
        sku: state.sku,
        url: state.url,
        specifications: Vec::new(),
        total_specs: 0,
        error: Some(error),
    }
}

pub async fn capture_state<P: Page + ?Sized>(page: &P, profile: &VariantProfile) -> PageState {
    let mut price = None;
    for selector in profile.price.iter() {
        let Ok(texts) = page.texts(selector).await else {
            continue;
        };
        price = texts.into_iter().find(|t| looks_like_price(t));
        if price.is_some() {
            break;
        }
    }

    let url = page.url().await.ok();
    let sku = url.as_deref().and_then(|u| sku_from_url(&profile.sku_pattern, u));
    PageState { price, sku, url }
}

pub fn looks_like_price(text: &str) -> bool {
    text.contains('đ') || text.contains("VND") || PRICE_LIKE.is_match(text)
}

pub fn sku_from_url(pattern: &Regex, url: &str) -> Option<String> {
    pattern
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Tries each close strategy in turn until the panel markers are gone.
/// Returns `false` when the panel is still open after all of them.
pub async fn close_panel<P: Page + ?Sized>(page: &P, profile: &VariantProfile) -> bool {
    info!("🚪 Attempting to close specs panel...");
    for (i, strategy) in profile.close.iter().enumerate() {
        let fired = match strategy {
            CloseStrategy::Click(set) => match resolve(page, set).await {
                Resolution::Found { selector, .. } => page.click(&selector, 0).await.is_ok(),
                Resolution::NotFound => false,
            },
            CloseStrategy::Key(key) => page.press_key(key).await.is_ok(),
        };
        if !fired {
            continue;
        }

        sleep(profile.close_settle).await;
        if !resolve(page, &profile.panel_markers).await.is_found() {
            info!("✅ Panel closed successfully (method {})", i + 1);
            return true;
        }
        warn!("⚠️ Panel still visible after method {}", i + 1);
    }

    warn!("🤷 Could not close panel, continuing anyway...");
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_comes_from_url_pattern() {
        let pattern = VariantProfile::default_sku_pattern();
        assert_eq!(
            sku_from_url(&pattern, "https://shop.test/phone?sku=00912345&x=1"),
            Some("00912345".to_string())
        );
        assert_eq!(
            sku_from_url(&pattern, "https://shop.test/phone/SKU/ABC_9"),
            Some("ABC_9".to_string())
        );
        assert_eq!(sku_from_url(&pattern, "https://shop.test/phone"), None);
    }

    #[test]
    fn price_heuristic() {
        assert!(looks_like_price("23.990.000đ"));
        assert!(looks_like_price("Giá 1,5 VND"));
        assert!(looks_like_price("12.5"));
        assert!(!looks_like_price("Liên hệ"));
    }

    #[test]
    fn option_label_distinguishes_missing_option_from_missing_label() {
        let html = r#"<div class="opts"><button><span class="b2-medium"> 256GB </span></button><button></button></div>"#;
        assert_eq!(
            option_label(html, ".opts button", 0, "span.b2-medium"),
            Some(Some("256GB".to_string()))
        );
        assert_eq!(option_label(html, ".opts button", 1, "span.b2-medium"), Some(None));
        assert_eq!(option_label(html, ".opts button", 2, "span.b2-medium"), None);
    }
}
