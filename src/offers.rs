//! Per-color price and promotion crawl.
//!
//! Color options are links to their own product URL, so each color is a
//! fresh navigation followed by a read of the price block, store location,
//! promotions and loyalty points.

use std::time::Duration;

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::Result;
use crate::page::Page;
use crate::selector::{text_of, Query};

/// A price container and the fields read from inside it.
#[derive(Debug, Clone)]
pub struct PriceBlock {
    pub container: String,
    pub current: String,
    pub original: String,
    pub discount: String,
    pub installment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OfferProfile {
    pub settle: Duration,
    /// Color links; their text is the color name and `href` its page.
    pub color_links: String,
    /// Tried in order; the first block present on the page wins.
    pub price_blocks: Vec<PriceBlock>,
    pub location: String,
    pub promo_box: String,
    pub promo_title: String,
    pub promo_items: String,
    pub loyalty_points: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub current_price: String,
    pub original_price: String,
    pub discount: String,
    pub installment_info: String,
    pub location: String,
    pub promo_title: String,
    pub promo_list: Vec<String>,
    pub loyalty_points: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorOffer {
    pub color: String,
    pub url: String,
    #[serde(flatten)]
    pub offer: Offer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reads an offer from rendered HTML. Anything missing is left empty.
pub fn read_offer(html: &str, profile: &OfferProfile) -> Offer {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let mut offer = Offer::default();

    for block in &profile.price_blocks {
        let Some(container) = first(root, &block.container) else {
            continue;
        };
        offer.current_price = first_text(container, &block.current);
        offer.original_price = first_text(container, &block.original);
        offer.discount = first_text(container, &block.discount);
        offer.installment_info = block
            .installment
            .as_deref()
            .map(|sel| first_text(container, sel))
            .unwrap_or_default();
        break;
    }

    offer.location = first_text(root, &profile.location);

    if let Some(promo) = first(root, &profile.promo_box) {
        offer.promo_title = first_text(promo, &profile.promo_title);
        offer.promo_list = all_texts(promo, &profile.promo_items);
    }

    offer.loyalty_points = first_text(root, &profile.loyalty_points);
    offer
}

/// Navigates to every color link found on `url` and reads its offer.
pub async fn crawl_offers<P: Page + ?Sized>(page: &P, url: &str, profile: &OfferProfile) -> Result<Vec<ColorOffer>> {
    page.goto(url).await?;
    sleep(profile.settle).await;

    let names = page.texts(&profile.color_links).await?;
    let hrefs = page.attributes(&profile.color_links, "href").await?;
    let current = page.url().await?;
    // An empty href points back at the page itself, as `a.href` resolves it.
    let colors: Vec<(String, String)> = names
        .into_iter()
        .zip(hrefs)
        .filter_map(|(name, href)| {
            href.map(|h| if h.is_empty() { current.clone() } else { h })
                .map(|h| (name, h))
        })
        .collect();
    info!("🎨 Found {} color option(s)", colors.len());

    let mut results = Vec::with_capacity(colors.len());
    for (color, href) in colors {
        info!("Navigating to color {}: {}", color, href);
        let read = async {
            page.goto(&href).await?;
            sleep(profile.settle).await;
            let html = page.content().await?;
            anyhow::Ok(read_offer(&html, profile))
        };

        let entry = match read.await {
            Ok(offer) => ColorOffer {
                color,
                url: href,
                offer,
                error: None,
            },
            Err(e) => {
                warn!("⚠️ Could not read offer for {}: {:#}", color, e);
                ColorOffer {
                    color,
                    url: href,
                    offer: Offer::default(),
                    error: Some(format!("{:#}", e)),
                }
            }
        };
        results.push(entry);
    }
    Ok(results)
}

fn matches<'a>(scope: ElementRef<'a>, selector: &str) -> Vec<ElementRef<'a>> {
    match Query::parse(selector) {
        Ok(query) => query.select_in(scope),
        Err(e) => {
            warn!("⚠️ {}", e);
            Vec::new()
        }
    }
}

fn first<'a>(scope: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    matches(scope, selector).into_iter().next()
}

fn first_text(scope: ElementRef<'_>, selector: &str) -> String {
    first(scope, selector)
        .map(|el| text_of(&el).trim().to_string())
        .unwrap_or_default()
}

fn all_texts(scope: ElementRef<'_>, selector: &str) -> Vec<String> {
    matches(scope, selector)
        .iter()
        .map(|el| text_of(el).trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites;

    #[test]
    fn reads_primary_price_block_and_promotions() {
        let html = r#"
            <div class="price-one">
                <p class="box-price-present"> 22.990.000₫ </p>
                <p class="box-price-old">25.990.000₫</p>
                <p class="box-price-percent">-11%</p>
                <span class="label--black">Trả góp 0%</span>
            </div>
            <div id="location-detail"><a>Hồ Chí Minh</a></div>
            <div class="block__promo">
                <p class="pr-txtb">Khuyến mãi</p>
                <div class="divb-right"><p>Giảm 500.000₫</p></div>
                <div class="divb-right"><p> Tặng ốp lưng </p></div>
            </div>
            <p class="loyalty__main__point">+5.747 điểm</p>
        "#;

        let offer = read_offer(html, &sites::thegioididong_offers());
        assert_eq!(offer.current_price, "22.990.000₫");
        assert_eq!(offer.original_price, "25.990.000₫");
        assert_eq!(offer.discount, "-11%");
        assert_eq!(offer.installment_info, "Trả góp 0%");
        assert_eq!(offer.location, "Hồ Chí Minh");
        assert_eq!(offer.promo_title, "Khuyến mãi");
        assert_eq!(offer.promo_list, vec!["Giảm 500.000₫", "Tặng ốp lưng"]);
        assert_eq!(offer.loyalty_points, "+5.747 điểm");
    }

    #[test]
    fn falls_back_to_secondary_price_block() {
        let html = r#"
            <div class="bs_title"><div class="bs_price">
                <strong>19.990.000₫</strong><em>21.990.000₫</em><i>-9%</i>
            </div></div>
        "#;

        let offer = read_offer(html, &sites::thegioididong_offers());
        assert_eq!(offer.current_price, "19.990.000₫");
        assert_eq!(offer.original_price, "21.990.000₫");
        assert_eq!(offer.discount, "-9%");
        assert_eq!(offer.installment_info, "");
        assert!(offer.promo_list.is_empty());
    }

    #[test]
    fn empty_page_gives_empty_offer() {
        assert_eq!(read_offer("<html></html>", &sites::thegioididong_offers()), Offer::default());
    }
}
